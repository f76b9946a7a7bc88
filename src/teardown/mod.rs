// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ordered teardown of the management plane.
//!
//! Stages run strictly one after another. Later stages depend on earlier ones
//! having removed the finalizers that would otherwise block deletion, and the
//! installation namespace always goes last.

pub mod cascade;
pub mod classify;
pub mod strip;
pub mod sweep;

use crate::config::{InstallationConfig, RetrySettings};
use crate::error::Result;
use crate::kubernetes::ResourceCatalog;
use crate::retry::RetryPolicy;
use crate::types::{Cluster, Node, Project, User};
use cascade::{AggregateSweep, DeleteSweep};
use classify::Classifier;
use kube::Client;
use std::fmt;
use std::sync::Arc;
use strip::{strip_all, StripMode};
use sweep::{run_sweep, SweepReport};
use tracing::{info, instrument};

/// The stages of a teardown, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Deployments,
    ClusterRoleBindings,
    ClusterRoles,
    StripMarks,
    Projects,
    Nodes,
    Clusters,
    Users,
    InstallationResources,
    CustomResourceDefinitions,
    CreatorLabels,
    Namespace,
}

impl StageKind {
    pub const ALL: [StageKind; 12] = [
        StageKind::Deployments,
        StageKind::ClusterRoleBindings,
        StageKind::ClusterRoles,
        StageKind::StripMarks,
        StageKind::Projects,
        StageKind::Nodes,
        StageKind::Clusters,
        StageKind::Users,
        StageKind::InstallationResources,
        StageKind::CustomResourceDefinitions,
        StageKind::CreatorLabels,
        StageKind::Namespace,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Deployments => "deployments",
            StageKind::ClusterRoleBindings => "cluster-role-bindings",
            StageKind::ClusterRoles => "cluster-roles",
            StageKind::StripMarks => "strip-marks",
            StageKind::Projects => "projects",
            StageKind::Nodes => "nodes",
            StageKind::Clusters => "clusters",
            StageKind::Users => "users",
            StageKind::InstallationResources => "installation-resources",
            StageKind::CustomResourceDefinitions => "custom-resource-definitions",
            StageKind::CreatorLabels => "creator-labels",
            StageKind::Namespace => "namespace",
        }
    }

    /// What the stage removes, for log lines
    fn subject(&self) -> &'static str {
        match self {
            StageKind::Deployments => "Cattle deployments",
            StageKind::ClusterRoleBindings => "ClusterRoleBindings",
            StageKind::ClusterRoles => "ClusterRoles",
            StageKind::StripMarks => "Cattle annotations, finalizers and labels",
            StageKind::Projects => "Projects",
            StageKind::Nodes => "Machines",
            StageKind::Clusters => "Clusters",
            StageKind::Users => "Users",
            StageKind::InstallationResources => "Cattle resources",
            StageKind::CustomResourceDefinitions => "Cattle CRDs",
            StageKind::CreatorLabels => "remaining Cattle marks",
            StageKind::Namespace => "the installation namespace",
        }
    }

    pub fn action(&self) -> StageAction {
        match self {
            StageKind::StripMarks | StageKind::CreatorLabels => StageAction::StripMarks,
            _ => StageAction::Delete,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAction {
    Delete,
    StripMarks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub kind: StageKind,
    pub action: StageAction,
    pub retry: RetryPolicy,
}

/// The fixed stage sequence of a run
#[derive(Debug, Clone)]
pub struct TeardownPlan {
    stages: Vec<Stage>,
}

impl TeardownPlan {
    pub fn standard(settings: &RetrySettings) -> Self {
        let retry = settings.stage_policy();
        let stages = StageKind::ALL
            .iter()
            .map(|kind| Stage {
                kind: *kind,
                action: kind.action(),
                retry: retry.clone(),
            })
            .collect();
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

/// What a run did, per stage
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub stages: Vec<(StageKind, SweepReport)>,
}

impl TeardownReport {
    pub fn stage(&self, kind: StageKind) -> Option<&SweepReport> {
        self.stages
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, report)| report)
    }

    /// Objects deleted or stripped over the whole run
    pub fn total_changes(&self) -> usize {
        self.stages.iter().map(|(_, r)| r.changes()).sum()
    }
}

/// Removes one management-plane installation from a cluster
pub struct Teardown {
    client: Client,
    classifier: Classifier,
    settings: RetrySettings,
    plan: TeardownPlan,
}

impl Teardown {
    pub fn new(client: Client, config: InstallationConfig, settings: RetrySettings) -> Self {
        let plan = TeardownPlan::standard(&settings);
        Self {
            client,
            classifier: Classifier::new(Arc::new(config)),
            settings,
            plan,
        }
    }

    fn config(&self) -> &InstallationConfig {
        self.classifier.config()
    }

    /// Run every stage in order, aborting on the first stage that fails
    #[instrument(skip(self), fields(namespace = %self.config().namespace))]
    pub async fn run(&self) -> Result<TeardownReport> {
        info!(
            "Removing Rancher management plane in namespace: [{}]",
            self.config().namespace
        );
        let mut report = TeardownReport::default();

        for stage in self.plan.stages() {
            info!("Removing {}", stage.kind.subject());
            let outcome = stage
                .retry
                .run(stage.kind.name(), || self.run_stage(stage.kind))
                .await?;
            info!(
                stage = %stage.kind,
                deleted = outcome.deleted,
                stripped = outcome.stripped,
                "Successfully removed {}",
                stage.kind.subject()
            );
            report.stages.push((stage.kind, outcome));
        }

        info!("Rancher Management Plane removed successfully");
        Ok(report)
    }

    async fn run_stage(&self, kind: StageKind) -> Result<SweepReport> {
        let client = &self.client;
        let classifier = &self.classifier;
        let settings = &self.settings;
        let concurrency = settings.concurrency;

        match kind {
            StageKind::Deployments => {
                let sweep = DeleteSweep::deployments(client, classifier, settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::ClusterRoleBindings => {
                let sweep = DeleteSweep::cluster_role_bindings(client, classifier, settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::ClusterRoles => {
                let sweep = DeleteSweep::cluster_roles(client, classifier, settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::StripMarks => {
                let mode = StripMode::PreserveCreator;
                strip_all(kind.name(), client, classifier, settings, mode).await
            }
            StageKind::Projects => {
                let sweep =
                    AggregateSweep::<Project>::new(kind.name(), client, self.config(), settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::Nodes => {
                let sweep =
                    AggregateSweep::<Node>::new(kind.name(), client, self.config(), settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::Clusters => {
                let sweep =
                    AggregateSweep::<Cluster>::new(kind.name(), client, self.config(), settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::Users => {
                let sweep =
                    AggregateSweep::<User>::new(kind.name(), client, self.config(), settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::InstallationResources => self.remove_installation_resources().await,
            StageKind::CustomResourceDefinitions => {
                let sweep = DeleteSweep::custom_resource_definitions(client, classifier, settings);
                run_sweep(&sweep, concurrency).await
            }
            StageKind::CreatorLabels => {
                strip_all(kind.name(), client, classifier, settings, StripMode::Full).await
            }
            StageKind::Namespace => {
                let sweep = DeleteSweep::installation_namespace(client, classifier, settings);
                run_sweep(&sweep, concurrency).await
            }
        }
    }

    /// Delete every instance of every type served under the installation's groups
    async fn remove_installation_resources(&self) -> Result<SweepReport> {
        let catalog = ResourceCatalog::discover(&self.client).await?;
        let config = self.config();
        let mut report = SweepReport::default();

        for descriptor in catalog
            .in_groups(|group| config.is_installation_domain(group))
            .into_iter()
            .filter(|d| d.is_deletable())
        {
            let sweep = DeleteSweep::installation_resources(
                &self.client,
                &self.classifier,
                &self.settings,
                descriptor,
            );
            report.merge(run_sweep(&sweep, self.settings.concurrency).await?);
        }

        Ok(report)
    }
}
