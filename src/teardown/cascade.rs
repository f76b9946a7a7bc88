// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deletion sweeps for owned objects and management aggregates

use crate::config::{InstallationConfig, RetrySettings};
use crate::error::Result;
use crate::kubernetes::namespaces::namespace_delete_params;
use crate::kubernetes::{
    delete_namespace, list_in, list_objects, LiveObject, ManagementClient, ResourceTypeDescriptor,
};
use crate::teardown::classify::{Classifier, Verdict};
use crate::teardown::sweep::{Outcome, Sweep};
use crate::types::Aggregate;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, ListParams, PropagationPolicy};
use kube::{Client, ResourceExt};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Delete parameters for installation custom resources and their definitions
pub fn foreground_delete_params() -> DeleteParams {
    DeleteParams {
        propagation_policy: Some(PropagationPolicy::Foreground),
        ..Default::default()
    }
}

/// Delete parameters for cluster-scoped RBAC objects
pub fn orphan_delete_params() -> DeleteParams {
    DeleteParams {
        propagation_policy: Some(PropagationPolicy::Orphan),
        grace_period_seconds: Some(0),
        ..Default::default()
    }
}

/// Deletes the owned objects of one resource type.
///
/// Candidates come from a list (optionally label-selected) and from a fixed set
/// of names fetched one by one. Objects that are not owned are left alone.
pub struct DeleteSweep<'a> {
    stage: &'static str,
    client: &'a Client,
    classifier: &'a Classifier,
    retry: &'a RetrySettings,
    descriptor: ResourceTypeDescriptor,
    namespace: Option<String>,
    list_params: Option<ListParams>,
    names: Vec<String>,
    delete_params: DeleteParams,
}

impl<'a> DeleteSweep<'a> {
    pub fn new(
        stage: &'static str,
        client: &'a Client,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
        descriptor: ResourceTypeDescriptor,
    ) -> Self {
        Self {
            stage,
            client,
            classifier,
            retry,
            descriptor,
            namespace: None,
            list_params: Some(ListParams::default()),
            names: Vec::new(),
            delete_params: DeleteParams::default(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_selector(mut self, selector: &str) -> Self {
        self.list_params = Some(ListParams::default().labels(selector));
        self
    }

    /// Only consider the named objects, never list
    pub fn named_only(mut self) -> Self {
        self.list_params = None;
        self
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_delete_params(mut self, params: DeleteParams) -> Self {
        self.delete_params = params;
        self
    }

    /// Deployments in the installation namespace
    pub fn deployments(
        client: &'a Client,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
    ) -> Self {
        let namespace = classifier.config().namespace.clone();
        Self::new(
            "deployments",
            client,
            classifier,
            retry,
            ResourceTypeDescriptor::deployment(),
        )
        .in_namespace(namespace)
    }

    /// Cluster role bindings carrying the creator label
    pub fn cluster_role_bindings(
        client: &'a Client,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
    ) -> Self {
        let selector = classifier.config().creator_selector();
        Self::new(
            "cluster-role-bindings",
            client,
            classifier,
            retry,
            ResourceTypeDescriptor::cluster_role_binding(),
        )
        .with_selector(&selector)
        .with_delete_params(orphan_delete_params())
    }

    /// Cluster roles carrying the creator label plus the static set
    pub fn cluster_roles(
        client: &'a Client,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
    ) -> Self {
        let config = classifier.config();
        let selector = config.creator_selector();
        let names = config.static_cluster_roles.clone();
        Self::new(
            "cluster-roles",
            client,
            classifier,
            retry,
            ResourceTypeDescriptor::cluster_role(),
        )
        .with_selector(&selector)
        .with_names(names)
        .with_delete_params(orphan_delete_params())
    }

    /// Every instance of a type in one of the installation's API groups
    pub fn installation_resources(
        client: &'a Client,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
        descriptor: ResourceTypeDescriptor,
    ) -> Self {
        Self::new(
            "installation-resources",
            client,
            classifier,
            retry,
            descriptor,
        )
        .with_delete_params(foreground_delete_params())
    }

    /// Definitions of the installation's API groups
    pub fn custom_resource_definitions(
        client: &'a Client,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
    ) -> Self {
        Self::new(
            "custom-resource-definitions",
            client,
            classifier,
            retry,
            ResourceTypeDescriptor::custom_resource_definition(),
        )
        .with_delete_params(foreground_delete_params())
    }

    /// The installation namespace itself
    pub fn installation_namespace(
        client: &'a Client,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
    ) -> Self {
        let namespace = classifier.config().namespace.clone();
        Self::new(
            "namespace",
            client,
            classifier,
            retry,
            ResourceTypeDescriptor::namespace(),
        )
        .named_only()
        .with_names([namespace])
        .with_delete_params(namespace_delete_params())
    }

    async fn get(&self, name: &str) -> Result<Option<LiveObject>> {
        let api = self.descriptor.api(self.client, self.namespace.as_deref());
        Ok(api.get_opt(name).await?.map(LiveObject::from))
    }
}

impl Sweep for DeleteSweep<'_> {
    type Object = LiveObject;

    fn stage(&self) -> &str {
        self.stage
    }

    fn describe(&self, object: &LiveObject) -> String {
        format!("{} {}", self.descriptor, object)
    }

    async fn list(&self) -> Result<Vec<LiveObject>> {
        let mut objects = match (&self.list_params, &self.namespace) {
            (None, _) => Vec::new(),
            (Some(params), Some(ns)) => {
                list_in(self.client, &self.descriptor, Some(ns.as_str()), params).await?
            }
            (Some(params), None) => list_objects(self.client, &self.descriptor, params).await?,
        };

        let mut seen: BTreeSet<String> = objects.iter().map(|o| o.name()).collect();
        for name in &self.names {
            if !seen.insert(name.clone()) {
                continue;
            }
            match self.get(name).await? {
                Some(object) => objects.push(object),
                None => debug!("{} {} already absent", self.descriptor, name),
            }
        }

        Ok(objects)
    }

    fn classify(&self, object: &LiveObject) -> Verdict {
        self.classifier.classify(&self.descriptor, object.meta())
    }

    async fn act(&self, object: LiveObject, verdict: Verdict) -> Result<Outcome> {
        if verdict != Verdict::Owned {
            debug!(
                "Leaving {} {} in place ({:?})",
                self.descriptor, object, verdict
            );
            return Ok(Outcome::Skipped);
        }

        let namespace = object.namespace();
        let api = self.descriptor.api(self.client, namespace.as_deref());
        let name = object.name();
        let pending = object.meta().deletion_timestamp.is_some();

        let action = format!("delete {} {}", self.descriptor, object);
        let deleted = self
            .retry
            .conflict_policy()
            .run(&action, || async {
                match api.delete(&name, &self.delete_params).await {
                    Ok(_) => Ok(true),
                    Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        if deleted && !pending {
            info!("Removed {} {}", self.descriptor, object);
            Ok(Outcome::Deleted)
        } else {
            Ok(Outcome::Skipped)
        }
    }
}

/// A management aggregate with the namespaces that hold its scoped resources
#[derive(Debug, Clone)]
pub struct AggregateTarget<K> {
    pub object: K,
    pub namespaces: Vec<String>,
}

/// Deletes every instance of a management aggregate kind
pub struct AggregateSweep<'a, K> {
    stage: &'static str,
    client: &'a Client,
    management: ManagementClient,
    config: &'a InstallationConfig,
    retry: &'a RetrySettings,
    kind: PhantomData<fn() -> K>,
}

impl<'a, K: Aggregate> AggregateSweep<'a, K> {
    pub fn new(
        stage: &'static str,
        client: &'a Client,
        config: &'a InstallationConfig,
        retry: &'a RetrySettings,
    ) -> Self {
        Self {
            stage,
            client,
            management: ManagementClient::new(client.clone()),
            config,
            retry,
            kind: PhantomData,
        }
    }

    fn delete_params(&self, object: &K) -> DeleteParams {
        DeleteParams {
            propagation_policy: Some(PropagationPolicy::Orphan),
            grace_period_seconds: Some(object.grace_period(self.config)),
            ..Default::default()
        }
    }
}

/// Namespaces named after the object or owned by it
pub fn namespaces_of<K: Aggregate>(object: &K, namespaces: &[Namespace]) -> Vec<String> {
    let mut found = BTreeSet::new();
    found.insert(object.name_any());
    if let Some(uid) = object.uid() {
        for ns in namespaces {
            if ns.owner_references().iter().any(|owner| owner.uid == uid) {
                found.insert(ns.name_any());
            }
        }
    }
    found.into_iter().collect()
}

impl<K: Aggregate> Sweep for AggregateSweep<'_, K> {
    type Object = AggregateTarget<K>;

    fn stage(&self) -> &str {
        self.stage
    }

    fn describe(&self, target: &AggregateTarget<K>) -> String {
        format!("{} {}", K::kind(&()), target.object.name_any())
    }

    async fn list(&self) -> Result<Vec<AggregateTarget<K>>> {
        let objects = self.management.list::<K>().await?;
        if objects.is_empty() || !K::OWNS_NAMESPACE {
            return Ok(objects
                .into_iter()
                .map(|object| AggregateTarget {
                    object,
                    namespaces: Vec::new(),
                })
                .collect());
        }

        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let existing = namespaces.list(&ListParams::default()).await?.items;
        Ok(objects
            .into_iter()
            .map(|object| {
                let namespaces = namespaces_of(&object, &existing);
                AggregateTarget { object, namespaces }
            })
            .collect())
    }

    fn classify(&self, _target: &AggregateTarget<K>) -> Verdict {
        Verdict::Owned
    }

    async fn act(&self, target: AggregateTarget<K>, _verdict: Verdict) -> Result<Outcome> {
        let AggregateTarget { object, namespaces } = target;
        info!("Deleting {} [{}]..", K::kind(&()), object.display_name());

        let mut changed = false;
        for namespace in &namespaces {
            changed |= delete_namespace(self.client, namespace, self.retry).await?;
        }

        let params = self.delete_params(&object);
        let pending = object.meta().deletion_timestamp.is_some();
        let action = format!("delete {} {}", K::kind(&()), object.name_any());
        let deleted = self
            .retry
            .conflict_policy()
            .run(&action, || self.management.delete(&object, &params))
            .await?;
        changed |= deleted && !pending;

        Ok(if changed {
            Outcome::Deleted
        } else {
            Outcome::Skipped
        })
    }
}
