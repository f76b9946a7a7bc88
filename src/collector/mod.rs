// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ephemeral per-node collectors.
//!
//! A collector deploys a DaemonSet, waits for it to become ready, runs a body
//! against its pods and always removes the DaemonSet again, also when the body
//! fails or the run is cancelled.

pub mod logs;
pub mod stats;
pub mod templates;

use crate::constants::collector;
use crate::error::{Result, TeardownError};
use crate::kubernetes::exec::file_exists;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetStatus};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use std::future::Future;
use std::time::Duration;
use templates::CollectorTemplate;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of a collector run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Absent,
    Deploying,
    Ready,
    Collecting,
    TearingDown,
}

/// When the collector pods count as ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Scheduled and ready replica counts match the desired count
    Replicas,
    /// Replicas are ready and every pod has written this file; `{node}` is
    /// replaced by the pod's node name
    MarkerFile(String),
}

impl Readiness {
    fn marker_for(&self, pod: &Pod) -> Option<String> {
        match self {
            Readiness::Replicas => None,
            Readiness::MarkerFile(pattern) => Some(pattern.replace("{node}", &node_of(pod))),
        }
    }
}

/// What to deploy and how to tell it is ready
#[derive(Debug, Clone)]
pub struct CollectorSpec {
    pub name: String,
    pub namespace: String,
    pub selector: String,
    pub manifest: DaemonSet,
    pub readiness: Readiness,
    /// Restrict the run to the pod on this node
    pub node: Option<String>,
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
}

impl CollectorSpec {
    pub fn new(
        template: CollectorTemplate,
        name: &str,
        selector: &str,
        namespace: &str,
        image: &str,
        readiness: Readiness,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            selector: selector.to_string(),
            manifest: template.daemonset(name, namespace, image)?,
            readiness,
            node: None,
            poll_interval: Duration::from_secs(collector::POLL_INTERVAL_SECS),
            ready_timeout: Duration::from_secs(collector::READY_TIMEOUT_SECS),
        })
    }

    /// Log collector waiting for each node's log tarball
    pub fn logs(namespace: &str, image: &str) -> Result<Self> {
        Self::new(
            CollectorTemplate::Logs,
            collector::LOG_COLLECTOR_NAME,
            collector::LOG_COLLECTOR_SELECTOR,
            namespace,
            image,
            Readiness::MarkerFile("/tmp/{node}.tar".to_string()),
        )
    }

    pub fn stats(namespace: &str, image: &str) -> Result<Self> {
        Self::new(
            CollectorTemplate::Stats,
            collector::STATS_COLLECTOR_NAME,
            collector::STATS_COLLECTOR_SELECTOR,
            namespace,
            image,
            Readiness::Replicas,
        )
    }

    pub fn on_node(mut self, node: Option<String>) -> Self {
        self.node = node;
        self
    }
}

/// Whether the DaemonSet runs a ready pod on every node it should
pub fn replicas_ready(status: Option<&DaemonSetStatus>) -> bool {
    status.is_some_and(|s| {
        s.desired_number_scheduled > 0
            && s.current_number_scheduled == s.desired_number_scheduled
            && s.number_ready == s.desired_number_scheduled
    })
}

fn node_of(pod: &Pod) -> String {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.clone())
        .unwrap_or_default()
}

/// The collector's deployed DaemonSet
pub struct JobSet {
    api: Api<DaemonSet>,
    name: String,
    uid: Option<String>,
}

impl JobSet {
    /// Create the DaemonSet, adopting one left behind by an earlier run
    #[instrument(skip(client, spec), fields(name = %spec.name))]
    pub async fn acquire(client: &Client, spec: &CollectorSpec) -> Result<Self> {
        let api: Api<DaemonSet> = Api::namespaced(client.clone(), &spec.namespace);
        info!("Deploying collection DaemonSet [{}]..", spec.name);

        let daemonset = match api.create(&PostParams::default(), &spec.manifest).await {
            Ok(created) => created,
            Err(e) => {
                let err = TeardownError::from(e);
                if !err.is_already_exists() {
                    return Err(err);
                }
                debug!("DaemonSet {} already exists, reusing it", spec.name);
                api.get(&spec.name).await?
            }
        };

        Ok(Self {
            api,
            name: spec.name.clone(),
            uid: daemonset.uid(),
        })
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    async fn status(&self) -> Result<Option<DaemonSetStatus>> {
        Ok(self.api.get(&self.name).await?.status)
    }

    /// Delete the DaemonSet and wait until it is gone
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn release(&self, poll_interval: Duration, timeout: Duration) -> Result<()> {
        info!("Removing collection DaemonSet [{}]..", self.name);
        match self
            .api
            .delete(&self.name, &DeleteParams::background())
            .await
        {
            Ok(_) => {}
            Err(kube::Error::Api(err)) if err.code == 404 => {}
            Err(e) => return Err(e.into()),
        }

        let deadline = Instant::now() + timeout;
        while self.api.get_opt(&self.name).await?.is_some() {
            if Instant::now() >= deadline {
                return Err(TeardownError::Timeout {
                    operation: format!("remove DaemonSet {}", self.name),
                    source: Box::new(TeardownError::CollectorError(
                        "DaemonSet still present".to_string(),
                    )),
                });
            }
            sleep(poll_interval).await;
        }

        info!("Collection DaemonSet [{}] removed successfully", self.name);
        Ok(())
    }
}

/// The collector pods a body runs against
pub struct Members {
    pub api: Api<Pod>,
    pub pods: Vec<Pod>,
}

pub struct Collector {
    client: Client,
    spec: CollectorSpec,
    state: CollectorState,
}

impl Collector {
    pub fn new(client: Client, spec: CollectorSpec) -> Self {
        Self {
            client,
            spec,
            state: CollectorState::Absent,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    fn transition(&mut self, state: CollectorState) {
        debug!(
            "Collector {} {:?} -> {:?}",
            self.spec.name, self.state, state
        );
        self.state = state;
    }

    /// Deploy, wait for readiness, run `body` and tear down.
    ///
    /// The DaemonSet is released on every path once it was created. An error
    /// from `body` or the wait takes precedence over a release error.
    pub async fn run<F, Fut, T>(&mut self, cancel: &CancellationToken, body: F) -> Result<T>
    where
        F: FnOnce(Members) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(TeardownError::Cancelled);
        }

        self.transition(CollectorState::Deploying);
        let jobs = match JobSet::acquire(&self.client, &self.spec).await {
            Ok(jobs) => jobs,
            Err(e) => {
                self.transition(CollectorState::Absent);
                return Err(e);
            }
        };

        let result = self.collect(&jobs, cancel, body).await;

        self.transition(CollectorState::TearingDown);
        let released = jobs
            .release(self.spec.poll_interval, self.spec.ready_timeout)
            .await;
        self.transition(CollectorState::Absent);

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), released) => {
                if let Err(release_err) = released {
                    warn!(
                        "Failed to remove DaemonSet {}: {}",
                        self.spec.name, release_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn collect<F, Fut, T>(
        &mut self,
        jobs: &JobSet,
        cancel: &CancellationToken,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(Members) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let pods = self.wait_ready(jobs, cancel).await?;
        self.transition(CollectorState::Ready);

        let members = Members {
            api: Api::namespaced(self.client.clone(), &self.spec.namespace),
            pods,
        };
        self.transition(CollectorState::Collecting);
        tokio::select! {
            _ = cancel.cancelled() => Err(TeardownError::Cancelled),
            result = body(members) => result,
        }
    }

    /// Poll until the DaemonSet is ready, returning its pods
    async fn wait_ready(&self, jobs: &JobSet, cancel: &CancellationToken) -> Result<Vec<Pod>> {
        info!("Waiting for DaemonSet [{}] to be ready..", self.spec.name);
        let deadline = Instant::now() + self.spec.ready_timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(TeardownError::Cancelled);
            }

            if replicas_ready(jobs.status().await?.as_ref()) {
                let pods = self.members(jobs).await?;
                if pods.is_empty() {
                    if let Some(node) = &self.spec.node {
                        return Err(TeardownError::CollectorError(format!(
                            "no collector pod on node [{}]",
                            node
                        )));
                    }
                } else if self.markers_present(&pods).await {
                    info!("DaemonSet [{}] deployed successfully", self.spec.name);
                    return Ok(pods);
                }
            }

            if Instant::now() >= deadline {
                return Err(TeardownError::Timeout {
                    operation: format!("wait for DaemonSet {}", self.spec.name),
                    source: Box::new(TeardownError::CollectorError("not ready".to_string())),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(TeardownError::Cancelled),
                _ = sleep(self.spec.poll_interval) => {}
            }
        }
    }

    /// Pods owned by this run's DaemonSet, optionally on one node
    async fn members(&self, jobs: &JobSet) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.spec.namespace);
        let pods = api
            .list(&ListParams::default().labels(&self.spec.selector))
            .await?
            .items;

        Ok(pods
            .into_iter()
            .filter(|pod| {
                pod.owner_references()
                    .iter()
                    .any(|owner| Some(owner.uid.as_str()) == jobs.uid())
            })
            .filter(|pod| {
                self.spec
                    .node
                    .as_ref()
                    .map_or(true, |node| node_of(pod) == *node)
            })
            .collect())
    }

    async fn markers_present(&self, pods: &[Pod]) -> bool {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.spec.namespace);
        for pod in pods {
            if let Some(marker) = self.spec.readiness.marker_for(pod) {
                if !file_exists(&api, pod, &marker).await {
                    debug!("Waiting for {} on [{}]", marker, node_of(pod));
                    return false;
                }
            }
        }
        true
    }
}

/// Image of the running cattle agent, reused for the collector pods
pub async fn find_agent_image(client: &Client, namespace: &str) -> Result<String> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let agents = pods
        .list(&ListParams::default().labels(collector::AGENT_SELECTOR))
        .await?;

    agents
        .items
        .iter()
        .find_map(|pod| {
            pod.spec
                .as_ref()
                .and_then(|s| s.containers.first())
                .and_then(|c| c.image.clone())
        })
        .ok_or_else(|| {
            TeardownError::CollectorError("can't find node agent image on this cluster".to_string())
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterProvider {
    Rke,
}

pub fn is_rke_node(node: &Node) -> bool {
    node.annotations().keys().any(|key| {
        key.split_once('/')
            .map_or(key.as_str(), |(domain, _)| domain)
            .ends_with(collector::RKE_ANNOTATION_DOMAIN)
    })
}

/// Work out how the cluster was provisioned from its node metadata
pub async fn detect_cluster_provider(client: &Client) -> Result<ClusterProvider> {
    let nodes: Api<Node> = Api::all(client.clone());
    let nodes = nodes.list(&ListParams::default()).await?;

    if nodes.items.iter().any(is_rke_node) {
        Ok(ClusterProvider::Rke)
    } else {
        Err(TeardownError::CollectorError("can't figure out cluster provider".to_string()))
    }
}
