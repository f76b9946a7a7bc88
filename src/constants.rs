// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Identifying marks left behind by the management plane
pub mod marks {
    /// Controller name carried by the management plane's finalizers
    pub const CONTROLLER_NAME: &str = "controller.cattle.io";
    /// Domain shared by every label, annotation and API group of the installation
    pub const LABEL_BASE: &str = "cattle.io";
    /// Label attributing an object to the component that created it
    pub const CREATOR_LABEL: &str = "cattle.io/creator";
    /// Creator label value used by the management plane's API layer
    pub const CREATOR_VALUE: &str = "norman";
}

/// Namespace the management plane is deployed into by default
pub const DEFAULT_NAMESPACE: &str = "cattle-system";

/// Cluster roles created by the management plane without a creator label
pub const STATIC_CLUSTER_ROLES: &[&str] = &[
    "cluster-owner",
    "create-ns",
    "project-owner",
    "project-owner-promoted",
];

/// Grace period used when deleting management aggregates (projects, clusters, nodes)
pub const AGGREGATE_GRACE_PERIOD_SECS: u32 = 120;

/// Retry configuration defaults
pub mod retry {
    /// Attempts per teardown stage
    pub const STAGE_ATTEMPTS: u32 = 3;
    /// Pause between stage attempts in seconds
    pub const STAGE_INTERVAL_SECS: u64 = 2;
    /// Wall-clock budget for resolving a write conflict on one object
    pub const CONFLICT_TIMEOUT_SECS: u64 = 60;
    /// Polling interval while resolving a write conflict
    pub const CONFLICT_INTERVAL_SECS: u64 = 2;
    /// Objects of one type updated or deleted concurrently
    pub const CONCURRENCY: usize = 8;
}

/// Collector DaemonSet configuration
pub mod collector {
    pub const LOG_COLLECTOR_NAME: &str = "log-collector";
    pub const LOG_COLLECTOR_SELECTOR: &str = "k8s-app=log-collector";
    pub const STATS_COLLECTOR_NAME: &str = "stats-collector";
    pub const STATS_COLLECTOR_SELECTOR: &str = "k8s-app=stats-collector";
    pub const DEFAULT_STATS_COMMAND: &str = "/usr/bin/sar -u -r -F 1 1";
    pub const DEFAULT_LOGS_OUTPUT: &str = "cluster-logs.tar";
    /// Label selecting the running agent pods whose image the collectors reuse
    pub const AGENT_SELECTOR: &str = "app=cattle-agent";
    /// Node annotation domain identifying an RKE provisioned node
    pub const RKE_ANNOTATION_DOMAIN: &str = "rke.cattle.io";
    /// Readiness polling interval in seconds
    pub const POLL_INTERVAL_SECS: u64 = 1;
    /// Pause between stats rounds in seconds
    pub const STATS_INTERVAL_SECS: u64 = 5;
    /// Maximum time to wait for the DaemonSet to become ready or go away
    pub const READY_TIMEOUT_SECS: u64 = 300;
}
