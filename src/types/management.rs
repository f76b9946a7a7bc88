// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Aggregate kinds of the management API (`management.cattle.io/v3`).
//!
//! Only the fields needed to identify and delete these objects are modelled.

use crate::config::InstallationConfig;
use kube::{CustomResource, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "management.cattle.io", version = "v3", kind = "Project")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "management.cattle.io", version = "v3", kind = "Cluster")]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Set on the management cluster itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "management.cattle.io", version = "v3", kind = "User")]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "management.cattle.io", version = "v3", kind = "Node")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_hostname: Option<String>,
}

/// A management aggregate that is deleted wholesale during teardown
pub trait Aggregate:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Whether a namespace named after the object holds its scoped resources
    const OWNS_NAMESPACE: bool;

    /// Human readable name for log lines
    fn display_name(&self) -> String;

    /// Grace period to delete the object with
    fn grace_period(&self, config: &InstallationConfig) -> u32 {
        config.aggregate_grace_period
    }
}

impl Aggregate for Project {
    const OWNS_NAMESPACE: bool = true;

    fn display_name(&self) -> String {
        self.spec
            .display_name
            .clone()
            .unwrap_or_else(|| self.name_any())
    }
}

impl Aggregate for Cluster {
    const OWNS_NAMESPACE: bool = true;

    fn display_name(&self) -> String {
        self.spec
            .display_name
            .clone()
            .unwrap_or_else(|| self.name_any())
    }
}

impl Aggregate for User {
    const OWNS_NAMESPACE: bool = true;

    fn display_name(&self) -> String {
        self.name_any()
    }

    fn grace_period(&self, _config: &InstallationConfig) -> u32 {
        0
    }
}

impl Aggregate for Node {
    const OWNS_NAMESPACE: bool = false;

    fn display_name(&self) -> String {
        self.spec
            .requested_hostname
            .clone()
            .or_else(|| self.spec.display_name.clone())
            .unwrap_or_else(|| self.name_any())
    }
}
