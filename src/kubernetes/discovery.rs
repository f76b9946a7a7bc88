// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Runtime discovery of every resource type the cluster serves

use crate::error::{Result, TeardownError};
use crate::kubernetes::LiveObject;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::{Client, Resource};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// A resource type served by the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeDescriptor {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
    pub verbs: BTreeSet<String>,
}

impl ResourceTypeDescriptor {
    /// Build a descriptor from a discovery entry of the given group version
    pub fn from_api_resource(group_version: &str, resource: &APIResource) -> Self {
        let (default_group, default_version) = match group_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", group_version),
        };

        Self {
            group: resource
                .group
                .clone()
                .unwrap_or_else(|| default_group.to_string()),
            version: resource
                .version
                .clone()
                .unwrap_or_else(|| default_version.to_string()),
            kind: resource.kind.clone(),
            plural: resource.name.clone(),
            namespaced: resource.namespaced,
            verbs: resource.verbs.iter().cloned().collect(),
        }
    }

    /// Descriptor of a typed resource with the standard verbs
    pub fn of<K: Resource<DynamicType = ()>>(namespaced: bool) -> Self {
        Self {
            group: K::group(&()).to_string(),
            version: K::version(&()).to_string(),
            kind: K::kind(&()).to_string(),
            plural: K::plural(&()).to_string(),
            namespaced,
            verbs: ["create", "delete", "get", "list", "patch", "update"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
        }
    }

    pub fn namespace() -> Self {
        Self::of::<Namespace>(false)
    }

    pub fn deployment() -> Self {
        Self::of::<Deployment>(true)
    }

    pub fn cluster_role() -> Self {
        Self::of::<ClusterRole>(false)
    }

    pub fn cluster_role_binding() -> Self {
        Self::of::<ClusterRoleBinding>(false)
    }

    pub fn custom_resource_definition() -> Self {
        Self::of::<CustomResourceDefinition>(false)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }

    pub fn supports(&self, verb: &str) -> bool {
        self.verbs.contains(verb)
    }

    /// Sub-resources like `pods/status` or `deployments/scale`
    pub fn is_subresource(&self) -> bool {
        self.plural.contains('/')
    }

    /// Whether instances can be listed and written back
    pub fn is_updatable(&self) -> bool {
        !self.is_subresource() && self.supports("update") && self.supports("list")
    }

    /// Whether instances can be listed and deleted
    pub fn is_deletable(&self) -> bool {
        !self.is_subresource() && self.supports("delete") && self.supports("list")
    }

    /// Dynamic API handle, scoped to a namespace when one is given for a namespaced type
    pub fn api(&self, client: &Client, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = self.api_resource();
        match namespace {
            Some(ns) if self.namespaced => Api::namespaced_with(client.clone(), ns, &resource),
            _ => Api::all_with(client.clone(), &resource),
        }
    }
}

impl fmt::Display for ResourceTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.plural)
        } else {
            write!(f, "{}.{}", self.plural, self.group)
        }
    }
}

/// Every resource type the cluster serves at the time of discovery
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    types: Vec<ResourceTypeDescriptor>,
}

impl ResourceCatalog {
    pub fn new(types: Vec<ResourceTypeDescriptor>) -> Self {
        Self { types }
    }

    /// Enumerate the core group and the preferred version of every API group.
    ///
    /// A named group whose resources cannot be fetched (its CRDs are being
    /// removed by someone else) is skipped with a warning. The core group is
    /// always served, so failing to list it fails discovery.
    #[instrument(skip(client))]
    pub async fn discover(client: &Client) -> Result<Self> {
        let mut types = Vec::new();

        let core = client.list_core_api_versions().await?;
        for version in &core.versions {
            let list = client.list_core_api_resources(version).await?;
            types.extend(resources_of(&list));
        }

        let groups = client.list_api_groups().await?;
        for group in &groups.groups {
            let Some(group_version) = group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first())
                .map(|v| v.group_version.clone())
            else {
                warn!("API group {} advertises no versions, skipping", group.name);
                continue;
            };

            match client.list_api_group_resources(&group_version).await {
                Ok(list) => types.extend(resources_of(&list)),
                Err(e) => warn!("Can't list API resources for [{}]: {}", group_version, e),
            }
        }

        if types.is_empty() {
            return Err(TeardownError::DiscoveryError(
                "API server reported no resource types".to_string(),
            ));
        }

        info!("Discovered {} resource types", types.len());
        Ok(Self { types })
    }

    pub fn types(&self) -> &[ResourceTypeDescriptor] {
        &self.types
    }

    /// Types whose instances can be listed and updated
    pub fn updatable(&self) -> Vec<ResourceTypeDescriptor> {
        self.types
            .iter()
            .filter(|t| t.is_updatable())
            .cloned()
            .collect()
    }

    /// Types belonging to groups matched by `predicate`
    pub fn in_groups<P>(&self, predicate: P) -> Vec<ResourceTypeDescriptor>
    where
        P: Fn(&str) -> bool,
    {
        self.types
            .iter()
            .filter(|t| !t.is_subresource() && predicate(&t.group))
            .cloned()
            .collect()
    }
}

fn resources_of(list: &APIResourceList) -> impl Iterator<Item = ResourceTypeDescriptor> + '_ {
    list.resources
        .iter()
        .map(|r| ResourceTypeDescriptor::from_api_resource(&list.group_version, r))
        .filter(|t| !t.is_subresource())
}

/// List every instance of a discovered type.
///
/// A type that stopped being served since discovery yields an empty list and
/// a warning instead of an error.
pub async fn list_objects(
    client: &Client,
    descriptor: &ResourceTypeDescriptor,
    params: &ListParams,
) -> Result<Vec<LiveObject>> {
    match list_in(client, descriptor, None, params).await {
        Ok(objects) => Ok(objects),
        Err(e) if is_vanished(&e) => {
            warn!("Can't list API resource [{}], skipping: {}", descriptor, e);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// List instances of a type, optionally within one namespace
pub async fn list_in(
    client: &Client,
    descriptor: &ResourceTypeDescriptor,
    namespace: Option<&str>,
    params: &ListParams,
) -> Result<Vec<LiveObject>> {
    let api = descriptor.api(client, namespace);
    let list = api.list(params).await?;
    debug!("Listed {} {}", list.items.len(), descriptor);
    Ok(list.items.into_iter().map(LiveObject::from).collect())
}

fn is_vanished(err: &TeardownError) -> bool {
    matches!(err.api_code(), Some(404 | 405 | 410 | 500..=599))
}
