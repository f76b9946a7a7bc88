// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed access to the management API aggregates

use crate::error::{Result, TeardownError};
use crate::types::Aggregate;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams};
use kube::{Client, ResourceExt};
use tracing::{debug, instrument};

/// List and delete management aggregates (projects, clusters, users, nodes)
#[derive(Clone)]
pub struct ManagementClient {
    client: Client,
}

impl ManagementClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// List every instance of an aggregate kind.
    ///
    /// A kind that is not served (its CRD is already gone) has no instances.
    /// An instance that does not parse fails the listing.
    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    pub async fn list<K: Aggregate>(&self) -> Result<Vec<K>> {
        let resource = ApiResource::erase::<K>(&());
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);

        let list = match api.list(&ListParams::default()).await {
            Ok(list) => list,
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("{} is not served, nothing to list", resource.plural);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::with_capacity(list.items.len());
        for mut object in list.items {
            // Some management objects are stored without a spec
            if let Some(data) = object.data.as_object_mut() {
                data.entry("spec").or_insert_with(|| serde_json::json!({}));
            }
            let name = object.name_any();
            let item = object
                .try_parse::<K>()
                .map_err(|e| TeardownError::UnreadableObject {
                    object: format!("{} {}", resource.kind, name),
                    message: e.to_string(),
                })?;
            items.push(item);
        }
        Ok(items)
    }

    /// Delete an aggregate; returns `false` when it was already gone
    pub async fn delete<K: Aggregate>(&self, object: &K, params: &DeleteParams) -> Result<bool> {
        let resource = ApiResource::erase::<K>(&());
        let api: Api<DynamicObject> = match object.namespace() {
            Some(ns) => Api::namespaced_with(self.client.clone(), &ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };

        match api.delete(&object.name_any(), params).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
