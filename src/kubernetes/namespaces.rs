// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::config::RetrySettings;
use crate::error::Result;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, PropagationPolicy};
use kube::Client;
use tracing::{debug, info, instrument};

/// Delete parameters for namespaces: orphan dependents, no grace period
pub fn namespace_delete_params() -> DeleteParams {
    DeleteParams {
        propagation_policy: Some(PropagationPolicy::Orphan),
        grace_period_seconds: Some(0),
        ..Default::default()
    }
}

/// Delete a namespace, resolving write conflicts.
///
/// Returns `false` when the namespace did not exist.
#[instrument(skip(client, retry))]
pub async fn delete_namespace(client: &Client, name: &str, retry: &RetrySettings) -> Result<bool> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let params = namespace_delete_params();

    let deleted = retry
        .conflict_policy()
        .run(&format!("delete namespace {}", name), || async {
            match namespaces.delete(name, &params).await {
                Ok(_) => Ok(true),
                Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
        .await?;

    if deleted {
        info!("Namespace {} deleted", name);
    } else {
        debug!("Namespace {} already absent", name);
    }
    Ok(deleted)
}
