// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation

use crate::error::{Result, TeardownError};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Create a client from an explicit kubeconfig file, or infer one from the environment
#[instrument]
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client> {
    match kubeconfig {
        Some(path) => create_client_from_kubeconfig(path).await,
        None => {
            debug!("No kubeconfig given, inferring client configuration");
            Client::try_default().await.map_err(|e| {
                TeardownError::KubeconfigError(format!("Failed to infer config: {}", e))
            })
        }
    }
}

/// Create a Kubernetes client from a kubeconfig file
async fn create_client_from_kubeconfig(path: &Path) -> Result<Client> {
    info!("Loading kubeconfig from {}", path.display());

    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
        TeardownError::KubeconfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                TeardownError::KubeconfigError(format!("Failed to create config: {}", e))
            })?;

    Client::try_from(client_config)
        .map_err(|e| TeardownError::KubeconfigError(format!("Failed to create client: {}", e)))
}
