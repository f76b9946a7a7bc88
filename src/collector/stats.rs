// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Periodic node statistics from a stats collector DaemonSet

use crate::collector::{find_agent_image, Collector, CollectorSpec, Members};
use crate::error::{Result, TeardownError};
use crate::kubernetes::exec::exec_capture;
use kube::{Client, ResourceExt};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct StatsOptions {
    pub node: Option<String>,
    pub command: String,
    pub image: Option<String>,
    pub namespace: String,
    /// Pause between rounds
    pub interval: Duration,
}

/// Errors that mean the collector pod is not able to run commands yet
pub fn is_waiting(err: &TeardownError) -> bool {
    let message = err.to_string();
    message.contains("exit code 127") || message.contains("unable to upgrade connection")
}

/// Print node statistics until cancelled, then tear the collector down
pub async fn collect_stats(
    client: &Client,
    opts: &StatsOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let image = match &opts.image {
        Some(image) => image.clone(),
        None => find_agent_image(client, &opts.namespace).await?,
    };
    let spec = CollectorSpec::stats(&opts.namespace, &image)?.on_node(opts.node.clone());
    let mut collector = Collector::new(client.clone(), spec);

    let rounds = cancel.clone();
    let result = collector
        .run(cancel, |members| async move {
            while !rounds.is_cancelled() {
                print_round(&members, &opts.command).await;
                tokio::select! {
                    _ = rounds.cancelled() => {}
                    _ = sleep(opts.interval) => {}
                }
            }
            Ok(())
        })
        .await;

    match result {
        Err(TeardownError::Cancelled) => {
            info!("User interrupt, collector removed");
            Ok(())
        }
        other => other,
    }
}

async fn print_round(members: &Members, command: &str) {
    for pod in &members.pods {
        let node = pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.clone())
            .unwrap_or_default();
        info!("Node stats for [{}]..", node);

        let cmd = vec!["sh".to_string(), "-c".to_string(), command.to_string()];
        match exec_capture(&members.api, pod, cmd).await {
            Ok(output) => println!("{}\n", String::from_utf8_lossy(&output)),
            Err(e) if is_waiting(&e) => info!(
                "Waiting for collector pod [{}/{}] on [{}] to be ready..",
                pod.namespace().unwrap_or_default(),
                pod.name_any(),
                node
            ),
            Err(e) => warn!(
                "Error executing command on pod [{}/{}] on [{}]: {}",
                pod.namespace().unwrap_or_default(),
                pod.name_any(),
                node,
                e
            ),
        }
    }
}
