// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster log collection into a single local tarball

use crate::collector::{detect_cluster_provider, find_agent_image, Collector, CollectorSpec};
use crate::error::{Result, TeardownError};
use crate::kubernetes::exec::read_file;
use kube::{Client, ResourceExt};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct LogsOptions {
    pub output: PathBuf,
    pub node: Option<String>,
    /// Collector image, defaults to the running agent's image
    pub image: Option<String>,
    pub namespace: String,
}

/// Tarball produced by the collector pod on one node
#[derive(Debug, Clone)]
pub struct NodeLogs {
    pub node: String,
    pub archive: Vec<u8>,
}

/// Collect the logs of every node (or one node) into `opts.output`.
///
/// Returns the number of entries written.
#[instrument(skip(client, opts, cancel), fields(output = %opts.output.display()))]
pub async fn collect_logs(
    client: &Client,
    opts: &LogsOptions,
    cancel: &CancellationToken,
) -> Result<usize> {
    if opts.output.as_os_str().is_empty() {
        return Err(TeardownError::CollectorError(
            "please choose an output file name for the logs tarball".to_string(),
        ));
    }

    // only RKE provisioned clusters keep their logs where the collector looks
    detect_cluster_provider(client).await?;

    let image = match &opts.image {
        Some(image) => image.clone(),
        None => find_agent_image(client, &opts.namespace).await?,
    };
    let spec = CollectorSpec::logs(&opts.namespace, &image)?.on_node(opts.node.clone());
    let mut collector = Collector::new(client.clone(), spec);

    let collected = collector
        .run(cancel, |members| async move {
            info!("Starting log collection..");
            let mut collected = Vec::with_capacity(members.pods.len());
            for pod in &members.pods {
                let node = pod
                    .spec
                    .as_ref()
                    .and_then(|s| s.node_name.clone())
                    .unwrap_or_else(|| pod.name_any());
                info!("Fetching logs from node [{}]..", node);
                let archive = read_file(&members.api, pod, &format!("/tmp/{}.tar", node)).await?;
                collected.push(NodeLogs { node, archive });
            }
            Ok::<_, TeardownError>(collected)
        })
        .await?;

    let entries = write_tarball(&opts.output, &collected)?;
    info!(
        "Wrote {} entries from {} nodes to {}",
        entries,
        collected.len(),
        opts.output.display()
    );
    Ok(entries)
}

/// Merge the per-node tarballs into one file
pub fn write_tarball(path: &Path, logs: &[NodeLogs]) -> Result<usize> {
    let mut builder = Builder::new(File::create(path)?);
    let mut entries = 0;
    for node in logs {
        entries += append_archive(&mut builder, &node.archive)?;
    }
    builder.into_inner()?.sync_all()?;
    Ok(entries)
}

/// Copy every entry of a tar archive into `builder`
pub fn append_archive<W: Write>(builder: &mut Builder<W>, archive: &[u8]) -> Result<usize> {
    let mut archive = Archive::new(archive);
    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let mut header = entry.header().clone();
        let path = entry.path()?.into_owned();
        builder.append_data(&mut header, &path, &mut entry)?;
        count += 1;
    }
    Ok(count)
}
