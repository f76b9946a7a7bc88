// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Remote command execution in pods

use crate::error::{Result, TeardownError};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams};
use kube::ResourceExt;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Run a command in the pod's first container and capture its stdout.
///
/// A non-zero exit is reported as [`TeardownError::ExecError`].
#[instrument(skip(pods, pod), fields(pod = %pod.name_any()))]
pub async fn exec_capture(pods: &Api<Pod>, pod: &Pod, command: Vec<String>) -> Result<Vec<u8>> {
    let pod_name = pod.name_any();
    let mut params = AttachParams::default().stderr(false);
    if let Some(container) = pod
        .spec
        .as_ref()
        .and_then(|s| s.containers.first())
        .map(|c| c.name.clone())
    {
        params = params.container(container);
    }

    let mut attached = pods
        .exec(&pod_name, command, &params)
        .await
        .map_err(|e| TeardownError::ExecError {
            pod: pod_name.clone(),
            message: e.to_string(),
        })?;

    let mut output = Vec::new();
    if let Some(mut stdout) = attached.stdout() {
        stdout.read_to_end(&mut output).await?;
    }

    let status = match attached.take_status() {
        Some(status) => status.await,
        None => None,
    };
    if let Err(e) = attached.join().await {
        debug!("Exec session for {} ended with: {}", pod_name, e);
    }

    if let Some(message) = status.as_ref().and_then(exec_failure) {
        return Err(TeardownError::ExecError {
            pod: pod_name,
            message,
        });
    }

    Ok(output)
}

/// Describe a failed exec from its final status, `None` on success.
///
/// A non-zero exit carries the code as an `ExitCode` cause.
pub fn exec_failure(status: &Status) -> Option<String> {
    if status.status.as_deref() != Some("Failure") {
        return None;
    }

    let mut message = format!(
        "{}: {}",
        status.reason.as_deref().unwrap_or("Failure"),
        status.message.as_deref().unwrap_or_default()
    );
    let exit_code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.clone())
        });
    if let Some(code) = exit_code {
        message.push_str(&format!(", exit code {}", code));
    }
    Some(message)
}

/// Read a file from inside the pod
pub async fn read_file(pods: &Api<Pod>, pod: &Pod, path: &str) -> Result<Vec<u8>> {
    exec_capture(pods, pod, vec!["/bin/cat".to_string(), path.to_string()]).await
}

/// Check whether a file exists inside the pod
pub async fn file_exists(pods: &Api<Pod>, pod: &Pod, path: &str) -> bool {
    exec_capture(
        pods,
        pod,
        vec!["test".to_string(), "-f".to_string(), path.to_string()],
    )
    .await
    .is_ok()
}
