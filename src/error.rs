// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TeardownError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Discovery failed: {0}")]
    DiscoveryError(String),

    #[error("Timed out during {operation}, please try again: {source}")]
    Timeout {
        operation: String,
        #[source]
        source: Box<TeardownError>,
    },

    #[error("Stage {stage} failed on {object}: {source}")]
    ObjectFailed {
        stage: String,
        object: String,
        #[source]
        source: Box<TeardownError>,
    },

    #[error("Collector failed: {0}")]
    CollectorError(String),

    #[error("Command failed in pod {pod}: {message}")]
    ExecError { pod: String, message: String },

    #[error("Interrupted")]
    Cancelled,

    #[error("Failed to render manifest: {0}")]
    TemplateError(#[from] minijinja::Error),

    #[error("Invalid manifest: {0}")]
    ManifestError(#[from] serde_yaml::Error),

    #[error("Can't read {object}: {message}")]
    UnreadableObject { object: String, message: String },

    #[error("Invalid object: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TeardownError {
    /// HTTP status code of the underlying API error, looking through wrappers
    pub fn api_code(&self) -> Option<u16> {
        self.api_error().map(|err| err.code)
    }

    fn api_error(&self) -> Option<&kube::core::ErrorResponse> {
        match self {
            TeardownError::KubeError(kube::Error::Api(err)) => Some(err),
            TeardownError::Timeout { source, .. } | TeardownError::ObjectFailed { source, .. } => {
                source.api_error()
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    /// Optimistic-concurrency write collision (not to be confused with AlreadyExists)
    pub fn is_conflict(&self) -> bool {
        match self {
            TeardownError::KubeError(kube::Error::Api(err)) => {
                err.code == 409 && err.reason != "AlreadyExists"
            }
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.api_error()
            .is_some_and(|err| err.code == 409 && err.reason == "AlreadyExists")
    }

    /// Permission and validation failures, as well as local errors, are never retried
    pub fn is_retryable(&self) -> bool {
        match self {
            TeardownError::KubeError(_) => !matches!(self.api_code(), Some(400 | 401 | 403 | 422)),
            TeardownError::Timeout { .. } => true,
            TeardownError::ObjectFailed { source, .. } => source.is_retryable(),
            TeardownError::DiscoveryError(_) => true,
            TeardownError::CollectorError(_) | TeardownError::ExecError { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TeardownError>;
