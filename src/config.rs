// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{self, marks, retry};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Identity of the installation being removed.
///
/// Built once per run and shared immutably by every stage, so tests can vary
/// the identifying prefixes without touching global state.
#[derive(Debug, Clone)]
pub struct InstallationConfig {
    /// Namespace the management plane runs in
    pub namespace: String,
    /// Controller name carried by the installation's finalizers
    pub controller_name: String,
    /// Domain of the installation's labels, annotations and API groups
    pub label_base: String,
    /// Creator attribution label, preserved while stripping marks
    pub creator_label: String,
    /// Value of the creator label on objects the installation created
    pub creator_value: String,
    /// Cluster roles created by the installation that carry no creator label
    pub static_cluster_roles: BTreeSet<String>,
    /// Grace period for deleting projects, clusters and nodes
    pub aggregate_grace_period: u32,
}

impl InstallationConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            controller_name: marks::CONTROLLER_NAME.to_string(),
            label_base: marks::LABEL_BASE.to_string(),
            creator_label: marks::CREATOR_LABEL.to_string(),
            creator_value: marks::CREATOR_VALUE.to_string(),
            static_cluster_roles: constants::STATIC_CLUSTER_ROLES
                .iter()
                .map(|r| r.to_string())
                .collect(),
            aggregate_grace_period: constants::AGGREGATE_GRACE_PERIOD_SECS,
        }
    }

    /// Label selector matching objects attributed to the installation
    pub fn creator_selector(&self) -> String {
        format!("{}={}", self.creator_label, self.creator_value)
    }

    /// Check whether a domain (e.g. an API group) belongs to the installation
    pub fn is_installation_domain(&self, domain: &str) -> bool {
        domain == self.label_base
            || domain
                .strip_suffix(self.label_base.as_str())
                .is_some_and(|rest| rest.ends_with('.'))
    }

    /// Check whether a label or annotation key carries the installation prefix
    pub fn is_installation_key(&self, key: &str) -> bool {
        key.split_once('/')
            .is_some_and(|(prefix, _)| self.is_installation_domain(prefix))
    }

    /// Check whether a finalizer belongs to the installation's controllers
    pub fn is_installation_finalizer(&self, finalizer: &str) -> bool {
        let domain = finalizer
            .split_once('/')
            .map(|(prefix, _)| prefix)
            .unwrap_or(finalizer);
        finalizer.contains(self.controller_name.as_str()) || self.is_installation_domain(domain)
    }
}

impl Default for InstallationConfig {
    fn default() -> Self {
        Self::new(constants::DEFAULT_NAMESPACE)
    }
}

/// Retry and concurrency tuning for one run
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub stage_attempts: u32,
    pub stage_interval: Duration,
    pub conflict_timeout: Duration,
    pub conflict_interval: Duration,
    pub concurrency: usize,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            stage_attempts: retry::STAGE_ATTEMPTS,
            stage_interval: Duration::from_secs(retry::STAGE_INTERVAL_SECS),
            conflict_timeout: Duration::from_secs(retry::CONFLICT_TIMEOUT_SECS),
            conflict_interval: Duration::from_secs(retry::CONFLICT_INTERVAL_SECS),
            concurrency: retry::CONCURRENCY,
        }
    }
}

impl RetrySettings {
    /// Load retry settings from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(RetrySettings {
            stage_attempts: env_or("TEARDOWN_STAGE_ATTEMPTS", defaults.stage_attempts)?,
            stage_interval: Duration::from_secs(env_or(
                "TEARDOWN_STAGE_INTERVAL_SECS",
                defaults.stage_interval.as_secs(),
            )?),
            conflict_timeout: Duration::from_secs(env_or(
                "TEARDOWN_CONFLICT_TIMEOUT_SECS",
                defaults.conflict_timeout.as_secs(),
            )?),
            conflict_interval: Duration::from_secs(env_or(
                "TEARDOWN_CONFLICT_INTERVAL_SECS",
                defaults.conflict_interval.as_secs(),
            )?),
            concurrency: env_or("TEARDOWN_CONCURRENCY", defaults.concurrency)?.max(1),
        })
    }
}

impl RetrySettings {
    /// Policy re-entering a whole stage
    pub fn stage_policy(&self) -> RetryPolicy {
        RetryPolicy::Attempts {
            max_attempts: self.stage_attempts,
            interval: self.stage_interval,
        }
    }

    /// Policy resolving write conflicts on a single object
    pub fn conflict_policy(&self) -> RetryPolicy {
        RetryPolicy::Deadline {
            timeout: self.conflict_timeout,
            interval: self.conflict_interval,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, value)),
        Err(_) => Ok(default),
    }
}
