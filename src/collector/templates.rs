// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Collector DaemonSet manifests

use crate::error::Result;
use k8s_openapi::api::apps::v1::DaemonSet;
use minijinja::{context, Environment};

/// Log collector manifest loaded at compile time
const LOG_COLLECTOR_TEMPLATE: &str = include_str!("../../templates/log-collector.yaml");

/// Stats collector manifest loaded at compile time
const STATS_COLLECTOR_TEMPLATE: &str = include_str!("../../templates/stats-collector.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorTemplate {
    Logs,
    Stats,
}

impl CollectorTemplate {
    fn source(&self) -> &'static str {
        match self {
            CollectorTemplate::Logs => LOG_COLLECTOR_TEMPLATE,
            CollectorTemplate::Stats => STATS_COLLECTOR_TEMPLATE,
        }
    }

    /// Render the manifest as YAML
    pub fn render(&self, name: &str, namespace: &str, image: &str) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("manifest", self.source())?;
        let rendered = env.get_template("manifest")?.render(context! {
            name => name,
            namespace => namespace,
            image => image,
        })?;
        Ok(rendered)
    }

    /// Render and parse the manifest
    pub fn daemonset(&self, name: &str, namespace: &str, image: &str) -> Result<DaemonSet> {
        let manifest = self.render(name, namespace, image)?;
        Ok(serde_yaml::from_str(&manifest)?)
    }
}
