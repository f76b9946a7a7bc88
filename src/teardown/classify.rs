// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ownership classification of live objects.

use crate::config::InstallationConfig;
use crate::kubernetes::ResourceTypeDescriptor;
use kube::api::ObjectMeta;
use std::sync::Arc;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";
const CRD_GROUP: &str = "apiextensions.k8s.io";

/// What teardown may do with an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Created by the installation, safe to delete
    Owned,
    /// Touched by the installation, clean but never delete
    Marked,
    /// Must not be touched
    Unrelated,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    config: Arc<InstallationConfig>,
}

impl Classifier {
    pub fn new(config: Arc<InstallationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InstallationConfig {
        &self.config
    }

    /// Classify an object of the given type by its metadata.
    ///
    /// Ownership is structural: the object's API group, its namespace, or a
    /// known name. Marks alone only ever make an object `Marked`.
    pub fn classify(&self, descriptor: &ResourceTypeDescriptor, meta: &ObjectMeta) -> Verdict {
        if self.is_owned(descriptor, meta) {
            Verdict::Owned
        } else if self.has_mark(meta) {
            Verdict::Marked
        } else {
            Verdict::Unrelated
        }
    }

    fn is_owned(&self, descriptor: &ResourceTypeDescriptor, meta: &ObjectMeta) -> bool {
        let name = meta.name.as_deref().unwrap_or_default();

        if self.config.is_installation_domain(&descriptor.group) {
            return true;
        }

        match (descriptor.group.as_str(), descriptor.kind.as_str()) {
            (CRD_GROUP, "CustomResourceDefinition") => self.owns_crd(name),
            ("", "Namespace") => name == self.config.namespace,
            (RBAC_GROUP, "ClusterRole") => {
                self.config.static_cluster_roles.contains(name)
                    || self.is_created_by_installation(meta)
            }
            (RBAC_GROUP, "ClusterRoleBinding") => self.is_created_by_installation(meta),
            _ => {
                descriptor.namespaced
                    && meta.namespace.as_deref() == Some(self.config.namespace.as_str())
            }
        }
    }

    /// CRD names are `<plural>.<group>`
    pub fn owns_crd(&self, name: &str) -> bool {
        name.split_once('.')
            .is_some_and(|(_, group)| self.config.is_installation_domain(group))
    }

    fn is_created_by_installation(&self, meta: &ObjectMeta) -> bool {
        meta.labels
            .as_ref()
            .and_then(|l| l.get(&self.config.creator_label))
            .is_some_and(|v| *v == self.config.creator_value)
    }

    /// Whether any finalizer, label or annotation carries the installation's mark
    pub fn has_mark(&self, meta: &ObjectMeta) -> bool {
        let finalizers = meta
            .finalizers
            .iter()
            .flatten()
            .any(|f| self.config.is_installation_finalizer(f));
        let labels = meta
            .labels
            .iter()
            .flatten()
            .any(|(k, _)| self.config.is_installation_key(k));
        let annotations = meta
            .annotations
            .iter()
            .flatten()
            .any(|(k, _)| self.config.is_installation_key(k));

        finalizers || labels || annotations
    }
}
