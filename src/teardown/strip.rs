// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Removal of installation finalizers, labels and annotations.

use crate::config::{InstallationConfig, RetrySettings};
use crate::error::Result;
use crate::kubernetes::{list_objects, LiveObject, ResourceCatalog, ResourceTypeDescriptor};
use crate::teardown::classify::{Classifier, Verdict};
use crate::teardown::sweep::{run_sweep, Outcome, Sweep, SweepReport};
use kube::api::{ListParams, ObjectMeta, PostParams};
use kube::Client;
use tracing::{debug, info, instrument};

/// Which installation marks are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripMode {
    /// Keep the creator attribution label
    PreserveCreator,
    /// Remove every mark
    Full,
}

/// Remove installation marks from `meta`, returning whether anything changed.
///
/// Applying it twice is a no-op the second time.
pub fn strip_marks(meta: &mut ObjectMeta, config: &InstallationConfig, mode: StripMode) -> bool {
    let mut changed = false;

    if let Some(finalizers) = meta.finalizers.as_mut() {
        let before = finalizers.len();
        finalizers.retain(|f| !config.is_installation_finalizer(f));
        changed |= finalizers.len() != before;
    }

    if let Some(labels) = meta.labels.as_mut() {
        let before = labels.len();
        labels.retain(|k, _| {
            !config.is_installation_key(k)
                || (mode == StripMode::PreserveCreator && *k == config.creator_label)
        });
        changed |= labels.len() != before;
    }

    if let Some(annotations) = meta.annotations.as_mut() {
        let before = annotations.len();
        annotations.retain(|k, _| !config.is_installation_key(k));
        changed |= annotations.len() != before;
    }

    changed
}

/// Strips marks from every instance of one resource type
pub struct MarkSweep<'a> {
    stage: &'static str,
    client: &'a Client,
    descriptor: &'a ResourceTypeDescriptor,
    classifier: &'a Classifier,
    retry: &'a RetrySettings,
    mode: StripMode,
}

impl<'a> MarkSweep<'a> {
    pub fn new(
        stage: &'static str,
        client: &'a Client,
        descriptor: &'a ResourceTypeDescriptor,
        classifier: &'a Classifier,
        retry: &'a RetrySettings,
        mode: StripMode,
    ) -> Self {
        Self {
            stage,
            client,
            descriptor,
            classifier,
            retry,
            mode,
        }
    }

    fn would_change(&self, object: &LiveObject) -> bool {
        let mut meta = object.meta().clone();
        strip_marks(&mut meta, self.classifier.config(), self.mode)
    }

    /// Re-fetch, strip and write back, resolving write conflicts
    async fn strip(&self, object: &LiveObject) -> Result<Outcome> {
        let namespace = object.namespace();
        let api = self.descriptor.api(self.client, namespace.as_deref());
        let name = object.name();
        let operation = format!("strip marks from {} {}", self.descriptor, object);

        self.retry
            .conflict_policy()
            .run(&operation, || async {
                let mut current = match api.get(&name).await {
                    Ok(current) => LiveObject::from(current),
                    Err(kube::Error::Api(err)) if err.code == 404 => return Ok(Outcome::Skipped),
                    Err(e) => return Err(e.into()),
                };
                if !strip_marks(current.meta_mut(), self.classifier.config(), self.mode) {
                    return Ok(Outcome::Skipped);
                }
                match api
                    .replace(&name, &PostParams::default(), current.as_dynamic())
                    .await
                {
                    Ok(_) => Ok(Outcome::Stripped),
                    Err(kube::Error::Api(err)) if err.code == 404 => Ok(Outcome::Skipped),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }
}

impl Sweep for MarkSweep<'_> {
    type Object = LiveObject;

    fn stage(&self) -> &str {
        self.stage
    }

    fn describe(&self, object: &LiveObject) -> String {
        format!("{} {}", self.descriptor, object)
    }

    async fn list(&self) -> Result<Vec<LiveObject>> {
        list_objects(self.client, self.descriptor, &ListParams::default()).await
    }

    fn classify(&self, object: &LiveObject) -> Verdict {
        self.classifier.classify(self.descriptor, object.meta())
    }

    async fn act(&self, object: LiveObject, verdict: Verdict) -> Result<Outcome> {
        if verdict == Verdict::Unrelated || !self.would_change(&object) {
            return Ok(Outcome::Skipped);
        }

        debug!("Cleaning {} {}", self.descriptor, object);
        let outcome = self.strip(&object).await?;
        if outcome == Outcome::Stripped {
            info!("Cleaned {} {}", self.descriptor, object);
        }
        Ok(outcome)
    }
}

/// Strip marks across every updatable resource type the cluster serves.
///
/// Types are processed one after another, objects of one type concurrently.
#[instrument(skip(client, classifier, retry))]
pub async fn strip_all(
    stage: &'static str,
    client: &Client,
    classifier: &Classifier,
    retry: &RetrySettings,
    mode: StripMode,
) -> Result<SweepReport> {
    let catalog = ResourceCatalog::discover(client).await?;
    let mut report = SweepReport::default();

    for descriptor in catalog.updatable() {
        debug!("Checking API resource [{}]", descriptor);
        let sweep = MarkSweep::new(stage, client, &descriptor, classifier, retry, mode);
        report.merge(run_sweep(&sweep, retry.concurrency).await?);
    }

    Ok(report)
}
