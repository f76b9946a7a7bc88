// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Enumerate, classify and act on the objects of one teardown stage.

use crate::error::{Result, TeardownError};
use crate::teardown::classify::Verdict;
use futures::{stream, StreamExt, TryStreamExt};
use std::future::Future;
use tracing::debug;

/// What happened to a single object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    Deleted,
    Stripped,
    #[default]
    Skipped,
}

/// Counts of what one sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,
    pub stripped: usize,
    pub skipped: usize,
}

impl SweepReport {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Deleted => self.deleted += 1,
            Outcome::Stripped => self.stripped += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.deleted += other.deleted;
        self.stripped += other.stripped;
        self.skipped += other.skipped;
    }

    /// Objects deleted or modified
    pub fn changes(&self) -> usize {
        self.deleted + self.stripped
    }
}

/// One pass over a set of objects.
///
/// `act` must tolerate objects that vanished since `list`.
pub trait Sweep {
    type Object: Send;

    fn stage(&self) -> &str;

    fn describe(&self, object: &Self::Object) -> String;

    fn list(&self) -> impl Future<Output = Result<Vec<Self::Object>>> + Send;

    fn classify(&self, object: &Self::Object) -> Verdict;

    fn act(
        &self,
        object: Self::Object,
        verdict: Verdict,
    ) -> impl Future<Output = Result<Outcome>> + Send;
}

/// Run a sweep, acting on up to `concurrency` objects at once.
///
/// The first failing object aborts the sweep.
pub async fn run_sweep<S>(sweep: &S, concurrency: usize) -> Result<SweepReport>
where
    S: Sweep + Sync,
{
    let objects = sweep.list().await?;
    debug!("Stage {} found {} candidates", sweep.stage(), objects.len());

    stream::iter(objects)
        .map(|object| async move {
            let verdict = sweep.classify(&object);
            let description = sweep.describe(&object);
            sweep
                .act(object, verdict)
                .await
                .map_err(|e| TeardownError::ObjectFailed {
                    stage: sweep.stage().to_string(),
                    object: description,
                    source: Box::new(e),
                })
        })
        .buffer_unordered(concurrency.max(1))
        .try_fold(SweepReport::default(), |mut report, outcome| async move {
            report.record(outcome);
            Ok(report)
        })
        .await
}
