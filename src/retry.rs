// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry wrappers for teardown stages and single mutating calls.
//!
//! Two shapes are used and compose: a stage is re-entered a fixed number of
//! times with [`retry_with_count`], and inside a stage each object update
//! resolves write conflicts with [`retry_on_conflict`].

use crate::error::{Result, TeardownError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// How an operation is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Re-run up to `max_attempts` times, treating not-found as success
    Attempts {
        max_attempts: u32,
        interval: Duration,
    },
    /// Re-run on conflict until `timeout` has elapsed
    Deadline {
        timeout: Duration,
        interval: Duration,
    },
}

impl RetryPolicy {
    pub async fn run<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Default,
    {
        match *self {
            RetryPolicy::Attempts {
                max_attempts,
                interval,
            } => retry_with_count(max_attempts, interval, operation_name, operation).await,
            RetryPolicy::Deadline { timeout, interval } => {
                retry_on_conflict(timeout, interval, operation_name, operation).await
            }
        }
    }
}

/// Invoke `operation` up to `max_attempts` times.
///
/// A not-found error counts as success and yields `T::default()`. Errors that
/// are not retryable (permission, validation, local failures) are returned at
/// once; anything else is retried after `interval` until attempts run out.
pub async fn retry_with_count<F, Fut, T>(
    max_attempts: u32,
    interval: Duration,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    T: Default,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_not_found() => {
                debug!(operation = %operation_name, "Target already absent: {}", e);
                return Ok(T::default());
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    "Operation failed after max retries"
                );
                return Err(e);
            }
            Err(e) => {
                info!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    "Operation failed, retrying in {:?}",
                    interval
                );
                sleep(interval).await;
            }
        }
    }
}

/// Invoke a single mutating call until it succeeds or `timeout` elapses.
///
/// Only conflict errors keep the loop going; every other error is returned
/// immediately. Running out of time yields [`TeardownError::Timeout`] wrapping
/// the last conflict.
pub async fn retry_on_conflict<F, Fut, T>(
    timeout: Duration,
    interval: Duration,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_conflict() => {
                if Instant::now() + interval > deadline {
                    return Err(TeardownError::Timeout {
                        operation: operation_name.to_string(),
                        source: Box::new(e),
                    });
                }
                debug!(operation = %operation_name, "Write conflict, retrying: {}", e);
                sleep(interval).await;
            }
            Err(e) => return Err(e),
        }
    }
}
