//! Concurrent resource scanner
//!
//! Fans out one lookup per partition and merges the results once every lookup
//! has finished. Each lookup owns the buffer it returns; buffers are only
//! appended to the merged list by the single consumer loop, so no shared
//! container is ever written concurrently.
//!
//! The join is a barrier: a failing partition never cancels its siblings, and
//! the resources from succeeding partitions are always handed back.

use super::partitions::EnumerationError;
use super::types::Partition;
use crate::gcp::{classify_anyhow_error, GcpError};
use cost_sentry_common::ResourceKind;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A lookup that failed for one partition
#[derive(Debug)]
pub struct PartitionFailure {
    pub partition: Partition,
    pub error: anyhow::Error,
}

impl fmt::Display for PartitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.partition, self.error)
    }
}

/// Some partitions failed; carries everything the others found
#[derive(Debug)]
pub struct PartialScanError<R> {
    pub kind: ResourceKind,
    pub total: usize,
    /// Resources from the partitions that succeeded
    pub resources: Vec<R>,
    /// Every failed partition, in completion order
    pub failures: Vec<PartitionFailure>,
}

impl<R> fmt::Display for PartialScanError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} {} partitions failed to scan",
            self.failures.len(),
            self.total,
            self.kind
        )
    }
}

impl<R: fmt::Debug> std::error::Error for PartialScanError<R> {}

/// Scan failure for one resource kind, without the recovered resources
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(
        "{failed} of {total} {kind} partitions failed to scan ({recovered} resources from other partitions discarded): {first}",
        failed = .failures.len(),
        first = .failures.first().map(ToString::to_string).unwrap_or_default()
    )]
    Partial {
        kind: ResourceKind,
        total: usize,
        recovered: usize,
        failures: Vec<PartitionFailure>,
    },
}

impl ScanError {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ScanError::Enumeration(e) => e.kind,
            ScanError::Partial { kind, .. } => *kind,
        }
    }

    /// Whether every underlying failure could clear up on its own.
    ///
    /// Transport errors and retryable API errors are transient; a denied
    /// permission or a rejected token fails the same way until someone
    /// intervenes.
    pub fn is_transient(&self) -> bool {
        match self {
            ScanError::Enumeration(e) => is_transient(&e.source),
            ScanError::Partial { failures, .. } => {
                failures.iter().all(|failure| is_transient(&failure.error))
            }
        }
    }
}

fn is_transient(error: &anyhow::Error) -> bool {
    classify_anyhow_error(error).map_or(true, GcpError::is_retryable)
}

impl<R> From<PartialScanError<R>> for ScanError {
    fn from(err: PartialScanError<R>) -> Self {
        ScanError::Partial {
            kind: err.kind,
            total: err.total,
            recovered: err.resources.len(),
            failures: err.failures,
        }
    }
}

/// Run `lookup` once per partition concurrently and merge the results.
///
/// Order across partitions is unspecified; order within a partition is the
/// order `lookup` returned.
pub async fn scan<R, F, Fut>(
    kind: ResourceKind,
    partitions: &[Partition],
    lookup: F,
) -> Result<Vec<R>, PartialScanError<R>>
where
    F: Fn(Partition) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<R>>>,
{
    let total = partitions.len();

    let mut workers: FuturesUnordered<_> = partitions
        .iter()
        .cloned()
        .map(|partition| {
            let lookup = lookup(partition.clone());
            async move { (partition, lookup.await) }
        })
        .collect();

    let mut resources = Vec::new();
    let mut failures = Vec::new();

    while let Some((partition, result)) = workers.next().await {
        match result {
            Ok(found) => {
                if !found.is_empty() {
                    debug!(kind = %kind, partition = %partition, count = found.len(), "Found resources");
                }
                resources.extend(found);
            }
            Err(error) => {
                warn!(kind = %kind, partition = %partition, error = ?error, "Partition scan failed");
                failures.push(PartitionFailure { partition, error });
            }
        }
    }

    if failures.is_empty() {
        info!(kind = %kind, partitions = total, count = resources.len(), "Scan complete");
        Ok(resources)
    } else {
        Err(PartialScanError {
            kind,
            total,
            resources,
            failures,
        })
    }
}
