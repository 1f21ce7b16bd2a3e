//! Partition enumeration
//!
//! A scan is only as good as its partition list: a missing zone means a
//! labelled instance keeps running. Enumeration failures are therefore fatal
//! for the resource kind, and no partial list is ever returned.

use super::types::Partition;
use cost_sentry_common::ResourceKind;
use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// The partition listing call for a resource kind failed
#[derive(Debug, Error)]
#[error("cannot list {} partitions for {kind}", .kind.partition_noun())]
pub struct EnumerationError {
    pub kind: ResourceKind,
    #[source]
    pub source: anyhow::Error,
}

/// Await a partition listing and return its partitions, deduplicated in
/// listing order.
pub async fn enumerate_partitions<F>(
    kind: ResourceKind,
    listing: F,
) -> Result<Vec<Partition>, EnumerationError>
where
    F: Future<Output = anyhow::Result<Vec<Partition>>>,
{
    let listed = listing.await.map_err(|source| {
        warn!(kind = %kind, error = ?source, "Partition enumeration failed");
        EnumerationError { kind, source }
    })?;

    let mut seen = HashSet::new();
    let partitions: Vec<Partition> = listed
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect();

    debug!(
        kind = %kind,
        count = partitions.len(),
        noun = kind.partition_noun(),
        "Enumerated partitions"
    );
    Ok(partitions)
}
