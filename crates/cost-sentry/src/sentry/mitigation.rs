//! Sequential mitigation of matched resources
//!
//! Actions run one resource at a time in input order, so "how many succeeded
//! before the failure" is always well defined. With
//! [`MitigationPolicy::FailFast`] the first failure stops the batch; with
//! [`MitigationPolicy::ContinueOnError`] every resource is attempted and every
//! failure is recorded.

use super::operations::{ComputeApi, ServicesApi};
use super::policy::{revoke_public_access, PolicyError};
use super::types::{ComputeResource, ManagedResource, Partition, ServiceResource};
use crate::config::MitigationPolicy;
use cost_sentry_common::ResourceKind;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

/// Stopping an instance failed
#[derive(Debug, Error)]
#[error("cannot stop instance {name} in {zone}")]
pub struct HaltError {
    pub name: String,
    pub zone: Partition,
    #[source]
    pub source: anyhow::Error,
}

/// Result of applying one action to a batch of resources
#[derive(Debug)]
pub struct MitigationOutcome<E> {
    pub kind: ResourceKind,
    /// Resources in the batch
    pub total: usize,
    /// Resources the action was invoked on
    pub attempted: usize,
    /// Actions that returned success
    pub succeeded: usize,
    /// Successful actions that changed something
    pub effective: usize,
    /// Failures in input order
    pub failures: Vec<E>,
}

impl<E> MitigationOutcome<E> {
    fn new(kind: ResourceKind, total: usize) -> Self {
        Self {
            kind,
            total,
            attempted: 0,
            succeeded: 0,
            effective: 0,
            failures: Vec::new(),
        }
    }

    pub fn first_error(&self) -> Option<&E> {
        self.failures.first()
    }

    /// Every resource was attempted and none failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.attempted == self.total
    }

    /// Resources never attempted because the batch stopped early
    pub fn skipped(&self) -> usize {
        self.total - self.attempted
    }
}

/// Apply `action` to each resource in order.
///
/// `action` resolves to `Ok(true)` when it changed the resource, `Ok(false)`
/// when there was nothing to do.
pub async fn apply_sequential<'a, R, E, F, Fut>(
    kind: ResourceKind,
    resources: &'a [R],
    policy: MitigationPolicy,
    action: F,
) -> MitigationOutcome<E>
where
    R: ManagedResource,
    E: std::error::Error,
    F: Fn(&'a R) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut outcome = MitigationOutcome::new(kind, resources.len());

    for resource in resources {
        outcome.attempted += 1;
        match action(resource).await {
            Ok(changed) => {
                outcome.succeeded += 1;
                if changed {
                    outcome.effective += 1;
                }
            }
            Err(e) => {
                warn!(
                    kind = %kind,
                    resource = %resource.qualified_name(),
                    error = %e,
                    "Mitigation failed"
                );
                outcome.failures.push(e);
                if policy == MitigationPolicy::FailFast {
                    break;
                }
            }
        }
    }

    if outcome.skipped() > 0 {
        warn!(
            kind = %kind,
            succeeded = outcome.succeeded,
            skipped = outcome.skipped(),
            "Stopped after first failure"
        );
    }

    outcome
}

/// Revoke public access from every service in the batch.
pub async fn revoke_services<S: ServicesApi>(
    api: &S,
    project: &str,
    services: &[ServiceResource],
    policy: MitigationPolicy,
) -> MitigationOutcome<PolicyError> {
    let outcome = apply_sequential(
        ResourceKind::CloudRunService,
        services,
        policy,
        |service| async move {
            revoke_public_access(api, &service.service_ref(project))
                .await
                .map(|r| r.changed())
        },
    )
    .await;

    info!(
        revoked = outcome.effective,
        checked = outcome.succeeded,
        total = outcome.total,
        "Cloud Run services processed"
    );
    outcome
}

/// Stop every instance in the batch.
///
/// The halt call is issued regardless of the run state seen at scan time.
pub async fn halt_instances<C: ComputeApi>(
    api: &C,
    project: &str,
    instances: &[ComputeResource],
    policy: MitigationPolicy,
) -> MitigationOutcome<HaltError> {
    let outcome = apply_sequential(
        ResourceKind::ComputeInstance,
        instances,
        policy,
        |instance| async move {
            match api.halt_instance(project, &instance.zone, &instance.name).await {
                Ok(()) => {
                    info!(instance = %instance.name, zone = %instance.zone, "Stopped instance");
                    Ok(true)
                }
                Err(source) => Err(HaltError {
                    name: instance.name.clone(),
                    zone: instance.zone.clone(),
                    source,
                }),
            }
        },
    )
    .await;

    info!(
        stopped = outcome.succeeded,
        total = outcome.total,
        "Compute Engine instances processed"
    );
    outcome
}
