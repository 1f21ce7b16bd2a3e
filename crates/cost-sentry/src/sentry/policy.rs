//! Public access revocation for Cloud Run services

use super::operations::ServicesApi;
use super::types::{Policy, ServiceRef};
use crate::gcp::{classify_anyhow_error, GcpError};
use cost_sentry_common::labels::is_public_principal;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Step of the read-modify-write cycle that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStage {
    Fetch,
    Mutate,
    Write,
}

impl fmt::Display for PolicyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyStage::Fetch => "fetch",
            PolicyStage::Mutate => "mutate",
            PolicyStage::Write => "write",
        })
    }
}

/// Revoking public access from a service failed
#[derive(Debug, Error)]
#[error("cannot revoke public access to {service} ({stage} failed)")]
pub struct PolicyError {
    pub service: ServiceRef,
    pub stage: PolicyStage,
    #[source]
    pub source: anyhow::Error,
}

/// What a revocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revocation {
    /// Public principals were removed and the policy written back
    Revoked { removed: Vec<String> },
    /// No public principal was bound; nothing was written
    AlreadyPrivate,
    /// The service was deleted since the scan
    Vanished,
}

impl Revocation {
    pub fn changed(&self) -> bool {
        matches!(self, Revocation::Revoked { .. })
    }
}

/// Remove every public principal from `policy`.
///
/// Bindings left without members are dropped. Non-public principals are
/// never touched. Returns the `role:member` pairs that were removed.
pub fn strip_public_members(policy: &mut Policy) -> Vec<String> {
    let mut removed = Vec::new();

    for binding in &mut policy.bindings {
        binding.members.retain(|member| {
            if is_public_principal(member) {
                removed.push(format!("{}:{}", binding.role, member));
                false
            } else {
                true
            }
        });
    }
    policy.bindings.retain(|b| !b.members.is_empty());

    removed
}

fn is_not_found(error: &anyhow::Error) -> bool {
    classify_anyhow_error(error).is_some_and(GcpError::is_not_found)
}

/// Fetch a service's policy, strip public principals and write it back.
///
/// Writing is skipped when the policy grants no public access, so a second
/// call is a no-op. A service deleted since the scan is not an error. A policy without an etag is not written back, since the
/// write could silently overwrite a concurrent change.
pub async fn revoke_public_access<S: ServicesApi>(
    api: &S,
    service: &ServiceRef,
) -> Result<Revocation, PolicyError> {
    let fail = |stage: PolicyStage| {
        move |source: anyhow::Error| PolicyError {
            service: service.clone(),
            stage,
            source,
        }
    };

    let mut policy = match api.get_access_policy(service).await {
        Ok(policy) => policy,
        Err(e) if is_not_found(&e) => {
            info!(service = %service, "Service no longer exists");
            return Ok(Revocation::Vanished);
        }
        Err(e) => return Err(fail(PolicyStage::Fetch)(e)),
    };

    let removed = strip_public_members(&mut policy);
    if removed.is_empty() {
        debug!(service = %service, "No public bindings");
        return Ok(Revocation::AlreadyPrivate);
    }

    if policy.etag.is_none() {
        return Err(fail(PolicyStage::Mutate)(anyhow::anyhow!(
            "policy has no etag; refusing blind overwrite"
        )));
    }

    match api.set_access_policy(service, &policy).await {
        Ok(()) => {}
        Err(e) if is_not_found(&e) => {
            info!(service = %service, "Service deleted before its policy was written");
            return Ok(Revocation::Vanished);
        }
        Err(e) => return Err(fail(PolicyStage::Write)(e)),
    }

    info!(service = %service, removed = ?removed, "Revoked public access");
    Ok(Revocation::Revoked { removed })
}
