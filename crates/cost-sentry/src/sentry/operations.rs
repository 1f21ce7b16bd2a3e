//! Cloud API traits the orchestrator depends on
//!
//! These abstract the Compute Engine and Cloud Run calls so the orchestration
//! logic can be unit tested without hitting real GCP.

use super::types::{ComputeResource, Partition, Policy, ServiceRef, ServiceResource};
use anyhow::Result;

/// Compute Engine operations.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait ComputeApi: Send + Sync {
    /// List every zone of the project
    async fn list_zones(&self, project: &str) -> Result<Vec<Partition>>;

    /// List instances in one zone matching a filter expression
    async fn list_instances(
        &self,
        project: &str,
        zone: &Partition,
        filter: &str,
    ) -> Result<Vec<ComputeResource>>;

    /// Stop an instance. Stopping an already stopped instance succeeds.
    async fn halt_instance(&self, project: &str, zone: &Partition, name: &str) -> Result<()>;
}

/// Cloud Run operations.
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait ServicesApi: Send + Sync {
    /// List every Cloud Run location of the project
    async fn list_locations(&self, project: &str) -> Result<Vec<Partition>>;

    /// List services in one location matching a label selector
    async fn list_services(
        &self,
        project: &str,
        location: &Partition,
        selector: &str,
    ) -> Result<Vec<ServiceResource>>;

    /// Read a service's IAM policy
    async fn get_access_policy(&self, service: &ServiceRef) -> Result<Policy>;

    /// Replace a service's IAM policy
    async fn set_access_policy(&self, service: &ServiceRef, policy: &Policy) -> Result<()>;
}
