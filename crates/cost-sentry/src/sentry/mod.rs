//! Budget-triggered mitigation
//!
//! This module contains everything between a decoded billing notice and the
//! cloud calls that contain spending:
//! - decision: over-budget test
//! - partitions / scanner: concurrent discovery of labelled resources
//! - policy: public access revocation for services
//! - mitigation: sequential appliers for both resource kinds
//! - engine: the per-invocation state machine tying it together

pub mod decision;
pub mod engine;
pub mod mitigation;
pub mod operations;
pub mod partitions;
pub mod policy;
pub mod report;
pub mod scanner;
pub mod types;

// Core types
pub use engine::{InvocationError, Orchestrator, Stage};
pub use operations::{ComputeApi, ServicesApi};
pub use report::{InvocationReport, KindSummary, Outcome};
pub use types::{Binding, ComputeResource, ManagedResource, Partition, Policy, ServiceRef, ServiceResource};

// Building blocks
pub use decision::should_mitigate;
pub use mitigation::{HaltError, MitigationOutcome, apply_sequential, halt_instances, revoke_services};
pub use partitions::{EnumerationError, enumerate_partitions};
pub use policy::{PolicyError, PolicyStage, Revocation, revoke_public_access, strip_public_members};
pub use scanner::{PartialScanError, PartitionFailure, ScanError, scan};
