//! GCP REST clients
//!
//! This module provides the production implementations of the collaborator
//! traits:
//! - compute: Compute Engine zones and instances
//! - run: Cloud Run locations, services and IAM policies
//! - context: credentials and the shared HTTP client
//! - error: API error classification

pub mod compute;
pub mod context;
pub mod error;
pub mod run;

// Core clients
pub use compute::ComputeClient;
pub use context::GcpContext;
pub use run::RunClient;

// Error handling
pub use error::{GcpError, classify_anyhow_error, classify_gcp_error, ignore_not_found};
