//! cost-sentry - Budget-triggered mitigation for GCP projects
//!
//! This crate provides the orchestrator that reacts to Cloud Billing budget
//! notices by revoking public access to labelled Cloud Run services and
//! stopping labelled Compute Engine instances, plus the HTTP harness and
//! operator CLI around it.

pub mod config;
pub mod error;
pub mod gcp;
pub mod sentry;
pub mod server;
