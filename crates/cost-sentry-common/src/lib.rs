//! cost-sentry-common - Shared types and utilities
//!
//! Pure data types used by the orchestrator and its harness, without any
//! cloud client or runtime dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values and environment variable names
//! - [`envelope`]: Pub/Sub push and background-event envelope decoding
//! - [`labels`]: Label filters, selectors and public principal constants
//! - [`notice`]: Billing budget notification type and decoder
//! - [`resource_kind`]: Managed resource kinds and mitigation ordering

pub mod defaults;
pub mod envelope;
pub mod labels;
pub mod notice;
pub mod resource_kind;

// Re-export commonly used types
pub use envelope::{decode_envelope, decode_notice};
pub use notice::{BillingNotice, DecodeError};
pub use resource_kind::ResourceKind;
