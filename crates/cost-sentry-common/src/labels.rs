//! Label filters and public principals
//!
//! Resources opt in to mitigation by carrying `<label>=true`. The same label
//! is used for instances (Compute filter expression) and services (Kubernetes
//! style label selector).

/// Principals that grant unauthenticated or any-account access
pub const PUBLIC_PRINCIPALS: &[&str] = &["allUsers", "allAuthenticatedUsers"];

/// Cloud Run metadata label carrying a service's location
pub const LOCATION_LABEL: &str = "cloud.googleapis.com/location";

/// Value the policy label must carry for a resource to be mitigated
pub const LABEL_VALUE: &str = "true";

/// Maximum length of a GCP label key
pub const MAX_LABEL_LEN: usize = 63;

/// Whether a principal grants public access
pub fn is_public_principal(member: &str) -> bool {
    PUBLIC_PRINCIPALS.contains(&member)
}

/// Compute Engine filter expression matching running, labelled instances.
pub fn instance_filter(label: &str) -> String {
    format!("status = RUNNING labels.{label} = {LABEL_VALUE}")
}

/// Cloud Run label selector matching labelled services.
pub fn service_selector(label: &str) -> String {
    format!("{label}={LABEL_VALUE}")
}

/// Whether `key` is a valid GCP label key.
///
/// Keys start with a lowercase letter and contain only lowercase letters,
/// digits, `_` and `-`.
pub fn is_valid_label_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    key.len() <= MAX_LABEL_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
