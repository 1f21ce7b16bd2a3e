//! GCP API error classification
//!
//! Google APIs report failures as `{"error": {"code", "message", "status"}}`.
//! Compute Engine omits `status`, so the HTTP status is the fallback.

use serde::Deserialize;
use thiserror::Error;

/// GCP error categories for mitigation and redelivery decisions
#[derive(Debug, Error)]
pub enum GcpError {
    /// Resource does not exist (an instance deleted since the scan)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Credentials lack the required permission
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// Token missing, expired or invalid
    #[error("Authentication failed: {message}")]
    Unauthenticated { message: String },

    /// Quota or rate limit exceeded (retryable)
    #[error("Rate limit exceeded: {message}")]
    Throttled { message: String },

    /// Concurrent modification, e.g. a stale policy etag (retryable)
    #[error("Conflicting update: {message}")]
    Conflict { message: String },

    /// Backend temporarily unavailable (retryable)
    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    /// Any other API error
    #[error("GCP API error ({http_status}): {message}")]
    Api {
        http_status: u16,
        status: Option<String>,
        message: String,
    },
}

impl GcpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GcpError::NotFound { .. })
    }

    /// Check if a later attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GcpError::Throttled { .. } | GcpError::Conflict { .. } | GcpError::Unavailable { .. }
        )
    }
}

/// Canonical status strings for "not found"
const NOT_FOUND_STATUSES: &[&str] = &["NOT_FOUND"];

/// Canonical status strings for missing permissions
const PERMISSION_STATUSES: &[&str] = &["PERMISSION_DENIED"];

/// Canonical status strings for quota/rate limiting
const THROTTLING_STATUSES: &[&str] = &["RESOURCE_EXHAUSTED"];

/// Canonical status strings for concurrent modification
const CONFLICT_STATUSES: &[&str] = &["ABORTED", "FAILED_PRECONDITION", "ALREADY_EXISTS"];

/// Canonical status strings for transient backend failures
const UNAVAILABLE_STATUSES: &[&str] = &["UNAVAILABLE", "DEADLINE_EXCEEDED", "INTERNAL"];

/// Classify an API error from its HTTP status and optional canonical status.
pub fn classify_gcp_error(http_status: u16, status: Option<&str>, message: Option<&str>) -> GcpError {
    let message = message.unwrap_or("Unknown error").to_string();

    match (status, http_status) {
        (Some(s), _) if NOT_FOUND_STATUSES.contains(&s) => GcpError::NotFound { message },
        (Some(s), _) if PERMISSION_STATUSES.contains(&s) => GcpError::PermissionDenied { message },
        (Some("UNAUTHENTICATED"), _) => GcpError::Unauthenticated { message },
        (Some(s), _) if THROTTLING_STATUSES.contains(&s) => GcpError::Throttled { message },
        (Some(s), _) if CONFLICT_STATUSES.contains(&s) => GcpError::Conflict { message },
        (Some(s), _) if UNAVAILABLE_STATUSES.contains(&s) => GcpError::Unavailable { message },
        (Some(_), _) => GcpError::Api {
            http_status,
            status: status.map(str::to_string),
            message,
        },
        (None, 404) => GcpError::NotFound { message },
        (None, 403) => GcpError::PermissionDenied { message },
        (None, 401) => GcpError::Unauthenticated { message },
        (None, 429) => GcpError::Throttled { message },
        (None, 409 | 412) => GcpError::Conflict { message },
        (None, 500 | 502 | 503 | 504) => GcpError::Unavailable { message },
        (None, _) => GcpError::Api {
            http_status,
            status: None,
            message,
        },
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Classify a failed response from its HTTP status and raw body.
pub fn classify_response(http_status: u16, body: &str) -> GcpError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => classify_gcp_error(
            http_status,
            parsed.error.status.as_deref(),
            parsed.error.message.as_deref(),
        ),
        Err(_) => {
            let body = body.trim();
            classify_gcp_error(http_status, None, (!body.is_empty()).then_some(body))
        }
    }
}

/// Find a [`GcpError`] anywhere in an anyhow error chain.
pub fn classify_anyhow_error(error: &anyhow::Error) -> Option<&GcpError> {
    error.chain().find_map(|cause| cause.downcast_ref::<GcpError>())
}

/// Treat "not found" as success.
pub fn ignore_not_found(result: anyhow::Result<()>) -> anyhow::Result<()> {
    match result {
        Err(e) if classify_anyhow_error(&e).is_some_and(GcpError::is_not_found) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_statuses() {
        for status in NOT_FOUND_STATUSES {
            assert!(classify_gcp_error(400, Some(status), None).is_not_found());
        }
        for status in THROTTLING_STATUSES
            .iter()
            .chain(CONFLICT_STATUSES)
            .chain(UNAVAILABLE_STATUSES)
        {
            let err = classify_gcp_error(400, Some(status), Some("msg"));
            assert!(err.is_retryable(), "Expected retryable for status: {status}");
        }
        assert!(matches!(
            classify_gcp_error(403, Some("PERMISSION_DENIED"), None),
            GcpError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn http_status_fallback() {
        assert!(classify_gcp_error(404, None, None).is_not_found());
        assert!(matches!(
            classify_gcp_error(401, None, None),
            GcpError::Unauthenticated { .. }
        ));
        assert!(classify_gcp_error(503, None, None).is_retryable());
        assert!(matches!(
            classify_gcp_error(418, None, Some("teapot")),
            GcpError::Api {
                http_status: 418,
                status: None,
                ..
            }
        ));
    }

    #[test]
    fn unknown_status_is_generic() {
        let err = classify_gcp_error(400, Some("INVALID_ARGUMENT"), Some("bad filter"));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "GCP API error (400): bad filter");
    }

    #[test]
    fn compute_style_body() {
        let body = r#"{"error": {"code": 404, "message": "The resource 'vm-1' was not found", "errors": [{"reason": "notFound"}]}}"#;
        let err = classify_response(404, body);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Resource not found: The resource 'vm-1' was not found");
    }

    #[test]
    fn run_style_body() {
        let body = r#"{"error": {"code": 409, "message": "etag mismatch", "status": "ABORTED"}}"#;
        assert!(matches!(classify_response(409, body), GcpError::Conflict { .. }));
    }

    #[test]
    fn non_json_body() {
        let err = classify_response(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "Service unavailable: Bad Gateway");
        assert!(matches!(
            classify_response(400, ""),
            GcpError::Api { ref message, .. } if message == "Unknown error"
        ));
    }

    #[test]
    fn chain_lookup_and_ignore_not_found() {
        let err = anyhow::Error::new(classify_gcp_error(404, None, Some("gone")))
            .context("stopping vm-1");
        assert!(classify_anyhow_error(&err).is_some_and(GcpError::is_not_found));
        ignore_not_found(Err(err)).unwrap();

        let other = anyhow::Error::new(classify_gcp_error(403, None, Some("denied")));
        assert!(ignore_not_found(Err(other)).is_err());
        assert!(classify_anyhow_error(&anyhow::anyhow!("plain")).is_none());
    }
}
