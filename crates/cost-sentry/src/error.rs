//! Configuration validation errors

use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// project field is empty
    #[error("project cannot be empty (set --project or GOOGLE_CLOUD_PROJECT)")]
    EmptyProject,

    /// label field is empty
    #[error("label cannot be empty (set --label or LABEL)")]
    EmptyLabel,

    /// label is not a valid GCP label key
    #[error(
        "label must start with a lowercase letter and contain only lowercase letters, digits, '_' or '-' (max 63 chars), got: {0}"
    )]
    InvalidLabel(String),

    /// Failed to read a notice file
    #[error("Failed to read notice '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
