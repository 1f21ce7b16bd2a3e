//! Orchestrator configuration

use crate::error::ConfigError;
use crate::gcp::GcpContext;
use cost_sentry_common::labels;

/// How a mitigation batch reacts to a failing resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MitigationPolicy {
    /// Stop at the first failure and report how many succeeded before it
    #[default]
    FailFast,
    /// Attempt every resource and report every failure
    #[value(name = "continue")]
    ContinueOnError,
}

/// Everything the orchestrator needs to know about the project it protects
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// Project to scan and mitigate
    pub project: String,
    /// Label opting resources in (`<label>=true`)
    pub label: String,
    /// Reaction to per-resource mitigation failures
    pub mitigation_policy: MitigationPolicy,
}

impl SentryConfig {
    pub fn new(project: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            label: label.into(),
            mitigation_policy: MitigationPolicy::default(),
        }
    }

    pub fn with_mitigation_policy(mut self, policy: MitigationPolicy) -> Self {
        self.mitigation_policy = policy;
        self
    }

    /// Check that the project and label can be used to build API requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::EmptyProject);
        }
        if self.label.is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        if !labels::is_valid_label_key(&self.label) {
            return Err(ConfigError::InvalidLabel(self.label.clone()));
        }
        Ok(())
    }

    /// Compute Engine filter expression for labelled, running instances
    pub fn instance_filter(&self) -> String {
        labels::instance_filter(&self.label)
    }

    /// Cloud Run label selector for labelled services
    pub fn service_selector(&self) -> String {
        labels::service_selector(&self.label)
    }
}

/// How API clients authenticate and where they send requests
#[derive(Debug, Clone, Default)]
pub struct GcpSettings {
    /// Pre-minted bearer token; Application Default Credentials when unset
    pub access_token: Option<String>,
    /// Compute Engine base URL override
    pub compute_endpoint: Option<String>,
    /// Cloud Run base URL override
    pub run_endpoint: Option<String>,
}

impl GcpSettings {
    /// Build a fresh context from these settings.
    pub async fn connect(&self) -> anyhow::Result<GcpContext> {
        let ctx = GcpContext::new(self.access_token.clone()).await?;
        let compute = self
            .compute_endpoint
            .clone()
            .unwrap_or_else(|| ctx.compute_endpoint().to_string());
        let run = self
            .run_endpoint
            .clone()
            .unwrap_or_else(|| ctx.run_endpoint().to_string());
        Ok(ctx.with_endpoints(compute, run))
    }
}
