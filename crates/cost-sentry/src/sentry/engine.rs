//! Invocation engine
//!
//! `Orchestrator` turns one billing notice into at most one mitigation pass.
//! A pass walks a fixed sequence of stages:
//!
//! ```text
//! Idle -> Decoding -> DecisionGate -> ScanningServices -> MitigatingServices
//!      -> ScanningInstances -> MitigatingInstances -> Done
//! ```
//!
//! Any stage may move to `Failed`. Services are handled before instances, and
//! each kind is scanned completely before any of it is mitigated. A kind that
//! cannot be scanned completely ends the invocation; per-resource mitigation
//! failures do not.

use std::fmt;

use cost_sentry_common::{BillingNotice, DecodeError, ResourceKind};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::decision::should_mitigate;
use super::mitigation::{halt_instances, revoke_services};
use super::operations::{ComputeApi, ServicesApi};
use super::partitions::enumerate_partitions;
use super::report::{InvocationReport, KindSummary, Outcome};
use super::scanner::{scan, ScanError};
use super::types::{ComputeResource, ServiceResource};
use crate::config::SentryConfig;

/// Step of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Decoding,
    DecisionGate,
    ScanningServices,
    MitigatingServices,
    ScanningInstances,
    MitigatingInstances,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Decoding => "decoding",
            Stage::DecisionGate => "decision-gate",
            Stage::ScanningServices => "scanning-services",
            Stage::MitigatingServices => "mitigating-services",
            Stage::ScanningInstances => "scanning-instances",
            Stage::MitigatingInstances => "mitigating-instances",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current stage and logs every transition
#[derive(Debug)]
struct StageTracker {
    current: Stage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: Stage::Idle,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.current, to = %next, "Stage transition");
        self.current = next;
    }

    /// Move to `Failed`, returning the stage that failed
    fn fail(&mut self) -> Stage {
        let failed = self.current;
        self.advance(Stage::Failed);
        failed
    }
}

/// An invocation that did not run to completion
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The payload is not a billing notice
    #[error("cannot decode billing notice")]
    Decode(#[from] DecodeError),

    /// A resource kind could not be scanned completely
    #[error("{} scan failed during {stage}", .source.kind())]
    Scan {
        stage: Stage,
        #[source]
        source: ScanError,
        /// What had been done before the scan failed
        report: Box<InvocationReport>,
    },
}

impl InvocationError {
    /// Stage the invocation was in when it failed
    pub fn stage(&self) -> Stage {
        match self {
            InvocationError::Decode(_) => Stage::Decoding,
            InvocationError::Scan { stage, .. } => *stage,
        }
    }

    /// Whether redelivering the same notice could succeed.
    ///
    /// A payload that failed to decode will fail again. A scan is worth
    /// retrying only when none of its failures is permanent.
    pub fn is_redeliverable(&self) -> bool {
        match self {
            InvocationError::Decode(_) => false,
            InvocationError::Scan { source, .. } => source.is_transient(),
        }
    }

    /// Partial report, when the notice was decoded
    pub fn report(&self) -> Option<&InvocationReport> {
        match self {
            InvocationError::Decode(_) => None,
            InvocationError::Scan { report, .. } => Some(report),
        }
    }
}

/// Reacts to billing notices by mitigating labelled resources.
pub struct Orchestrator<C, S> {
    config: SentryConfig,
    compute: C,
    services: S,
}

impl<C, S> fmt::Debug for Orchestrator<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("project", &self.config.project)
            .field("label", &self.config.label)
            .finish()
    }
}

impl<C: ComputeApi, S: ServicesApi> Orchestrator<C, S> {
    pub fn new(config: SentryConfig, compute: C, services: S) -> Self {
        Self {
            config,
            compute,
            services,
        }
    }

    pub fn config(&self) -> &SentryConfig {
        &self.config
    }

    // ── Invocation ──────────────────────────────────────────────────────

    /// Decode a raw billing notice and handle it.
    pub async fn handle_event(&self, payload: &[u8]) -> Result<InvocationReport, InvocationError> {
        let mut stage = StageTracker::new();
        stage.advance(Stage::Decoding);

        let notice = match BillingNotice::from_json(payload) {
            Ok(notice) => notice,
            Err(e) => {
                stage.fail();
                warn!(error = %e, "Discarding undecodable billing notice");
                return Err(e.into());
            }
        };

        self.run(&notice, stage).await
    }

    /// Handle an already decoded billing notice.
    pub async fn handle_notice(
        &self,
        notice: &BillingNotice,
    ) -> Result<InvocationReport, InvocationError> {
        let mut stage = StageTracker::new();
        stage.advance(Stage::Decoding);
        self.run(notice, stage).await
    }

    async fn run(
        &self,
        notice: &BillingNotice,
        mut stage: StageTracker,
    ) -> Result<InvocationReport, InvocationError> {
        stage.advance(Stage::DecisionGate);
        info!(
            budget = %notice.display_name,
            cost = notice.cost_amount,
            budget_amount = notice.budget_amount,
            currency = %notice.currency_code,
            "Received billing notice"
        );

        if !should_mitigate(notice.cost_amount, notice.budget_amount) {
            info!("Cost within budget, no action required");
            stage.advance(Stage::Done);
            return Ok(InvocationReport::new(notice, Outcome::NoAction));
        }

        warn!(
            project = %self.config.project,
            label = %self.config.label,
            "Budget exceeded, mitigating labelled resources"
        );
        let mut report = InvocationReport::new(notice, Outcome::ScanFailed);
        let policy = self.config.mitigation_policy;

        stage.advance(Stage::ScanningServices);
        let services = match self.scan_services().await {
            Ok(services) => services,
            Err(source) => return Err(scan_failed(&mut stage, source, report)),
        };

        stage.advance(Stage::MitigatingServices);
        let outcome =
            revoke_services(&self.services, &self.config.project, &services, policy).await;
        report.services = Some(KindSummary::from_outcome(services.len(), &outcome));

        stage.advance(Stage::ScanningInstances);
        let instances = match self.scan_instances().await {
            Ok(instances) => instances,
            Err(source) => return Err(scan_failed(&mut stage, source, report)),
        };

        stage.advance(Stage::MitigatingInstances);
        let outcome =
            halt_instances(&self.compute, &self.config.project, &instances, policy).await;
        report.instances = Some(KindSummary::from_outcome(instances.len(), &outcome));

        report.outcome = report.mitigation_outcome();
        stage.advance(Stage::Done);

        if report.outcome == Outcome::FullyMitigated {
            info!(summary = %report, "Mitigation complete");
        } else {
            for failure in report.failures() {
                warn!(error = %failure, "Mitigation failure");
            }
            warn!(summary = %report, "Mitigation incomplete");
        }
        Ok(report)
    }

    // ── Scanning ────────────────────────────────────────────────────────

    /// Find every labelled Cloud Run service across all locations.
    pub async fn scan_services(&self) -> Result<Vec<ServiceResource>, ScanError> {
        let project = self.config.project.as_str();
        let selector = self.config.service_selector();

        let locations = enumerate_partitions(
            ResourceKind::CloudRunService,
            self.services.list_locations(project),
        )
        .await?;

        let selector = selector.as_str();
        let services = scan(ResourceKind::CloudRunService, &locations, |location| async move {
            self.services
                .list_services(project, &location, selector)
                .await
        })
        .await?;
        Ok(services)
    }

    /// Find every labelled, running Compute Engine instance across all zones.
    pub async fn scan_instances(&self) -> Result<Vec<ComputeResource>, ScanError> {
        let project = self.config.project.as_str();
        let filter = self.config.instance_filter();

        let zones = enumerate_partitions(
            ResourceKind::ComputeInstance,
            self.compute.list_zones(project),
        )
        .await?;

        let filter = filter.as_str();
        let instances = scan(ResourceKind::ComputeInstance, &zones, |zone| async move {
            self.compute.list_instances(project, &zone, filter).await
        })
        .await?;
        Ok(instances)
    }
}

fn scan_failed(
    stage: &mut StageTracker,
    source: ScanError,
    report: InvocationReport,
) -> InvocationError {
    let failed = stage.fail();
    error!(stage = %failed, error = %source, "Scan failed, aborting invocation");
    InvocationError::Scan {
        stage: failed,
        source,
        report: Box::new(report),
    }
}
