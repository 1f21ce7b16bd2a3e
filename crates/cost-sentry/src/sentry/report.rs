//! Invocation outcome and human-readable summary

use super::mitigation::MitigationOutcome;
use cost_sentry_common::{BillingNotice, ResourceKind};
use serde::Serialize;
use std::fmt;

/// What an invocation achieved, as seen by operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Cost within budget, nothing scanned
    NoAction,
    /// Every matched resource was mitigated
    FullyMitigated,
    /// At least one mitigation failed or was skipped
    PartiallyMitigated,
    /// A resource kind could not be scanned completely
    ScanFailed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::NoAction => "no action",
            Outcome::FullyMitigated => "fully mitigated",
            Outcome::PartiallyMitigated => "partially mitigated",
            Outcome::ScanFailed => "scan failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mitigation counts for one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub kind: ResourceKind,
    /// Resources matched by the scan
    pub found: usize,
    pub attempted: usize,
    pub succeeded: usize,
    /// Successful actions that changed something
    pub effective: usize,
    /// Rendered failures, in input order
    pub failures: Vec<String>,
}

impl KindSummary {
    pub fn from_outcome<E: std::error::Error + 'static>(
        found: usize,
        outcome: &MitigationOutcome<E>,
    ) -> Self {
        Self {
            kind: outcome.kind,
            found,
            attempted: outcome.attempted,
            succeeded: outcome.succeeded,
            effective: outcome.effective,
            failures: outcome
                .failures
                .iter()
                .map(|e| render_chain(e))
                .collect(),
        }
    }

    /// Every matched resource was attempted and none failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.attempted == self.found
    }

    /// Resources known to need a change: the ones changed plus the ones that
    /// failed before we could tell
    pub fn needing_action(&self) -> usize {
        self.effective + self.failures.len()
    }
}

/// Render an error and its source chain joined with ": "
pub(crate) fn render_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Result of one invocation
#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    pub budget: String,
    pub cost: f64,
    pub budget_amount: f64,
    pub currency: String,
    pub outcome: Outcome,
    pub services: Option<KindSummary>,
    pub instances: Option<KindSummary>,
}

impl InvocationReport {
    pub fn new(notice: &BillingNotice, outcome: Outcome) -> Self {
        Self {
            budget: notice.display_name.clone(),
            cost: notice.cost_amount,
            budget_amount: notice.budget_amount,
            currency: notice.currency_code.clone(),
            outcome,
            services: None,
            instances: None,
        }
    }

    /// Outcome implied by the per-kind summaries
    pub fn mitigation_outcome(&self) -> Outcome {
        let complete = [&self.services, &self.instances]
            .into_iter()
            .flatten()
            .all(KindSummary::is_complete);
        if complete {
            Outcome::FullyMitigated
        } else {
            Outcome::PartiallyMitigated
        }
    }

    /// Failures across both kinds
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        [&self.services, &self.instances]
            .into_iter()
            .flatten()
            .flat_map(|s| s.failures.iter().map(String::as_str))
    }
}

impl fmt::Display for InvocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.outcome)?;
        if self.outcome == Outcome::NoAction {
            return write!(
                f,
                ": cost {:.2} within budget {:.2} {}",
                self.cost, self.budget_amount, self.currency
            );
        }
        if let Some(services) = &self.services {
            write!(
                f,
                ": servicesMitigated={} of {} needing action",
                services.effective,
                services.needing_action()
            )?;
        }
        if let Some(instances) = &self.instances {
            write!(
                f,
                ", instancesHalted={} of {}",
                instances.succeeded, instances.found
            )?;
        }
        Ok(())
    }
}
