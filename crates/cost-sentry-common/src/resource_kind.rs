//! Managed resource kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of resources cost-sentry mitigates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Cloud Run service, partitioned by location
    CloudRunService,
    /// Compute Engine instance, partitioned by zone
    ComputeInstance,
}

impl ResourceKind {
    /// Short identifier used in logs and summaries
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::CloudRunService => "cloud-run-service",
            ResourceKind::ComputeInstance => "compute-instance",
        }
    }

    /// Name of the partition this kind is spread over
    pub fn partition_noun(self) -> &'static str {
        match self {
            ResourceKind::CloudRunService => "location",
            ResourceKind::ComputeInstance => "zone",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ResourceKind::ComputeInstance.to_string(), "compute-instance");
        assert_eq!(ResourceKind::CloudRunService.partition_noun(), "location");
    }
}
