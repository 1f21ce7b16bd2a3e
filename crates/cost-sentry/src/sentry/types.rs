//! Resource and access-policy types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A provider-defined scan unit: a zone for instances, a location for services
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Partition(String);

impl Partition {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Partition {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Partition {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Capabilities shared by every mitigable resource
pub trait ManagedResource {
    /// Resource name, unique within its partition
    fn name(&self) -> &str;

    /// Partition owning the resource
    fn partition(&self) -> &Partition;

    /// `partition/name`, for logs
    fn qualified_name(&self) -> String {
        format!("{}/{}", self.partition(), self.name())
    }
}

/// Compute Engine instance matched by the label filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ComputeResource {
    pub name: String,
    pub zone: Partition,
    /// Run state as reported at scan time (e.g. `RUNNING`)
    pub status: String,
}

impl ComputeResource {
    pub fn new(name: impl Into<String>, zone: impl Into<Partition>) -> Self {
        Self {
            name: name.into(),
            zone: zone.into(),
            status: "RUNNING".to_string(),
        }
    }
}

impl ManagedResource for ComputeResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn partition(&self) -> &Partition {
        &self.zone
    }
}

/// Cloud Run service matched by the label selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceResource {
    pub name: String,
    pub location: Partition,
}

impl ServiceResource {
    pub fn new(name: impl Into<String>, location: impl Into<Partition>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Fully qualified reference used by the access-policy calls
    pub fn service_ref(&self, project: &str) -> ServiceRef {
        ServiceRef {
            project: project.to_string(),
            location: self.location.as_str().to_string(),
            name: self.name.clone(),
        }
    }
}

impl ManagedResource for ServiceResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn partition(&self) -> &Partition {
        &self.location
    }
}

/// Address of a Cloud Run service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRef {
    pub project: String,
    pub location: String,
    pub name: String,
}

impl ServiceRef {
    /// `projects/{project}/locations/{location}/services/{name}`
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/services/{}",
            self.project, self.location, self.name
        )
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_name())
    }
}

/// IAM policy attached to a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Role granted to a set of principals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl Binding {
    pub fn new(role: impl Into<String>, members: &[&str]) -> Self {
        Self {
            role: role.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
            condition: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_ref_name() {
        let svc = ServiceResource::new("frontend", "us-central1");
        assert_eq!(
            svc.service_ref("demo").resource_name(),
            "projects/demo/locations/us-central1/services/frontend"
        );
        assert_eq!(svc.qualified_name(), "us-central1/frontend");
    }

    #[test]
    fn test_policy_wire_format() {
        let json = r#"{
            "version": 1,
            "etag": "BwYz",
            "bindings": [
                {"role": "roles/run.invoker", "members": ["allUsers"]}
            ]
        }"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.etag.as_deref(), Some("BwYz"));

        let out = serde_json::to_value(&policy).unwrap();
        assert!(out["bindings"][0].get("condition").is_none());
        assert_eq!(out["etag"], "BwYz");
    }

    #[test]
    fn test_empty_policy_decodes() {
        let policy: Policy = serde_json::from_str(r#"{"etag": "ACAB"}"#).unwrap();
        assert!(policy.bindings.is_empty());
    }
}
