//! Shared test utilities for integration tests
//!
//! `FakeCloud` is an in-memory project implementing both collaborator traits.
//! It records every call, can fail chosen partitions or resources, and can
//! delay each lookup by a random amount to shake out ordering assumptions.

#![allow(dead_code)]

use anyhow::{bail, Result};
use cost_sentry::gcp::GcpError;
use cost_sentry::sentry::{
    Binding, ComputeApi, ComputeResource, Partition, Policy, ServiceRef, ServiceResource,
    ServicesApi,
};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_PROJECT: &str = "demo";
pub const TEST_LABEL: &str = "costsentry";

/// Over-budget notice (150 against 100)
pub const OVER_BUDGET: &[u8] =
    br#"{"budgetDisplayName": "demo-budget", "costAmount": 150, "budgetAmount": 100, "currencyCode": "USD"}"#;

/// Under-budget notice (50 against 100)
pub const UNDER_BUDGET: &[u8] =
    br#"{"budgetDisplayName": "demo-budget", "costAmount": 50, "budgetAmount": 100, "currencyCode": "USD"}"#;

/// A call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListZones,
    ListInstances { zone: String, filter: String },
    Halt { zone: String, name: String },
    ListLocations,
    ListServices { location: String, selector: String },
    GetPolicy { service: String },
    SetPolicy { service: String },
}

/// Policy granting public invoke plus one named admin
pub fn public_policy() -> Policy {
    Policy {
        version: Some(1),
        etag: Some("BwYz".to_string()),
        bindings: vec![
            Binding::new("roles/run.invoker", &["allUsers"]),
            Binding::new("roles/run.admin", &["user:alice@example.com"]),
        ],
    }
}

/// Policy with no public principal
pub fn private_policy() -> Policy {
    Policy {
        version: Some(1),
        etag: Some("BwYa".to_string()),
        bindings: vec![Binding::new(
            "roles/run.invoker",
            &["serviceAccount:ci@demo.iam.gserviceaccount.com"],
        )],
    }
}

/// In-memory project
#[derive(Debug, Default)]
pub struct FakeCloud {
    zones: Vec<String>,
    locations: Vec<String>,
    instances: HashMap<String, Vec<String>>,
    services: HashMap<String, Vec<String>>,
    policies: Mutex<HashMap<String, Policy>>,

    fail_zone_listing: bool,
    deny_zone_listing: bool,
    fail_location_listing: bool,
    fail_zones: HashSet<String>,
    fail_locations: HashSet<String>,
    fail_halts: HashSet<String>,
    fail_policy_writes: HashSet<String>,

    max_delay_ms: u64,
    calls: Mutex<Vec<Call>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone holding the named labelled, running instances
    pub fn with_zone(mut self, zone: &str, instances: &[&str]) -> Self {
        self.zones.push(zone.to_string());
        self.instances
            .insert(zone.to_string(), instances.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Add a location holding labelled services with the given policies
    pub fn with_location(mut self, location: &str, services: &[(&str, Policy)]) -> Self {
        self.locations.push(location.to_string());
        let mut policies = self.policies.lock().unwrap();
        let mut names = Vec::new();
        for (name, policy) in services {
            policies.insert(service_key(location, name), policy.clone());
            names.push(name.to_string());
        }
        drop(policies);
        self.services.insert(location.to_string(), names);
        self
    }

    /// List a service that is deleted before its policy can be read
    pub fn with_deleted_service(mut self, location: &str, name: &str) -> Self {
        self.services
            .entry(location.to_string())
            .or_default()
            .push(name.to_string());
        self
    }

    pub fn failing_zone_listing(mut self) -> Self {
        self.fail_zone_listing = true;
        self
    }

    /// Reject zone listing with a permission error
    pub fn denying_zone_listing(mut self) -> Self {
        self.deny_zone_listing = true;
        self
    }

    pub fn failing_location_listing(mut self) -> Self {
        self.fail_location_listing = true;
        self
    }

    pub fn failing_zone(mut self, zone: &str) -> Self {
        self.fail_zones.insert(zone.to_string());
        self
    }

    pub fn failing_location(mut self, location: &str) -> Self {
        self.fail_locations.insert(location.to_string());
        self
    }

    pub fn failing_halt(mut self, instance: &str) -> Self {
        self.fail_halts.insert(instance.to_string());
        self
    }

    pub fn failing_policy_write(mut self, service: &str) -> Self {
        self.fail_policy_writes.insert(service.to_string());
        self
    }

    /// Delay every partition lookup by up to `max_ms`
    pub fn with_random_delays(mut self, max_ms: u64) -> Self {
        self.max_delay_ms = max_ms;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of instances a halt was requested for, in call order
    pub fn halted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Halt { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Services whose policy was written, in call order
    pub fn policy_writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetPolicy { service } => Some(service),
                _ => None,
            })
            .collect()
    }

    pub fn policy(&self, location: &str, service: &str) -> Option<Policy> {
        self.policies
            .lock()
            .unwrap()
            .get(&service_key(location, service))
            .cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn jitter(&self) {
        if self.max_delay_ms == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(0..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

fn service_key(location: &str, name: &str) -> String {
    format!("projects/{TEST_PROJECT}/locations/{location}/services/{name}")
}

impl ComputeApi for &FakeCloud {
    async fn list_zones(&self, _project: &str) -> Result<Vec<Partition>> {
        self.record(Call::ListZones);
        if self.fail_zone_listing {
            bail!("connection reset by peer");
        }
        if self.deny_zone_listing {
            return Err(GcpError::PermissionDenied {
                message: "Required 'compute.zones.list' permission".to_string(),
            }
            .into());
        }
        Ok(self.zones.iter().map(|z| Partition::from(z.as_str())).collect())
    }

    async fn list_instances(
        &self,
        _project: &str,
        zone: &Partition,
        filter: &str,
    ) -> Result<Vec<ComputeResource>> {
        self.record(Call::ListInstances {
            zone: zone.to_string(),
            filter: filter.to_string(),
        });
        self.jitter().await;
        if self.fail_zones.contains(zone.as_str()) {
            bail!("503 backend unavailable in {zone}");
        }
        Ok(self
            .instances
            .get(zone.as_str())
            .into_iter()
            .flatten()
            .map(|name| ComputeResource::new(name.as_str(), zone.clone()))
            .collect())
    }

    async fn halt_instance(&self, _project: &str, zone: &Partition, name: &str) -> Result<()> {
        self.record(Call::Halt {
            zone: zone.to_string(),
            name: name.to_string(),
        });
        if self.fail_halts.contains(name) {
            bail!("operation timed out");
        }
        Ok(())
    }
}

impl ServicesApi for &FakeCloud {
    async fn list_locations(&self, _project: &str) -> Result<Vec<Partition>> {
        self.record(Call::ListLocations);
        if self.fail_location_listing {
            bail!("403 run API disabled");
        }
        Ok(self
            .locations
            .iter()
            .map(|l| Partition::from(l.as_str()))
            .collect())
    }

    async fn list_services(
        &self,
        _project: &str,
        location: &Partition,
        selector: &str,
    ) -> Result<Vec<ServiceResource>> {
        self.record(Call::ListServices {
            location: location.to_string(),
            selector: selector.to_string(),
        });
        self.jitter().await;
        if self.fail_locations.contains(location.as_str()) {
            bail!("503 backend unavailable in {location}");
        }
        Ok(self
            .services
            .get(location.as_str())
            .into_iter()
            .flatten()
            .map(|name| ServiceResource::new(name.as_str(), location.clone()))
            .collect())
    }

    async fn get_access_policy(&self, service: &ServiceRef) -> Result<Policy> {
        let key = service.resource_name();
        self.record(Call::GetPolicy {
            service: key.clone(),
        });
        match self.policies.lock().unwrap().get(&key) {
            Some(policy) => Ok(policy.clone()),
            None => Err(GcpError::NotFound {
                message: format!("{key} not found"),
            }
            .into()),
        }
    }

    async fn set_access_policy(&self, service: &ServiceRef, policy: &Policy) -> Result<()> {
        let key = service.resource_name();
        self.record(Call::SetPolicy {
            service: key.clone(),
        });
        if self.fail_policy_writes.contains(&service.name) {
            bail!("409 etag mismatch");
        }
        self.policies.lock().unwrap().insert(key, policy.clone());
        Ok(())
    }
}
