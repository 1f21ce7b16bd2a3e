//! Cloud Run Admin API (v1) client

use std::collections::HashMap;

use anyhow::Result;
use cost_sentry_common::labels::LOCATION_LABEL;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::GcpContext;
use crate::sentry::{Partition, Policy, ServiceRef, ServiceResource, ServicesApi};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationPage {
    #[serde(default)]
    locations: Vec<Location>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    location_id: String,
}

/// Knative-style service list
#[derive(Debug, Deserialize)]
struct ServicePage {
    #[serde(default)]
    items: Vec<Service>,
    #[serde(default)]
    metadata: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(default, rename = "continue")]
    continue_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Service {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct SetPolicyRequest<'a> {
    policy: &'a Policy,
}

/// Cloud Run client for location, service and IAM policy operations
#[derive(Debug, Clone)]
pub struct RunClient {
    ctx: GcpContext,
}

impl RunClient {
    pub fn from_context(ctx: &GcpContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.ctx.run_endpoint(), name)
    }
}

/// Convert a listed service, taking its location from the metadata label
/// when present and from the listing partition otherwise.
fn to_resource(service: Service, listed_in: &Partition) -> ServiceResource {
    let location = service
        .metadata
        .labels
        .get(LOCATION_LABEL)
        .map(|l| Partition::new(l.as_str()))
        .unwrap_or_else(|| listed_in.clone());

    ServiceResource::new(service.metadata.name, location)
}

impl ServicesApi for RunClient {
    async fn list_locations(&self, project: &str) -> Result<Vec<Partition>> {
        let url = self.resource_url(&format!("projects/{project}/locations"));
        let mut locations = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|token| vec![("pageToken", token)])
                .unwrap_or_default();
            let page: LocationPage = self.ctx.get_json(&url, &query).await?;
            locations.extend(page.locations.into_iter().map(|l| Partition::new(l.location_id)));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(locations),
            }
        }
    }

    async fn list_services(
        &self,
        project: &str,
        location: &Partition,
        selector: &str,
    ) -> Result<Vec<ServiceResource>> {
        let url = self.resource_url(&format!("projects/{project}/locations/{location}/services"));
        let mut services = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut query = vec![("labelSelector", selector)];
            if let Some(token) = continue_token.as_deref() {
                query.push(("continue", token));
            }
            let page: ServicePage = self.ctx.get_json(&url, &query).await?;
            services.extend(page.items.into_iter().map(|s| to_resource(s, location)));

            match page.metadata.continue_token {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        debug!(location = %location, count = services.len(), "Listed services");
        Ok(services)
    }

    async fn get_access_policy(&self, service: &ServiceRef) -> Result<Policy> {
        let url = format!("{}:getIamPolicy", self.resource_url(&service.resource_name()));
        self.ctx.get_json(&url, &[]).await
    }

    async fn set_access_policy(&self, service: &ServiceRef, policy: &Policy) -> Result<()> {
        let url = format!("{}:setIamPolicy", self.resource_url(&service.resource_name()));
        let _: Policy = self.ctx.post_json(&url, &SetPolicyRequest { policy }).await?;
        Ok(())
    }
}
