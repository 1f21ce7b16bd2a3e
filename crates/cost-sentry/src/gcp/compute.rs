//! Compute Engine REST client

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

use super::context::GcpContext;
use super::error::ignore_not_found;
use crate::sentry::{ComputeApi, ComputeResource, Partition};

/// One page of a Compute Engine list call
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Instance {
    name: String,
    /// Full zone URL, e.g. `.../projects/demo/zones/us-central1-a`
    #[serde(default)]
    zone: String,
    #[serde(default)]
    status: String,
}

/// Last path segment of a zone URL, or the value itself when it has none
pub fn zone_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Compute Engine client for zone and instance operations
#[derive(Debug, Clone)]
pub struct ComputeClient {
    ctx: GcpContext,
}

impl ComputeClient {
    pub fn from_context(ctx: &GcpContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    fn project_url(&self, project: &str) -> String {
        format!("{}/projects/{}", self.ctx.compute_endpoint(), project)
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        filter: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = Vec::new();
            if let Some(filter) = filter {
                query.push(("filter", filter));
            }
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: ListPage<T> = self.ctx.get_json(url, &query).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }
}

impl ComputeApi for ComputeClient {
    async fn list_zones(&self, project: &str) -> Result<Vec<Partition>> {
        let url = format!("{}/zones", self.project_url(project));
        let zones: Vec<Zone> = self.list_all(&url, None).await?;
        Ok(zones.into_iter().map(|z| Partition::new(z.name)).collect())
    }

    async fn list_instances(
        &self,
        project: &str,
        zone: &Partition,
        filter: &str,
    ) -> Result<Vec<ComputeResource>> {
        let url = format!("{}/zones/{}/instances", self.project_url(project), zone);
        let instances: Vec<Instance> = self.list_all(&url, Some(filter)).await?;

        debug!(zone = %zone, count = instances.len(), "Listed instances");
        Ok(instances
            .into_iter()
            .map(|i| {
                let zone = if i.zone.is_empty() {
                    zone.clone()
                } else {
                    Partition::new(zone_from_url(&i.zone))
                };
                ComputeResource {
                    name: i.name,
                    zone,
                    status: i.status,
                }
            })
            .collect())
    }

    async fn halt_instance(&self, project: &str, zone: &Partition, name: &str) -> Result<()> {
        let url = format!(
            "{}/zones/{}/instances/{}/stop",
            self.project_url(project),
            zone,
            name
        );

        // The stop call returns a zonal operation; the instance is stopping
        // once it is accepted. An instance deleted since the scan is not
        // spending anything.
        let result = self
            .ctx
            .post_json::<_, serde_json::Value>(&url, &serde_json::json!({}))
            .await
            .map(|_| ());
        ignore_not_found(result)?;

        info!(instance = %name, zone = %zone, "Stop requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_from_url() {
        assert_eq!(
            zone_from_url("https://www.googleapis.com/compute/v1/projects/demo/zones/us-central1-a"),
            "us-central1-a"
        );
        assert_eq!(zone_from_url("europe-west1-b"), "europe-west1-b");
    }

    #[test]
    fn test_page_decoding() {
        let page: ListPage<Instance> = serde_json::from_str(
            r#"{
                "kind": "compute#instanceList",
                "items": [{"name": "vm-1", "zone": "projects/demo/zones/us-central1-a", "status": "RUNNING"}],
                "nextPageToken": "abc"
            }"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        // Empty zones omit `items` entirely
        let empty: ListPage<Zone> = serde_json::from_str(r#"{"kind": "compute#zoneList"}"#).unwrap();
        assert!(empty.items.is_empty());
        assert!(empty.next_page_token.is_none());
    }

    #[tokio::test]
    #[ignore = "requires GCP credentials"]
    async fn test_list_zones_live() {
        let project = std::env::var("GOOGLE_CLOUD_PROJECT").unwrap();
        let ctx = GcpContext::new(None).await.unwrap();
        let zones = ctx.compute_client().list_zones(&project).await.unwrap();
        assert!(!zones.is_empty());
    }
}
