//! Shared GCP request context
//!
//! Provides `GcpContext` for resolving credentials once and creating the
//! Compute Engine and Cloud Run clients from the same HTTP client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use gcp_auth::TokenProvider;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::compute::ComputeClient;
use super::error::classify_response;
use super::run::RunClient;

/// OAuth scope covering both the Compute Engine and Cloud Run APIs
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

pub const COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";
pub const RUN_ENDPOINT: &str = "https://run.googleapis.com/v1";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
enum Credentials {
    /// Token supplied by the operator
    Static(String),
    /// Application Default Credentials
    Provider(Arc<dyn TokenProvider>),
}

/// Shared GCP context for creating API clients.
///
/// # Example
/// ```ignore
/// let gcp = GcpContext::new(None).await?;
///
/// let compute = gcp.compute_client();
/// let run = gcp.run_client();
/// ```
#[derive(Clone)]
pub struct GcpContext {
    http: reqwest::Client,
    credentials: Credentials,
    compute_endpoint: String,
    run_endpoint: String,
}

impl GcpContext {
    /// Resolve credentials: the given access token if any, otherwise
    /// Application Default Credentials.
    pub async fn new(access_token: Option<String>) -> Result<Self> {
        let credentials = match access_token {
            Some(token) => Credentials::Static(token),
            None => Credentials::Provider(
                gcp_auth::provider()
                    .await
                    .context("Failed to initialize GCP authentication")?,
            ),
        };
        Self::with_credentials(credentials)
    }

    /// Context authenticating every request with a fixed bearer token.
    pub fn with_token(token: impl Into<String>) -> Result<Self> {
        Self::with_credentials(Credentials::Static(token.into()))
    }

    fn with_credentials(credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            credentials,
            compute_endpoint: COMPUTE_ENDPOINT.to_string(),
            run_endpoint: RUN_ENDPOINT.to_string(),
        })
    }

    /// Point the clients at other base URLs (local fakes, private endpoints).
    pub fn with_endpoints(mut self, compute: impl Into<String>, run: impl Into<String>) -> Self {
        self.compute_endpoint = compute.into().trim_end_matches('/').to_string();
        self.run_endpoint = run.into().trim_end_matches('/').to_string();
        self
    }

    pub fn compute_endpoint(&self) -> &str {
        &self.compute_endpoint
    }

    pub fn run_endpoint(&self) -> &str {
        &self.run_endpoint
    }

    /// Create a Compute Engine client from this context.
    pub fn compute_client(&self) -> ComputeClient {
        ComputeClient::from_context(self)
    }

    /// Create a Cloud Run client from this context.
    pub fn run_client(&self) -> RunClient {
        RunClient::from_context(self)
    }

    async fn token(&self) -> Result<String> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::Provider(provider) => {
                let token = provider
                    .token(&[CLOUD_PLATFORM_SCOPE])
                    .await
                    .context("Failed to get GCP access token")?;
                Ok(token.as_str().to_string())
            }
        }
    }

    /// GET `url` and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!(url, "GET");
        let request = self.http.get(url).query(query);
        self.send(request, url).await
    }

    /// POST a JSON body to `url` and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        debug!(url, "POST");
        let request = self.http.post(url).json(body);
        self.send(request, url).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, url: &str) -> Result<T> {
        let token = self.token().await?;
        let response = request
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::Error::new(classify_response(status.as_u16(), &body)));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {url}"))
    }
}

impl std::fmt::Debug for GcpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let credentials = match self.credentials {
            Credentials::Static(_) => "static",
            Credentials::Provider(_) => "application-default",
        };
        f.debug_struct("GcpContext")
            .field("credentials", &credentials)
            .field("compute_endpoint", &self.compute_endpoint)
            .field("run_endpoint", &self.run_endpoint)
            .finish_non_exhaustive()
    }
}
