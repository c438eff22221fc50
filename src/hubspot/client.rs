//! HubSpot API client
//!
//! Thin typed layer over [`HttpClient`]. Paths come from the injected
//! [`ResourceRegistry`]; transport, auth, retries and rate limiting are
//! handled by the HTTP client.

use super::resources::{PaginationCapability, ResourceRegistry, OBJECT_ID_PLACEHOLDER};
use super::types::{ListOptions, ListResponse, SearchRequest};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig, RequestConfig};
use crate::types::{BackoffType, JsonObject, JsonValue};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default HubSpot API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

/// Read operations the change-capture iterators depend on
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// List items of a resource
    async fn list(&self, resource: &str, options: &ListOptions) -> Result<ListResponse>;

    /// Follow a cursor link returned in a previous list response
    async fn list_by_next_link(&self, link: &str) -> Result<ListResponse>;

    /// Search items of a resource
    async fn search(&self, resource: &str, request: &SearchRequest) -> Result<ListResponse>;
}

/// Settings of a [`HubSpotClient`]
#[derive(Debug, Clone)]
pub struct HubSpotClientConfig {
    pub access_token: String,
    pub base_url: String,
    pub max_retries: u32,
    pub rate_limit: RateLimiterConfig,
}

impl HubSpotClientConfig {
    /// Config for the public API with default retries
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 4,
            rate_limit: RateLimiterConfig::default(),
        }
    }

    /// Override the base URL
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the retry count
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the request quota
    #[must_use]
    pub fn rate_limit(mut self, rate_limit: RateLimiterConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// Client for the HubSpot API v3
#[derive(Debug)]
pub struct HubSpotClient {
    http: HttpClient,
    registry: Arc<ResourceRegistry>,
}

impl HubSpotClient {
    /// Build a client with bearer auth, exponential backoff and rate limiting
    pub fn new(config: HubSpotClientConfig, registry: Arc<ResourceRegistry>) -> Result<Self> {
        let http = HttpClient::with_config(
            HttpClientConfig::builder()
                .base_url(config.base_url)
                .bearer_token(config.access_token)
                .max_retries(config.max_retries)
                .rate_limit(config.rate_limit)
                .backoff(
                    BackoffType::Exponential,
                    Duration::from_millis(500),
                    Duration::from_secs(30),
                )
                .build(),
        )?;

        Ok(Self { http, registry })
    }

    /// Build a client over an already configured HTTP client
    pub fn with_http(http: HttpClient, registry: Arc<ResourceRegistry>) -> Self {
        Self { http, registry }
    }

    /// The registry paths are resolved against
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Create an item
    pub async fn create(&self, resource: &str, item: &JsonObject) -> Result<()> {
        let path = self
            .registry
            .get(resource)?
            .create_path
            .as_deref()
            .ok_or_else(|| Error::unsupported_resource(resource))?;

        self.http
            .request(
                Method::POST,
                path,
                RequestConfig::new().json(JsonValue::Object(item.clone())),
            )
            .await
            .context("execute request")?;

        debug!(resource, "created item");
        Ok(())
    }

    /// Update the item with the given id
    pub async fn update(&self, resource: &str, id: &str, item: &JsonObject) -> Result<()> {
        let endpoint = self
            .registry
            .get(resource)?
            .update
            .as_ref()
            .ok_or_else(|| Error::unsupported_resource(resource))?;

        let path = endpoint.path.replace(OBJECT_ID_PLACEHOLDER, id);
        self.http
            .request(
                endpoint.method.into(),
                &path,
                RequestConfig::new().json(JsonValue::Object(item.clone())),
            )
            .await
            .context("execute request")?;

        debug!(resource, id, "updated item");
        Ok(())
    }

    /// Delete the item with the given id
    pub async fn delete(&self, resource: &str, id: &str) -> Result<()> {
        let path = self
            .registry
            .get(resource)?
            .delete_path
            .as_deref()
            .ok_or_else(|| Error::unsupported_resource(resource))?
            .replace(OBJECT_ID_PLACEHOLDER, id);

        self.http
            .request(Method::DELETE, &path, RequestConfig::new())
            .await
            .context("execute request")?;

        debug!(resource, id, "deleted item");
        Ok(())
    }
}

#[async_trait]
impl ResourceApi for HubSpotClient {
    async fn list(&self, resource: &str, options: &ListOptions) -> Result<ListResponse> {
        let path = self
            .registry
            .get(resource)?
            .list_path
            .as_deref()
            .ok_or_else(|| Error::unsupported_resource(resource))?;

        let mut request = RequestConfig::new();
        for (key, value) in options.to_query() {
            request = request.query(key, value);
        }

        self.http
            .get_json(path, request)
            .await
            .context("execute request")
    }

    async fn list_by_next_link(&self, link: &str) -> Result<ListResponse> {
        self.http
            .get_json(link, RequestConfig::new())
            .await
            .context("execute request")
    }

    async fn search(&self, resource: &str, request: &SearchRequest) -> Result<ListResponse> {
        let path = match self.registry.capability(resource)? {
            PaginationCapability::Search(fields) => fields.path.as_str(),
            PaginationCapability::Timestamp(_) => {
                return Err(Error::unsupported_resource(resource))
            }
        };

        let body = serde_json::to_value(request)?;
        self.http
            .request_json(Method::POST, path, RequestConfig::new().json(body))
            .await
            .context("do request")
    }
}
