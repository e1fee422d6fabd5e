//! HTTP implementation of the backend traits.
//!
//! Every endpoint answers with a `{ success, data, message }` envelope;
//! list endpoints nest the items under a named key next to the
//! pagination fields.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::drivers::{Driver, DriverQuery};
use crate::error::{Error, Result, SourceError};
use crate::orders::{Order, OrderDraft, OrderFilter};
use crate::permission::RawPermission;
use crate::slice::Page;
use crate::source::{DriverBackend, OrderBackend, PermissionSource, ProfileSource, StoreBackend};
use crate::stores::{Store, StoreDraft};
use crate::types::{OrderId, StoreId, UserProfile};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/";
/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_URL: &str = "CONSOLE_API_URL";
const ENV_TOKEN: &str = "CONSOLE_API_TOKEN";
const ENV_TIMEOUT: &str = "CONSOLE_API_TIMEOUT_SECS";

/// Connection settings for [`ApiClient`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// API root; a trailing slash is added when missing.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// Starts a builder from the defaults.
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reads `CONSOLE_API_URL`, `CONSOLE_API_TOKEN` and
    /// `CONSOLE_API_TIMEOUT_SECS`; unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(url) = lookup(ENV_URL) {
            builder = builder.base_url(url);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|token| !token.trim().is_empty()) {
            builder = builder.token(token);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("{ENV_TIMEOUT} must be a number, got {raw:?}")))?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build())
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn base(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)
            .map_err(|err| Error::Config(format!("invalid base url {raw:?}: {err}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!("{raw:?} cannot be a base url")));
        }
        Ok(url)
    }
}

/// Builder for [`ApiConfig`].
#[derive(Clone, Debug)]
pub struct ApiConfigBuilder {
    config: ApiConfig,
}

impl ApiConfigBuilder {
    /// Sets the API root.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Sets the bearer token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Sets the per-request timeout, truncated to whole seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs();
        self
    }

    /// Returns the finished config.
    pub fn build(self) -> ApiConfig {
        self.config
    }
}

/// Failures talking to the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    /// The envelope reported `success: false`.
    #[error("{0}")]
    Rejected(String),
    /// A required payload field was absent.
    #[error("response is missing `{0}`")]
    Missing(&'static str),
    /// The body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: Option<bool>,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Bare(Vec<T>),
    Wrapped(Value),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    page: u32,
    limit: u32,
    total: u64,
    total_pages: u32,
}

/// Unwraps the `data` field of an envelope.
fn decode_data<T: DeserializeOwned>(body: &str) -> std::result::Result<T, ApiError> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if envelope.success == Some(false) {
        return Err(ApiError::Rejected(
            envelope.message.unwrap_or_else(|| "request rejected".to_string()),
        ));
    }
    envelope.data.ok_or(ApiError::Missing("data"))
}

/// Decodes a list that is either the bare `data` array or nested under `key`.
fn decode_list<T: DeserializeOwned>(
    body: &str,
    key: &'static str,
) -> std::result::Result<Vec<T>, ApiError> {
    match decode_data::<ListPayload<T>>(body)? {
        ListPayload::Bare(items) => Ok(items),
        ListPayload::Wrapped(mut value) => {
            let items = value.get_mut(key).map(Value::take).ok_or(ApiError::Missing(key))?;
            Ok(serde_json::from_value(items)?)
        }
    }
}

/// Decodes the permission list entry by entry, so one malformed entry
/// never rejects the whole set.
fn decode_permissions(body: &str) -> std::result::Result<Vec<RawPermission>, ApiError> {
    let values: Vec<Value> = decode_list(body, "permissions")?;
    Ok(RawPermission::decode_each(values))
}

/// Decodes `{ data: { <key>: [...], page, limit, total, totalPages } }`.
fn decode_page<T: DeserializeOwned>(
    body: &str,
    key: &'static str,
) -> std::result::Result<Page<T>, ApiError> {
    let mut data: Value = decode_data(body)?;
    let items = data.get_mut(key).map(Value::take).ok_or(ApiError::Missing(key))?;
    let items: Vec<T> = serde_json::from_value(items)?;
    let meta: PageMeta = serde_json::from_value(data)?;
    Ok(Page {
        items,
        page: meta.page,
        limit: meta.limit,
        total: meta.total,
        total_pages: meta.total_pages,
    })
}

/// Pulls a readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Client for the console HTTP API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Creates a client from `config`.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base = config.base()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| Error::Config(format!("failed to create http client: {err}")))?;
        Ok(Self {
            http,
            base,
            token: config.token.clone(),
        })
    }

    /// Creates a client from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(&ApiConfig::from_env()?)
    }

    /// Resolves `path` against the base url and appends `query`.
    pub fn endpoint(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Url, SourceError> {
        let mut url = self.base.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends `request`, returning the status and the body text.
    async fn send(&self, request: RequestBuilder) -> std::result::Result<(StatusCode, String), SourceError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(status = status.as_u16(), "api response");
        Ok((status, body))
    }

    /// Sends `request` and fails on a non-success status.
    async fn send_ok(&self, request: RequestBuilder) -> std::result::Result<String, SourceError> {
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            }
            .into());
        }
        Ok(body)
    }

    async fn get_data<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, SourceError> {
        let body = self.send_ok(self.http.get(url)).await?;
        Ok(decode_data(&body)?)
    }
}

#[async_trait]
impl PermissionSource for ApiClient {
    async fn my_permissions(
        &self,
        store: Option<StoreId>,
    ) -> std::result::Result<Vec<RawPermission>, SourceError> {
        let query: Vec<(&str, String)> = store
            .map(|store| vec![("storeId", store.to_string())])
            .unwrap_or_default();
        let url = self.endpoint("permissions/me", &query)?;
        let body = self.send_ok(self.http.get(url)).await?;
        Ok(decode_permissions(&body)?)
    }

    async fn clear_all_cache(&self) -> std::result::Result<(), SourceError> {
        // Nothing is memoized client-side.
        Ok(())
    }
}

#[async_trait]
impl ProfileSource for ApiClient {
    async fn me(&self) -> std::result::Result<UserProfile, SourceError> {
        let url = self.endpoint("users/me", &[])?;
        self.get_data(url).await
    }
}

#[async_trait]
impl OrderBackend for ApiClient {
    async fn list_orders(
        &self,
        filter: OrderFilter,
    ) -> std::result::Result<Page<Order>, SourceError> {
        let url = self.endpoint("orders", &filter.query_pairs())?;
        let body = self.send_ok(self.http.get(url)).await?;
        Ok(decode_page(&body, "orders")?)
    }

    async fn get_order(&self, id: OrderId) -> std::result::Result<Option<Order>, SourceError> {
        let url = self.endpoint(&format!("orders/{id}"), &[])?;
        let (status, body) = self.send(self.http.get(url)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            }
            .into());
        }
        Ok(Some(decode_data(&body)?))
    }

    async fn create_order(&self, draft: OrderDraft) -> std::result::Result<Order, SourceError> {
        let url = self.endpoint("orders", &[])?;
        let body = self.send_ok(self.http.post(url).json(&draft)).await?;
        Ok(decode_data(&body)?)
    }

    async fn update_order(
        &self,
        id: OrderId,
        draft: OrderDraft,
    ) -> std::result::Result<Order, SourceError> {
        let url = self.endpoint(&format!("orders/{id}"), &[])?;
        let body = self.send_ok(self.http.put(url).json(&draft)).await?;
        Ok(decode_data(&body)?)
    }

    async fn delete_order(&self, id: OrderId) -> std::result::Result<(), SourceError> {
        let url = self.endpoint(&format!("orders/{id}"), &[])?;
        self.send_ok(self.http.delete(url)).await?;
        Ok(())
    }

    async fn validate_order(&self, id: OrderId) -> std::result::Result<Order, SourceError> {
        let url = self.endpoint(&format!("orders/{id}/validate"), &[])?;
        let body = self.send_ok(self.http.post(url)).await?;
        Ok(decode_data(&body)?)
    }
}

#[async_trait]
impl StoreBackend for ApiClient {
    async fn list_stores(&self) -> std::result::Result<Vec<Store>, SourceError> {
        let url = self.endpoint("stores", &[])?;
        let body = self.send_ok(self.http.get(url)).await?;
        Ok(decode_list(&body, "stores")?)
    }

    async fn get_store(&self, id: StoreId) -> std::result::Result<Option<Store>, SourceError> {
        let url = self.endpoint(&format!("stores/{id}"), &[])?;
        let (status, body) = self.send(self.http.get(url)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            }
            .into());
        }
        Ok(Some(decode_data(&body)?))
    }

    async fn create_store(&self, draft: StoreDraft) -> std::result::Result<Store, SourceError> {
        let url = self.endpoint("stores", &[])?;
        let body = self.send_ok(self.http.post(url).json(&draft)).await?;
        Ok(decode_data(&body)?)
    }

    async fn update_store(
        &self,
        id: StoreId,
        draft: StoreDraft,
    ) -> std::result::Result<Store, SourceError> {
        let url = self.endpoint(&format!("stores/{id}"), &[])?;
        let body = self.send_ok(self.http.put(url).json(&draft)).await?;
        Ok(decode_data(&body)?)
    }

    async fn delete_store(&self, id: StoreId) -> std::result::Result<(), SourceError> {
        let url = self.endpoint(&format!("stores/{id}"), &[])?;
        self.send_ok(self.http.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl DriverBackend for ApiClient {
    async fn list_drivers(
        &self,
        query: DriverQuery,
    ) -> std::result::Result<Page<Driver>, SourceError> {
        let url = self.endpoint("driver/drivers", &query.query_pairs())?;
        let body = self.send_ok(self.http.get(url)).await?;
        Ok(decode_page(&body, "drivers")?)
    }
}
