//! Bilibili API - request client
//!
//! Issues signed GET requests with the synthetic identity headers and
//! classifies every outcome into a `Classified` value.

mod identity;
pub mod model;
mod wbi;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
pub use identity::Identity;
pub use model::*;
use parking_lot::RwLock;
use reqwest::{Client, header};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::ResolveError;

static BASE_URL: &str = "https://api.bilibili.com";

const NAV_PATH: &str = "/x/web-interface/nav";

/// How long nav image keys stay valid before refetching
const WBI_KEY_TTL: Duration = Duration::from_secs(60 * 60);

/// In-body code returned when the WBI signature is rejected
const CODE_SIGNATURE_REJECTED: i64 = -403;

/// Outcome of one remote request
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// JSON body with in-body code 0
    Ok(Value),
    /// HTTP 412, or an in-body throttling code
    RateLimited,
    /// Not JSON-shaped (e.g. an HTML challenge page served with 200)
    MalformedBody(String),
    /// Transport failure or non-2xx HTTP status
    NetworkError(String),
    /// JSON body whose in-body code is non-zero
    ApiError { code: i64, message: String },
}

impl Classified {
    /// Classify a complete HTTP response
    pub fn classify(status: u16, content_type: Option<&str>, body: &str) -> Self {
        match Self::parse_response(status, content_type, body) {
            Ok(value) => Self::from_value(value),
            Err(classified) => classified,
        }
    }

    /// Check transport-level framing and parse the JSON body
    ///
    /// The in-body code is not inspected here.
    fn parse_response(status: u16, content_type: Option<&str>, body: &str) -> Result<Value, Self> {
        if status == 412 {
            return Err(Classified::RateLimited);
        }
        if !(200..300).contains(&status) {
            return Err(Classified::NetworkError(format!("HTTP {}", status)));
        }

        let content_type = content_type.unwrap_or_default();
        if !content_type.to_ascii_lowercase().contains("json") {
            return Err(Classified::MalformedBody(format!(
                "unexpected content type {:?}",
                content_type
            )));
        }

        serde_json::from_str::<Value>(body)
            .map_err(|e| Classified::MalformedBody(format!("invalid JSON: {}", e)))
    }

    /// Classify a parsed body by its in-body status code
    pub fn from_value(value: Value) -> Self {
        let Some(code) = value.get("code").and_then(|c| c.as_i64()) else {
            return Classified::MalformedBody("missing in-body status code".to_string());
        };

        match code {
            0 => Classified::Ok(value),
            -412 | -352 => Classified::RateLimited,
            _ => Classified::ApiError {
                code,
                message: value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default()
                    .to_string(),
            },
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Classified::RateLimited)
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, Classified::NetworkError(_))
    }

    /// The JSON body on success, the failure class otherwise
    pub fn into_result(self) -> Result<Value, ResolveError> {
        match self {
            Classified::Ok(value) => Ok(value),
            other => Err(ResolveError::from(other)),
        }
    }
}

/// Remote endpoints the resolver calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    VideoInfo,
    PlayUrl,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Search => "/x/web-interface/wbi/search/type",
            Endpoint::VideoInfo => "/x/web-interface/view",
            Endpoint::PlayUrl => "/x/player/wbi/playurl",
        }
    }

    /// Whether the endpoint requires a WBI signature
    pub fn signed(&self) -> bool {
        !matches!(self, Endpoint::VideoInfo)
    }
}

/// Performs one GET against the remote API and classifies the outcome
pub trait ApiClient: Send + Sync + 'static {
    fn get(
        &self,
        endpoint: Endpoint,
        query: Vec<(String, String)>,
    ) -> impl Future<Output = Classified> + Send;
}

/// HTTP client for the Bilibili web API
#[derive(Clone)]
pub struct BiliApi {
    client: Client,
    identity: Arc<Identity>,
    /// Mixin key and when it was fetched
    wbi_key: Arc<RwLock<Option<(String, Instant)>>>,
}

impl std::fmt::Debug for BiliApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiliApi")
            .field("client", &"<HttpClient>")
            .field("session_token", &self.identity.session_token())
            .finish()
    }
}

impl BiliApi {
    pub fn new(identity: Arc<Identity>) -> Result<Self> {
        Self::with_proxy(identity, None)
    }

    /// Create a client routed through `proxy_url` when given
    pub fn with_proxy(identity: Arc<Identity>, proxy_url: Option<String>) -> Result<Self> {
        let mut builder = Client::builder().gzip(true);
        if let Some(url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(&url)?);
        }
        Ok(Self {
            client: builder.build()?,
            identity,
            wbi_key: Arc::new(RwLock::new(None)),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn send(&self, url: &str) -> Result<Value, Classified> {
        let response = self
            .client
            .get(url)
            .headers(self.identity.build_headers())
            .send()
            .await
            .map_err(|e| Classified::NetworkError(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| Classified::NetworkError(format!("Failed to read response: {}", e)))?;

        Classified::parse_response(status, content_type.as_deref(), &body)
    }

    fn cached_mixin_key(&self) -> Option<String> {
        match self.wbi_key.read().as_ref() {
            Some((key, fetched)) if fetched.elapsed() < WBI_KEY_TTL => Some(key.clone()),
            _ => None,
        }
    }

    async fn mixin_key(&self) -> Result<String, Classified> {
        if let Some(key) = self.cached_mixin_key() {
            return Ok(key);
        }

        // Nav answers -101 to anonymous clients but still carries the keys
        let value = self.send(&format!("{}{}", BASE_URL, NAV_PATH)).await?;
        let (img_key, sub_key) = to_wbi_keys(&value)
            .map_err(|e| Classified::MalformedBody(format!("nav keys: {:#}", e)))?;
        let key = wbi::mixin_key(&img_key, &sub_key);
        debug!("Refreshed WBI mixin key");
        *self.wbi_key.write() = Some((key.clone(), Instant::now()));
        Ok(key)
    }
}

impl ApiClient for BiliApi {
    async fn get(&self, endpoint: Endpoint, mut query: Vec<(String, String)>) -> Classified {
        if endpoint.signed() {
            let key = match self.mixin_key().await {
                Ok(key) => key,
                Err(classified) => return classified,
            };
            wbi::sign(&mut query, &key, chrono::Utc::now().timestamp());
        }

        let url = format!(
            "{}{}?{}",
            BASE_URL,
            endpoint.path(),
            wbi::encode_query(&query)
        );
        debug!("GET {}", url);

        let classified = match self.send(&url).await {
            Ok(value) => Classified::from_value(value),
            Err(classified) => classified,
        };

        if endpoint.signed()
            && matches!(
                classified,
                Classified::ApiError {
                    code: CODE_SIGNATURE_REJECTED,
                    ..
                }
            )
        {
            warn!("WBI signature rejected, dropping cached key");
            self.wbi_key.write().take();
        }

        classified
    }
}
