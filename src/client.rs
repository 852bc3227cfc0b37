//! Store API client
//!
//! The four primitives map one-to-one onto the store endpoints and hand back
//! the raw [`ApiResponse`]. They only fail on transport problems; deciding
//! whether a status code is acceptable is left to the caller.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::error::{ProtocolError, Result, StoreTestError};
use crate::model::{ErrorResponse, Inventory, Order};
use crate::retry::{retry_with_cancellation, CancellationToken, RetryPolicy};

pub const INVENTORY_PATH: &str = "/store/inventory";
pub const ORDER_PATH: &str = "/store/order";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Full HTTP result, uninterpreted
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status_code: u16,
    pub status_line: String,
    /// Header names are stored lower-cased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub duration: Duration,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status_code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("");
        Self {
            status_code,
            status_line: format!("HTTP/1.1 {} {}", status_code, reason).trim_end().to_string(),
            headers: HashMap::new(),
            body: body.into(),
            duration: Duration::ZERO,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    /// Status in 200..=299
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn has_body(&self) -> bool {
        !self.body_text().trim().is_empty()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Outbound defaults applied to every request
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub base_url: String,
    pub headers: HeaderMap,
    pub log_requests: bool,
    pub timeout: Duration,
}

impl RequestSpec {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            headers,
            log_requests: settings.log_requests,
            timeout: settings.request_timeout,
        }
    }

    /// Add or replace a default header
    pub fn with_header(mut self, name: &str, value: &str) -> std::result::Result<Self, ProtocolError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProtocolError::ClientBuild(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ProtocolError::ClientBuild(format!("invalid header value '{}': {}", value, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// Inbound defaults applied to every response
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub log_responses: bool,
}

impl ResponseSpec {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { log_responses: settings.log_responses }
    }
}

/// The store endpoints, plus typed conveniences built on them
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// GET /store/inventory
    async fn get_inventory(&self) -> std::result::Result<ApiResponse, ProtocolError>;

    /// POST /store/order
    async fn place_order(&self, order: &Order) -> std::result::Result<ApiResponse, ProtocolError>;

    /// GET /store/order/{orderId}
    async fn get_order_by_id(&self, order_id: i64) -> std::result::Result<ApiResponse, ProtocolError>;

    /// DELETE /store/order/{orderId}
    async fn delete_order(&self, order_id: i64) -> std::result::Result<ApiResponse, ProtocolError>;

    /// Retry parameters used by the retrying conveniences
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Inventory as a status-to-count map. Any failure, including a body that
    /// does not deserialize, is retried.
    async fn get_inventory_as_map(&self) -> Result<Inventory> {
        self.get_inventory_as_map_with_cancellation(&CancellationToken::new()).await
    }

    /// [`get_inventory_as_map`](Self::get_inventory_as_map), abandoning the
    /// wait between attempts once `token` is cancelled
    async fn get_inventory_as_map_with_cancellation(&self, token: &CancellationToken) -> Result<Inventory> {
        let policy = self.retry_policy();
        retry_with_cancellation(
            || async {
                let response = self.get_inventory().await?;
                response.json::<Inventory>()
            },
            policy.max_attempts,
            policy.delay,
            token,
        )
        .await
    }

    /// Place an order and return the created order. Anything but a 200 is
    /// treated as a failure and retried.
    async fn place_order_as_object(&self, order: &Order) -> Result<Order> {
        self.place_order_as_object_with_cancellation(order, &CancellationToken::new()).await
    }

    async fn place_order_as_object_with_cancellation(&self, order: &Order, token: &CancellationToken) -> Result<Order> {
        let policy = self.retry_policy();
        retry_with_cancellation(
            || async {
                let response = self.place_order(order).await?;
                if response.is_ok() {
                    response.json::<Order>()
                } else {
                    Err(StoreTestError::UnexpectedStatus {
                        status_line: format!("Failed to place order: {}", response.status_line),
                    })
                }
            },
            policy.max_attempts,
            policy.delay,
            token,
        )
        .await
    }

    /// The order when the lookup answers 200, `None` otherwise
    async fn get_order_by_id_as_object(&self, order_id: i64) -> Result<Option<Order>> {
        let response = self.get_order_by_id(order_id).await?;
        if response.is_ok() {
            Ok(Some(response.json()?))
        } else {
            Ok(None)
        }
    }

    /// The error body when the lookup does not answer 200, `None` otherwise
    async fn get_order_by_id_as_error(&self, order_id: i64) -> Result<Option<ErrorResponse>> {
        let response = self.get_order_by_id(order_id).await?;
        if response.is_ok() {
            Ok(None)
        } else {
            Ok(Some(response.json()?))
        }
    }
}

/// `reqwest`-backed store client. Its request and response specs are built
/// once at construction and never change.
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: Client,
    request_spec: RequestSpec,
    response_spec: ResponseSpec,
    retry_policy: RetryPolicy,
}

impl StoreClient {
    pub fn new(settings: &Settings) -> std::result::Result<Self, ProtocolError> {
        Self::with_specs(
            settings,
            RequestSpec::from_settings(settings),
            ResponseSpec::from_settings(settings),
        )
    }

    pub fn with_specs(
        settings: &Settings,
        request_spec: RequestSpec,
        response_spec: ResponseSpec,
    ) -> std::result::Result<Self, ProtocolError> {
        let client = ClientBuilder::new()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connection_timeout)
            .user_agent(format!("{}/{}", crate::NAME, crate::VERSION))
            .default_headers(request_spec.headers.clone())
            .build()
            .map_err(|e| ProtocolError::ClientBuild(format!("Failed to build HTTP client: {}", e)))?;

        log::debug!(
            "Store client initialized for {} (timeout {:?}, connect timeout {:?})",
            request_spec.base_url,
            settings.request_timeout,
            settings.connection_timeout
        );

        Ok(Self {
            client,
            request_spec,
            response_spec,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Override the policy used by the retrying conveniences
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn request_spec(&self) -> &RequestSpec {
        &self.request_spec
    }

    pub fn response_spec(&self) -> &ResponseSpec {
        &self.response_spec
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.request_spec.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> std::result::Result<ApiResponse, ProtocolError> {
        let url = self.url(path);
        let mut builder = self.client.request(method.clone(), &url);

        if self.request_spec.log_requests {
            log::info!(
                "Request {} {}\nHeaders: {:?}\nBody: {}",
                method,
                url,
                self.request_spec.headers,
                body.as_deref().map(String::from_utf8_lossy).unwrap_or_default()
            );
        }

        if let Some(body) = body {
            builder = builder.body(body);
        }

        let start_time = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProtocolError::Timeout { timeout: self.request_spec.timeout }
            } else if e.is_connect() {
                ProtocolError::ConnectionFailed(e.to_string())
            } else if e.is_builder() {
                ProtocolError::InvalidUrl(format!("{}: {}", url, e))
            } else {
                ProtocolError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        let status_line = format!("{:?} {}", response.version(), status);
        let headers = extract_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::NetworkError(format!("Failed to read response body: {}", e)))?
            .to_vec();
        let duration = start_time.elapsed();

        let api_response = ApiResponse {
            status_code: status.as_u16(),
            status_line,
            headers,
            body,
            duration,
        };

        if self.response_spec.log_responses {
            log::info!(
                "Response {} ({:?})\nHeaders: {:?}\nBody: {}",
                api_response.status_line,
                duration,
                api_response.headers,
                api_response.body_text()
            );
        }

        Ok(api_response)
    }
}

fn encode_body<T: Serialize>(body: &T) -> std::result::Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(body)?)
}

fn extract_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut extracted = HashMap::new();
    for (name, value) in headers {
        if let Ok(value_str) = value.to_str() {
            extracted.insert(name.as_str().to_string(), value_str.to_string());
        }
    }
    extracted
}

#[async_trait]
impl StoreApi for StoreClient {
    async fn get_inventory(&self) -> std::result::Result<ApiResponse, ProtocolError> {
        self.send(Method::GET, INVENTORY_PATH, None).await
    }

    async fn place_order(&self, order: &Order) -> std::result::Result<ApiResponse, ProtocolError> {
        let body = encode_body(order)?;
        self.send(Method::POST, ORDER_PATH, Some(body)).await
    }

    async fn get_order_by_id(&self, order_id: i64) -> std::result::Result<ApiResponse, ProtocolError> {
        self.send(Method::GET, &format!("{}/{}", ORDER_PATH, order_id), None).await
    }

    async fn delete_order(&self, order_id: i64) -> std::result::Result<ApiResponse, ProtocolError> {
        self.send(Method::DELETE, &format!("{}/{}", ORDER_PATH, order_id), None).await
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_spec_carries_json_defaults() {
        let settings = Settings::built_in("dev").with_base_url("http://localhost:8080/v2/");
        let spec = RequestSpec::from_settings(&settings);

        assert_eq!(spec.base_url, "http://localhost:8080/v2");
        assert_eq!(spec.headers.get(CONTENT_TYPE).unwrap(), JSON_CONTENT_TYPE);
        assert_eq!(spec.headers.get(ACCEPT).unwrap(), JSON_CONTENT_TYPE);
        assert!(spec.log_requests);
    }

    #[test]
    fn request_spec_accepts_extra_headers() {
        let settings = Settings::built_in("dev");
        let spec = RequestSpec::from_settings(&settings)
            .with_header("X-Trace", "suite")
            .unwrap();
        assert_eq!(spec.headers.get("x-trace").unwrap(), "suite");

        assert!(RequestSpec::from_settings(&settings).with_header("bad header", "x").is_err());
    }

    #[test]
    fn response_helpers_classify_status() {
        let response = ApiResponse::new(204, Vec::new()).with_header("Content-Type", JSON_CONTENT_TYPE);
        assert!(response.is_success());
        assert!(!response.is_ok());
        assert!(!response.has_body());
        assert_eq!(response.header("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(response.status_line, "HTTP/1.1 204 No Content");

        let not_found = ApiResponse::new(404, r#"{"code":1}"#);
        assert!(not_found.is_client_error());
        assert!(not_found.has_body());
    }

    #[test]
    fn unserializable_body_is_a_serialization_error() {
        let mut body = HashMap::new();
        body.insert((1, 2), "non-string keys cannot be JSON object keys");

        match encode_body(&body) {
            Err(ProtocolError::Serialization(e)) => assert!(e.to_string().contains("key must be a string")),
            other => panic!("expected a serialization error, got {:?}", other),
        }
        assert_eq!(encode_body(&Order::default()).unwrap().first(), Some(&b'{'));
    }
}
