//! HTTP transport: one request in, one normalized outcome out.
//!
//! Non-2xx responses become `TransportError::Status` with the message taken
//! from the JSON `detail` field when there is one. Successful bodies are
//! decoded as JSON, falling back to raw text.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;

use super::error::TransportError;

/// Download progress callback, called with integer percentages 0..=100.
///
/// Purely a UI signal: it is never called when the response has no
/// content length, so it must not be used to detect completion.
pub type Progress<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

/// Request body.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
}

/// Per-request options. `Default` sends a bare request.
#[derive(Default)]
pub struct RequestOptions<'a> {
    pub query: Vec<(String, String)>,
    pub payload: Option<Payload>,
    /// Replace default headers with the same name.
    pub headers: HeaderMap,
    pub bearer: Option<String>,
    pub progress: Option<Progress<'a>>,
}

impl<'a> RequestOptions<'a> {
    pub fn json(body: Value) -> Self {
        Self {
            payload: Some(Payload::Json(body)),
            ..Default::default()
        }
    }

    pub fn form<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            payload: Some(Payload::Form(
                pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            )),
            ..Default::default()
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn with_progress(mut self, progress: Option<Progress<'a>>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// HTTP client wrapper holding the base URL and default headers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    default_headers: HeaderMap,
}

impl HttpTransport {
    /// Create a transport with no timeouts; requests inherit reqwest's defaults.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeouts(base_url, None, None)
    }

    pub fn with_timeouts(
        base_url: &str,
        timeout: Option<Duration>,
        connect_timeout: Option<Duration>,
    ) -> Self {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        if let Some(t) = connect_timeout {
            builder = builder.connect_timeout(t);
        }
        let client = builder.build().unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers: HeaderMap::new(),
        }
    }

    /// Headers sent with every request unless overridden per request.
    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn get(&self, endpoint: &str, opts: RequestOptions<'_>) -> Result<Body, TransportError> {
        self.request(Method::GET, endpoint, opts).await
    }

    pub async fn post(&self, endpoint: &str, opts: RequestOptions<'_>) -> Result<Body, TransportError> {
        self.request(Method::POST, endpoint, opts).await
    }

    pub async fn put(&self, endpoint: &str, opts: RequestOptions<'_>) -> Result<Body, TransportError> {
        self.request(Method::PUT, endpoint, opts).await
    }

    pub async fn delete(&self, endpoint: &str, opts: RequestOptions<'_>) -> Result<Body, TransportError> {
        self.request(Method::DELETE, endpoint, opts).await
    }

    /// Send one request and normalize its outcome. Never retries.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        opts: RequestOptions<'_>,
    ) -> Result<Body, TransportError> {
        let url = self.url(endpoint);
        log::debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, &url)
            .headers(self.default_headers.clone())
            .headers(opts.headers);

        if !opts.query.is_empty() {
            builder = builder.query(&opts.query);
        }
        if let Some(ref token) = opts.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match opts.payload {
            Some(Payload::Json(ref body)) => builder.json(body),
            Some(Payload::Form(ref pairs)) => builder.form(pairs),
            None => builder,
        };

        let mut resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|e| {
                log::debug!("Failed to read error body for {}: {}", status, e);
                String::new()
            });
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let total = resp.content_length().filter(|&t| t > 0);
        let report = |pct: u8| {
            if let (Some(_), Some(cb)) = (total, opts.progress) {
                cb(pct);
            }
        };

        report(0);
        let mut data = Vec::with_capacity(total.unwrap_or(0).min(1 << 20) as usize);
        while let Some(chunk) = resp.chunk().await? {
            data.extend_from_slice(&chunk);
            if let Some(total) = total {
                report(percentage(data.len() as u64, total));
            }
            tokio::task::yield_now().await;
        }
        report(100);

        Ok(decode_body(&data))
    }
}

/// Extract the error message from a failed response body.
fn error_message(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(detail) => detail.to_string(),
            None => text.to_string(),
        },
        _ => text.to_string(),
    }
}

fn decode_body(data: &[u8]) -> Body {
    match serde_json::from_slice(data) {
        Ok(v) => Body::Json(v),
        Err(_) => Body::Text(String::from_utf8_lossy(data).into_owned()),
    }
}

fn percentage(downloaded: u64, total: u64) -> u8 {
    (downloaded.saturating_mul(100) / total).min(100) as u8
}
