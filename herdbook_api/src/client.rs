//! HTTP client for the Herdbook admin API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::{
    auth::{MemoryTokenStore, TokenStore},
    config::ClientConfig,
    query::ListQuery,
    types::{Envelope, Page, PageInfo},
    ApiError,
};

/// Per-call options. The default attaches credentials and uses the
/// client-level timeout.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Skip the `Authorization` header (login and health endpoints).
    pub skip_auth: bool,
    /// Override the client-level timeout for this call.
    pub timeout: Option<Duration>,
}

/// HTTP client for the Herdbook admin API.
///
/// Attaches the bearer credential from the injected [`TokenStore`], enforces
/// the configured timeout, and unwraps the server's `{success, data, meta}`
/// envelope before returning payloads to callers. Every failure path raises
/// an [`ApiError`]; nothing is swallowed locally.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Creates a client from explicit configuration and a token store.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                tracing::error!("failed to build HTTP client: {e}");
                ApiError::Network {
                    url: config.base_url.clone(),
                    message: e.to_string(),
                }
            })?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    /// Client with an empty in-memory token store. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, ApiError> {
        Self::new(
            ClientConfig::new(base_url),
            Arc::new(MemoryTokenStore::new()),
        )
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// GET a single resource, unwrapping the envelope.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_with(path, &RequestOptions::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &RequestOptions,
    ) -> Result<T, ApiError> {
        let url = self.url_for(path, None)?;
        let body = self
            .send::<()>(Method::GET, url.clone(), None, opts)
            .await?;
        decode_required(&url, body)
    }

    /// GET a paginated list. The response must carry `meta`.
    pub async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &ListQuery,
    ) -> Result<Page<T>, ApiError> {
        let url = self.url_for(path, Some(query))?;
        let body = self
            .send::<()>(Method::GET, url.clone(), None, &RequestOptions::default())
            .await?;
        let Some(body) = body else {
            return Err(decode_error(&url, "expected a paginated body, got no content"));
        };
        let (data, meta) = unwrap_envelope(body);
        let meta: PageInfo =
            meta.ok_or_else(|| decode_error(&url, "paginated response is missing `meta`"))?;
        let data: Vec<T> =
            serde_json::from_value(data).map_err(|e| decode_error(&url, &e.to_string()))?;
        Ok(Page { data, meta })
    }

    /// POST a JSON body, returning the created resource.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.post_with(path, body, &RequestOptions::default()).await
    }

    pub async fn post_with<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        opts: &RequestOptions,
    ) -> Result<T, ApiError> {
        let url = self.url_for(path, None)?;
        let reply = self.send(Method::POST, url.clone(), Some(body), opts).await?;
        decode_required(&url, reply)
    }

    /// POST without a body (e.g. `/{id}/restore`). Tolerates a 204 reply.
    pub async fn post_empty<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ApiError> {
        let url = self.url_for(path, None)?;
        let reply = self
            .send::<()>(Method::POST, url.clone(), None, &RequestOptions::default())
            .await?;
        decode_optional(&url, reply)
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url_for(path, None)?;
        let reply = self
            .send(Method::PUT, url.clone(), Some(body), &RequestOptions::default())
            .await?;
        decode_required(&url, reply)
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url_for(path, None)?;
        let reply = self
            .send(Method::PATCH, url.clone(), Some(body), &RequestOptions::default())
            .await?;
        decode_required(&url, reply)
    }

    /// DELETE a resource. Tolerates a 204 reply.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let url = self.url_for(path, None)?;
        let reply = self
            .send::<()>(Method::DELETE, url.clone(), None, &RequestOptions::default())
            .await?;
        decode_optional(&url, reply)
    }

    /// Multipart file upload with optional extra form fields.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
        extra: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url_for(path, None)?;
        let mut form = Form::new().part(
            field.to_string(),
            Part::bytes(bytes).file_name(file_name.to_string()),
        );
        for (name, value) in extra {
            form = form.text(name.to_string(), value.clone());
        }
        let req = self
            .prepare(Method::POST, &url, &RequestOptions::default())
            .multipart(form);
        let reply = self.dispatch(&Method::POST, &url, req).await?;
        decode_required(&url, reply)
    }

    fn url_for(&self, path: &str, query: Option<&ListQuery>) -> Result<Url, ApiError> {
        let url = Url::parse(&format!("{}{}", self.config.base_url, path)).map_err(|e| {
            tracing::error!("invalid URL from path {path}: {e}");
            ApiError::InvalidUrl {
                message: e.to_string(),
            }
        })?;
        Ok(match query {
            Some(query) => query.add_to_url(&url),
            None => url,
        })
    }

    fn prepare(
        &self,
        method: Method,
        url: &Url,
        opts: &RequestOptions,
    ) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url.clone());
        if let Some(timeout) = opts.timeout {
            req = req.timeout(timeout);
        }
        if !opts.skip_auth {
            if let Some(token) = self.tokens.get() {
                req = req.bearer_auth(token);
            }
        }
        req
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        opts: &RequestOptions,
    ) -> Result<Option<Value>, ApiError> {
        let mut req = self.prepare(method.clone(), &url, opts);
        if let Some(body) = body {
            req = req.json(body);
        }
        self.dispatch(&method, &url, req).await
    }

    /// Executes a prepared request and applies the shared status, logging,
    /// and envelope-independent body handling.
    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        req: reqwest::RequestBuilder,
    ) -> Result<Option<Value>, ApiError> {
        tracing::debug!(%method, %url, "api request");

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => return Err(transport_failure(method, url, e)),
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return Err(transport_failure(method, url, e)),
        };

        if !status.is_success() {
            let body = parse_error_body(&text);
            // 404 is an expected absence, not an error worth alerting on.
            if status == StatusCode::NOT_FOUND {
                tracing::debug!(%method, %url, "resource not found");
            } else {
                tracing::error!(
                    %method,
                    %url,
                    status = status.as_u16(),
                    body = %truncate_body(&text),
                    "api request failed"
                );
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
                url: url.to_string(),
            });
        }

        if status == StatusCode::NO_CONTENT || text.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(%method, %url, body = %truncate_body(&text), "failed to parse response body: {e}");
            ApiError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Some(value))
    }
}

fn transport_failure(method: &Method, url: &Url, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        tracing::error!(%method, %url, "request timed out");
        ApiError::Timeout {
            url: url.to_string(),
        }
    } else {
        tracing::error!(%method, %url, "network failure: {err}");
        ApiError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Splits an envelope body into payload and pagination meta. A body that is
/// not shaped like `{success: true, data: ...}` is passed through unchanged
/// (escape hatch for non-conforming endpoints).
fn unwrap_envelope(value: Value) -> (Value, Option<PageInfo>) {
    let wrapped = value.get("success").and_then(Value::as_bool) == Some(true)
        && value.get("data").is_some();
    if !wrapped {
        return (value, None);
    }
    match serde_json::from_value::<Envelope<Value>>(value.clone()) {
        Ok(envelope) => (envelope.data, envelope.meta),
        // Malformed `meta` or `timestamp`: keep the payload, drop the rest.
        Err(_) => match value {
            Value::Object(mut map) => (map.remove("data").unwrap_or(Value::Null), None),
            other => (other, None),
        },
    }
}

/// A non-2xx body is kept as parsed JSON when possible so the classifier can
/// inspect `message`/`dependencies`; otherwise the raw text is carried as a
/// JSON string.
fn parse_error_body(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
    )
}

fn decode_required<T: DeserializeOwned>(url: &Url, body: Option<Value>) -> Result<T, ApiError> {
    let Some(body) = body else {
        return Err(decode_error(url, "expected a body, got no content"));
    };
    let (data, _meta) = unwrap_envelope(body);
    serde_json::from_value(data).map_err(|e| decode_error(url, &e.to_string()))
}

fn decode_optional<T: DeserializeOwned>(
    url: &Url,
    body: Option<Value>,
) -> Result<Option<T>, ApiError> {
    match body {
        None => Ok(None),
        Some(body) => {
            let (data, _meta) = unwrap_envelope(body);
            serde_json::from_value(data)
                .map(Some)
                .map_err(|e| decode_error(url, &e.to_string()))
        }
    }
}

fn decode_error(url: &Url, message: &str) -> ApiError {
    tracing::error!(%url, "failed to decode response: {message}");
    ApiError::Decode {
        url: url.to_string(),
        message: message.to_string(),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        return body.to_string();
    }
    // A fixed byte slice can split a multibyte character; back up to the
    // nearest boundary so a long non-ASCII body cannot panic the log path.
    let mut cut = MAX;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...[truncated]", &body[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_with_meta_is_split() {
        let body = json!({
            "success": true,
            "data": [{"id": "a1"}],
            "timestamp": "2026-01-01T00:00:00Z",
            "meta": {"total": 1, "page": 1, "limit": 20}
        });
        let (data, meta) = unwrap_envelope(body);
        assert_eq!(data, json!([{"id": "a1"}]));
        let meta = meta.unwrap();
        assert_eq!(meta.total, 1);
        assert_eq!(meta.limit, 20);
    }

    #[test]
    fn envelope_without_meta_yields_payload_only() {
        let body = json!({"success": true, "data": {"id": "a1", "version": 3}});
        let (data, meta) = unwrap_envelope(body);
        assert_eq!(data, json!({"id": "a1", "version": 3}));
        assert!(meta.is_none());
    }

    #[test]
    fn non_envelope_body_passes_through() {
        let body = json!({"id": "a1", "version": 3});
        let (data, meta) = unwrap_envelope(body.clone());
        assert_eq!(data, body);
        assert!(meta.is_none());
    }

    #[test]
    fn malformed_meta_keeps_the_payload() {
        let body = json!({
            "success": true,
            "data": {"id": "a1"},
            "meta": {"total": "not-a-number"}
        });
        let (data, meta) = unwrap_envelope(body);
        assert_eq!(data, json!({"id": "a1"}));
        assert!(meta.is_none());
    }

    #[test]
    fn success_false_is_not_unwrapped() {
        let body = json!({"success": false, "data": null, "message": "nope"});
        let (data, _) = unwrap_envelope(body.clone());
        assert_eq!(data, body);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let short = truncate_body("short");
        assert_eq!(short, "short");

        let ascii = "x".repeat(3000);
        let truncated = truncate_body(&ascii);
        assert!(truncated.starts_with(&"x".repeat(2000)));
        assert!(truncated.ends_with("...[truncated]"));

        // 1999 ASCII bytes put the two-byte char astride the cut point.
        let multibyte = format!("{}é{}", "a".repeat(1999), "b".repeat(100));
        let truncated = truncate_body(&multibyte);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(!truncated.contains('é'));
        assert_eq!(truncated.trim_end_matches("...[truncated]").len(), 1999);
    }

    #[test]
    fn error_body_falls_back_to_raw_text() {
        assert_eq!(parse_error_body(""), None);
        assert_eq!(
            parse_error_body("Bad Gateway"),
            Some(Value::String("Bad Gateway".to_string()))
        );
        assert_eq!(
            parse_error_body(r#"{"message":"nope"}"#),
            Some(json!({"message": "nope"}))
        );
    }
}
