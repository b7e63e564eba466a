//! # HTTP Client
//!
//! Thin JSON client over `reqwest` that speaks the Laravel conventions:
//!
//! - `Authorization: Bearer <token>` and `Accept: application/json` on
//!   every request
//! - success bodies wrapped as `{"data": ...}`; bare bodies are accepted
//! - paginated listings carry `total` at the top level or in `meta.total`
//! - errors as `{"message": "...", "errors": {"field": ["..."]}}`

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{ClientError, ClientResult};

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// One page of a listing plus the total across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// JSON client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Builds a client from settings.
    pub fn new(settings: &ApiSettings) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(&settings.base_url)?,
            token: settings.token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    /// Replaces the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    /// Appends `path` to the base URL, percent-encoding each segment.
    pub fn url_for(&self, path: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    fn request(&self, method: Method, path: &[&str]) -> ClientResult<RequestBuilder> {
        let url = self.url_for(path)?;
        debug!(%method, %url, "API request");

        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(auth) = self.auth_header() {
            request = request.header(AUTHORIZATION, auth);
        }
        Ok(request)
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// GET returning the unwrapped `data` payload.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let body = self.get_raw(path, query).await?;
        decode(unwrap_envelope(body))
    }

    /// GET where 404 or a null payload means "none".
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &[&str]) -> ClientResult<Option<T>> {
        match self.get_raw(path, &[]).await {
            Ok(body) => match unwrap_envelope(body) {
                Value::Null => Ok(None),
                data => decode(data).map(Some),
            },
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET of a paginated listing.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
    ) -> ClientResult<Page<T>> {
        let body = self.get_raw(path, query).await?;
        page_from_body(body)
    }

    /// POST a JSON body, optionally with an `Idempotency-Key` header.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &[&str],
        body: &B,
        idempotency_key: Option<&str>,
    ) -> ClientResult<T> {
        let mut request = self.request(Method::POST, path)?.json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY, key);
        }

        let response = request.send().await?;
        let body = Self::handle_response(response).await?;
        decode(unwrap_envelope(body))
    }

    async fn get_raw(&self, path: &[&str], query: &[(&str, String)]) -> ClientResult<Value> {
        let response = self.request(Method::GET, path)?.query(query).send().await?;
        Self::handle_response(response).await
    }

    /// Maps the status to a [`ClientError`] or parses the JSON body.
    async fn handle_response(response: reqwest::Response) -> ClientResult<Value> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = error_from_body(status, &text);
            warn!(status = status.as_u16(), error = %err, "API request failed");
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("Malformed JSON: {}", e)))
    }
}

// =============================================================================
// Body Helpers
// =============================================================================

fn normalize_base(raw: &str) -> ClientResult<Url> {
    let mut url = Url::parse(raw.trim())?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Returns the `data` member of an envelope, or the body itself.
pub(crate) fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> ClientResult<T> {
    serde_json::from_value(data).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

/// Reads a listing body: `{data, total}`, `{data, meta: {total}}` or a bare
/// array. Without a total the page length is used.
pub(crate) fn page_from_body<T: DeserializeOwned>(body: Value) -> ClientResult<Page<T>> {
    let total = body
        .get("total")
        .or_else(|| body.get("meta").and_then(|m| m.get("total")))
        .and_then(Value::as_u64);

    let items: Vec<T> = match unwrap_envelope(body) {
        Value::Null => Vec::new(),
        data @ Value::Array(_) => decode(data)?,
        other => {
            return Err(ClientError::InvalidResponse(format!(
                "Expected a list, got {}",
                kind_of(&other)
            )))
        }
    };

    let total = total.unwrap_or(items.len() as u64);
    Ok(Page { items, total })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

/// Builds the error for a non-success response.
pub(crate) fn error_from_body(status: StatusCode, text: &str) -> ClientError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('<') {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientError::Validation {
                message,
                errors: body.errors,
            }
        }
        s if s.is_server_error() => ClientError::Server {
            status: s.as_u16(),
            message,
        },
        s => ClientError::Api {
            status: s.as_u16(),
            message,
        },
    }
}
