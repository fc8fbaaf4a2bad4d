//! Single-attempt request execution.
//!
//! # Design
//! `Executor` turns an `ApiRequest` into one `HttpRequest`, sends it through
//! the transport exactly once and classifies the outcome:
//!
//! - 2xx with a JSON body: the success wire tree;
//! - 2xx with anything else: `TransportError` (`MalformedBody`);
//! - non-2xx: `ApiError::Api` with the parsed envelope;
//! - no response: `ApiError::Transport`.
//!
//! It knows nothing about retries; the resilience controller wraps it.

use std::sync::Arc;

use serde_json::Value;
use url::form_urlencoded;

use crate::codec::FormParams;
use crate::config::ClientConfig;
use crate::error::{parse_error, ApiError, TransportError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::idempotency::IdempotencyKey;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
pub const VERSION_HEADER: &str = "Stripe-Version";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Which configured endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiBase {
    Api,
    /// The file-upload endpoint, subject to the upload timeout.
    Files,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Form(FormParams),
    Json(Value),
}

/// Description of one logical API call, reused for every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path below the base URL, e.g. `/v1/charges`.
    pub path: String,
    pub query: FormParams,
    pub body: RequestBody,
    pub base: ApiBase,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path, RequestBody::Empty)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path, RequestBody::Empty)
    }

    pub fn post_form(path: impl Into<String>, params: FormParams) -> Self {
        Self::new(HttpMethod::Post, path, RequestBody::Form(params))
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path, RequestBody::Json(body))
    }

    fn new(method: HttpMethod, path: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            path: path.into(),
            query: FormParams::new(),
            body,
            base: ApiBase::Api,
        }
    }

    pub fn with_query(mut self, query: FormParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_base(mut self, base: ApiBase) -> Self {
        self.base = base;
        self
    }

    /// Whether repeated attempts need an idempotency key to stay safe.
    pub fn is_idempotency_sensitive(&self) -> bool {
        self.method == HttpMethod::Post
    }
}

/// Percent-encode a caller-supplied id so it stays one path segment.
///
/// `/`, `?`, `#` and spaces are escaped, and `.` or `..` on their own are
/// spelled `%2E` so they cannot be read as dot segments.
pub fn path_segment(raw: &str) -> String {
    if raw == "." || raw == ".." {
        return raw.replace('.', "%2E");
    }
    // form_urlencoded spells a space `+`; a literal `+` is already `%2B`.
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Issues exactly one physical call per `execute`.
pub struct Executor<T> {
    config: Arc<ClientConfig>,
    transport: T,
}

impl<T: Transport> Executor<T> {
    pub fn new(config: Arc<ClientConfig>, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn execute(
        &self,
        request: &ApiRequest,
        idempotency_key: Option<&IdempotencyKey>,
    ) -> Result<Value, ApiError> {
        let http = self.build(request, idempotency_key);
        let response = self.transport.send(http).await?;
        classify_response(response)
    }

    /// The `HttpRequest` for one attempt of `request`.
    pub fn build(&self, request: &ApiRequest, idempotency_key: Option<&IdempotencyKey>) -> HttpRequest {
        let (base, timeout) = match request.base {
            ApiBase::Api => (&self.config.api_base, self.config.request_timeout),
            ApiBase::Files => (&self.config.upload_base, self.config.upload_timeout),
        };

        let mut url = format!("{base}{}", request.path);
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&request.query.to_urlencoded());
        }

        let mut headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.config.api_key),
        )];
        if let Some(version) = &self.config.api_version {
            headers.push((VERSION_HEADER.to_string(), version.clone()));
        }
        if let Some(key) = idempotency_key {
            headers.push((IDEMPOTENCY_HEADER.to_string(), key.to_string()));
        }

        let body = match &request.body {
            RequestBody::Empty => None,
            RequestBody::Form(params) => {
                headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
                Some(params.to_urlencoded())
            }
            RequestBody::Json(value) => {
                headers.push(("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()));
                Some(value.to_string())
            }
        };

        HttpRequest {
            method: request.method,
            url,
            headers,
            body,
            timeout: Some(timeout),
        }
    }
}

/// Map a raw response to the success tree or a classified failure.
pub fn classify_response(response: HttpResponse) -> Result<Value, ApiError> {
    if response.is_success() {
        return serde_json::from_str(&response.body).map_err(|e| {
            ApiError::Transport(TransportError::new(
                TransportErrorKind::MalformedBody,
                format!("HTTP {} body is not JSON: {e}", response.status),
            ))
        });
    }

    let wire = serde_json::from_str(&response.body).unwrap_or(Value::String(response.body));
    Err(ApiError::Api(parse_error(response.status, &wire)))
}
