//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. The executor builds an
//! `HttpRequest` and hands it to a `Transport`, which performs exactly one
//! network round-trip and returns an `HttpResponse` or a `TransportError`.
//! Status interpretation stays in the executor: a transport never turns a
//! 4xx/5xx into an error.
//!
//! `UreqTransport` is the bundled implementation. Tests substitute scripted
//! transports to drive the retry state machine deterministically.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{TransportError, TransportErrorKind};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL including any query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Overall deadline for this round-trip; `None` leaves it to the transport.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Performs one physical HTTP round-trip.
///
/// Implementations must not retry and must return non-2xx responses as
/// `Ok(HttpResponse)`. Only failures to obtain a response at all
/// (connection refused, timeout, unreadable body) are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a blocking `ureq` agent.
///
/// Each call runs on tokio's blocking pool so the async caller is never
/// stalled by socket I/O.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || send_blocking(&agent, request))
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?
    }
}

fn send_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
        timeout,
    } = request;

    let result = match method {
        HttpMethod::Get => {
            let mut builder = agent.get(&url);
            for (k, v) in &headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            builder.config().timeout_global(timeout).build().call()
        }
        HttpMethod::Delete => {
            let mut builder = agent.delete(&url);
            for (k, v) in &headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            builder.config().timeout_global(timeout).build().call()
        }
        HttpMethod::Post => {
            let mut builder = agent.post(&url);
            for (k, v) in &headers {
                builder = builder.header(k.as_str(), v.as_str());
            }
            let builder = builder.config().timeout_global(timeout).build();
            match body {
                Some(body) => builder.send(body.as_bytes()),
                None => builder.send_empty(),
            }
        }
    };

    let mut response = result.map_err(transport_error)?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| TransportError::new(TransportErrorKind::MalformedBody, e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn transport_error(err: ureq::Error) -> TransportError {
    let kind = match &err {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => TransportErrorKind::Connect,
        ureq::Error::Http(_)
        | ureq::Error::BadUri(_)
        | ureq::Error::InvalidProxyUrl
        | ureq::Error::RequireHttpsOnly(_) => TransportErrorKind::Request,
        _ => TransportErrorKind::Io,
    };
    TransportError::new(kind, err.to_string())
}
