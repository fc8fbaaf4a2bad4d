//! Error model for the payments API client.
//!
//! # Design
//! Every failure a caller can observe is one `ApiError` variant. Remote
//! rejections arrive as a JSON envelope (`{"error": {"type": ..., ...}}`)
//! and are classified into a closed `ErrorCategory`. The HTTP status alone
//! is not enough: the remote service answers a bad API key with 401 and an
//! `invalid_request_error` type, and several categories share 400.
//!
//! Transport failures (no well-formed response at all) are kept apart from
//! envelopes because the retry policy treats them differently.

use std::fmt;

use serde_json::Value;

use crate::codec::naming;

/// Closed set of remote failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or semantically invalid input from the client.
    InvalidRequest,
    /// Missing, invalid or revoked API key.
    Authentication,
    /// The card was declined or rejected by the issuer.
    CardDeclined,
    /// Too many requests hit the API too quickly.
    RateLimited,
    /// Transient fault on the remote side.
    ApiFailure,
    /// An idempotency key was reused with different parameters.
    IdempotencyConflict,
    Unknown,
}

impl ErrorCategory {
    /// Whether a retry of the same logical operation may succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorCategory::ApiFailure | ErrorCategory::RateLimited)
    }

    /// Combine the HTTP status with the wire `type` and `code` tags.
    pub fn classify(status: u16, kind: Option<&str>, code: Option<&str>) -> Self {
        if status == 401 {
            return ErrorCategory::Authentication;
        }
        if status == 429 || code == Some("rate_limit") || kind == Some("rate_limit_error") {
            return ErrorCategory::RateLimited;
        }
        match kind {
            Some("card_error") => ErrorCategory::CardDeclined,
            Some("idempotency_error") => ErrorCategory::IdempotencyConflict,
            Some("invalid_request_error") => ErrorCategory::InvalidRequest,
            Some("authentication_error") => ErrorCategory::Authentication,
            Some("api_error") | Some("api_connection_error") => ErrorCategory::ApiFailure,
            _ => match status {
                400 | 404 => ErrorCategory::InvalidRequest,
                402 => ErrorCategory::CardDeclined,
                409 => ErrorCategory::IdempotencyConflict,
                500..=599 => ErrorCategory::ApiFailure,
                _ => ErrorCategory::Unknown,
            },
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::InvalidRequest => "invalid request",
            ErrorCategory::Authentication => "authentication failure",
            ErrorCategory::CardDeclined => "card declined",
            ErrorCategory::RateLimited => "rate limited",
            ErrorCategory::ApiFailure => "api failure",
            ErrorCategory::IdempotencyConflict => "idempotency conflict",
            ErrorCategory::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

/// A well-formed error response from the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub category: ErrorCategory,
    pub message: Option<String>,
    /// Offending request parameter in wire form, e.g. `legal_entity[dob][day]`.
    pub param: Option<String>,
    /// Machine-readable code such as `card_declined` or `missing`.
    pub code: Option<String>,
    pub decline_code: Option<String>,
    pub status: u16,
    /// The complete payload as received.
    pub raw: Value,
}

impl ErrorEnvelope {
    /// The offending parameter as an in-memory field path
    /// (`legal_entity.dob.day`).
    pub fn field_path(&self) -> Option<String> {
        self.param
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(naming::field_path)
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {})", self.category, self.status)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = self.field_path() {
            write!(f, " [{path}]")?;
        }
        Ok(())
    }
}

/// Build an `ErrorEnvelope` from an error status and its body.
///
/// Bodies that are not JSON should be passed as `Value::String`; they are
/// classified on status alone and kept in `raw`.
pub fn parse_error(status: u16, wire: &Value) -> ErrorEnvelope {
    let error = wire.get("error");
    let field = |name: &str| {
        error
            .and_then(|e| e.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let kind = field("type");
    let code = field("code");

    ErrorEnvelope {
        category: ErrorCategory::classify(status, kind.as_deref(), code.as_deref()),
        message: field("message"),
        param: field("param"),
        code,
        decline_code: field("decline_code"),
        status,
        raw: wire.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not connect (refused, DNS failure, reset during connect).
    Connect,
    Timeout,
    /// A response arrived but its body was unreadable or not the expected JSON.
    MalformedBody,
    Io,
    /// The request itself could not be put on the wire (bad URI, header
    /// value that is not valid HTTP). Sending it again cannot help.
    Request,
}

impl TransportErrorKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, TransportErrorKind::Request)
    }
}

/// Failure to obtain a well-formed response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport failure ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Mapping failure between a semantic value and its wire form.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Shape mismatch, missing required field or unknown enum member.
    #[error("wire decode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A polymorphic payload matched none of the declared shapes.
    #[error("no {type_name} shape matches object tag {tag:?}")]
    UnknownVariant {
        type_name: &'static str,
        /// The discriminator found on the wire, `None` if absent.
        tag: Option<String>,
    },

    #[error("expected a JSON object for {0}")]
    NotAnObject(&'static str),

    /// The value cannot be expressed as form parameters.
    #[error("cannot form-encode: {0}")]
    Form(String),
}

/// Errors returned by the executor and the resilience controller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The remote service rejected the request.
    #[error("api error: {0}")]
    Api(ErrorEnvelope),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The success payload did not match the expected type.
    #[error("response decode failed: {0}")]
    Decode(#[source] CodecError),

    /// The request value could not be encoded.
    #[error("request encode failed: {0}")]
    Encode(#[source] CodecError),

    /// Transient failures persisted past the retry ceiling.
    #[error("gave up after {attempts} attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: Box<ApiError> },

    /// The operation was cancelled while waiting to retry.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        attempts: u32,
        /// The transient failure the operation was waiting to retry.
        last: Option<Box<ApiError>>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether the resilience controller may retry after this error.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => e.kind.is_transient(),
            ApiError::Api(envelope) => envelope.category.is_transient(),
            _ => false,
        }
    }

    /// The envelope, if the remote service answered with one.
    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            ApiError::Api(envelope) => Some(envelope),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.envelope().map(|e| e.category)
    }
}
