//! Typed client core for a payment-processing REST API.
//!
//! # Overview
//! Strongly typed values are encoded to form parameters or JSON, sent
//! through a pluggable `Transport`, and responses are decoded back into
//! typed values or classified into one `ApiError`.
//!
//! # Design
//! - `codec` maps semantic values to and from the wire: optional-field
//!   absence, empty-as-absent collections, epoch-second timestamps, closed
//!   vocabularies, polymorphic objects and bracket-keyed form parameters.
//! - `error` classifies remote failures from status plus wire type tag.
//! - `executor` performs exactly one physical call per invocation.
//! - `resilience` owns retries and the idempotency key of each logical
//!   operation; it is what consumers call.
//! - `config` is an explicit immutable value shared by `Arc`.
//! - `client` and `types` are a representative slice of the resource
//!   catalog built on the pieces above.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod idempotency;
pub mod resilience;
pub mod types;

pub use client::PaymentsClient;
pub use codec::{decode_from_wire, encode_form, encode_to_wire, Expandable, FormEncode, FormParams, List, ListStyle};
pub use config::ClientConfig;
pub use error::{parse_error, ApiError, CodecError, ErrorCategory, ErrorEnvelope, TransportError, TransportErrorKind};
pub use executor::{path_segment, ApiBase, ApiRequest, Executor, RequestBody};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use idempotency::{IdempotencyKey, KeySource, UuidKeySource};
pub use resilience::{Controller, Operation, RetryPolicy, RetryState};
pub use tokio_util::sync::CancellationToken;
