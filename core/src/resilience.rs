//! Retry and idempotency control around the executor.
//!
//! # Design
//! `run_with_retry` drives one logical operation through the states
//! `Start -> Attempting -> {Succeeded | Retrying | FailedTerminal}`:
//!
//! - On start, one idempotency key is fixed for the whole operation (POST
//!   requests only) and the attempt counter is zero.
//! - Transport failures and transient envelopes (`ApiFailure`,
//!   `RateLimited`) move to `Retrying`: wait the backoff interval, then
//!   attempt again with the same key.
//! - Every other failure, including a success body that fails to decode,
//!   is terminal and surfaces unchanged without consuming a retry.
//! - When the retry budget is spent the last error is wrapped in
//!   `ApiError::MaxRetriesExceeded`.
//!
//! Attempts within one operation are strictly sequential. The backoff wait
//! is the only suspension point besides the attempt itself and can be cut
//! short with a `CancellationToken`.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::codec::decode_from_wire;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::executor::{ApiRequest, Executor};
use crate::http::Transport;
use crate::idempotency::{IdempotencyKey, KeySource, UuidKeySource};

/// Backoff and retry budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt; `K` permits `K + 1` attempts.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        let delay = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped
        };
        Duration::try_from_secs_f64(delay).unwrap_or(self.max_delay)
    }
}

/// A logical operation: the request plus the type its success body decodes to.
#[derive(Debug, Clone)]
pub struct Operation<R> {
    request: ApiRequest,
    idempotency_key: Option<IdempotencyKey>,
    output: PhantomData<fn() -> R>,
}

impl<R: DeserializeOwned> Operation<R> {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            idempotency_key: None,
            output: PhantomData,
        }
    }

    /// Use `key` instead of drawing a fresh one.
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    fn decode(&self, wire: Value) -> Result<R, ApiError> {
        decode_from_wire(wire).map_err(ApiError::Decode)
    }
}

/// Per-operation bookkeeping, owned by a single `run_with_retry` call.
#[derive(Debug)]
pub struct RetryState {
    /// Physical attempts made so far.
    pub attempts: u32,
    pub idempotency_key: Option<IdempotencyKey>,
    pub last_error: Option<ApiError>,
}

impl RetryState {
    fn start<R: DeserializeOwned>(operation: &Operation<R>, keys: &dyn KeySource) -> Self {
        let idempotency_key = if operation.request.is_idempotency_sensitive() {
            Some(
                operation
                    .idempotency_key
                    .clone()
                    .unwrap_or_else(|| keys.new_key()),
            )
        } else {
            None
        };
        Self {
            attempts: 0,
            idempotency_key,
            last_error: None,
        }
    }

    fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// The entry point consumers call to run operations.
pub struct Controller<T, K = UuidKeySource> {
    executor: Executor<T>,
    keys: K,
    policy: RetryPolicy,
}

impl<T: Transport> Controller<T, UuidKeySource> {
    pub fn new(config: Arc<ClientConfig>, transport: T) -> Self {
        Self::with_key_source(config, transport, UuidKeySource)
    }
}

impl<T: Transport, K: KeySource> Controller<T, K> {
    pub fn with_key_source(config: Arc<ClientConfig>, transport: T, keys: K) -> Self {
        let policy = config.retry.clone();
        Self {
            executor: Executor::new(config, transport),
            keys,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        self.executor.transport()
    }

    /// One attempt; the first error is returned as is.
    pub async fn run_once<R: DeserializeOwned>(&self, operation: &Operation<R>) -> Result<R, ApiError> {
        let state = RetryState::start(operation, &self.keys);
        let wire = self
            .executor
            .execute(&operation.request, state.idempotency_key.as_ref())
            .await?;
        operation.decode(wire)
    }

    pub async fn run_with_retry<R: DeserializeOwned>(&self, operation: &Operation<R>) -> Result<R, ApiError> {
        self.run_with_retry_until(operation, &CancellationToken::new()).await
    }

    /// `run_with_retry`, abandoning the operation if `cancel` fires while
    /// waiting between attempts.
    pub async fn run_with_retry_until<R: DeserializeOwned>(
        &self,
        operation: &Operation<R>,
        cancel: &CancellationToken,
    ) -> Result<R, ApiError> {
        let request = &operation.request;
        let mut state = RetryState::start(operation, &self.keys);

        loop {
            state.attempts += 1;
            tracing::debug!(
                method = request.method.as_str(),
                path = %request.path,
                attempt = state.attempts,
                "sending request"
            );

            let error = match self
                .executor
                .execute(request, state.idempotency_key.as_ref())
                .await
            {
                Ok(wire) => {
                    if state.attempts > 1 {
                        tracing::info!(
                            path = %request.path,
                            attempts = state.attempts,
                            "request succeeded after retry"
                        );
                    }
                    return operation.decode(wire);
                }
                Err(error) => error,
            };

            if !error.is_transient() {
                tracing::debug!(path = %request.path, error = %error, "terminal failure");
                return Err(error);
            }

            if state.retries() >= self.policy.max_retries {
                tracing::warn!(
                    path = %request.path,
                    attempts = state.attempts,
                    error = %error,
                    "retry budget exhausted"
                );
                return Err(ApiError::MaxRetriesExceeded {
                    attempts: state.attempts,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay_for_retry(state.attempts);
            tracing::warn!(
                path = %request.path,
                attempt = state.attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "transient failure, retrying"
            );
            state.last_error = Some(error);

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(path = %request.path, attempts = state.attempts, "retry cancelled");
                    return Err(ApiError::Cancelled {
                        attempts: state.attempts,
                        last: state.last_error.take().map(Box::new),
                    });
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
