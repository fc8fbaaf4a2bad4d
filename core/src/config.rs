//! Client configuration.
//!
//! # Design
//! Configuration is an explicit value built once and shared as
//! `Arc<ClientConfig>` by every executor and controller. Nothing in the
//! crate reads process-wide state after construction; `from_env` is a
//! convenience for binaries and is never called implicitly.

use std::time::Duration;

use crate::error::ApiError;
use crate::resilience::RetryPolicy;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_UPLOAD_BASE: &str = "https://files.stripe.com";

/// Immutable settings for talking to the payments API.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_base: String,
    /// Base URL for file uploads.
    pub upload_base: String,
    /// Sent as the API version header when set.
    pub api_version: Option<String>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    /// Deadline for each upload request.
    pub upload_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            api_version: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(80),
            upload_timeout: Duration::from_secs(120),
        }
    }

    /// Read `PAYMENTS_API_KEY` (required), `PAYMENTS_API_BASE`,
    /// `PAYMENTS_UPLOAD_BASE`, `PAYMENTS_API_VERSION` and
    /// `PAYMENTS_MAX_RETRIES`.
    pub fn from_env() -> Result<Self, ApiError> {
        let api_key = std::env::var("PAYMENTS_API_KEY")
            .map_err(|_| ApiError::Config("PAYMENTS_API_KEY is not set".to_string()))?;
        let mut config = Self::new(api_key);
        if let Ok(base) = std::env::var("PAYMENTS_API_BASE") {
            config = config.with_api_base(&base);
        }
        if let Ok(base) = std::env::var("PAYMENTS_UPLOAD_BASE") {
            config = config.with_upload_base(&base);
        }
        if let Ok(version) = std::env::var("PAYMENTS_API_VERSION") {
            config = config.with_api_version(version);
        }
        if let Ok(raw) = std::env::var("PAYMENTS_MAX_RETRIES") {
            let max = raw
                .parse()
                .map_err(|_| ApiError::Config(format!("PAYMENTS_MAX_RETRIES is not a number: {raw:?}")))?;
            config = config.with_max_retries(max);
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_upload_base(mut self, base: &str) -> Self {
        self.upload_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .field("upload_base", &self.upload_base)
            .field("api_version", &self.api_version)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("upload_timeout", &self.upload_timeout)
            .finish()
    }
}

/// Keep the key prefix (`sk_test_`, `sk_live_`) and the last four characters.
fn redact(key: &str) -> String {
    // Byte offsets below always come from char boundaries.
    let prefix_len = key.match_indices('_').nth(1).map_or(0, |(i, _)| i + 1);
    let chars = key.chars().count();
    if chars <= key[..prefix_len].chars().count() + 4 {
        return "*".repeat(chars);
    }
    let tail_start = key.char_indices().rev().nth(3).map_or(0, |(i, _)| i);
    format!("{}****{}", &key[..prefix_len], &key[tail_start..])
}
