//! Idempotency keys for logical operations.
//!
//! One key is drawn per logical operation and sent on every physical attempt
//! of it, so the remote service applies the operation at most once.

use std::fmt;

use uuid::Uuid;

/// Opaque token identifying one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies fresh keys.
pub trait KeySource: Send + Sync {
    fn new_key(&self) -> IdempotencyKey;
}

/// Random UUID v4 keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidKeySource;

impl KeySource for UuidKeySource {
    fn new_key(&self) -> IdempotencyKey {
        IdempotencyKey(Uuid::new_v4().to_string())
    }
}
