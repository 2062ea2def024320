// Cache entries and payloads.
// Handles the serialized form written to the durable store and TTL checks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{DashError, Result};

/// Default TTL: 30 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// A cached API response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    /// Decode a JSON payload into `T`.
    pub fn into_json<T: DeserializeOwned>(self, key: &str) -> Result<T> {
        match self {
            Payload::Json(value) => Ok(serde_json::from_value(value)?),
            Payload::Text(_) => Err(DashError::PayloadKind {
                key: key.to_string(),
                expected: "json",
            }),
        }
    }

    /// Take a text payload.
    pub fn into_text(self, key: &str) -> Result<String> {
        match self {
            Payload::Text(text) => Ok(text),
            Payload::Json(serde_json::Value::String(text)) => Ok(text),
            Payload::Json(_) => Err(DashError::PayloadKind {
                key: key.to_string(),
                expected: "text",
            }),
        }
    }
}

/// Wrapper for cached data with the time it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached data.
    pub data: T,
    /// When the data was last refreshed, as epoch milliseconds on disk.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub stored_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T, stored_at: DateTime<Utc>) -> Self {
        Self { data, stored_at }
    }

    /// Check if this entry has expired at `now`: `now - stored_at >= ttl`.
    ///
    /// A `stored_at` in the future gives a negative age, so it is fresh. A TTL
    /// too large for chrono never expires.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.stored_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => elapsed >= ttl,
            Err(_) => false,
        }
    }

    /// Check if this entry is still fresh at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        !self.is_expired(ttl, now)
    }
}

impl<T: Serialize> CachedData<T> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: DeserializeOwned> CachedData<T> {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
