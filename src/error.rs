// Error types for repodash.
// Covers GitHub API failures, durable store failures, and cache misses with no fallback.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The loader failed and the durable store had nothing for this key.
    #[error("No data available for {key}")]
    NoDataAvailable {
        key: String,
        #[source]
        source: Box<DashError>,
    },

    #[error("Unexpected payload for {key}: expected {expected}")]
    PayloadKind { key: String, expected: &'static str },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl DashError {
    /// Whether this is the terminal "nothing cached, nothing live" failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, DashError::NoDataAvailable { .. })
    }
}

/// Failures raised by a durable store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded: {requested} bytes requested, quota is {quota} bytes")]
    QuotaExceeded { requested: u64, quota: u64 },

    #[error("Storage full")]
    StorageFull,

    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl StoreError {
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            StoreError::QuotaExceeded { .. } | StoreError::StorageFull
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::StorageFull => StoreError::StorageFull,
            _ => StoreError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_no_data_carries_cause() {
        let err = DashError::NoDataAvailable {
            key: "repo/acme/widget".to_string(),
            source: Box::new(DashError::Unauthorized),
        };

        assert!(err.is_no_data());
        let cause = err.source().expect("source should be set");
        assert!(cause.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_storage_full_io_maps_to_quota() {
        let io = std::io::Error::from(std::io::ErrorKind::StorageFull);
        assert!(StoreError::from(io).is_quota());

        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(!StoreError::from(io).is_quota());
    }
}
