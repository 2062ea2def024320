//! repodash library
//!
//! GitHub repository dashboard data layer: a TTL cache with durable stale
//! fallback, the GitHub REST client it fronts, and batched dashboard loading.

pub mod cache;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod github;
pub mod logging;
pub mod report;

pub use error::{DashError, Result, StoreError};
