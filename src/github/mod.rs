// GitHub API module.
// Provides client and types for reading repository data from the GitHub REST API.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::GitHubClient;
pub use types::*;
