//! Command-line interface parsing for repodash.

use std::path::PathBuf;

use clap::Parser;

use crate::config::RepoRef;
use crate::error::{DashError, Result};

/// repodash - GitHub repository dashboard with an offline-tolerant cache
#[derive(Parser, Debug)]
#[command(name = "repodash")]
#[command(about = "Show stars, commits, releases and issues for a list of GitHub repositories")]
#[command(version)]
pub struct Cli {
    /// Config file listing the repositories to show
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Clear all cached data before loading
    #[arg(long)]
    pub refresh: bool,

    /// Load the card for a single repository (retry after a failure)
    #[arg(long, value_name = "OWNER/NAME", conflicts_with = "details")]
    pub repo: Option<String>,

    /// Show the detail view for one repository
    #[arg(long, value_name = "OWNER/NAME")]
    pub details: Option<String>,

    /// Branch for the detail view's commit list (defaults to the repository's default branch)
    #[arg(long, requires = "details")]
    pub branch: Option<String>,

    /// Commit page to show in the detail view; pages after the first print only commits
    #[arg(
        long,
        default_value_t = 1,
        requires = "details",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub page: u32,

    /// Override the cache TTL from the config file
    #[arg(long, value_name = "MINUTES")]
    pub ttl_minutes: Option<u64>,

    /// Log cache decisions to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse an `owner/name` argument.
pub fn parse_repo_arg(arg: &str) -> Result<RepoRef> {
    RepoRef::parse(arg).ok_or_else(|| {
        DashError::Other(format!("Invalid repository '{}': expected OWNER/NAME", arg))
    })
}
