//! repodash - GitHub repository dashboard
//!
//! Prints summary cards for the configured repositories, or the detail view of
//! one repository. API responses are cached on disk and served stale when the
//! API is unreachable.

use std::sync::Arc;

use clap::Parser;

use repodash::cache::{CacheManager, DurableStore, FileStore, MemoryStore};
use repodash::cli::{Cli, parse_repo_arg};
use repodash::config::{Config, default_config_path};
use repodash::dashboard::{DETAIL_COMMITS_PER_PAGE, Dashboard};
use repodash::github::GitHubClient;
use repodash::{logging, report};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config_path = cli.config.clone().or_else(default_config_path);
    let mut config = Config::load_or_default(config_path.as_deref());
    if let Some(minutes) = cli.ttl_minutes {
        config.cache_ttl_minutes = minutes;
    }

    let store: Arc<dyn DurableStore> = match FileStore::in_cache_dir() {
        Some(store) => Arc::new(store),
        None => {
            tracing::warn!("no cache directory available, cache will not persist");
            Arc::new(MemoryStore::new())
        }
    };
    let cache = CacheManager::open(store, config.cache_config()).await;
    let client = GitHubClient::from_env()?;
    let dashboard = Dashboard::new(client, cache, config);

    if cli.refresh {
        dashboard.refresh().await;
    }

    if let Some(details) = &cli.details {
        let repo = parse_repo_arg(details)?;

        if cli.page > 1 {
            let branch = match &cli.branch {
                Some(branch) => branch.clone(),
                None => {
                    dashboard
                        .repository(&repo.owner, &repo.name)
                        .await?
                        .data
                        .default_branch
                }
            };
            let commits = dashboard
                .commits_page(&repo, &branch, cli.page, DETAIL_COMMITS_PER_PAGE)
                .await?;
            print!("{}", report::format_commits_page(&repo.full_name(), &branch, cli.page, &commits));
            return Ok(());
        }

        let details = dashboard.load_details(&repo, cli.branch.as_deref()).await?;
        print!("{}", report::format_details(&details));
        return Ok(());
    }

    let cards = match &cli.repo {
        Some(arg) => {
            let mut repo = parse_repo_arg(arg)?;
            if let Some(configured) = dashboard
                .config()
                .repositories
                .iter()
                .find(|r| r.owner == repo.owner && r.name == repo.name)
            {
                repo = configured.clone();
            }
            vec![dashboard.load_card(&repo).await]
        }
        None => dashboard.load_cards().await,
    };

    for card in &cards {
        println!("{}", report::format_card(card));
    }

    let rate_limit = dashboard.client().rate_limit();
    if rate_limit.limit > 0 {
        tracing::info!(
            remaining = rate_limit.remaining,
            limit = rate_limit.limit,
            "API rate limit"
        );
    }

    if !cards.is_empty() && cards.iter().all(|card| !card.is_loaded()) {
        return Err("no repository could be loaded".into());
    }

    Ok(())
}
