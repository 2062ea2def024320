// Dashboard data loading.
// Every API read goes through the cache manager. Repositories are loaded in
// small concurrent batches, and each repository or detail section fails independently.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::{CacheKey, CacheManager, Fetched, ResourceKind};
use crate::config::{Config, RepoRef};
use crate::error::{DashError, Result};
use crate::github::{
    Branch, Commit, CommunityProfile, Contributor, GitHubClient, Issue, Release, Repository, Tag,
};

pub const DETAIL_COMMITS_PER_PAGE: u32 = 10;
pub const RELEASES_SHOWN: u32 = 5;
pub const ISSUES_SHOWN: u32 = 5;
pub const CONTRIBUTORS_SHOWN: u32 = 10;

/// Summary shown for one repository on the overview.
#[derive(Debug, Clone)]
pub struct RepoSummary {
    pub repo: RepoRef,
    pub repository: Repository,
    pub recent_commits: Vec<Commit>,
    /// True when any part came from the cache rather than a live call.
    pub from_cache: bool,
}

impl RepoSummary {
    /// Configured description, then the repository's own.
    pub fn description(&self) -> Option<&str> {
        self.repo
            .description
            .as_deref()
            .or(self.repository.description.as_deref())
    }
}

/// Overview card: loaded data or a per-item error that can be retried.
#[derive(Debug)]
pub enum RepoCard {
    Loaded(RepoSummary),
    Failed { repo: RepoRef, error: DashError },
}

impl RepoCard {
    pub fn repo(&self) -> &RepoRef {
        match self {
            RepoCard::Loaded(summary) => &summary.repo,
            RepoCard::Failed { repo, .. } => repo,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, RepoCard::Loaded(_))
    }
}

/// Everything shown on a repository's detail view.
#[derive(Debug)]
pub struct RepoDetails {
    pub repository: Fetched<Repository>,
    /// Branch the commit list was read from.
    pub branch: String,
    pub readme: Option<String>,
    pub commits: Result<Fetched<Vec<Commit>>>,
    pub branches: Result<Fetched<Vec<Branch>>>,
    pub tags: Result<Fetched<Vec<Tag>>>,
    pub releases: Result<Fetched<Vec<Release>>>,
    pub issues: Result<Fetched<Vec<Issue>>>,
    pub contributors: Result<Fetched<Vec<Contributor>>>,
    pub community: Result<Fetched<CommunityProfile>>,
}

impl RepoDetails {
    /// Date of the newest commit on the shown branch.
    pub fn last_commit_at(&self) -> Option<DateTime<Utc>> {
        self.commits
            .as_ref()
            .ok()
            .and_then(|commits| commits.data.first())
            .map(|commit| commit.commit.author.date)
    }

    /// True when any section was served from cache rather than a live call.
    pub fn from_cache(&self) -> bool {
        fn cached<T>(section: &Result<Fetched<T>>) -> bool {
            matches!(section, Ok(fetched) if fetched.source.is_cached())
        }

        self.repository.source.is_cached()
            || cached(&self.commits)
            || cached(&self.branches)
            || cached(&self.tags)
            || cached(&self.releases)
            || cached(&self.issues)
            || cached(&self.contributors)
            || cached(&self.community)
    }
}

/// Reads dashboard data through the cache.
pub struct Dashboard {
    client: GitHubClient,
    cache: CacheManager,
    config: Config,
}

impl Dashboard {
    pub fn new(client: GitHubClient, cache: CacheManager, config: Config) -> Self {
        Self {
            client,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Load a card for every configured repository, a batch at a time.
    pub async fn load_cards(&self) -> Vec<RepoCard> {
        let batch_size = self.config.batch_size.max(1);
        let mut cards = Vec::with_capacity(self.config.repositories.len());

        for batch in self.config.repositories.chunks(batch_size) {
            cards.extend(join_all(batch.iter().map(|repo| self.load_card(repo))).await);
        }

        let failed = cards.iter().filter(|card| !card.is_loaded()).count();
        info!(total = cards.len(), failed, "loaded repository cards");
        cards
    }

    /// Load one repository's card. Failures become [`RepoCard::Failed`].
    pub async fn load_card(&self, repo: &RepoRef) -> RepoCard {
        match self.load_summary(repo).await {
            Ok(summary) => RepoCard::Loaded(summary),
            Err(error) => {
                warn!(repo = %repo.full_name(), error = %error, "failed to load repository");
                RepoCard::Failed {
                    repo: repo.clone(),
                    error,
                }
            }
        }
    }

    /// Reload the repository behind a card.
    pub async fn retry(&self, card: &RepoCard) -> RepoCard {
        self.load_card(card.repo()).await
    }

    async fn load_summary(&self, repo: &RepoRef) -> Result<RepoSummary> {
        let (repository, commits) = tokio::try_join!(
            self.repository(&repo.owner, &repo.name),
            self.commits_page(repo, &repo.branch, 1, self.config.recent_commits),
        )?;

        Ok(RepoSummary {
            repo: repo.clone(),
            from_cache: repository.source.is_cached() || commits.source.is_cached(),
            repository: repository.data,
            recent_commits: commits.data,
        })
    }

    /// Load the detail view. Repository metadata is required; every other
    /// section reports its own error. `branch` defaults to the repository's
    /// default branch.
    pub async fn load_details(&self, repo: &RepoRef, branch: Option<&str>) -> Result<RepoDetails> {
        let repository = self.repository(&repo.owner, &repo.name).await?;
        let branch = branch
            .map(str::to_string)
            .unwrap_or_else(|| repository.data.default_branch.clone());

        let readme = match self.readme(repo).await {
            Ok(readme) => Some(readme.data),
            Err(e) => {
                warn!(repo = %repo.full_name(), error = %e, "README unavailable");
                None
            }
        };

        let (commits, branches, tags, releases, issues, contributors, community) = tokio::join!(
            self.commits_page(repo, &branch, 1, DETAIL_COMMITS_PER_PAGE),
            self.branches(repo),
            self.tags(repo),
            self.releases(repo),
            self.issues(repo),
            self.contributors(repo),
            self.community(repo),
        );

        Ok(RepoDetails {
            repository,
            branch,
            readme,
            commits,
            branches,
            tags,
            releases,
            issues,
            contributors,
            community,
        })
    }

    /// Drop all cached data so the next load goes to the API.
    pub async fn refresh(&self) {
        self.cache.invalidate_all().await;
    }

    pub async fn repository(&self, owner: &str, name: &str) -> Result<Fetched<Repository>> {
        let client = &self.client;
        self.cache
            .fetch_json(&CacheKey::repository(owner, name), || {
                client.get_repo(owner, name)
            })
            .await
    }

    /// One page of commits on `branch`; each page is cached separately.
    pub async fn commits_page(
        &self,
        repo: &RepoRef,
        branch: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Fetched<Vec<Commit>>> {
        let client = &self.client;
        let key = CacheKey::commits(&repo.owner, &repo.name, branch, page, per_page);
        self.cache
            .fetch_json(&key, || {
                client.get_commits(&repo.owner, &repo.name, branch, page, per_page)
            })
            .await
    }

    pub async fn branches(&self, repo: &RepoRef) -> Result<Fetched<Vec<Branch>>> {
        let client = &self.client;
        self.cache
            .fetch_json(&key(ResourceKind::Branches, repo), || {
                client.get_branches(&repo.owner, &repo.name)
            })
            .await
    }

    pub async fn tags(&self, repo: &RepoRef) -> Result<Fetched<Vec<Tag>>> {
        let client = &self.client;
        self.cache
            .fetch_json(&key(ResourceKind::Tags, repo), || {
                client.get_tags(&repo.owner, &repo.name)
            })
            .await
    }

    pub async fn releases(&self, repo: &RepoRef) -> Result<Fetched<Vec<Release>>> {
        let client = &self.client;
        let key = key(ResourceKind::Releases, repo).with_per_page(RELEASES_SHOWN);
        self.cache
            .fetch_json(&key, || {
                client.get_releases(&repo.owner, &repo.name, RELEASES_SHOWN)
            })
            .await
    }

    pub async fn issues(&self, repo: &RepoRef) -> Result<Fetched<Vec<Issue>>> {
        let client = &self.client;
        let key = key(ResourceKind::Issues, repo).with_per_page(ISSUES_SHOWN);
        self.cache
            .fetch_json(&key, || {
                client.get_issues(&repo.owner, &repo.name, ISSUES_SHOWN)
            })
            .await
    }

    pub async fn readme(&self, repo: &RepoRef) -> Result<Fetched<String>> {
        let client = &self.client;
        self.cache
            .fetch_text(&key(ResourceKind::Readme, repo), || {
                client.get_readme_html(&repo.owner, &repo.name)
            })
            .await
    }

    pub async fn contributors(&self, repo: &RepoRef) -> Result<Fetched<Vec<Contributor>>> {
        let client = &self.client;
        let key = key(ResourceKind::Contributors, repo).with_per_page(CONTRIBUTORS_SHOWN);
        self.cache
            .fetch_json(&key, || {
                client.get_contributors(&repo.owner, &repo.name, CONTRIBUTORS_SHOWN)
            })
            .await
    }

    pub async fn community(&self, repo: &RepoRef) -> Result<Fetched<CommunityProfile>> {
        let client = &self.client;
        self.cache
            .fetch_json(&key(ResourceKind::CommunityProfile, repo), || {
                client.get_community_profile(&repo.owner, &repo.name)
            })
            .await
    }
}

fn key(kind: ResourceKind, repo: &RepoRef) -> CacheKey {
    CacheKey::new(kind, &repo.owner, &repo.name)
}
