// GitHub API response types.
// Only the fields the dashboard shows; everything else in a response is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GitHub user or organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    pub avatar_url: Option<String>,
}

/// Repository license summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub key: Option<String>,
    pub name: String,
}

/// GitHub repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    pub html_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    /// Only present on single-repository responses.
    #[serde(default)]
    pub subscribers_count: Option<u64>,
    pub language: Option<String>,
    pub license: Option<License>,
    pub default_branch: String,
    /// Size in kilobytes.
    #[serde(default)]
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl Repository {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

/// Author or committer signature inside a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub date: DateTime<Utc>,
}

/// Git-level commit data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: Signature,
}

/// Entry in a repository's commit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub html_url: String,
    pub commit: CommitDetail,
    /// Linked GitHub account; absent when the author email is unknown.
    pub author: Option<Owner>,
}

impl Commit {
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.commit.message.lines().next().unwrap_or_default()
    }
}

/// Commit reference inside branch and tag listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// Repository branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitRef,
    #[serde(default)]
    pub protected: bool,
}

/// Repository tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitRef,
}

/// Published release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub html_url: String,
    pub body: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    /// Release name, falling back to the tag.
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.tag_name)
    }
}

/// Issue or pull request (the issues endpoint returns both).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub user: Owner,
    pub body: Option<String>,
    #[serde(default)]
    pub comments: u64,
    pub created_at: DateTime<Utc>,
    /// Present only for pull requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Contributor with commit count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub avatar_url: Option<String>,
    pub contributions: u64,
}

/// File reference in the community profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityFile {
    pub html_url: Option<String>,
}

/// Community health files present in a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityFiles {
    pub code_of_conduct: Option<CommunityFile>,
    pub contributing: Option<CommunityFile>,
    pub issue_template: Option<CommunityFile>,
    pub pull_request_template: Option<CommunityFile>,
    pub license: Option<CommunityFile>,
    pub readme: Option<CommunityFile>,
}

/// Community profile metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityProfile {
    pub health_percentage: u8,
    pub description: Option<String>,
    #[serde(default)]
    pub files: CommunityFiles,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}
