// GitHub API endpoint functions.
// Typed methods for the repository resources the dashboard shows.

use crate::error::Result;

use super::client::{GitHubClient, HTML_MEDIA_TYPE};
use super::types::{
    Branch, Commit, CommunityProfile, Contributor, Issue, Release, Repository, Tag,
};

impl GitHubClient {
    /// Get a specific repository.
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repository> {
        let response = self.get(&format!("/repos/{}/{}", owner, repo)).await?;
        let repository: Repository = response.json().await?;
        Ok(repository)
    }

    /// Get one page of commits on a branch.
    pub async fn get_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Commit>> {
        let params = [
            ("sha", branch.to_string()),
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/commits", owner, repo), &params)
            .await?;
        let commits: Vec<Commit> = response.json().await?;
        Ok(commits)
    }

    /// Get branches for a repository.
    pub async fn get_branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>> {
        let response = self
            .get(&format!("/repos/{}/{}/branches", owner, repo))
            .await?;
        let branches: Vec<Branch> = response.json().await?;
        Ok(branches)
    }

    /// Get tags for a repository.
    pub async fn get_tags(&self, owner: &str, repo: &str) -> Result<Vec<Tag>> {
        let response = self.get(&format!("/repos/{}/{}/tags", owner, repo)).await?;
        let tags: Vec<Tag> = response.json().await?;
        Ok(tags)
    }

    /// Get the most recent releases.
    pub async fn get_releases(&self, owner: &str, repo: &str, per_page: u32) -> Result<Vec<Release>> {
        let params = [("per_page", per_page.to_string())];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/releases", owner, repo), &params)
            .await?;
        let releases: Vec<Release> = response.json().await?;
        Ok(releases)
    }

    /// Get the most recent open issues (pull requests included).
    pub async fn get_issues(&self, owner: &str, repo: &str, per_page: u32) -> Result<Vec<Issue>> {
        let params = [("per_page", per_page.to_string())];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/issues", owner, repo), &params)
            .await?;
        let issues: Vec<Issue> = response.json().await?;
        Ok(issues)
    }

    /// Get the README rendered as HTML (returns raw text).
    pub async fn get_readme_html(&self, owner: &str, repo: &str) -> Result<String> {
        let response = self
            .get_as(&format!("/repos/{}/{}/readme", owner, repo), HTML_MEDIA_TYPE)
            .await?;
        let html = response.text().await?;
        Ok(html)
    }

    /// Get top contributors by commit count.
    pub async fn get_contributors(
        &self,
        owner: &str,
        repo: &str,
        per_page: u32,
    ) -> Result<Vec<Contributor>> {
        let params = [("per_page", per_page.to_string())];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/contributors", owner, repo), &params)
            .await?;
        let contributors: Vec<Contributor> = response.json().await?;
        Ok(contributors)
    }

    /// Get community health metrics.
    pub async fn get_community_profile(&self, owner: &str, repo: &str) -> Result<CommunityProfile> {
        let response = self
            .get(&format!("/repos/{}/{}/community/profile", owner, repo))
            .await?;
        let profile: CommunityProfile = response.json().await?;
        Ok(profile)
    }
}
