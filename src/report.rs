// Plain-text output for cards and detail views.

use std::fmt::Write;

use crate::cache::Fetched;
use crate::dashboard::{RepoCard, RepoDetails};
use crate::error::Result;
use crate::github::{Commit, Issue};

const SUMMARY_WIDTH: usize = 60;
const TAGS_SHOWN: usize = 10;

/// Format an overview card.
pub fn format_card(card: &RepoCard) -> String {
    let mut out = String::new();
    match card {
        RepoCard::Loaded(summary) => {
            let repo = &summary.repository;
            let _ = writeln!(
                out,
                "{}{}",
                repo.full_name,
                if summary.from_cache { "  [cached]" } else { "" }
            );
            let _ = writeln!(
                out,
                "  ★ {}  forks {}  issues {}  {}",
                repo.stargazers_count,
                repo.forks_count,
                repo.open_issues_count,
                repo.language.as_deref().unwrap_or("-")
            );
            let _ = writeln!(
                out,
                "  {}",
                summary.description().unwrap_or("No description")
            );
            let _ = writeln!(out, "  updated {}", repo.updated_at.format("%Y-%m-%d %H:%M"));
            for commit in &summary.recent_commits {
                let _ = writeln!(
                    out,
                    "    {} {} ({}, {})",
                    commit.short_sha(),
                    truncate(commit.summary(), SUMMARY_WIDTH),
                    commit.commit.author.name,
                    commit.commit.author.date.format("%Y-%m-%d")
                );
            }
        }
        RepoCard::Failed { repo, error } => {
            let _ = writeln!(out, "{}  [error]", repo.full_name());
            let _ = writeln!(out, "  failed to load: {}", error);
            let _ = writeln!(out, "  retry with: repodash --repo {}", repo.full_name());
        }
    }
    out
}

/// Format a repository detail view.
pub fn format_details(details: &RepoDetails) -> String {
    let mut out = String::new();
    let repo = &details.repository.data;

    let _ = writeln!(
        out,
        "{}{}",
        repo.full_name,
        if details.from_cache() { "  [cached]" } else { "" }
    );
    let _ = writeln!(out, "{}", repo.html_url);
    let _ = writeln!(out, "{}", repo.description.as_deref().unwrap_or("No description"));
    let _ = writeln!(out);
    let _ = writeln!(out, "stars        {}", repo.stargazers_count);
    let _ = writeln!(out, "forks        {}", repo.forks_count);
    let _ = writeln!(out, "open issues  {}", repo.open_issues_count);
    let _ = writeln!(out, "language     {}", repo.language.as_deref().unwrap_or("unknown"));
    let _ = writeln!(
        out,
        "license      {}",
        repo.license.as_ref().map(|l| l.name.as_str()).unwrap_or("none")
    );
    let _ = writeln!(out, "branch       {}", repo.default_branch);
    let _ = writeln!(out, "size         {:.2} MB", repo.size_mb());
    if let Some(subscribers) = repo.subscribers_count {
        let _ = writeln!(out, "watchers     {}", subscribers);
    }
    let _ = writeln!(out, "created      {}", repo.created_at.format("%Y-%m-%d"));
    let _ = writeln!(
        out,
        "last commit  {}",
        details
            .last_commit_at()
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    section(&mut out, &format!("Commits ({})", details.branch), &details.commits, |out, commits| {
        if commits.is_empty() {
            let _ = writeln!(out, "  no commits");
        }
        for commit in commits {
            let _ = writeln!(
                out,
                "  {} {} ({})",
                commit.short_sha(),
                truncate(commit.summary(), SUMMARY_WIDTH),
                commit.commit.author.name
            );
        }
    });

    section(&mut out, "Branches", &details.branches, |out, branches| {
        for branch in branches {
            let _ = writeln!(out, "  {}{}", branch.name, if branch.protected { " (protected)" } else { "" });
        }
    });

    section(&mut out, "Tags", &details.tags, |out, tags| {
        if tags.is_empty() {
            let _ = writeln!(out, "  no tags");
        }
        for tag in tags.iter().take(TAGS_SHOWN) {
            let _ = writeln!(out, "  {}", tag.name);
        }
        if tags.len() > TAGS_SHOWN {
            let _ = writeln!(out, "  +{} more", tags.len() - TAGS_SHOWN);
        }
    });

    section(&mut out, "Releases", &details.releases, |out, releases| {
        if releases.is_empty() {
            let _ = writeln!(out, "  no releases");
        }
        for release in releases {
            let published = release
                .published_at
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let _ = writeln!(out, "  {} [{}] {}", release.title(), release.tag_name, published);
        }
    });

    section(&mut out, "Issues", &details.issues, |out, issues| write_issues(out, issues));

    section(&mut out, "Contributors", &details.contributors, |out, contributors| {
        for contributor in contributors {
            let _ = writeln!(out, "  {} ({})", contributor.login, contributor.contributions);
        }
    });

    section(&mut out, "Community", &details.community, |out, profile| {
        let _ = writeln!(out, "  health {}%", profile.health_percentage);
        let files = &profile.files;
        for (name, present) in [
            ("code of conduct", files.code_of_conduct.is_some()),
            ("contributing", files.contributing.is_some()),
            ("license", files.license.is_some()),
            ("readme", files.readme.is_some()),
        ] {
            let _ = writeln!(out, "  {} {}", if present { "✓" } else { "✗" }, name);
        }
    });

    let _ = writeln!(out, "\nREADME");
    match &details.readme {
        Some(readme) => {
            let _ = writeln!(out, "{}", readme.trim());
        }
        None => {
            let _ = writeln!(out, "  README unavailable");
        }
    }

    out
}

/// Format one page of a branch's commit list.
pub fn format_commits_page(
    repo: &str,
    branch: &str,
    page: u32,
    commits: &Fetched<Vec<Commit>>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} commits on {} (page {}){}",
        repo,
        branch,
        page,
        if commits.source.is_cached() { "  [cached]" } else { "" }
    );
    if commits.data.is_empty() {
        let _ = writeln!(out, "  no more commits");
    }
    for commit in &commits.data {
        let _ = writeln!(
            out,
            "  {} {} ({}, {})",
            commit.short_sha(),
            truncate(commit.summary(), SUMMARY_WIDTH),
            commit.commit.author.name,
            commit.commit.author.date.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

/// Open issues, with pull requests from the same listing counted separately.
fn write_issues(out: &mut String, issues: &[Issue]) {
    let (pulls, issues): (Vec<&Issue>, Vec<&Issue>) =
        issues.iter().partition(|issue| issue.is_pull_request());

    if issues.is_empty() {
        let _ = writeln!(out, "  no open issues");
    }
    for issue in issues {
        let _ = writeln!(
            out,
            "  #{} {} ({}, {} comments)",
            issue.number,
            truncate(&issue.title, SUMMARY_WIDTH),
            issue.user.login,
            issue.comments
        );
    }
    if !pulls.is_empty() {
        let _ = writeln!(out, "  +{} open pull requests", pulls.len());
    }
}

fn section<T>(
    out: &mut String,
    title: &str,
    data: &Result<Fetched<T>>,
    body: impl FnOnce(&mut String, &T),
) {
    let _ = writeln!(out, "\n{}", title);
    match data {
        Ok(fetched) => body(out, &fetched.data),
        Err(e) => {
            let _ = writeln!(out, "  failed to load: {}", e);
        }
    }
}

/// Truncate to `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoRef;
    use crate::error::DashError;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly ten", 11), "exactly ten");
        assert_eq!(truncate("a much longer message", 10), "a much ...");
    }

    fn issue(number: u64, title: &str, pull_request: bool) -> Issue {
        serde_json::from_value(serde_json::json!({
            "number": number,
            "title": title,
            "html_url": format!("https://github.com/acme/widget/issues/{}", number),
            "user": {"login": "dev", "avatar_url": null},
            "body": null,
            "comments": 2,
            "created_at": "2024-06-01T00:00:00Z",
            "pull_request": if pull_request { serde_json::json!({"url": "x"}) } else { serde_json::Value::Null }
        }))
        .unwrap()
    }

    #[test]
    fn test_issues_section_skips_pull_requests() {
        let mut out = String::new();
        write_issues(
            &mut out,
            &[issue(1, "Crash on start", false), issue(2, "Add cache", true)],
        );

        assert!(out.contains("#1 Crash on start (dev, 2 comments)"));
        assert!(!out.contains("Add cache"));
        assert!(out.contains("+1 open pull requests"));
    }

    #[test]
    fn test_only_pull_requests_means_no_issues() {
        let mut out = String::new();
        write_issues(&mut out, &[issue(2, "Add cache", true)]);

        assert!(out.contains("no open issues"));
    }

    #[test]
    fn test_failed_card_shows_error_and_retry() {
        let card = RepoCard::Failed {
            repo: RepoRef::new("acme", "widget"),
            error: DashError::NoDataAvailable {
                key: "repo/acme/widget".into(),
                source: Box::new(DashError::Unauthorized),
            },
        };

        let text = format_card(&card);
        assert!(text.contains("acme/widget  [error]"));
        assert!(text.contains("No data available for repo/acme/widget"));
        assert!(text.contains("--repo acme/widget"));
    }
}
