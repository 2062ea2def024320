// Structured cache keys.
// Every parameter that changes an API response is a field, so two requests that
// differ in branch or page never share an entry.

use std::fmt;

/// Kind of upstream resource a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Repository,
    Commits,
    Branches,
    Tags,
    Releases,
    Issues,
    Readme,
    Contributors,
    CommunityProfile,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Repository => "repo",
            ResourceKind::Commits => "commits",
            ResourceKind::Branches => "branches",
            ResourceKind::Tags => "tags",
            ResourceKind::Releases => "releases",
            ResourceKind::Issues => "issues",
            ResourceKind::Readme => "readme",
            ResourceKind::Contributors => "contributors",
            ResourceKind::CommunityProfile => "community",
        }
    }
}

/// Identifies one cached API response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ResourceKind,
    owner: String,
    name: String,
    branch: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

impl CacheKey {
    pub fn new(kind: ResourceKind, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            owner: owner.into(),
            name: name.into(),
            branch: None,
            page: None,
            per_page: None,
        }
    }

    /// Key for a repository's metadata.
    pub fn repository(owner: &str, name: &str) -> Self {
        Self::new(ResourceKind::Repository, owner, name)
    }

    /// Key for one page of a branch's commit list.
    pub fn commits(owner: &str, name: &str, branch: &str, page: u32, per_page: u32) -> Self {
        Self::new(ResourceKind::Commits, owner, name)
            .with_branch(branch)
            .with_page(page)
            .with_per_page(per_page)
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flat string form used by the memory table and the durable store.
    ///
    /// Components are escaped so a `/` inside a branch name cannot be confused
    /// with a separator.
    pub fn storage_key(&self) -> String {
        let mut key = format!(
            "{}/{}/{}",
            self.kind.as_str(),
            escape_component(&self.owner),
            escape_component(&self.name)
        );
        if let Some(branch) = &self.branch {
            key.push_str("/branch=");
            key.push_str(&escape_component(branch));
        }
        if let Some(page) = self.page {
            key.push_str(&format!("/page={}", page));
        }
        if let Some(per_page) = self.per_page {
            key.push_str(&format!("/per_page={}", per_page));
        }
        key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Escape separator and escape characters in a key component.
fn escape_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}
