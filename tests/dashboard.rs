//! Integration tests for dashboard loading against a local HTTP responder.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::DateTime;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use repodash::DashError;
use repodash::cache::{
    CacheConfig, CacheKey, CacheManager, CachedData, DurableStore, MemoryStore, Payload,
    ResourceKind,
};
use repodash::config::{Config, RepoRef};
use repodash::dashboard::{Dashboard, RepoCard};
use repodash::github::GitHubClient;

type Handler = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

/// Serve `handler(path)` for every request; returns the base URL and a request counter.
async fn spawn_server(handler: Handler) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let request = String::from_utf8_lossy(&buf);
                let target = request.split_whitespace().nth(1).unwrap_or("/");
                let path = target.split('?').next().unwrap_or(target);
                let (status, body) = handler(path);

                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), requests)
}

fn repo_json(owner: &str, name: &str) -> Value {
    json!({
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "owner": {"login": owner, "avatar_url": null},
        "html_url": format!("https://github.com/{}/{}", owner, name),
        "description": "A widget",
        "stargazers_count": 10,
        "forks_count": 3,
        "open_issues_count": 1,
        "subscribers_count": 4,
        "language": "Rust",
        "license": {"key": "mit", "name": "MIT License"},
        "default_branch": "main",
        "size": 1024,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-06-01T00:00:00Z",
        "pushed_at": "2024-06-01T00:00:00Z"
    })
}

fn commits_json() -> Value {
    json!([{
        "sha": "abcdef0123456789",
        "html_url": "https://github.com/acme/widget/commit/abcdef0123456789",
        "commit": {
            "message": "Add cache\n\nDetails",
            "author": {"name": "Dev", "date": "2024-06-01T12:00:00Z"}
        },
        "author": null
    }])
}

/// Routes for a healthy `acme/widget`; everything else is 404.
fn widget_routes(path: &str) -> (u16, String) {
    let body = match path {
        "/repos/acme/widget" => repo_json("acme", "widget"),
        "/repos/acme/gadget" => repo_json("acme", "gadget"),
        "/repos/acme/widget/commits" | "/repos/acme/gadget/commits" => commits_json(),
        "/repos/acme/widget/branches" => {
            json!([{"name": "main", "commit": {"sha": "abc"}, "protected": true}])
        }
        "/repos/acme/widget/tags" => json!([{"name": "v1.0.0", "commit": {"sha": "abc"}}]),
        "/repos/acme/widget/releases" => json!([{
            "tag_name": "v1.0.0",
            "name": "First",
            "html_url": "https://github.com/acme/widget/releases/v1.0.0",
            "body": null,
            "prerelease": false,
            "published_at": "2024-05-01T00:00:00Z"
        }]),
        "/repos/acme/widget/issues" => json!([]),
        "/repos/acme/widget/contributors" => {
            json!([{"login": "dev", "avatar_url": null, "contributions": 12}])
        }
        "/repos/acme/widget/readme" => return (200, "<h1>Widget</h1>".to_string()),
        "/repos/acme/widget/community/profile" => return (500, "{}".to_string()),
        _ => return (404, json!({"message": "Not Found"}).to_string()),
    };
    (200, body.to_string())
}

async fn dashboard(base_url: &str, store: Arc<dyn DurableStore>, repos: Vec<RepoRef>) -> Dashboard {
    let cache = CacheManager::open(store, CacheConfig::default()).await;
    let client = GitHubClient::with_base_url(None, base_url).unwrap();
    let config = Config {
        repositories: repos,
        ..Config::default()
    };
    Dashboard::new(client, cache, config)
}

#[tokio::test]
async fn test_cards_load_live_then_from_cache() {
    let (base_url, requests) = spawn_server(Arc::new(widget_routes)).await;
    let dash = dashboard(
        &base_url,
        Arc::new(MemoryStore::new()),
        vec![RepoRef::new("acme", "widget")],
    )
    .await;

    let cards = dash.load_cards().await;
    let RepoCard::Loaded(summary) = &cards[0] else {
        panic!("expected loaded card: {:?}", cards[0]);
    };
    assert!(!summary.from_cache);
    assert_eq!(summary.repository.stargazers_count, 10);
    assert_eq!(summary.recent_commits[0].summary(), "Add cache");
    assert_eq!(requests.load(Ordering::SeqCst), 2);

    let cards = dash.load_cards().await;
    let RepoCard::Loaded(summary) = &cards[0] else {
        panic!("expected loaded card");
    };
    assert!(summary.from_cache);
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_repository_does_not_block_others() {
    let (base_url, _requests) = spawn_server(Arc::new(widget_routes)).await;
    let repos = vec![
        RepoRef::new("acme", "widget"),
        RepoRef::new("acme", "missing"),
        RepoRef::new("acme", "gadget"),
        RepoRef::new("acme", "widget").with_branch("dev"),
    ];
    let dash = dashboard(&base_url, Arc::new(MemoryStore::new()), repos.clone()).await;

    let cards = dash.load_cards().await;

    assert_eq!(cards.len(), 4);
    let order: Vec<_> = cards.iter().map(|card| card.repo().clone()).collect();
    assert_eq!(order, repos);
    assert!(cards[0].is_loaded());
    assert!(cards[2].is_loaded());
    assert!(cards[3].is_loaded());

    let RepoCard::Failed { error, .. } = &cards[1] else {
        panic!("expected failed card");
    };
    let DashError::NoDataAvailable { source, .. } = error else {
        panic!("expected NoDataAvailable, got {error:?}");
    };
    assert!(matches!(**source, DashError::NotFound(_)));
}

#[tokio::test]
async fn test_stale_store_is_used_when_api_fails() {
    let (base_url, _requests) =
        spawn_server(Arc::new(|_: &str| (500, "{}".to_string()))).await;

    let store = Arc::new(MemoryStore::new());
    let stale_at = DateTime::from_timestamp_millis(0).unwrap();
    let seed = [
        (CacheKey::repository("acme", "widget"), repo_json("acme", "widget")),
        (
            CacheKey::commits("acme", "widget", "main", 1, 5),
            commits_json(),
        ),
    ];
    for (key, value) in seed {
        let entry = CachedData::new(Payload::Json(value), stale_at);
        store
            .set(&key.storage_key(), &entry.to_json().unwrap())
            .await
            .unwrap();
    }

    let dash = dashboard(&base_url, store, vec![RepoRef::new("acme", "widget")]).await;
    assert_eq!(dash.cache().memory_len(), 0, "stale entries are not re-seeded");

    let cards = dash.load_cards().await;
    let RepoCard::Loaded(summary) = &cards[0] else {
        panic!("expected stale fallback, got {:?}", cards[0]);
    };
    assert!(summary.from_cache);
    assert_eq!(summary.repository.full_name, "acme/widget");
}

#[tokio::test]
async fn test_retry_after_upstream_recovers() {
    let healthy = Arc::new(AtomicBool::new(false));
    let flag = healthy.clone();
    let (base_url, _requests) = spawn_server(Arc::new(move |path: &str| {
        if flag.load(Ordering::SeqCst) {
            widget_routes(path)
        } else {
            (503, "{}".to_string())
        }
    }))
    .await;
    let dash = dashboard(
        &base_url,
        Arc::new(MemoryStore::new()),
        vec![RepoRef::new("acme", "widget")],
    )
    .await;

    let cards = dash.load_cards().await;
    assert!(!cards[0].is_loaded());

    healthy.store(true, Ordering::SeqCst);
    let card = dash.retry(&cards[0]).await;
    assert!(card.is_loaded());
}

#[tokio::test]
async fn test_details_sections_fail_independently() {
    let (base_url, _requests) = spawn_server(Arc::new(widget_routes)).await;
    let store = Arc::new(MemoryStore::new());
    let dash = dashboard(&base_url, store.clone(), vec![]).await;
    let repo = RepoRef::new("acme", "widget");

    let details = dash.load_details(&repo, None).await.unwrap();

    assert_eq!(details.branch, "main");
    assert_eq!(details.readme.as_deref(), Some("<h1>Widget</h1>"));
    assert_eq!(details.branches.as_ref().unwrap().data[0].name, "main");
    assert_eq!(details.releases.as_ref().unwrap().data[0].title(), "First");
    assert!(details.issues.as_ref().unwrap().data.is_empty());
    assert_eq!(details.contributors.as_ref().unwrap().data[0].contributions, 12);
    assert!(details.community.as_ref().unwrap_err().is_no_data());
    assert!(details.last_commit_at().is_some());
    assert!(!details.from_cache());

    let readme_key = CacheKey::new(ResourceKind::Readme, "acme", "widget").storage_key();
    let stored = store.get(&readme_key).await.unwrap().unwrap();
    let entry: CachedData<Payload> = CachedData::from_json(&stored).unwrap();
    assert_eq!(entry.data, Payload::Text("<h1>Widget</h1>".to_string()));
}

#[tokio::test]
async fn test_commit_pages_are_cached_separately() {
    let (base_url, requests) = spawn_server(Arc::new(widget_routes)).await;
    let dash = dashboard(&base_url, Arc::new(MemoryStore::new()), vec![]).await;
    let repo = RepoRef::new("acme", "widget");

    dash.commits_page(&repo, "main", 1, 10).await.unwrap();
    dash.commits_page(&repo, "main", 2, 10).await.unwrap();
    dash.commits_page(&repo, "dev", 1, 10).await.unwrap();
    assert_eq!(requests.load(Ordering::SeqCst), 3);

    dash.commits_page(&repo, "main", 2, 10).await.unwrap();
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_refresh_clears_cached_cards() {
    let (base_url, requests) = spawn_server(Arc::new(widget_routes)).await;
    let store = Arc::new(MemoryStore::new());
    let dash = dashboard(&base_url, store.clone(), vec![RepoRef::new("acme", "widget")]).await;

    dash.load_cards().await;
    assert_eq!(store.len(), 2);

    dash.refresh().await;
    assert!(store.is_empty());

    dash.load_cards().await;
    assert_eq!(requests.load(Ordering::SeqCst), 4);
}
