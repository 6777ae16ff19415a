use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use repocache_git::{Fetcher, GitFetcher, LocalBlobStore};
use repocache_util::errors::RepoCacheError;
use tokio_util::sync::CancellationToken;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git runs");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Create a repository with one commit and return its URL (a local path).
fn remote_repo(root: &Path) -> String {
    let dir = root.join("remote");
    std::fs::create_dir_all(&dir).unwrap();
    git(&dir, &["init", "--quiet"]);
    commit(&dir, "main.go", "package main\n");
    dir.to_string_lossy().into_owned()
}

fn commit(dir: &Path, file: &str, content: &str) -> String {
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", file]);
    git(dir, &["commit", "--quiet", "-m", file]);
    git(dir, &["rev-parse", "HEAD"])
}

#[tokio::test]
async fn first_fetch_clones_and_later_fetch_updates() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let url = remote_repo(tmp.path());
    let fetcher = GitFetcher::new("git", tmp.path().join("repos"));
    let ctx = CancellationToken::new();

    let tree = fetcher.fetch(&ctx, &url).await.unwrap();
    assert_eq!(tree.url(), url);
    assert_eq!(tree.head(), git(Path::new(&url), &["rev-parse", "HEAD"]));
    assert!(tree.join("main.go").is_file());
    assert!(tree.path().starts_with(fetcher.root()));

    let new_head = commit(Path::new(&url), "util.go", "package main\n");
    let updated = fetcher.fetch(&ctx, &url).await.unwrap();
    assert_eq!(updated.head(), new_head);
    assert!(updated.join("util.go").is_file());
}

#[tokio::test]
async fn earlier_tree_is_untouched_by_a_later_fetch() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let url = remote_repo(tmp.path());
    let remote = Path::new(&url);
    let fetcher = GitFetcher::new("git", tmp.path().join("repos"));
    let ctx = CancellationToken::new();

    commit(remote, "VERSION", "v1\n");
    let old = fetcher.fetch(&ctx, &url).await.unwrap();
    let before = std::fs::read_to_string(old.join("VERSION")).unwrap();

    commit(remote, "VERSION", "v2\n");
    let new = fetcher.fetch(&ctx, &url).await.unwrap();

    assert_eq!(before, "v1\n");
    assert_eq!(std::fs::read_to_string(old.join("VERSION")).unwrap(), "v1\n");
    assert_eq!(git(old.path(), &["rev-parse", "HEAD"]), old.head());
    assert_eq!(std::fs::read_to_string(new.join("VERSION")).unwrap(), "v2\n");
    assert_ne!(old.path(), new.path());
}

#[tokio::test]
async fn unchanged_head_reuses_its_tree() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let url = remote_repo(tmp.path());
    let fetcher = GitFetcher::new("git", tmp.path().join("repos"));
    let ctx = CancellationToken::new();

    let first = fetcher.fetch(&ctx, &url).await.unwrap();
    let second = fetcher.fetch(&ctx, &url).await.unwrap();

    assert_eq!(first.head(), second.head());
    assert_eq!(first.path(), second.path());
    assert!(second.join("main.go").is_file());
}

#[tokio::test]
async fn missing_remote_is_a_fetch_error() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = GitFetcher::new("git", tmp.path().join("repos"));
    let url = tmp.path().join("does-not-exist").to_string_lossy().into_owned();

    let err = fetcher
        .fetch(&CancellationToken::new(), &url)
        .await
        .unwrap_err();
    match err {
        RepoCacheError::Fetch { url: failed, .. } => assert_eq!(failed, url),
        other => panic!("expected fetch error, got {other:?}"),
    }
    assert!(!fetcher.remote_dir(&url).join("repo").exists());
}

#[tokio::test]
async fn missing_program_is_a_fetch_error() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = GitFetcher::new("repocache-no-such-git", tmp.path().join("repos"));

    let err = fetcher
        .fetch(&CancellationToken::new(), "https://example.com/r.git")
        .await
        .unwrap_err();
    assert!(matches!(err, RepoCacheError::Fetch { .. }));
}

#[tokio::test]
async fn cancelled_token_stops_fetch() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = GitFetcher::new("git", tmp.path().join("repos"));
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = fetcher
        .fetch(&ctx, "https://example.com/r.git")
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn snapshot_is_stored_and_restores_a_fresh_cache() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let url = remote_repo(tmp.path());
    let blobs = Arc::new(LocalBlobStore::new(
        tmp.path().join("snapshots"),
        10 * 1024 * 1024,
        100 * 1024 * 1024,
    ));
    let ctx = CancellationToken::new();

    let first = GitFetcher::new("git", tmp.path().join("repos-a"))
        .with_snapshots(blobs.clone(), 10 * 1024 * 1024);
    first.fetch(&ctx, &url).await.unwrap();
    assert!(blobs.contains(&url));

    let new_head = commit(Path::new(&url), "later.go", "package main\n");
    let second = GitFetcher::new("git", tmp.path().join("repos-b"))
        .with_snapshots(blobs.clone(), 10 * 1024 * 1024);
    let tree = second.fetch(&ctx, &url).await.unwrap();

    assert_eq!(tree.head(), new_head);
    assert!(tree.join("main.go").is_file());
    assert!(tree.join("later.go").is_file());
    assert_eq!(git(tree.path(), &["remote", "get-url", "origin"]), url);
}

#[tokio::test]
async fn large_repositories_are_not_snapshotted() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let url = remote_repo(tmp.path());
    let blobs = Arc::new(LocalBlobStore::new(tmp.path().join("snapshots"), 1 << 20, 1 << 30));

    let fetcher = GitFetcher::new("git", tmp.path().join("repos")).with_snapshots(blobs.clone(), 1);
    fetcher.fetch(&CancellationToken::new(), &url).await.unwrap();

    assert!(!blobs.contains(&url));
}
