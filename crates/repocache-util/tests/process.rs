use std::time::Duration;

use repocache_util::errors::RepoCacheError;
use repocache_util::process::CommandBuilder;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_builder_simple_command() {
    let ctx = CancellationToken::new();
    let output = CommandBuilder::new("echo")
        .arg("hello")
        .exec(&ctx)
        .await
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "hello");
}

#[tokio::test]
async fn test_builder_with_env() {
    let ctx = CancellationToken::new();
    let output = CommandBuilder::new("sh")
        .arg("-c")
        .arg("echo $MY_TEST_VAR")
        .env("MY_TEST_VAR", "repocache_test_value")
        .exec(&ctx)
        .await
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "repocache_test_value");
}

#[tokio::test]
async fn test_builder_with_cwd() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("repocache_cwd_test.marker"), "ok").unwrap();

    let ctx = CancellationToken::new();
    let output = CommandBuilder::new("ls")
        .arg("repocache_cwd_test.marker")
        .cwd(tmp.path())
        .exec(&ctx)
        .await
        .unwrap();
    assert!(output.status.success());
}

#[tokio::test]
async fn test_builder_nonexistent_program() {
    let ctx = CancellationToken::new();
    let result = CommandBuilder::new("nonexistent_program_xyz_123")
        .exec(&ctx)
        .await;
    assert!(matches!(result, Err(RepoCacheError::Io(_))));
}

#[tokio::test]
async fn test_cancellation_kills_child() {
    let ctx = CancellationToken::new();
    let trigger = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = CommandBuilder::new("sleep").arg("30").exec(&ctx).await;
    assert!(matches!(result, Err(RepoCacheError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_display_joins_args() {
    let cmd = CommandBuilder::new("git").args(["fetch", "origin"]);
    assert_eq!(cmd.display(), "git fetch origin");
}
