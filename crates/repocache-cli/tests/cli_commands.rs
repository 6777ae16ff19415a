use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[allow(deprecated)]
fn repocache_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("repocache").unwrap();
    cmd.env("HOME", home.path()).env_remove("REPOCACHE_CONFIG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();

    repocache_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("hints"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn test_hints_show_without_hints() {
    let home = TempDir::new().unwrap();

    repocache_cmd(&home)
        .args(["hints", "show", "github.com/dave/jsgo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No hints for github.com/dave/jsgo"));
}

#[test]
fn test_hints_show_reads_hint_file() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".repocache");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("hints.json"),
        r#"{"github.com/dave/jsgo": ["https://github.com/dave/jsgo", "https://github.com/gopherjs/gopherjs"]}"#,
    )
    .unwrap();

    repocache_cmd(&home)
        .args(["hints", "show", "github.com/dave/jsgo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://github.com/dave/jsgo\n"))
        .stdout(predicate::str::contains("https://github.com/gopherjs/gopherjs"));
}

#[test]
fn test_cache_stats_on_empty_cache() {
    let home = TempDir::new().unwrap();

    repocache_cmd(&home)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Working trees:"))
        .stdout(predicate::str::contains("Repositories: 0"));
}

#[test]
fn test_cache_clean_removes_working_trees() {
    let home = TempDir::new().unwrap();
    let repos = home.path().join(".repocache").join("repos");
    fs::create_dir_all(repos.join("github.com-a-b-0123456789ab")).unwrap();
    fs::write(repos.join("github.com-a-b-0123456789ab").join("a.go"), "package a\n").unwrap();

    repocache_cmd(&home)
        .args(["cache", "clean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared working trees"));

    assert!(!repos.exists());
}

#[test]
fn test_fetch_missing_repository_fails() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("no-such-repo");

    repocache_cmd(&home)
        .args(["fetch", "--no-save"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch"));
}

#[test]
fn test_fetch_requires_urls() {
    let home = TempDir::new().unwrap();

    repocache_cmd(&home).arg("fetch").assert().failure();
}

#[test]
fn test_malformed_config_is_reported() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("config.toml");
    fs::write(&config, "[hints\nbackend = ").unwrap();

    repocache_cmd(&home)
        .arg("--config")
        .arg(&config)
        .args(["cache", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_config_selects_memory_backend() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("config.toml");
    fs::write(&config, "[hints]\nbackend = \"memory\"\n").unwrap();

    repocache_cmd(&home)
        .arg("--config")
        .arg(&config)
        .args(["hints", "show", "pkg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No hints for pkg"));
}
