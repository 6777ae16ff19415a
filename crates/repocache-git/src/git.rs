//! Fetcher backed by the `git` command-line client.
//!
//! Each remote gets one clone under the cache root. The first fetch clones it
//! (from a stored snapshot when one exists, then brought current from the
//! remote); later fetches update it to the remote's current head. Every head
//! is checked out into its own linked worktree, so a tree handed to one
//! session is never rewritten by a later fetch from another.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use repocache_core::WorkTree;
use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use repocache_util::process::CommandBuilder;
use tokio_util::sync::CancellationToken;

use crate::blob::BlobStore;
use crate::fetcher::Fetcher;
use crate::remote::remote_dir;

struct Snapshots {
    store: Arc<dyn BlobStore>,
    max_repo_bytes: u64,
}

/// Clones and updates repositories with the system `git` executable.
pub struct GitFetcher {
    program: String,
    root: PathBuf,
    snapshots: Option<Snapshots>,
    dir_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for GitFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitFetcher")
            .field("program", &self.program)
            .field("root", &self.root)
            .field("snapshots", &self.snapshots.is_some())
            .finish()
    }
}

impl GitFetcher {
    /// Create a fetcher running `program` and keeping working trees under `root`.
    pub fn new(program: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            root: root.into(),
            snapshots: None,
            dir_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Restore absent repositories from `store` and snapshot repositories whose
    /// `.git` directory is at most `max_repo_bytes`.
    pub fn with_snapshots(mut self, store: Arc<dyn BlobStore>, max_repo_bytes: u64) -> Self {
        self.snapshots = Some(Snapshots {
            store,
            max_repo_bytes,
        });
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the clone and checked-out trees for `url`.
    pub fn remote_dir(&self, url: &str) -> PathBuf {
        remote_dir(&self.root, url)
    }

    fn git(&self) -> CommandBuilder {
        CommandBuilder::new(&self.program).env("GIT_TERMINAL_PROMPT", "0")
    }

    /// Same-directory fetches from different sessions must not interleave.
    fn dir_lock(&self, dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.dir_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(dir.to_path_buf()).or_default())
    }

    /// Run a git command, returning trimmed stdout.
    async fn run(
        &self,
        ctx: &CancellationToken,
        url: &str,
        cmd: CommandBuilder,
    ) -> RepoCacheResult<String> {
        tracing::trace!("running {}", cmd.display());
        let output = cmd.exec(ctx).await.map_err(|e| match e {
            RepoCacheError::Cancelled => e,
            other => RepoCacheError::fetch(url, format!("failed to run `{}`: {other}", cmd.display())),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("`{}` exited with {}", cmd.display(), output.status)
            } else {
                stderr
            };
            return Err(RepoCacheError::fetch(url, message));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn head(&self, ctx: &CancellationToken, url: &str, dir: &Path) -> RepoCacheResult<String> {
        let cmd = self.git().args(["rev-parse", "HEAD"]).cwd(dir);
        self.run(ctx, url, cmd).await
    }

    async fn clone_remote(&self, ctx: &CancellationToken, url: &str, dir: &Path) -> RepoCacheResult<()> {
        tracing::debug!("cloning {url}");
        let cmd = self
            .git()
            .args(["clone", "--quiet", "--no-checkout", "--", url])
            .arg(dir.to_string_lossy());
        let cloned = self.run(ctx, url, cmd).await;
        if cloned.is_err() {
            remove_partial(dir);
        }
        cloned.map(|_| ())
    }

    /// Move the clone to the remote's current head without touching any
    /// checked-out tree.
    async fn update(&self, ctx: &CancellationToken, url: &str, dir: &Path) -> RepoCacheResult<()> {
        tracing::debug!("updating {url}");
        let fetch = self
            .git()
            .args(["fetch", "--quiet", "origin", "HEAD"])
            .cwd(dir);
        self.run(ctx, url, fetch).await?;
        let reset = self
            .git()
            .args(["reset", "--soft", "--quiet", "FETCH_HEAD"])
            .cwd(dir);
        self.run(ctx, url, reset).await?;
        Ok(())
    }

    /// Check out `head` of the clone at `repo` into `tree`, unless an earlier
    /// fetch already did.
    ///
    /// The checkout is made under a temporary name and moved into place once
    /// complete, so an existing `tree` is always a full checkout.
    async fn checkout(
        &self,
        ctx: &CancellationToken,
        url: &str,
        repo: &Path,
        tree: &Path,
        head: &str,
    ) -> RepoCacheResult<()> {
        if tree.is_dir() {
            tracing::trace!("reusing checkout {}", tree.display());
            return Ok(());
        }
        let partial = tree.with_extension("partial");
        remove_partial(&partial);

        let add = self
            .git()
            .args(["worktree", "add", "--detach", "--force"])
            .arg(partial.to_string_lossy())
            .arg(head)
            .cwd(repo);
        let move_into_place = self
            .git()
            .args(["worktree", "move"])
            .arg(partial.to_string_lossy())
            .arg(tree.to_string_lossy())
            .cwd(repo);

        let checked_out = match self.run(ctx, url, add).await {
            Ok(_) => self.run(ctx, url, move_into_place).await,
            Err(e) => Err(e),
        };
        if checked_out.is_err() {
            remove_partial(&partial);
        }
        checked_out.map(|_| ())
    }

    /// Clone `dir` from the stored snapshot for `url`, if any.
    ///
    /// Only cancellation is an error; any other failure leaves `dir` absent
    /// and falls back to a network clone.
    async fn restore_snapshot(
        &self,
        ctx: &CancellationToken,
        url: &str,
        dir: &Path,
    ) -> RepoCacheResult<bool> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(false);
        };
        match self.try_restore(ctx, snapshots, url, dir).await {
            Ok(restored) => Ok(restored),
            Err(RepoCacheError::Cancelled) => {
                remove_partial(dir);
                Err(RepoCacheError::Cancelled)
            }
            Err(e) => {
                tracing::warn!("Failed to restore snapshot of {url}: {e}");
                remove_partial(dir);
                Ok(false)
            }
        }
    }

    async fn try_restore(
        &self,
        ctx: &CancellationToken,
        snapshots: &Snapshots,
        url: &str,
        dir: &Path,
    ) -> RepoCacheResult<bool> {
        let bundle = tempfile::Builder::new()
            .suffix(".bundle")
            .tempfile_in(&self.root)?
            .into_temp_path();

        let mut file = tokio::fs::File::create(&bundle).await?;
        let found = snapshots.store.load(ctx, url, &mut file).await?;
        drop(file);
        if !found {
            return Ok(false);
        }

        let clone = self
            .git()
            .args(["clone", "--quiet", "--no-checkout", "--"])
            .arg(bundle.to_string_lossy())
            .arg(dir.to_string_lossy());
        self.run(ctx, url, clone).await?;
        let set_url = self
            .git()
            .args(["remote", "set-url", "origin", url])
            .cwd(dir);
        self.run(ctx, url, set_url).await?;

        tracing::debug!("restored {url} from snapshot");
        Ok(true)
    }

    /// Bundle the repository and hand it to the blob store. Failures are logged.
    async fn store_snapshot(&self, ctx: &CancellationToken, url: &str, dir: &Path) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        let git_dir = dir.join(".git");
        let size = tokio::task::spawn_blocking(move || repocache_util::fs::dir_size(&git_dir))
            .await
            .unwrap_or(u64::MAX);
        if size > snapshots.max_repo_bytes {
            tracing::debug!("{url} is too large to snapshot ({size} bytes)");
            return;
        }

        match self.try_store(ctx, snapshots, url, dir).await {
            Ok(()) | Err(RepoCacheError::Cancelled) => {}
            Err(e) => tracing::warn!("Failed to store snapshot of {url}: {e}"),
        }
    }

    async fn try_store(
        &self,
        ctx: &CancellationToken,
        snapshots: &Snapshots,
        url: &str,
        dir: &Path,
    ) -> RepoCacheResult<()> {
        let bundle = tempfile::Builder::new()
            .suffix(".bundle")
            .tempfile_in(&self.root)?
            .into_temp_path();

        let create = self
            .git()
            .args(["bundle", "create"])
            .arg(bundle.to_string_lossy())
            .arg("--all")
            .cwd(dir);
        self.run(ctx, url, create).await?;

        let mut file = tokio::fs::File::open(&bundle).await?;
        let size = file.metadata().await?.len();
        snapshots.store.store(ctx, url, size, &mut file).await?;
        tracing::debug!("stored snapshot of {url}");
        Ok(())
    }
}

#[async_trait]
impl Fetcher for GitFetcher {
    async fn fetch(&self, ctx: &CancellationToken, url: &str) -> RepoCacheResult<Arc<WorkTree>> {
        let dir = self.remote_dir(url);
        let lock = self.dir_lock(&dir);
        let _guard = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RepoCacheError::Cancelled),
            guard = lock.lock_owned() => guard,
        };

        repocache_util::fs::ensure_dir(&self.root)
            .map_err(|e| RepoCacheError::fetch(url, format!("{}: {e}", self.root.display())))?;

        let repo = dir.join("repo");
        let baseline = if repo.join(".git").is_dir() {
            let before = self.head(ctx, url, &repo).await.ok();
            self.update(ctx, url, &repo).await?;
            before
        } else if self.restore_snapshot(ctx, url, &repo).await? {
            let restored = self.head(ctx, url, &repo).await.ok();
            self.update(ctx, url, &repo).await?;
            restored
        } else {
            self.clone_remote(ctx, url, &repo).await?;
            None
        };

        let head = self.head(ctx, url, &repo).await?;
        if baseline.as_deref() != Some(head.as_str()) {
            self.store_snapshot(ctx, url, &repo).await;
        }

        let tree_dir = dir.join("trees").join(&head);
        self.checkout(ctx, url, &repo, &tree_dir, &head).await?;

        let tree = WorkTree::new(url, tree_dir, head);
        tracing::debug!("{url} at {}", tree.short_head());
        Ok(Arc::new(tree))
    }
}

fn remove_partial(dir: &Path) {
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!("Failed to remove partial clone {}: {e}", dir.display());
        }
    }
}
