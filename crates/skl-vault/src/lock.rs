//! Advisory directory locks backed by a sentinel file.
//!
//! A lock on a directory is the existence of `<dir>/.lock`, holding the
//! owner token of the acquirer. The sentinel lives on the filesystem, so the
//! same lock excludes tasks within one process and separate processes that
//! share the project.
//!
//! Locks are not reentrant. Acquiring the same directory twice from one
//! logical caller waits until the timeout.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use skl_core::SklError;

/// Sentinel file name inside a locked directory.
pub const LOCK_FILE: &str = ".lock";

/// Pause between acquisition attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Default bound on how long an acquirer waits.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Pause before reading back the sentinel in [`LockStrategy::WriteVerify`].
const VERIFY_DELAY: Duration = Duration::from_millis(10);

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// How the sentinel is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockStrategy {
    /// Atomic create-if-absent. Wins only when creation did not collide.
    #[default]
    Exclusive,
    /// Write unconditionally, pause, read back and compare the token. For
    /// filesystems without a reliable exclusive create; has a race window.
    WriteVerify,
}

/// Hands out [`LockGuard`]s for directories.
#[derive(Debug, Clone)]
pub struct LockManager {
    timeout: Duration,
    stale_after: Option<Duration>,
    strategy: LockStrategy,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl LockManager {
    /// A manager that never reclaims abandoned sentinels.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            stale_after: None,
            strategy: LockStrategy::Exclusive,
        }
    }

    /// Treat sentinels older than `stale_after` as left behind by a crashed
    /// holder and remove them.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: LockStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire the lock on `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::LockTimeout`] if the lock stays held for longer
    /// than the timeout and [`SklError::Io`] if the sentinel cannot be
    /// created for any other reason.
    pub async fn acquire(&self, dir: &Path) -> Result<LockGuard, SklError> {
        tokio::fs::create_dir_all(dir).await?;
        let sentinel = dir.join(LOCK_FILE);
        let token = owner_token();
        let start = Instant::now();

        loop {
            let acquired = match self.strategy {
                LockStrategy::Exclusive => create_exclusive(&sentinel, &token).await?,
                LockStrategy::WriteVerify => write_and_verify(&sentinel, &token).await?,
            };
            if acquired {
                debug!(path = %sentinel.display(), token = %token, "lock acquired");
                return Ok(LockGuard {
                    path: sentinel,
                    token,
                    released: false,
                });
            }

            if let Some(stale_after) = self.stale_after {
                if reclaim_if_stale(&sentinel, stale_after, &token).await {
                    continue;
                }
            }

            if start.elapsed() >= self.timeout {
                return Err(SklError::LockTimeout {
                    path: dir.to_path_buf(),
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }
}

/// Owner token unique per acquisition: pid, in-process sequence, and time.
fn owner_token() -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}-{seq}-{nanos}", std::process::id())
}

async fn create_exclusive(sentinel: &Path, token: &str) -> Result<bool, SklError> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(sentinel)
        .await;
    match file {
        Ok(mut file) => {
            let written = async {
                file.write_all(token.as_bytes()).await?;
                file.flush().await
            }
            .await;
            drop(file);
            settle_new_sentinel(sentinel, written).await
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(SklError::Io(e)),
    }
}

/// A sentinel we created but could not fill must not outlive the error,
/// or every later acquirer would wait on an owner that never existed.
async fn settle_new_sentinel(sentinel: &Path, written: std::io::Result<()>) -> Result<bool, SklError> {
    match written {
        Ok(()) => Ok(true),
        Err(e) => {
            if let Err(remove) = tokio::fs::remove_file(sentinel).await {
                warn!(path = %sentinel.display(), error = %remove, "failed to remove unwritten lock");
            }
            Err(SklError::Io(e))
        }
    }
}

async fn write_and_verify(sentinel: &Path, token: &str) -> Result<bool, SklError> {
    if tokio::fs::try_exists(sentinel).await? {
        return Ok(false);
    }
    tokio::fs::write(sentinel, token).await?;
    tokio::time::sleep(VERIFY_DELAY).await;
    match tokio::fs::read_to_string(sentinel).await {
        Ok(current) => Ok(current == token),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SklError::Io(e)),
    }
}

/// Remove a sentinel whose mtime is older than `stale_after`.
async fn reclaim_if_stale(sentinel: &Path, stale_after: Duration, token: &str) -> bool {
    let Ok(observed) = tokio::fs::metadata(sentinel).await else {
        return false;
    };
    let age = observed
        .modified()
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .unwrap_or_default();
    if age < stale_after {
        return false;
    }
    let reclaimed = reclaim_observed(sentinel, &observed, token).await;
    if reclaimed {
        warn!(
            path = %sentinel.display(),
            age_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX),
            "reclaimed abandoned lock"
        );
    }
    reclaimed
}

/// Claim the sentinel last seen as `observed` by renaming it aside, so only
/// one waiter can take it. The moved file is deleted only if it is still
/// the file that was judged stale (same mtime and length); a sentinel that
/// a live holder created in the meantime is put back.
async fn reclaim_observed(sentinel: &Path, observed: &std::fs::Metadata, token: &str) -> bool {
    let aside = sentinel.with_file_name(format!("{LOCK_FILE}.stale-{token}"));
    if tokio::fs::rename(sentinel, &aside).await.is_err() {
        return false;
    }

    let unchanged = match tokio::fs::metadata(&aside).await {
        Ok(moved) => same_file_state(observed, &moved),
        Err(_) => false,
    };
    if unchanged {
        if let Err(e) = tokio::fs::remove_file(&aside).await {
            warn!(path = %aside.display(), error = %e, "failed to remove reclaimed lock");
        }
        return true;
    }

    restore_aside(&aside, sentinel).await;
    false
}

fn same_file_state(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    a.len() == b.len() && a.modified().ok() == b.modified().ok()
}

/// Move a sentinel back without replacing one created since it was moved.
async fn restore_aside(aside: &Path, sentinel: &Path) {
    match tokio::fs::hard_link(aside, sentinel).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            warn!(path = %sentinel.display(), "lock re-acquired while moved aside, keeping the new owner");
        }
        Err(_) => {
            // No hard links on this filesystem.
            if let Err(e) = tokio::fs::rename(aside, sentinel).await {
                warn!(path = %sentinel.display(), error = %e, "failed to restore lock moved aside");
            }
            return;
        }
    }
    if let Err(e) = tokio::fs::remove_file(aside).await {
        warn!(path = %aside.display(), error = %e, "failed to remove lock moved aside");
    }
}

/// Held lock. Release with [`LockGuard::release`]; dropping an unreleased
/// guard removes the sentinel synchronously, so every exit path unlocks.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    path: PathBuf,
    token: String,
    released: bool,
}

impl LockGuard {
    /// Path of the sentinel file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Delete the sentinel. Failures are logged, never returned: the
    /// critical section has already completed.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::read_to_string(&self.path).await {
            Ok(owner) if owner != self.token => {
                warn!(path = %self.path.display(), owner = %owner, "lock was taken over before release");
                return;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "lock vanished before release");
                return;
            }
            _ => {}
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "lock released"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to release lock"),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(owner) if owner == self.token => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %e, "failed to release lock");
                }
            }
            _ => {}
        }
    }
}
