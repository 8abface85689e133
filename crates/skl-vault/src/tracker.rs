//! Usage tracker: bump access counters when a module skill is read.
//!
//! Tracking is best-effort telemetry. [`Vault::track_access`] logs and
//! swallows every failure so it can never fail the read that triggered it.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use skl_core::frontmatter::{self, UsageMetadata};
use skl_core::SklError;

use crate::layout::should_track;
use crate::vault::{read_optional, write_atomic, Vault};

/// What a tracking attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrackOutcome {
    Tracked { access_count: u64 },
    /// The path is not a module skill document.
    Ignored,
    Missing,
    /// The document has no frontmatter block to record usage in.
    NoFrontmatter,
}

impl Vault {
    /// Record one read of `path`, never failing.
    pub async fn track_access(&self, path: &Path) {
        match self.try_track_access(path).await {
            Ok(TrackOutcome::Tracked { access_count }) => {
                debug!(path = %path.display(), access_count, "tracked skill access");
            }
            Ok(outcome) => debug!(path = %path.display(), ?outcome, "skipped skill access"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to track skill access"),
        }
    }

    /// Record one read of `path`, reporting failures.
    ///
    /// Increments `usage.access_count` (creating the `usage` block if
    /// needed) and stamps `usage.last_accessed`; every other field is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::LockTimeout`] if the document's directory stays
    /// locked, or [`SklError::Io`].
    pub async fn try_track_access(&self, path: &Path) -> Result<TrackOutcome, SklError> {
        if !should_track(path) {
            return Ok(TrackOutcome::Ignored);
        }
        if !tokio::fs::try_exists(path).await? {
            return Ok(TrackOutcome::Missing);
        }
        let dir = path
            .parent()
            .ok_or_else(|| SklError::InvalidPath(path.display().to_string()))?;

        let guard = self.locks.acquire(dir).await?;
        let result = self.track_locked(path).await;
        guard.release().await;

        result
    }

    async fn track_locked(&self, path: &Path) -> Result<TrackOutcome, SklError> {
        // Re-read under the lock: the document may have been rewritten or
        // deleted since the existence check.
        let Some(text) = read_optional(path).await? else {
            return Ok(TrackOutcome::Missing);
        };
        let Some((mut fm, body)) = frontmatter::parse_document(&text) else {
            return Ok(TrackOutcome::NoFrontmatter);
        };

        let access_count = fm
            .usage
            .get_or_insert_with(UsageMetadata::default)
            .record_access(self.now());
        write_atomic(path, &frontmatter::serialize(&fm, body)).await?;

        Ok(TrackOutcome::Tracked { access_count })
    }
}
