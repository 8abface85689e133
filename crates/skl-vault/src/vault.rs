//! The [`Vault`] handle: one project's skill store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use skl_core::{SklConfig, SklError};

use crate::clock::{Clock, SystemClock};
use crate::layout::VaultLayout;
use crate::lock::LockManager;
use crate::project::{project_skill_name, GitRootResolver, ProjectRootResolver};

/// Entry point for every storage operation on one project.
///
/// Cloning is cheap and clones share the clock. Locks live on disk, so
/// clones, separate `Vault`s and separate processes all exclude each other.
#[derive(Clone)]
pub struct Vault {
    pub(crate) layout: VaultLayout,
    pub(crate) project: String,
    pub(crate) config: SklConfig,
    pub(crate) locks: LockManager,
    pub(crate) clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("layout", &self.layout)
            .field("project", &self.project)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Open the store for the project containing `path`, resolving the root
    /// through git and loading the project config.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Config`] if the project config is malformed.
    pub fn open(path: &Path) -> Result<Self, SklError> {
        Self::open_with(path, &GitRootResolver)
    }

    /// Like [`Vault::open`] with an explicit root resolver.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Config`] if the project config is malformed.
    pub fn open_with(path: &Path, resolver: &dyn ProjectRootResolver) -> Result<Self, SklError> {
        let root = resolver.project_root(path);
        let config = SklConfig::load(&root)?;
        Ok(Self::new(&root, config))
    }

    /// Build a vault for a known root and config.
    #[must_use]
    pub fn new(project_root: &Path, config: SklConfig) -> Self {
        let project = project_skill_name(project_root, &config);
        let locks = LockManager::new(Duration::from_millis(config.lock_timeout_ms))
            .with_stale_after(config.stale_lock_after());
        Self {
            layout: VaultLayout::new(project_root, &config, &project),
            project,
            config,
            locks,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_lock_manager(mut self, locks: LockManager) -> Self {
        self.locks = locks;
        self
    }

    #[must_use]
    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Sanitized project identity.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn config(&self) -> &SklConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Read a file, mapping "does not exist" to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>, SklError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SklError::Io(e)),
    }
}

/// Replace the whole file by writing a sibling temp file and renaming it
/// over the target, so readers never observe a partial document.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), SklError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SklError::InvalidPath(path.display().to_string()))?;
    let tmp: PathBuf = path.with_file_name(format!(".{file_name}.tmp"));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SklError::Io(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SklError::Io(e));
    }
    Ok(())
}
