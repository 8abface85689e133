//! Project configuration loaded from `.opencode/skill-learner.toml`.
//!
//! Every field is optional:
//! ```toml
//! project_name = "my-app"
//! skills_dir = ".opencode/skills"
//! knowledge_dir = ".opencode/knowledge"
//! lock_timeout_ms = 5000
//! stale_lock_ms = 30000
//!
//! [cleanup]
//! min_age_days = 60
//! min_access_count = 5
//! max_inactive_days = 60
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SklError;
use crate::usage::CleanupThresholds;

/// Config file location relative to the project root.
pub const CONFIG_FILE: &str = ".opencode/skill-learner.toml";

/// Resolved configuration with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SklConfig {
    /// Overrides the project identity derived from the root directory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Skills namespace, relative to the project root.
    pub skills_dir: PathBuf,
    /// Global knowledge namespace, relative to the project root.
    pub knowledge_dir: PathBuf,
    pub lock_timeout_ms: u64,
    /// A lock sentinel older than this is treated as abandoned. `0` disables
    /// reclaiming, so a crashed holder blocks acquirers until they time out.
    pub stale_lock_ms: u64,
    pub cleanup: CleanupThresholds,
}

impl Default for SklConfig {
    fn default() -> Self {
        Self {
            project_name: None,
            skills_dir: PathBuf::from(".opencode/skills"),
            knowledge_dir: PathBuf::from(".opencode/knowledge"),
            lock_timeout_ms: 5000,
            stale_lock_ms: 30_000,
            cleanup: CleanupThresholds::default(),
        }
    }
}

impl SklConfig {
    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Config`] if the text is not valid TOML for this
    /// shape.
    pub fn from_toml(text: &str) -> Result<Self, SklError> {
        toml::from_str(text).map_err(|e| SklError::Config(e.to_string()))
    }

    /// Load the config for a project, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Config`] if the file is malformed and
    /// [`SklError::Io`] if it exists but cannot be read.
    pub fn load(project_root: &Path) -> Result<Self, SklError> {
        let path = project_root.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml(&text)
                .map_err(|e| SklError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SklError::Io(e)),
        }
    }

    /// Serialize back to TOML, as printed by `skl config`.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Serialization`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, SklError> {
        toml::to_string_pretty(self).map_err(|e| SklError::Serialization(e.to_string()))
    }

    #[must_use]
    pub fn stale_lock_after(&self) -> Option<std::time::Duration> {
        (self.stale_lock_ms > 0).then(|| std::time::Duration::from_millis(self.stale_lock_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = SklConfig::from_toml("").unwrap();
        assert_eq!(config, SklConfig::default());
        assert_eq!(config.lock_timeout_ms, 5000);
        assert_eq!(config.cleanup.min_access_count, 5);
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config = SklConfig::from_toml(
            "project_name = \"web\"\nlock_timeout_ms = 250\n\n[cleanup]\nmin_age_days = 7\n",
        )
        .unwrap();
        assert_eq!(config.project_name.as_deref(), Some("web"));
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.cleanup.min_age_days, 7);
        assert_eq!(config.cleanup.max_inactive_days, 60);
        assert_eq!(config.skills_dir, PathBuf::from(".opencode/skills"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = SklConfig::from_toml("colour = \"red\"\n").unwrap_err();
        assert!(matches!(err, SklError::Config(_)));
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(SklConfig::load(dir.path()).unwrap(), SklConfig::default());
    }

    #[test]
    fn load_reads_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".opencode")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "stale_lock_ms = 0\n").unwrap();

        let config = SklConfig::load(dir.path()).unwrap();
        assert_eq!(config.stale_lock_after(), None);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = SklConfig::default();
        config.project_name = Some("app".to_string());
        let text = config.to_toml().unwrap();
        assert_eq!(SklConfig::from_toml(&text).unwrap(), config);
    }
}
