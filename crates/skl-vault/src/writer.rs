//! Knowledge writer: read-modify-write of module skills and index documents.
//!
//! Every mutation runs inside the directory lock of the document it
//! touches. Module skills share the `modules/` lock with the usage tracker,
//! so a content rewrite never drops a concurrent access-count bump.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use skl_core::frontmatter::{self, format_timestamp, Frontmatter, UsageMetadata};
use skl_core::index::{self, IndexEntry, IndexKind};
use skl_core::{module_path, to_skill_name, SkillContent, SklError, WriteMode};

use crate::scan;
use crate::vault::{read_optional, write_atomic, Vault};

/// Result of [`Vault::learn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnOutcome {
    pub module: String,
    pub name: String,
    pub path: PathBuf,
    pub description: String,
}

struct Written {
    path: PathBuf,
    description: String,
}

impl Vault {
    /// Write the skill document for `module_path` and return its path.
    ///
    /// The existing `usage` block is preserved (`created_at` is set only on
    /// first write, counters are never reset) and `last_updated` is set to
    /// now.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::LockTimeout`] if the modules directory stays
    /// locked, and [`SklError::Io`] on filesystem failure. The lock is
    /// released before either is returned.
    pub async fn write_module_skill(
        &self,
        module_path: &str,
        content: SkillContent,
        mode: WriteMode,
    ) -> Result<PathBuf, SklError> {
        self.write_module(module_path, content, mode)
            .await
            .map(|written| written.path)
    }

    async fn write_module(
        &self,
        module_path: &str,
        content: SkillContent,
        mode: WriteMode,
    ) -> Result<Written, SklError> {
        let name = to_skill_name(module_path);
        let path = self.layout.module_skill_path(&name);

        let guard = self.locks.acquire(&self.layout.modules_dir()).await?;
        let result = self.write_module_locked(&path, &name, content, mode).await;
        guard.release().await;

        let description = result?;
        info!(module = %module_path, name = %name, path = %path.display(), "wrote module skill");
        Ok(Written { path, description })
    }

    async fn write_module_locked(
        &self,
        path: &Path,
        name: &str,
        content: SkillContent,
        mode: WriteMode,
    ) -> Result<String, SklError> {
        let existing = read_optional(path).await?;
        let (old_frontmatter, old_content) = match existing.as_deref() {
            Some(text) => match frontmatter::parse_document(text) {
                Some((fm, body)) => {
                    let old = SkillContent::from_body(fm.description.clone().unwrap_or_default(), body);
                    (Some(fm), Some(old))
                }
                None => (None, Some(SkillContent::from_body("", text))),
            },
            None => (None, None),
        };

        let now = format_timestamp(self.now());
        let mut usage: UsageMetadata = old_frontmatter
            .and_then(|fm| fm.usage)
            .unwrap_or_default();
        if usage.created_at.is_none() {
            usage.created_at = Some(now.clone());
        }
        usage.last_updated = Some(now);

        let content = content.merged_onto(old_content, mode);
        let fm = Frontmatter {
            name: Some(name.to_string()),
            description: Some(content.description.clone()),
            usage: Some(usage),
        };
        write_atomic(path, &frontmatter::serialize(&fm, &content.render_body(name))).await?;

        Ok(content.description)
    }

    /// Insert or replace `entry` in the given index document.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::LockTimeout`] or [`SklError::Io`].
    pub async fn update_index(&self, entry: &IndexEntry, kind: IndexKind) -> Result<PathBuf, SklError> {
        let path = self.layout.index_path(kind);
        self.edit_index(&path, kind, &self.project, |doc| index::upsert_entry(&doc, entry))
            .await?;
        debug!(name = %entry.name, index = %path.display(), "updated index entry");
        Ok(path)
    }

    /// Drop entries by name from the given index document. A missing index
    /// is left missing.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::LockTimeout`] or [`SklError::Io`].
    pub async fn remove_index_entries(&self, names: &[String], kind: IndexKind) -> Result<(), SklError> {
        let path = self.layout.index_path(kind);
        self.remove_entries_at(&path, kind, &self.project, names).await
    }

    pub(crate) async fn remove_entries_at(
        &self,
        path: &Path,
        kind: IndexKind,
        project: &str,
        names: &[String],
    ) -> Result<(), SklError> {
        if names.is_empty() || !tokio::fs::try_exists(path).await? {
            return Ok(());
        }
        self.edit_index(path, kind, project, |doc| index::remove_entries(&doc, names))
            .await
    }

    /// Locked read-modify-write of an index document. Absent or malformed
    /// documents are reseeded from the template before `edit` runs.
    async fn edit_index<F>(&self, path: &Path, kind: IndexKind, project: &str, edit: F) -> Result<(), SklError>
    where
        F: FnOnce(String) -> String,
    {
        let dir = path
            .parent()
            .ok_or_else(|| SklError::InvalidPath(path.display().to_string()))?;

        let guard = self.locks.acquire(dir).await?;
        let result = async {
            let existing = read_optional(path).await?;
            let doc = index::ensure_template(existing.as_deref(), kind, project);
            let updated = edit(doc);
            if existing.as_deref() != Some(updated.as_str()) {
                write_atomic(path, &updated).await?;
            }
            Ok::<(), SklError>(())
        }
        .await;
        guard.release().await;

        result
    }

    /// Write a module skill and record it in both index documents.
    ///
    /// # Errors
    ///
    /// Propagates the first failure; earlier steps stay applied.
    pub async fn learn(
        &self,
        module_path: &str,
        content: SkillContent,
        mode: WriteMode,
    ) -> Result<LearnOutcome, SklError> {
        let name = to_skill_name(module_path);
        let written = self.write_module(module_path, content, mode).await?;

        for kind in [IndexKind::Project, IndexKind::Global] {
            let entry = IndexEntry::new(
                name.clone(),
                written.description.clone(),
                self.layout.entry_location(kind, &name),
            );
            self.update_index(&entry, kind).await?;
        }

        Ok(LearnOutcome {
            module: module_path.to_string(),
            name,
            path: written.path,
            description: written.description,
        })
    }

    /// [`Vault::learn`] for the module bucket of a file that triggered
    /// extraction.
    ///
    /// # Errors
    ///
    /// Same as [`Vault::learn`].
    pub async fn learn_for_file(
        &self,
        file: &Path,
        content: SkillContent,
        mode: WriteMode,
    ) -> Result<LearnOutcome, SklError> {
        let module = module_path(self.layout.project_root(), file);
        self.learn(&module, content, mode).await
    }

    /// Regenerate this project's index from the module documents on disk,
    /// keeping the index prose and dropping entries with no document.
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::LockTimeout`] or [`SklError::Io`].
    pub async fn rebuild_index(&self) -> Result<usize, SklError> {
        let entries: Vec<IndexEntry> = scan::module_documents(self.layout.skills_root())
            .await?
            .into_iter()
            .filter(|doc| doc.project == self.project)
            .map(|doc| {
                let description = doc
                    .frontmatter
                    .and_then(|fm| fm.description)
                    .unwrap_or_default();
                let location = self.layout.entry_location(IndexKind::Project, &doc.name);
                IndexEntry::new(doc.name, description, location)
            })
            .collect();
        let count = entries.len();

        let path = self.layout.index_path(IndexKind::Project);
        self.edit_index(&path, IndexKind::Project, &self.project, |doc| {
            let stale: Vec<String> = index::parse_entries(&doc)
                .into_iter()
                .map(|e| e.name)
                .filter(|name| !entries.iter().any(|e| &e.name == name))
                .collect();
            let doc = index::remove_entries(&doc, &stale);
            entries
                .iter()
                .fold(doc, |doc, entry| index::upsert_entry(&doc, entry))
        })
        .await?;

        info!(project = %self.project, entries = count, "rebuilt project index");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use skl_core::index::parse_entries;
    use skl_core::SklConfig;

    use crate::clock::ManualClock;

    fn vault(dir: &Path) -> (Vault, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 2, 10, 9, 0, 0).unwrap(),
        ));
        let mut config = SklConfig::default();
        config.project_name = Some("app".to_string());
        let vault = Vault::new(dir, config).with_clock(clock.clone());
        (vault, clock)
    }

    fn auth() -> SkillContent {
        SkillContent::new("Session handling")
            .with_section("Conventions", "Refresh in middleware.")
            .with_related_file("src/auth/session.rs")
    }

    fn read_frontmatter(path: &Path) -> Frontmatter {
        frontmatter::parse(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    // === write_module_skill ===

    #[tokio::test]
    async fn writes_to_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, _) = vault(dir.path());

        let path = vault
            .write_module_skill("src/auth", auth(), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(
            path,
            dir.path().join(".opencode/skills/app/modules/src-auth.md")
        );

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("---\nname: src-auth\ndescription: Session handling\nusage:\n"));
        assert!(text.contains("  created_at: 2025-02-10T09:00:00.000Z\n"));
        assert!(!text.contains("access_count"));
        assert!(text.contains("## Conventions\n\nRefresh in middleware."));
        assert!(!dir.path().join(".opencode/skills/app/modules/.lock").exists());
    }

    #[tokio::test]
    async fn rewrite_preserves_created_at_and_counters() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, clock) = vault(dir.path());

        let path = vault
            .write_module_skill("src/auth", auth(), WriteMode::Replace)
            .await
            .unwrap();
        clock.advance(Duration::hours(1));
        vault.try_track_access(&path).await.unwrap();
        clock.advance(Duration::days(2));
        vault
            .write_module_skill("src/auth", SkillContent::new("Rewritten"), WriteMode::Replace)
            .await
            .unwrap();

        let fm = read_frontmatter(&path);
        let usage = fm.usage.unwrap();
        assert_eq!(fm.description.as_deref(), Some("Rewritten"));
        assert_eq!(usage.created_at.as_deref(), Some("2025-02-10T09:00:00.000Z"));
        assert_eq!(usage.last_updated.as_deref(), Some("2025-02-12T10:00:00.000Z"));
        assert_eq!(usage.access_count, Some(1));
        assert_eq!(usage.last_accessed.as_deref(), Some("2025-02-10T10:00:00.000Z"));
    }

    #[tokio::test]
    async fn merge_mode_keeps_old_sections() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, _) = vault(dir.path());

        vault
            .write_module_skill("src/auth", auth(), WriteMode::Replace)
            .await
            .unwrap();
        let path = vault
            .write_module_skill(
                "src/auth",
                SkillContent::new("").with_section("Pitfalls", "Tokens expire."),
                WriteMode::Merge,
            )
            .await
            .unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("description: Session handling\n"));
        assert!(text.contains("## Conventions"));
        assert!(text.contains("## Pitfalls\n\nTokens expire."));
        assert!(text.contains("- `src/auth/session.rs`"));
    }

    #[tokio::test]
    async fn hand_written_document_gains_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, _) = vault(dir.path());
        let path = vault.layout().module_skill_path("lib");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# lib\n\n## Notes\n\nkeep me\n").unwrap();

        vault
            .write_module_skill("lib", SkillContent::new("Library"), WriteMode::Merge)
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let fm = read_frontmatter(&path);
        assert_eq!(fm.name.as_deref(), Some("lib"));
        assert!(fm.usage.unwrap().created_at.is_some());
        assert!(text.contains("## Notes\n\nkeep me"));
    }

    #[tokio::test]
    async fn locked_modules_dir_times_out_and_leaves_document() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, _) = vault(dir.path());
        let vault = vault.with_lock_manager(crate::lock::LockManager::new(
            std::time::Duration::from_millis(100),
        ));
        let _held = vault.locks.acquire(&vault.layout().modules_dir()).await.unwrap();

        let err = vault
            .write_module_skill("src/auth", auth(), WriteMode::Replace)
            .await
            .unwrap_err();
        assert!(err.is_lock_timeout());
        assert!(!vault.layout().module_skill_path("src-auth").exists());
    }

    // === Index documents ===

    #[tokio::test]
    async fn update_index_seeds_template_then_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, _) = vault(dir.path());

        let first = IndexEntry::new("src-auth", "first", "modules/src-auth.md");
        let second = IndexEntry::new("src-auth", "second", "modules/src-auth.md");
        let path = vault.update_index(&first, IndexKind::Project).await.unwrap();
        vault.update_index(&second, IndexKind::Project).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("---\nname: app\n"));
        assert_eq!(parse_entries(&text), vec![second]);
    }

    #[tokio::test]
    async fn learn_writes_document_and_both_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, _) = vault(dir.path());

        let outcome = vault
            .learn_for_file(&dir.path().join("src/auth/session.rs"), auth(), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(outcome.module, "src/auth");
        assert_eq!(outcome.name, "src-auth");

        let project = std::fs::read_to_string(vault.layout().index_path(IndexKind::Project)).unwrap();
        assert_eq!(
            parse_entries(&project),
            vec![IndexEntry::new("src-auth", "Session handling", "modules/src-auth.md")]
        );

        let global = std::fs::read_to_string(vault.layout().index_path(IndexKind::Global)).unwrap();
        assert_eq!(
            parse_entries(&global),
            vec![IndexEntry::new(
                "src-auth",
                "Session handling",
                ".opencode/skills/app/modules/src-auth.md"
            )]
        );
    }

    #[tokio::test]
    async fn rebuild_index_matches_documents_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, _) = vault(dir.path());

        vault.learn("src/auth", auth(), WriteMode::Replace).await.unwrap();
        vault
            .learn("src/db", SkillContent::new("Pooling"), WriteMode::Replace)
            .await
            .unwrap();
        std::fs::remove_file(vault.layout().module_skill_path("src-db")).unwrap();
        vault
            .write_module_skill("lib", SkillContent::new("Library"), WriteMode::Replace)
            .await
            .unwrap();

        assert_eq!(vault.rebuild_index().await.unwrap(), 2);

        let text = std::fs::read_to_string(vault.layout().index_path(IndexKind::Project)).unwrap();
        let names: Vec<String> = parse_entries(&text).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["src-auth", "lib"]);
        assert!(text.contains("## Modules"));
    }
}
