//! File system watcher for module skill documents.
//!
//! Uses `notify`'s recommended backend for the platform. Only paths that
//! [`should_track`] accepts are reported, so index rewrites and lock
//! sentinels never surface as events.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use skl_core::SklError;

use crate::layout::should_track;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillEvent {
    /// A module skill was created or rewritten.
    Changed(PathBuf),
    Removed(PathBuf),
}

impl SkillEvent {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Changed(path) | Self::Removed(path) => path,
        }
    }
}

/// Watches a skills root recursively and queues [`SkillEvent`]s.
pub struct SkillWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<SkillEvent>,
}

impl std::fmt::Debug for SkillWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillWatcher").finish_non_exhaustive()
    }
}

fn watch_error(e: notify::Error) -> SklError {
    SklError::Io(std::io::Error::other(e))
}

impl SkillWatcher {
    /// Start watching `skills_root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Io`] if the directory or the watcher cannot be
    /// created.
    pub fn start(skills_root: &Path) -> Result<Self, SklError> {
        std::fs::create_dir_all(skills_root)?;
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else {
                return;
            };
            for path in event.paths.iter().filter(|p| should_track(p)) {
                let skill_event = match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => SkillEvent::Changed(path.clone()),
                    EventKind::Remove(_) => SkillEvent::Removed(path.clone()),
                    _ => continue,
                };
                let _ = tx.send(skill_event);
            }
        })
        .map_err(watch_error)?;

        watcher
            .watch(skills_root, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Next event, or `None` if nothing arrives within `timeout`.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SkillEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    #[must_use]
    pub fn try_recv(&self) -> Option<SkillEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything already queued, for coalescing bursts of events.
    pub fn drain(&self) -> Vec<SkillEvent> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// `(skills_root, modules_dir)` under a temp dir.
    fn layout(dir: &Path) -> (PathBuf, PathBuf) {
        let root = dir.join("skills");
        let modules = root.join("app").join("modules");
        fs::create_dir_all(&modules).unwrap();
        (root, modules)
    }

    #[test]
    fn detects_new_module_skill() {
        let dir = tempfile::tempdir().unwrap();
        let (root, modules) = layout(dir.path());
        let watcher = SkillWatcher::start(&root).unwrap();

        fs::write(modules.join("src-auth.md"), "---\nname: src-auth\n---\n").unwrap();

        match watcher.recv_timeout(Duration::from_secs(2)) {
            Some(SkillEvent::Changed(path)) => assert!(path.ends_with("src-auth.md")),
            other => panic!("Expected Changed event, got {other:?}"),
        }
    }

    #[test]
    fn detects_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let (root, modules) = layout(dir.path());
        let file = modules.join("lib.md");
        fs::write(&file, "# lib").unwrap();

        let watcher = SkillWatcher::start(&root).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        fs::remove_file(&file).unwrap();

        // Some backends emit Changed before Removed.
        let mut found_removed = false;
        for _ in 0..10 {
            match watcher.recv_timeout(Duration::from_secs(2)) {
                Some(SkillEvent::Removed(path)) => {
                    assert!(path.ends_with("lib.md"));
                    found_removed = true;
                    break;
                }
                Some(SkillEvent::Changed(_)) => continue,
                None => break,
            }
        }
        assert!(found_removed, "Expected watcher to emit Removed event");
    }

    #[test]
    fn ignores_index_and_lock_files() {
        let dir = tempfile::tempdir().unwrap();
        let (root, modules) = layout(dir.path());
        let watcher = SkillWatcher::start(&root).unwrap();

        fs::write(root.join("app").join("SKILL.md"), "---\nname: app\n---\n").unwrap();
        fs::write(modules.join(".lock"), "123-0-0").unwrap();
        fs::write(modules.join("notes.txt"), "plain text").unwrap();

        let event = watcher.recv_timeout(Duration::from_millis(500));
        assert!(event.is_none(), "Watcher should ignore non-module files, got {event:?}");
    }
}
