//! On-disk layout of a project's skill store.
//!
//! ```text
//! <root>/
//! ├── .opencode/skills/<project>/
//! │   ├── SKILL.md                 per-project index
//! │   ├── .lock                    guards SKILL.md
//! │   └── modules/
//! │       ├── src-auth.md          module skill documents
//! │       └── .lock                guards every module document
//! └── .opencode/knowledge/
//!     ├── KNOWLEDGE.md             global index
//!     └── .lock
//! ```

use std::path::{Component, Path, PathBuf};

use skl_core::{IndexKind, SklConfig};

/// Directory name that holds module skill documents.
pub const MODULES_DIR: &str = "modules";

/// Directory name the skills namespace must end with for tracking.
pub const SKILLS_DIR: &str = "skills";

/// Resolved paths for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    project_root: PathBuf,
    skills_root: PathBuf,
    knowledge_dir: PathBuf,
    project: String,
}

impl VaultLayout {
    #[must_use]
    pub fn new(project_root: &Path, config: &SklConfig, project: &str) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            skills_root: project_root.join(&config.skills_dir),
            knowledge_dir: project_root.join(&config.knowledge_dir),
            project: project.to_string(),
        }
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// `<root>/<namespace>/skills`, shared by every project identity.
    #[must_use]
    pub fn skills_root(&self) -> &Path {
        &self.skills_root
    }

    #[must_use]
    pub fn project_dir(&self) -> PathBuf {
        self.skills_root.join(&self.project)
    }

    #[must_use]
    pub fn modules_dir(&self) -> PathBuf {
        self.project_dir().join(MODULES_DIR)
    }

    #[must_use]
    pub fn module_skill_path(&self, skill_name: &str) -> PathBuf {
        self.modules_dir().join(format!("{skill_name}.md"))
    }

    #[must_use]
    pub fn knowledge_dir(&self) -> &Path {
        &self.knowledge_dir
    }

    #[must_use]
    pub fn index_path(&self, kind: IndexKind) -> PathBuf {
        match kind {
            IndexKind::Project => self.project_dir().join(kind.file_name()),
            IndexKind::Global => self.knowledge_dir.join(kind.file_name()),
        }
    }

    /// Project index of any project identity under the skills root.
    #[must_use]
    pub fn project_index_of(&self, project: &str) -> PathBuf {
        self.skills_root
            .join(project)
            .join(IndexKind::Project.file_name())
    }

    /// Location string stored in an index entry for a module skill.
    ///
    /// Project index entries are relative to the index itself; global
    /// entries are relative to the project root.
    #[must_use]
    pub fn entry_location(&self, kind: IndexKind, skill_name: &str) -> String {
        match kind {
            IndexKind::Project => format!("{MODULES_DIR}/{skill_name}.md"),
            IndexKind::Global => {
                let path = self.module_skill_path(skill_name);
                let relative = path.strip_prefix(&self.project_root).unwrap_or(&path);
                to_slash(relative)
            }
        }
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a read of `path` should bump usage counters.
///
/// Only module skill documents qualify: `.../skills/<project>/modules/<name>.md`.
/// The per-project `SKILL.md` index and anything outside the skills tree
/// never do.
#[must_use]
pub fn should_track(path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    if stem.is_empty() || stem.starts_with('.') {
        return false;
    }

    let parts: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    match parts.as_slice() {
        [.., skills, project, modules, _file] => {
            *skills == SKILLS_DIR && *modules == MODULES_DIR && !project.starts_with('.')
        }
        _ => false,
    }
}
