//! Project root and identity resolution.

use std::path::{Path, PathBuf};

use skl_core::{sanitize_identity, SklConfig};

/// Maps any path inside a project to the project root.
pub trait ProjectRootResolver: Send + Sync {
    fn project_root(&self, path: &Path) -> PathBuf;
}

/// Resolves to the enclosing git checkout.
///
/// Linked worktrees resolve to the primary checkout, so every worktree of a
/// repository shares one skill store. Without any `.git` the start
/// directory is the root.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitRootResolver;

impl ProjectRootResolver for GitRootResolver {
    fn project_root(&self, path: &Path) -> PathBuf {
        let start = if path.is_file() {
            path.parent().unwrap_or(path)
        } else {
            path
        };

        for dir in start.ancestors() {
            let dot_git = dir.join(".git");
            if dot_git.is_dir() {
                return dir.to_path_buf();
            }
            if dot_git.is_file() {
                return primary_checkout(dir, &dot_git).unwrap_or_else(|| dir.to_path_buf());
            }
        }

        start.to_path_buf()
    }
}

/// Follow a `.git` file (`gitdir: ...`) of a linked worktree back to the
/// main checkout. Submodules have no `commondir` and return `None`.
fn primary_checkout(dir: &Path, dot_git: &Path) -> Option<PathBuf> {
    let pointer = std::fs::read_to_string(dot_git).ok()?;
    let gitdir = pointer.trim().strip_prefix("gitdir:")?.trim();
    let gitdir = dir.join(gitdir);

    let common = std::fs::read_to_string(gitdir.join("commondir")).ok()?;
    let common = gitdir.join(common.trim());
    let common = std::fs::canonicalize(&common).unwrap_or(common);

    common.parent().map(Path::to_path_buf)
}

/// Fixed root, for callers that already know it.
#[derive(Debug, Clone)]
pub struct FixedRoot(pub PathBuf);

impl ProjectRootResolver for FixedRoot {
    fn project_root(&self, _path: &Path) -> PathBuf {
        self.0.clone()
    }
}

/// Project identity: the config override, else the root directory name,
/// sanitized to `[a-z0-9-]`.
#[must_use]
pub fn project_skill_name(project_root: &Path, config: &SklConfig) -> String {
    if let Some(name) = config.project_name.as_deref() {
        return sanitize_identity(name);
    }
    let dir_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_identity(&dir_name)
}
