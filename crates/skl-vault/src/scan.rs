//! Full enumeration of module skill documents under a skills root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use skl_core::frontmatter::{self, Frontmatter};
use skl_core::SklError;

use crate::layout::MODULES_DIR;

/// A module skill document found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDocument {
    /// Project identity directory the document lives under.
    pub project: String,
    /// Skill name, taken from the file stem.
    pub name: String,
    pub path: PathBuf,
    /// `None` for documents without a frontmatter block.
    pub frontmatter: Option<Frontmatter>,
}

/// Read every `<skills_root>/<project>/modules/*.md`, sorted by project
/// then name. A missing skills root yields an empty list; unreadable
/// individual documents are skipped with a warning.
///
/// # Errors
///
/// Returns [`SklError::Io`] if a directory exists but cannot be listed.
pub async fn module_documents(skills_root: &Path) -> Result<Vec<ModuleDocument>, SklError> {
    let mut documents = Vec::new();

    let mut projects = match tokio::fs::read_dir(skills_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(documents),
        Err(e) => return Err(SklError::Io(e)),
    };

    while let Some(project) = projects.next_entry().await? {
        let Some(project_name) = project.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if project_name.starts_with('.') || !project.file_type().await?.is_dir() {
            continue;
        }

        let modules_dir = project.path().join(MODULES_DIR);
        let mut modules = match tokio::fs::read_dir(&modules_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(SklError::Io(e)),
        };

        while let Some(entry) = modules.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            match tokio::fs::read_to_string(&path).await {
                Ok(text) => documents.push(ModuleDocument {
                    project: project_name.clone(),
                    name,
                    frontmatter: frontmatter::parse(&text),
                    path,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable skill document"),
            }
        }
    }

    documents.sort_by(|a, b| (&a.project, &a.name).cmp(&(&b.project, &b.name)));
    Ok(documents)
}
