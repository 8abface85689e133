//! Cleanup engine: find and retire module skills nobody reads.
//!
//! Cleanup is two-phase. [`Vault::find_eligible`] is a read-only preview;
//! [`Vault::delete_eligible`] removes exactly the records it is handed and
//! then drops their index entries. A failed deletion, a locked modules
//! directory or an index that cannot be rewritten is reported and never
//! aborts the batch.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use skl_core::index::IndexKind;
use skl_core::{CleanupThresholds, SklError, UsageAges};

use crate::layout::MODULES_DIR;
use crate::scan;
use crate::vault::Vault;

/// A module skill that satisfies the eligibility predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibleRecord {
    pub project: String,
    pub name: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub ages: UsageAges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub name: String,
    pub path: PathBuf,
    pub error: String,
}

/// An index document that still lists deleted skills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFailure {
    pub index: PathBuf,
    pub error: String,
}

/// Outcome of a confirmed cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failed: Vec<CleanupFailure>,
    pub failed_indexes: Vec<IndexFailure>,
}

impl CleanupReport {
    fn fail(&mut self, record: &EligibleRecord, error: String) {
        self.failed.push(CleanupFailure {
            name: record.name.clone(),
            path: record.path.clone(),
            error,
        });
    }

    fn index_result(&mut self, index: PathBuf, result: Result<(), SklError>) {
        if let Err(e) = result {
            warn!(index = %index.display(), error = %e, "failed to drop cleaned up index entries");
            self.failed_indexes.push(IndexFailure {
                index,
                error: e.to_string(),
            });
        }
    }
}

impl Vault {
    /// Every module skill under the skills root that `thresholds` marks
    /// eligible. Documents without a usage block or a parseable
    /// `created_at` are skipped. Nothing is modified.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Io`] if the skills tree cannot be listed.
    pub async fn find_eligible(
        &self,
        thresholds: &CleanupThresholds,
    ) -> Result<Vec<EligibleRecord>, SklError> {
        let now = self.now();
        let records = scan::module_documents(self.layout.skills_root())
            .await?
            .into_iter()
            .filter_map(|doc| {
                let usage = doc.frontmatter.as_ref().and_then(|fm| fm.usage.as_ref());
                let ages = thresholds.evaluate(usage, now)?;
                Some(EligibleRecord {
                    project: doc.project,
                    name: doc.name,
                    path: doc.path,
                    ages,
                })
            })
            .collect();
        Ok(records)
    }

    /// Delete `records` and remove their entries from the owning project
    /// indexes and from this project's global index.
    ///
    /// A document that is already gone counts as deleted. Any other
    /// deletion failure, including a modules directory that stays locked,
    /// is reported in [`CleanupReport::failed`] and its index entry is
    /// kept. Index rewrites that fail land in
    /// [`CleanupReport::failed_indexes`].
    pub async fn delete_eligible(&self, records: &[EligibleRecord]) -> CleanupReport {
        let mut by_project: BTreeMap<&str, Vec<&EligibleRecord>> = BTreeMap::new();
        for record in records {
            by_project.entry(record.project.as_str()).or_default().push(record);
        }

        let mut report = CleanupReport::default();
        for (project, records) in by_project {
            let modules_dir = self.layout.skills_root().join(project).join(MODULES_DIR);

            let guard = match self.locks.acquire(&modules_dir).await {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(project, error = %e, "skipping project, modules directory is locked");
                    for record in records {
                        report.fail(record, e.to_string());
                    }
                    continue;
                }
            };
            let mut deleted = Vec::new();
            for record in records {
                match tokio::fs::remove_file(&record.path).await {
                    Ok(()) => deleted.push(record.name.clone()),
                    Err(e) if e.kind() == ErrorKind::NotFound => deleted.push(record.name.clone()),
                    Err(e) => {
                        warn!(path = %record.path.display(), error = %e, "failed to delete skill document");
                        report.fail(record, e.to_string());
                    }
                }
            }
            guard.release().await;

            let index = self.layout.project_index_of(project);
            let result = self
                .remove_entries_at(&index, IndexKind::Project, project, &deleted)
                .await;
            report.index_result(index, result);
            if project == self.project {
                let result = self.remove_index_entries(&deleted, IndexKind::Global).await;
                report.index_result(self.layout.index_path(IndexKind::Global), result);
            }

            info!(project, deleted = deleted.len(), "cleaned up module skills");
            report.deleted.extend(deleted);
        }

        report
    }
}
