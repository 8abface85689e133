//! Aggregate usage statistics over every module skill document.

use std::path::PathBuf;

use serde::Serialize;

use skl_core::{CleanupThresholds, SklError, UsageLevel};

use crate::scan;
use crate::vault::Vault;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl LevelCounts {
    fn add(&mut self, level: UsageLevel) {
        match level {
            UsageLevel::High => self.high += 1,
            UsageLevel::Medium => self.medium += 1,
            UsageLevel::Low => self.low += 1,
        }
    }
}

/// Per-document line of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentUsage {
    pub project: String,
    pub name: String,
    pub path: PathBuf,
    pub access_count: u64,
    pub level: UsageLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
    /// Whether the document carries a usage block at all.
    pub tracked: bool,
    pub eligible_for_cleanup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub project: String,
    pub total_documents: usize,
    pub total_accesses: u64,
    /// Documents without a usage block.
    pub untracked: usize,
    pub levels: LevelCounts,
    /// Documents read fewer than `min_access_count` times.
    pub low_frequency: usize,
    pub eligible_for_cleanup: usize,
    pub documents: Vec<DocumentUsage>,
}

impl Vault {
    /// Scan every module skill under the skills root and aggregate its
    /// usage. Untracked documents count as zero reads.
    ///
    /// # Errors
    ///
    /// Returns [`SklError::Io`] if the skills tree cannot be listed.
    pub async fn status(&self, thresholds: &CleanupThresholds) -> Result<StatusReport, SklError> {
        let now = self.now();
        let documents: Vec<DocumentUsage> = scan::module_documents(self.layout.skills_root())
            .await?
            .into_iter()
            .map(|doc| {
                let usage = doc.frontmatter.and_then(|fm| fm.usage);
                let access_count = usage.as_ref().map_or(0, |u| u.access_count());
                let eligible_for_cleanup = thresholds.evaluate(usage.as_ref(), now).is_some();
                DocumentUsage {
                    project: doc.project,
                    name: doc.name,
                    path: doc.path,
                    access_count,
                    level: UsageLevel::classify(access_count, thresholds.min_access_count),
                    tracked: usage.is_some(),
                    last_accessed: usage.and_then(|u| u.last_accessed),
                    eligible_for_cleanup,
                }
            })
            .collect();

        let mut levels = LevelCounts::default();
        for doc in &documents {
            levels.add(doc.level);
        }

        Ok(StatusReport {
            project: self.project.clone(),
            total_documents: documents.len(),
            total_accesses: documents.iter().map(|d| d.access_count).sum(),
            untracked: documents.iter().filter(|d| !d.tracked).count(),
            levels,
            low_frequency: documents
                .iter()
                .filter(|d| d.access_count < thresholds.min_access_count)
                .count(),
            eligible_for_cleanup: documents.iter().filter(|d| d.eligible_for_cleanup).count(),
            documents,
        })
    }
}
