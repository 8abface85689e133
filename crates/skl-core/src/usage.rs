//! Usage levels and the cleanup eligibility predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frontmatter::UsageMetadata;

const SECONDS_PER_DAY: i64 = 86_400;

/// Thresholds of the three-clause cleanup predicate.
///
/// A document is eligible when it is at least `min_age_days` old, has
/// fewer than `min_access_count` reads, and has not been read for at least
/// `max_inactive_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupThresholds {
    pub min_age_days: i64,
    pub min_access_count: u64,
    pub max_inactive_days: i64,
}

impl Default for CleanupThresholds {
    fn default() -> Self {
        Self {
            min_age_days: 60,
            min_access_count: 5,
            max_inactive_days: 60,
        }
    }
}

/// Whole-day ages derived from a usage block at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageAges {
    pub age_days: i64,
    pub inactive_days: i64,
    pub access_count: u64,
}

impl UsageAges {
    /// Compute ages, or `None` when `created_at` is missing or malformed.
    ///
    /// A document that was never read counts as inactive since creation.
    #[must_use]
    pub fn compute(usage: &UsageMetadata, now: DateTime<Utc>) -> Option<Self> {
        let created = usage.created_at_utc()?;
        let last_read = usage.last_accessed_utc().unwrap_or(created);
        Some(Self {
            age_days: whole_days(now - created),
            inactive_days: whole_days(now - last_read),
            access_count: usage.access_count(),
        })
    }
}

fn whole_days(elapsed: chrono::Duration) -> i64 {
    elapsed.num_seconds().div_euclid(SECONDS_PER_DAY)
}

impl CleanupThresholds {
    #[must_use]
    pub fn is_eligible(&self, ages: &UsageAges) -> bool {
        ages.age_days >= self.min_age_days
            && ages.access_count < self.min_access_count
            && ages.inactive_days >= self.max_inactive_days
    }

    /// Evaluate a usage block. `None` means not enough metadata to decide,
    /// which is never eligible.
    #[must_use]
    pub fn evaluate(&self, usage: Option<&UsageMetadata>, now: DateTime<Utc>) -> Option<UsageAges> {
        let ages = UsageAges::compute(usage?, now)?;
        self.is_eligible(&ages).then_some(ages)
    }
}

/// Access-frequency bucket used by status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    High,
    Medium,
    Low,
}

impl UsageLevel {
    /// High at twice the cleanup access floor, medium at the floor, low below.
    #[must_use]
    pub fn classify(access_count: u64, min_access_count: u64) -> Self {
        if access_count >= min_access_count.saturating_mul(2) {
            Self::High
        } else if access_count >= min_access_count {
            Self::Medium
        } else {
            Self::Low
        }
    }
}
