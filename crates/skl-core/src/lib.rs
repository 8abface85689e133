//! # skl-core
//!
//! Core types for the skl module-skill knowledge store.
//!
//! This crate holds everything that does not touch the filesystem
//! concurrently:
//! - [`Frontmatter`] and [`UsageMetadata`] with the two-level codec ([`frontmatter`])
//! - [`SkillContent`] and body rendering ([`document`])
//! - Skill-name normalization and module bucketing ([`skill_name`])
//! - Index-document editing ([`index`])
//! - Usage levels and the cleanup predicate ([`usage`])
//! - [`SklConfig`] loaded from `.opencode/skill-learner.toml` ([`config`])
//! - Error hierarchy ([`SklError`])

pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod index;
pub mod skill_name;
pub mod usage;

pub use config::SklConfig;
pub use document::{Section, SkillContent, WriteMode};
pub use error::{Result, SklError};
pub use frontmatter::{Frontmatter, UsageMetadata};
pub use index::{IndexEntry, IndexKind};
pub use skill_name::{module_path, sanitize_identity, to_skill_name, ROOT_MODULE, ROOT_SKILL_NAME};
pub use usage::{CleanupThresholds, UsageAges, UsageLevel};
