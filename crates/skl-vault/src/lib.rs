//! # skl-vault
//!
//! File-backed storage engine for module skills.
//!
//! The markdown files under `.opencode/` are the only state. Every
//! read-modify-write runs under a `.lock` sentinel in the document's
//! directory, which excludes concurrent tasks in one process and separate
//! processes alike.
//!
//! - [`LockManager`] and [`LockGuard`] ([`lock`])
//! - [`Vault`]: knowledge writer ([`writer`]), usage tracker ([`tracker`]),
//!   cleanup engine ([`cleanup`]) and status aggregation ([`status`])
//! - Project root resolution ([`project`]) and on-disk layout ([`layout`])
//! - [`SessionRegistry`] for host session state ([`session`])
//! - [`SkillWatcher`] for hand edits to the skills tree ([`watcher`])

pub mod cleanup;
pub mod clock;
pub mod layout;
pub mod lock;
pub mod project;
pub mod scan;
pub mod session;
pub mod status;
pub mod tracker;
pub mod vault;
pub mod watcher;
pub mod writer;

pub use cleanup::{CleanupFailure, CleanupReport, EligibleRecord, IndexFailure};
pub use clock::{Clock, ManualClock, SystemClock};
pub use layout::{should_track, VaultLayout};
pub use lock::{LockGuard, LockManager, LockStrategy};
pub use project::{project_skill_name, FixedRoot, GitRootResolver, ProjectRootResolver};
pub use scan::ModuleDocument;
pub use session::{ExtractionState, SessionRegistry};
pub use status::{DocumentUsage, LevelCounts, StatusReport};
pub use tracker::TrackOutcome;
pub use vault::Vault;
pub use watcher::{SkillEvent, SkillWatcher};
pub use writer::LearnOutcome;
