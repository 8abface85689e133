//! skl CLI: per-module skill knowledge store for coding assistants
//!
//! Commands: status, cleanup, track, write, index, sync, module, watch,
//! config, completions. Every command except `config` and `completions`
//! prints JSON to stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use skl_core::frontmatter::format_timestamp;
use skl_core::{
    module_path, to_skill_name, CleanupThresholds, IndexEntry, IndexKind, SkillContent, WriteMode,
};
use skl_vault::{SkillEvent, SkillWatcher, Vault};

#[derive(Parser)]
#[command(name = "skl")]
#[command(version)]
#[command(about = "Per-module skill knowledge store for coding assistants")]
struct Cli {
    /// Any directory inside the project (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Usage statistics for every module skill
    Status {
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Preview (default) or delete module skills nobody reads
    Cleanup {
        /// Delete the eligible documents instead of listing them
        #[arg(long)]
        confirm: bool,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Record one read of a module skill document
    Track { path: PathBuf },
    /// Write a module skill and index it
    Write {
        /// Source file (bucketed to its module) or module path like `src/auth`
        target: String,
        #[arg(long)]
        description: String,
        /// Section as `Heading=Content`, repeatable
        #[arg(long = "section", value_name = "HEADING=CONTENT")]
        sections: Vec<String>,
        /// Related file path, repeatable
        #[arg(long = "related", value_name = "PATH")]
        related: Vec<String>,
        /// Keep existing sections not named in this write
        #[arg(long)]
        merge: bool,
        /// Markdown body to take sections and related files from
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
    /// Insert or replace one index entry
    Index {
        name: String,
        #[arg(long)]
        description: String,
        /// Defaults to the module skill location for `name`
        #[arg(long)]
        location: Option<String>,
        /// Edit the global knowledge index instead of the project index
        #[arg(long)]
        global: bool,
    },
    /// Rebuild the project index from module documents on disk
    Sync,
    /// Show the module bucket and skill name for a file
    Module { file: PathBuf },
    /// Rebuild the project index whenever module documents change
    Watch,
    /// Print the effective configuration as TOML
    Config,
    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

#[derive(clap::Args)]
struct ThresholdArgs {
    #[arg(long)]
    min_age_days: Option<i64>,
    #[arg(long)]
    min_access_count: Option<u64>,
    #[arg(long)]
    max_inactive_days: Option<i64>,
}

impl ThresholdArgs {
    /// Flags override the project config.
    fn resolve(&self, base: CleanupThresholds) -> CleanupThresholds {
        CleanupThresholds {
            min_age_days: self.min_age_days.unwrap_or(base.min_age_days),
            min_access_count: self.min_access_count.unwrap_or(base.min_access_count),
            max_inactive_days: self.max_inactive_days.unwrap_or(base.max_inactive_days),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn start_dir(root: Option<&Path>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root.to_path_buf()),
        None => std::env::current_dir().context("cannot read current directory"),
    }
}

/// Resolve a CLI path against the current directory.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn parse_section(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((heading, content)) if !heading.trim().is_empty() => {
            Ok((heading.trim().to_string(), content.replace("\\n", "\n")))
        }
        _ => bail!("invalid --section {raw:?}, expected HEADING=CONTENT"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "skl", &mut std::io::stdout());
        return Ok(());
    }

    let start = start_dir(cli.root.as_deref())?;
    let vault = Vault::open(&start)
        .with_context(|| format!("cannot open skill store for {}", start.display()))?;

    match cli.command {
        Commands::Status { thresholds } => {
            let thresholds = thresholds.resolve(vault.config().cleanup);
            let report = vault.status(&thresholds).await?;
            print_json(&json!({
                "generated_at": format_timestamp(Utc::now()),
                "thresholds": thresholds,
                "report": report,
            }))
        }
        Commands::Cleanup { confirm, thresholds } => {
            let thresholds = thresholds.resolve(vault.config().cleanup);
            let eligible = vault.find_eligible(&thresholds).await?;
            if !confirm {
                return print_json(&json!({
                    "mode": "preview",
                    "thresholds": thresholds,
                    "eligible": eligible,
                }));
            }
            let report = vault.delete_eligible(&eligible).await;
            info!(deleted = report.deleted.len(), failed = report.failed.len(), "cleanup finished");
            print_json(&json!({
                "mode": "confirm",
                "thresholds": thresholds,
                "eligible": eligible,
                "deleted": report.deleted,
                "failed": report.failed,
                "failed_indexes": report.failed_indexes,
            }))
        }
        Commands::Track { path } => {
            let path = absolute(&path)?;
            // Tracking never fails the caller.
            let result = match vault.try_track_access(&path).await {
                Ok(outcome) => serde_json::to_value(outcome)?,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to track skill access");
                    json!({ "outcome": "error", "error": e.to_string() })
                }
            };
            print_json(&result)
        }
        Commands::Write {
            target,
            description,
            sections,
            related,
            merge,
            body_file,
        } => {
            let mut content = match body_file {
                Some(file) => {
                    let body = std::fs::read_to_string(&file)
                        .with_context(|| format!("cannot read {}", file.display()))?;
                    SkillContent::from_body(description, &body)
                }
                None => SkillContent::new(description),
            };
            for raw in &sections {
                let (heading, text) = parse_section(raw)?;
                content = content.with_section(heading, text);
            }
            for path in related {
                content = content.with_related_file(path);
            }
            let mode = if merge { WriteMode::Merge } else { WriteMode::Replace };

            let file = absolute(Path::new(&target))?;
            let outcome = if file.is_file() {
                vault.learn_for_file(&file, content, mode).await?
            } else {
                vault.learn(&target, content, mode).await?
            };
            print_json(&outcome)
        }
        Commands::Index {
            name,
            description,
            location,
            global,
        } => {
            let kind = if global { IndexKind::Global } else { IndexKind::Project };
            let location = location.unwrap_or_else(|| vault.layout().entry_location(kind, &name));
            let entry = IndexEntry::new(name, description, location);
            let path = vault.update_index(&entry, kind).await?;
            print_json(&json!({ "index": path, "entry": entry }))
        }
        Commands::Sync => {
            let entries = vault.rebuild_index().await?;
            print_json(&json!({
                "index": vault.layout().index_path(IndexKind::Project),
                "entries": entries,
            }))
        }
        Commands::Module { file } => {
            let file = absolute(&file)?;
            let module = module_path(vault.layout().project_root(), &file);
            let name = to_skill_name(&module);
            print_json(&json!({
                "module": module,
                "name": name,
                "path": vault.layout().module_skill_path(&name),
            }))
        }
        Commands::Watch => watch(vault).await,
        Commands::Config => {
            print!("{}", vault.config().to_toml()?);
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

/// Block on the watcher from a worker thread and rebuild the index once per
/// burst of events.
async fn watch(vault: Vault) -> Result<()> {
    let watcher = SkillWatcher::start(vault.layout().skills_root())?;
    info!(root = %vault.layout().skills_root().display(), "watching module skills");
    let runtime = tokio::runtime::Handle::current();

    tokio::task::spawn_blocking(move || -> Result<()> {
        loop {
            let Some(first) = watcher.recv_timeout(Duration::from_secs(1)) else {
                continue;
            };
            std::thread::sleep(Duration::from_millis(200));
            let mut events = vec![first];
            events.extend(watcher.drain());

            let removed = events
                .iter()
                .filter(|e| matches!(e, SkillEvent::Removed(_)))
                .count();
            match runtime.block_on(vault.rebuild_index()) {
                Ok(entries) => print_json(&json!({
                    "events": events.len(),
                    "removed": removed,
                    "entries": entries,
                }))?,
                Err(e) => warn!(error = %e, "failed to rebuild index"),
            }
        }
    })
    .await?
}
