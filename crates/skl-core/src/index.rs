//! Index documents: one-line summaries of skill documents keyed by name.
//!
//! Entries have the exact shape:
//! ```markdown
//! ### src-auth
//! Session handling and token refresh
//! - **Location**: `modules/src-auth.md`
//! ```
//!
//! An entry spans from its `### <name>` heading line to the next heading of
//! level one to three, or the end of the document. Edits are scoped to that
//! range so unrelated entries and hand-written prose survive. New entries go
//! after the last existing entry, or at the end of the section that follows
//! the template marker, never into trailing prose.
//!
//! A description that would read as a heading or a location line is
//! written with a leading `\`, which [`parse_entries`] strips again.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Marker line that identifies a document seeded from one of our templates.
pub const INDEX_MARKER: &str = "<!-- skl:index -->";

const LOCATION_PREFIX: &str = "- **Location**: ";

/// Which index document an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// `<skills>/<project>/SKILL.md`, read by the host's skill discovery.
    Project,
    /// `<knowledge>/KNOWLEDGE.md`, the project-wide landing page.
    Global,
}

impl IndexKind {
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Project => "SKILL.md",
            Self::Global => "KNOWLEDGE.md",
        }
    }

    /// Fresh document text for this index.
    #[must_use]
    pub fn template(self, project: &str) -> String {
        match self {
            Self::Project => format!(
                "---\n\
                 name: {project}\n\
                 description: Module knowledge learned for {project}. Read the module skill matching the files you are working on.\n\
                 ---\n\
                 \n\
                 # {project}\n\
                 \n\
                 Knowledge distilled from previous coding sessions, one skill per module.\n\
                 \n\
                 {INDEX_MARKER}\n\
                 \n\
                 ## Modules\n"
            ),
            Self::Global => format!(
                "# Project Knowledge\n\
                 \n\
                 Landing page for knowledge learned in {project}. Each entry points at a skill document.\n\
                 \n\
                 {INDEX_MARKER}\n\
                 \n\
                 ## Skills\n"
            ),
        }
    }
}

/// One summary line in an index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub description: String,
    pub location: String,
}

impl IndexEntry {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            location: location.into(),
        }
    }

    /// Render the entry block, ending in a newline.
    #[must_use]
    pub fn render(&self) -> String {
        let mut description = self.description.split_whitespace().collect::<Vec<_>>().join(" ");
        if description.starts_with(['#', '\\']) || description.starts_with(LOCATION_PREFIX.trim_end()) {
            description.insert(0, '\\');
        }
        format!(
            "### {}\n{}\n{LOCATION_PREFIX}`{}`\n",
            self.name, description, self.location
        )
    }
}

/// Whether `text` was seeded from a template and can be edited in place.
#[must_use]
pub fn is_well_formed(text: &str) -> bool {
    text.lines().any(|line| line.trim() == INDEX_MARKER)
}

/// Return `existing` if it is well formed, otherwise a fresh template that
/// carries over every entry parseable from `existing`.
#[must_use]
pub fn ensure_template(existing: Option<&str>, kind: IndexKind, project: &str) -> String {
    match existing {
        Some(text) if is_well_formed(text) => text.to_string(),
        Some(text) => parse_entries(text)
            .iter()
            .fold(kind.template(project), |doc, entry| upsert_entry(&doc, entry)),
        None => kind.template(project),
    }
}

/// `#`, `##` or `###` followed by a space.
fn is_section_heading(line: &str) -> bool {
    let hashes = line.len() - line.trim_start_matches('#').len();
    (1..=3).contains(&hashes) && line[hashes..].starts_with(' ')
}

fn find_entry(text: &str, name: &str) -> Option<Range<usize>> {
    let heading = format!("### {name}");
    let mut offset = 0;
    let mut start = None;

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\r', '\n']);
        match start {
            Some(s) if is_section_heading(bare) => return Some(s..offset),
            None if bare.trim_end() == heading => start = Some(offset),
            _ => {}
        }
        offset += line.len();
    }

    start.map(|s| s..text.len())
}

/// Byte offset where a new entry is inserted.
fn insertion_point(text: &str) -> usize {
    let mut offset = 0;
    let mut after_marker = false;
    let mut in_entries = false;
    let mut section_end = None;

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\r', '\n']);
        if bare.trim() == INDEX_MARKER {
            after_marker = true;
        } else if bare.starts_with("### ") {
            in_entries = true;
            section_end = None;
        } else if is_section_heading(bare) {
            if in_entries {
                section_end.get_or_insert(offset);
                in_entries = false;
            } else if after_marker && !bare.starts_with("# ") {
                // First section after the marker holds the entries.
                after_marker = false;
                in_entries = true;
            }
        }
        offset += line.len();
    }

    section_end.unwrap_or(text.len())
}

/// Insert `entry`, replacing an existing entry with the same name in place.
#[must_use]
pub fn upsert_entry(text: &str, entry: &IndexEntry) -> String {
    let block = entry.render();

    if let Some(range) = find_entry(text, &entry.name) {
        let mut out = String::with_capacity(text.len() + block.len());
        out.push_str(&text[..range.start]);
        out.push_str(&block);
        if range.end < text.len() {
            out.push('\n');
        }
        out.push_str(&text[range.end..]);
        return out;
    }

    let (head, tail) = text.split_at(insertion_point(text));
    let mut out = head.trim_end().to_string();
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(&block);
    let tail = tail.trim_start_matches(['\r', '\n']);
    if !tail.is_empty() {
        out.push('\n');
        out.push_str(tail);
    }
    out
}

/// Drop every entry whose name is in `names`.
#[must_use]
pub fn remove_entries<S: AsRef<str>>(text: &str, names: &[S]) -> String {
    let mut out = text.to_string();
    for name in names {
        while let Some(range) = find_entry(&out, name.as_ref()) {
            out.replace_range(range, "");
        }
    }
    if out != text && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Parse all entries of an index document in order of appearance.
#[must_use]
pub fn parse_entries(text: &str) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    let mut current: Option<IndexEntry> = None;

    for line in text.lines() {
        let line = line.trim_end();
        if let Some(name) = line.strip_prefix("### ") {
            entries.extend(current.take());
            current = Some(IndexEntry::new(name.trim(), "", ""));
            continue;
        }
        if is_section_heading(line) {
            entries.extend(current.take());
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        if let Some(location) = line.strip_prefix(LOCATION_PREFIX) {
            entry.location = location.trim().trim_matches('`').to_string();
        } else if entry.description.is_empty() && !line.trim().is_empty() && !line.starts_with('#')
        {
            let text = line.trim();
            entry.description = text.strip_prefix('\\').unwrap_or(text).to_string();
        }
    }
    entries.extend(current);

    entries
}
