//! Two-level frontmatter parsing and writing.
//!
//! Handles the `---` delimited header of skill documents. The reader is
//! line-oriented and understands exactly one shape:
//! ```markdown
//! ---
//! name: src-auth
//! description: Session handling and token refresh
//! usage:
//!   created_at: 2025-02-10T09:15:00.000Z
//!   last_updated: 2025-02-11T10:00:00.000Z
//!   access_count: 3
//!   last_accessed: 2025-02-12T08:30:00.000Z
//! ---
//!
//! # src-auth
//! ```
//!
//! Nesting is marked by exactly two spaces of indentation and only the
//! `usage` key may have children. Anything else is ignored on read and
//! normalized away on write.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Parsed frontmatter of a skill or index document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frontmatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Absent until the document is first written by the knowledge writer
    /// or first read by the usage tracker. `Some(UsageMetadata::default())`
    /// is a distinct state from `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
}

/// The nested `usage:` block.
///
/// Timestamps are kept as the exact strings found in the file so that a
/// rewrite never reformats a value it did not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
}

impl Frontmatter {
    /// Frontmatter with identity fields and no usage block.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            usage: None,
        }
    }
}

impl UsageMetadata {
    /// Number of recorded reads. Missing counts as zero.
    #[must_use]
    pub fn access_count(&self) -> u64 {
        self.access_count.unwrap_or(0)
    }

    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    #[must_use]
    pub fn last_updated_utc(&self) -> Option<DateTime<Utc>> {
        self.last_updated.as_deref().and_then(parse_timestamp)
    }

    #[must_use]
    pub fn last_accessed_utc(&self) -> Option<DateTime<Utc>> {
        self.last_accessed.as_deref().and_then(parse_timestamp)
    }

    /// Bump the counter and stamp `last_accessed`. Returns the new count.
    pub fn record_access(&mut self, now: DateTime<Utc>) -> u64 {
        let count = self.access_count().saturating_add(1);
        self.access_count = Some(count);
        self.last_accessed = Some(format_timestamp(now));
        count
    }
}

/// Format a timestamp the way skill documents store it
/// (`2025-02-10T09:15:00.000Z`).
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp into UTC. Returns `None` on malformed input.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split a markdown file into the raw frontmatter block and the body.
///
/// The frontmatter is the text strictly between a leading `---` line and the
/// next `---` line. Returns `None` when that framing is absent, which is a
/// valid state for hand-authored documents.
#[must_use]
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let block = rest[..offset].trim_end_matches(['\r', '\n']);
            let body = &rest[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }

    None
}

/// Parse the frontmatter of a document. `None` means no frontmatter.
#[must_use]
pub fn parse(content: &str) -> Option<Frontmatter> {
    parse_document(content).map(|(fm, _)| fm)
}

/// Parse a document into frontmatter and body.
///
/// The single blank separator line written by [`serialize`] is stripped from
/// the returned body.
#[must_use]
pub fn parse_document(content: &str) -> Option<(Frontmatter, &str)> {
    let (block, body) = split_frontmatter(content)?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);
    Some((parse_block(block), body))
}

fn parse_block(block: &str) -> Frontmatter {
    let mut fm = Frontmatter::default();
    let mut in_usage = false;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(child) = line.strip_prefix("  ") {
            // Children of unsupported keys and deeper levels are dropped.
            if !in_usage || child.starts_with([' ', '\t']) {
                continue;
            }
            let Some((key, value)) = split_key_value(child) else {
                continue;
            };
            let usage = fm.usage.get_or_insert_with(UsageMetadata::default);
            match key {
                "created_at" => usage.created_at = Some(unquote(value)),
                "last_updated" => usage.last_updated = Some(unquote(value)),
                "last_accessed" => usage.last_accessed = Some(unquote(value)),
                "access_count" => {
                    usage.access_count = Some(unquote(value).trim().parse().unwrap_or(0));
                }
                _ => {}
            }
            continue;
        }

        in_usage = false;
        if line.starts_with([' ', '\t']) {
            continue;
        }
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        match key {
            "name" => fm.name = Some(unquote(value)),
            "description" => fm.description = Some(unquote(value)),
            "usage" if value.is_empty() => {
                in_usage = true;
                fm.usage.get_or_insert_with(UsageMetadata::default);
            }
            _ => {}
        }
    }

    fm
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }
    Some((key, value.trim()))
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return serde_json::from_str::<String>(value)
            .unwrap_or_else(|_| value[1..value.len() - 1].to_string());
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("''", "'");
    }
    value.to_string()
}

/// Characters that YAML readers reject or treat as line breaks.
fn is_yaml_unsafe(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}' | '\u{fffe}' | '\u{ffff}')
}

fn needs_quoting(value: &str) -> bool {
    if value.is_empty() || value != value.trim() {
        return true;
    }
    if value.chars().any(is_yaml_unsafe) {
        return true;
    }
    if value.starts_with([
        '"', '\'', '#', '&', '*', '!', '|', '>', '%', '@', '`', '[', ']', '{', '}', ',', '?', '-',
    ]) {
        return true;
    }
    if value.contains(": ") || value.contains(" #") || value.ends_with(':') {
        return true;
    }
    // Scalars YAML would type as something other than a string.
    let lower = value.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~"
    ) || value.parse::<f64>().is_ok()
}

/// Double-quoted scalar that is both a JSON string and a YAML string.
fn quote(value: &str) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""));
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if is_yaml_unsafe(c) {
            out.push_str(&format!("\\u{:04x}", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    out
}

fn push_field(out: &mut String, indent: &str, key: &str, value: &str) {
    out.push_str(indent);
    out.push_str(key);
    out.push_str(": ");
    if needs_quoting(value) {
        out.push_str(&quote(value));
    } else {
        out.push_str(value);
    }
    out.push('\n');
}

/// Write frontmatter and body as a complete document.
///
/// Field order is fixed (`name`, `description`, then `usage` with
/// `created_at`, `last_updated`, `access_count`, `last_accessed`); absent
/// fields are omitted.
#[must_use]
pub fn serialize(fm: &Frontmatter, body: &str) -> String {
    let mut output = String::with_capacity(body.len() + 256);
    output.push_str("---\n");

    if let Some(name) = &fm.name {
        push_field(&mut output, "", "name", name);
    }
    if let Some(description) = &fm.description {
        push_field(&mut output, "", "description", description);
    }
    if let Some(usage) = &fm.usage {
        output.push_str("usage:\n");
        if let Some(created_at) = &usage.created_at {
            push_field(&mut output, "  ", "created_at", created_at);
        }
        if let Some(last_updated) = &usage.last_updated {
            push_field(&mut output, "  ", "last_updated", last_updated);
        }
        if let Some(count) = usage.access_count {
            output.push_str(&format!("  access_count: {count}\n"));
        }
        if let Some(last_accessed) = &usage.last_accessed {
            push_field(&mut output, "  ", "last_accessed", last_accessed);
        }
    }

    output.push_str("---\n");
    if !body.is_empty() {
        output.push('\n');
        output.push_str(body);
        if !body.ends_with('\n') {
            output.push('\n');
        }
    }

    output
}
