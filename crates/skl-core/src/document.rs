//! Skill document body model.
//!
//! A module skill body is rendered from a [`SkillContent`]:
//! ```markdown
//! # src-auth
//!
//! Session handling and token refresh
//!
//! ## Conventions
//!
//! Tokens are refreshed by the middleware, never by handlers.
//!
//! ## Related files
//!
//! - `src/auth/session.rs`
//! ```

use serde::{Deserialize, Serialize};

const RELATED_FILES_HEADING: &str = "Related files";

/// One `## heading` block of a skill body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
}

impl Section {
    #[must_use]
    pub fn new(heading: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
        }
    }
}

/// Knowledge handed to the writer for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillContent {
    pub description: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub related_files: Vec<String>,
}

/// How new content combines with an existing document body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// New content fully replaces the old body.
    #[default]
    Replace,
    /// Same-heading sections are replaced in place, other old sections are
    /// kept, new sections are appended and related files are unioned.
    Merge,
}

impl SkillContent {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_section(mut self, heading: impl Into<String>, content: impl Into<String>) -> Self {
        self.sections.push(Section::new(heading, content));
        self
    }

    #[must_use]
    pub fn with_related_file(mut self, path: impl Into<String>) -> Self {
        self.related_files.push(path.into());
        self
    }

    /// Render the markdown body for a skill named `name`.
    #[must_use]
    pub fn render_body(&self, name: &str) -> String {
        let mut out = format!("# {name}\n\n");
        let description = self.description.trim();
        if !description.is_empty() {
            out.push_str(description);
            out.push_str("\n\n");
        }

        for section in &self.sections {
            out.push_str("## ");
            out.push_str(section.heading.trim());
            out.push_str("\n\n");
            let content = section.content.trim();
            if !content.is_empty() {
                out.push_str(content);
                out.push_str("\n\n");
            }
        }

        if !self.related_files.is_empty() {
            out.push_str("## ");
            out.push_str(RELATED_FILES_HEADING);
            out.push_str("\n\n");
            for path in &self.related_files {
                out.push_str(&format!("- `{path}`\n"));
            }
            out.push('\n');
        }

        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        out.push('\n');
        out
    }

    /// Recover content from a body previously produced by [`render_body`].
    ///
    /// Text before the first `##` heading (other than the `#` title) is
    /// ignored; the description comes from frontmatter.
    ///
    /// [`render_body`]: SkillContent::render_body
    #[must_use]
    pub fn from_body(description: impl Into<String>, body: &str) -> Self {
        let mut content = Self::new(description);
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in body.lines() {
            if let Some(heading) = line.strip_prefix("## ") {
                flush_section(current.take(), &mut content);
                current = Some((heading.trim().to_string(), Vec::new()));
            } else if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }
        flush_section(current.take(), &mut content);

        content
    }

    /// Combine `self` (new) with `old` according to `mode`.
    #[must_use]
    pub fn merged_onto(self, old: Option<Self>, mode: WriteMode) -> Self {
        let Some(old) = old else {
            return self;
        };
        if mode == WriteMode::Replace {
            return self;
        }

        let mut sections = old.sections;
        for section in self.sections {
            match sections.iter_mut().find(|s| s.heading == section.heading) {
                Some(existing) => *existing = section,
                None => sections.push(section),
            }
        }

        let mut related_files = old.related_files;
        for path in self.related_files {
            if !related_files.contains(&path) {
                related_files.push(path);
            }
        }

        let description = if self.description.trim().is_empty() {
            old.description
        } else {
            self.description
        };

        Self {
            description,
            sections,
            related_files,
        }
    }
}

fn flush_section(current: Option<(String, Vec<&str>)>, content: &mut SkillContent) {
    let Some((heading, lines)) = current else {
        return;
    };
    if heading == RELATED_FILES_HEADING {
        content.related_files.extend(lines.iter().filter_map(|line| {
            let item = line.trim().strip_prefix("- ")?;
            Some(item.trim().trim_matches('`').to_string())
        }));
    } else {
        content
            .sections
            .push(Section::new(heading, lines.join("\n").trim().to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_content() -> SkillContent {
        SkillContent::new("Session handling and token refresh")
            .with_section("Conventions", "Tokens are refreshed by middleware.")
            .with_section("Pitfalls", "Never cache the refresh token.")
            .with_related_file("src/auth/session.rs")
    }

    #[test]
    fn render_body_lays_out_sections() {
        let body = auth_content().render_body("src-auth");
        assert!(body.starts_with("# src-auth\n\nSession handling and token refresh\n\n"));
        assert!(body.contains("## Conventions\n\nTokens are refreshed by middleware.\n\n"));
        assert!(body.ends_with("## Related files\n\n- `src/auth/session.rs`\n"));
    }

    #[test]
    fn from_body_recovers_sections_and_files() {
        let original = auth_content();
        let body = original.render_body("src-auth");
        let recovered = SkillContent::from_body(original.description.clone(), &body);
        assert_eq!(recovered, original);
    }

    #[test]
    fn from_body_tolerates_hand_written_text() {
        let body = "Some intro without headings.\n\n## Notes\n\nline one\nline two\n";
        let content = SkillContent::from_body("d", body);
        assert_eq!(content.sections, vec![Section::new("Notes", "line one\nline two")]);
        assert!(content.related_files.is_empty());
    }

    #[test]
    fn replace_mode_discards_old_body() {
        let new = SkillContent::new("new").with_section("Only", "this");
        let merged = new.clone().merged_onto(Some(auth_content()), WriteMode::Replace);
        assert_eq!(merged, new);
    }

    #[test]
    fn merge_mode_replaces_same_heading_in_place() {
        let new = SkillContent::new("")
            .with_section("Conventions", "Updated convention.")
            .with_section("Testing", "Use the fake clock.")
            .with_related_file("src/auth/session.rs")
            .with_related_file("src/auth/token.rs");
        let merged = new.merged_onto(Some(auth_content()), WriteMode::Merge);

        assert_eq!(merged.description, "Session handling and token refresh");
        let headings: Vec<&str> = merged.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Conventions", "Pitfalls", "Testing"]);
        assert_eq!(merged.sections[0].content, "Updated convention.");
        assert_eq!(
            merged.related_files,
            vec!["src/auth/session.rs", "src/auth/token.rs"]
        );
    }
}
