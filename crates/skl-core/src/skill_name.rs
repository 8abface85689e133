//! Skill-name normalization and module bucketing.
//!
//! Every module skill lives at `modules/<to_skill_name(module)>.md`. The
//! same function is used when writing a document and when re-deriving its
//! location later, so it must stay a pure function of its input.

use std::path::{Component, Path};

/// Module path of the project root.
pub const ROOT_MODULE: &str = ".";

/// Skill name used for the project-root module.
pub const ROOT_SKILL_NAME: &str = "project-root";

/// Maximum length of a skill name or project identity.
pub const MAX_NAME_LEN: usize = 64;

/// Directory names that never form a module of their own.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    "vendor",
    ".git",
    ".svn",
    ".hg",
    ".opencode",
    ".vscode",
    ".idea",
    ".next",
    ".cache",
    "__pycache__",
];

/// Map a module path to a canonical, filename-safe skill identifier.
///
/// `"src/auth"` becomes `"src-auth"` and `"."` becomes `"project-root"`.
/// Input that strips down to nothing also maps to `"project-root"`.
#[must_use]
pub fn to_skill_name(module_path: &str) -> String {
    if module_path == ROOT_MODULE {
        return ROOT_SKILL_NAME.to_string();
    }

    let mut name: String = module_path
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    name.truncate(MAX_NAME_LEN);

    if name.is_empty() {
        ROOT_SKILL_NAME.to_string()
    } else {
        name
    }
}

/// Sanitize a project identity to the `[a-z0-9-]` charset.
///
/// Unlike [`to_skill_name`], disallowed characters become hyphens, runs of
/// hyphens collapse and edge hyphens are trimmed.
#[must_use]
pub fn sanitize_identity(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let mut out = out.trim_matches('-').to_string();
    out.truncate(MAX_NAME_LEN);
    let out = out.trim_end_matches('-').to_string();

    if out.is_empty() {
        "project".to_string()
    } else {
        out
    }
}

/// Derive the module bucket for a file that triggered extraction.
///
/// The module is the first one or two directory levels of the file's
/// parent, relative to `project_root`, joined with `/`. Files at the root,
/// outside the root, or under an [`EXCLUDED_DIRS`] entry map to
/// [`ROOT_MODULE`].
#[must_use]
pub fn module_path(project_root: &Path, file: &Path) -> String {
    let relative = if file.is_absolute() {
        match file.strip_prefix(project_root) {
            Ok(rel) => rel,
            Err(_) => return ROOT_MODULE.to_string(),
        }
    } else {
        file
    };

    let Some(parent) = relative.parent() else {
        return ROOT_MODULE.to_string();
    };

    let mut parts = Vec::new();
    for component in parent.components() {
        match component {
            Component::Normal(part) => {
                let Some(part) = part.to_str() else {
                    return ROOT_MODULE.to_string();
                };
                if EXCLUDED_DIRS.contains(&part) {
                    return ROOT_MODULE.to_string();
                }
                parts.push(part);
            }
            Component::CurDir => {}
            _ => return ROOT_MODULE.to_string(),
        }
    }

    if parts.is_empty() {
        return ROOT_MODULE.to_string();
    }
    parts.truncate(2);
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    // === to_skill_name ===

    #[test]
    fn nested_module_becomes_hyphenated() {
        assert_eq!(to_skill_name("src/auth"), "src-auth");
        assert_eq!(to_skill_name("packages\\web"), "packages-web");
    }

    #[test]
    fn root_module_has_sentinel_name() {
        assert_eq!(to_skill_name("."), "project-root");
        assert_eq!(to_skill_name("@@@"), "project-root");
    }

    #[test]
    fn disallowed_characters_are_stripped_after_case_folding() {
        assert_eq!(to_skill_name("Src/Auth_Flow"), "src-authflow");
        assert_eq!(to_skill_name("lib/ünïcode"), "lib-ncode");
        assert_eq!(to_skill_name("app/v2.1"), "app-v21");
    }

    #[test]
    fn long_names_truncate_to_64() {
        let long = "a".repeat(50) + "/" + &"b".repeat(50);
        let name = to_skill_name(&long);
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert!(name.starts_with(&"a".repeat(50)));
    }

    proptest! {
        #[test]
        fn skill_name_is_deterministic_and_safe(path in "\\PC{0,100}") {
            let a = to_skill_name(&path);
            let b = to_skill_name(&path);
            prop_assert_eq!(&a, &b);
            prop_assert!(!a.is_empty());
            prop_assert!(a.len() <= MAX_NAME_LEN);
            prop_assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }

    // === sanitize_identity ===

    #[test]
    fn identity_is_sanitized() {
        assert_eq!(sanitize_identity("My App!"), "my-app");
        assert_eq!(sanitize_identity("--web__client--"), "web-client");
        assert_eq!(sanitize_identity("???"), "project");
        assert_eq!(sanitize_identity(&"x".repeat(80)).len(), MAX_NAME_LEN);
    }

    // === module_path ===

    #[test]
    fn module_is_first_two_directory_levels() {
        let root = PathBuf::from("/repo");
        assert_eq!(
            module_path(&root, Path::new("/repo/src/auth/handlers/login.rs")),
            "src/auth"
        );
        assert_eq!(module_path(&root, Path::new("/repo/src/main.rs")), "src");
        assert_eq!(module_path(&root, Path::new("src/auth/mod.rs")), "src/auth");
    }

    #[test]
    fn root_files_map_to_root_module() {
        let root = PathBuf::from("/repo");
        assert_eq!(module_path(&root, Path::new("/repo/Cargo.toml")), ".");
        assert_eq!(module_path(&root, Path::new("README.md")), ".");
        assert_eq!(module_path(&root, Path::new("./README.md")), ".");
    }

    #[test]
    fn excluded_and_foreign_paths_map_to_root_module() {
        let root = PathBuf::from("/repo");
        assert_eq!(
            module_path(&root, Path::new("/repo/node_modules/react/index.js")),
            "."
        );
        assert_eq!(module_path(&root, Path::new("/repo/.git/config")), ".");
        assert_eq!(
            module_path(&root, Path::new("/repo/packages/dist/bundle.js")),
            "."
        );
        assert_eq!(module_path(&root, Path::new("/elsewhere/src/lib.rs")), ".");
        assert_eq!(module_path(&root, Path::new("../other/src/lib.rs")), ".");
    }
}
