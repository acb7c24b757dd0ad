//! Structural validation over the full member list.
//!
//! Validation is exhaustive: every violation is collected so the uploader gets
//! one complete diagnostic list instead of fixing problems one at a time.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::entry::ArchiveMember;
use crate::options::{ExtractOptions, MIB, Strictness};

/// Server-side, executable, script and database file types.
pub const DENYLIST: &[&str] = &[
    ".php", ".exe", ".py", ".sh", ".bat", ".cmd", ".dll", ".so", ".dylib", ".app", ".jar", ".war",
    ".ear", ".rb", ".pl", ".cgi", ".asp", ".aspx", ".jsp", ".sql", ".db", ".sqlite", ".mdb",
];

/// Static asset types served with a specific content type.
pub const ALLOWLIST: &[&str] = &[
    ".html", ".htm", ".css", ".js", ".json", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp",
    ".ico", ".woff", ".woff2", ".ttf", ".eot", ".otf", ".pdf", ".txt", ".md", ".xml", ".map",
];

pub const MISSING_INDEX_WARNING: &str =
    "No index.html found - users will see a directory listing or 404";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub has_index_entry: bool,
    pub file_count: usize,
    pub total_size: u64,
    /// Members dropped because of an unsafe name under [`Strictness::SkipMember`].
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Validate every member against the name, type and size rules.
pub fn validate_members(members: &[ArchiveMember], options: &ExtractOptions) -> ValidationResult {
    let mut result = ValidationResult::default();
    let eligible: Vec<&ArchiveMember> = members.iter().filter(|m| m.is_eligible()).collect();

    if eligible.is_empty() {
        result.errors.push("archive is empty".to_owned());
        return result;
    }
    result.file_count = eligible.len();

    let mut accepted: Vec<&str> = Vec::new();
    for member in eligible {
        let name = member.name.as_str();

        if has_unsafe_name(name) {
            if options.strictness == Strictness::SkipMember {
                tracing::warn!(entry = name, "skipping member with unsafe path");
                result.warnings.push(format!("Skipped unsafe path: {name}"));
                result.skipped.push(name.to_owned());
            } else {
                result.errors.push(format!("Invalid or disallowed file: {name}"));
            }
            continue;
        }
        if DENYLIST.contains(&file_extension(name).as_str()) {
            result.errors.push(format!("Invalid or disallowed file: {name}"));
            continue;
        }

        if is_index_entry(name) {
            result.has_index_entry = true;
        }

        if member.declared_size > options.max_file_size {
            result.errors.push(format!(
                "File too large: {name} (max {}MB per file)",
                options.max_file_size / MIB
            ));
            continue;
        }

        result.total_size = result.total_size.saturating_add(member.declared_size);
        accepted.push(name);
    }

    if accepted.is_empty() && !result.skipped.is_empty() && result.errors.is_empty() {
        result.errors.push("archive is empty".to_owned());
    }
    result.errors.extend(path_conflicts(&accepted));

    if !result.has_index_entry {
        result.warnings.push(MISSING_INDEX_WARNING.to_owned());
    }

    result.valid = result.errors.is_empty();
    result
}

/// Files whose name is also used as a directory by another member.
fn path_conflicts(names: &[&str]) -> Vec<String> {
    let files: HashSet<&str> = names.iter().map(|n| n.trim_start_matches("./")).collect();
    let mut conflicts = BTreeSet::new();
    for name in names {
        let name = name.trim_start_matches("./");
        for (i, _) in name.match_indices('/') {
            let parent = &name[..i];
            if files.contains(parent) {
                conflicts.insert(parent);
            }
        }
    }
    conflicts
        .into_iter()
        .map(|file| format!("Conflicting paths: {file} is both a file and a directory"))
        .collect()
}

fn has_unsafe_name(name: &str) -> bool {
    name.contains("..") || name.contains('\\')
}

fn is_index_entry(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "index.html" || lower.ends_with("/index.html")
}

/// Lowercased extension of the last path segment, including the dot. Empty when there is none.
pub fn file_extension(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.rfind('.')
        .map(|i| base[i..].to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_allowed_file_type(name: &str) -> bool {
    ALLOWLIST.contains(&file_extension(name).as_str())
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| compile(r"[^a-zA-Z0-9._/-]"));
static DOT_RUNS: Lazy<Regex> = Lazy::new(|| compile(r"\.{2,}"));
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| compile(r"-{2,}"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {pattern}: {e}"))
}

/// Replace characters outside `[A-Za-z0-9._/-]` with `-` and collapse runs of dots and dashes.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name, "-");
    let dots = DOT_RUNS.replace_all(&replaced, ".");
    DASH_RUNS.replace_all(&dots, "-").into_owned()
}
