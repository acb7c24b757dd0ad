//! Content signatures for server-side and script payloads hidden in static assets.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::ArchiveMember;
use crate::error::{Error, Result};

struct Signature {
    label: &'static str,
    pattern: Regex,
}

fn signature(label: &'static str, pattern: &str) -> Signature {
    Signature {
        label,
        pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid signature {label}: {e}")),
    }
}

// `regex` compiles to finite automata, so matching is linear in content length.
static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(|| {
    vec![
        signature("server-side open tag", r"(?i)<\?(php|=)"),
        signature("template execution tag", r"<%.*%>"),
        signature("remote script include", r"(?i)<script[^>]*src=[^>]*http"),
        signature("dynamic code execution", r"(?i)\b(eval|exec|system)\s*\("),
    ]
});

const MARKUP_EXTENSIONS: &[&str] = &[".html", ".htm"];

/// Check one member's decoded text. Markup files get a dedicated reason for PHP tags.
pub fn scan_content(name: &str, content: &str) -> Result<()> {
    let lower_name = name.to_ascii_lowercase();
    if MARKUP_EXTENSIONS.iter().any(|ext| lower_name.ends_with(ext))
        && content.to_ascii_lowercase().contains("<?php")
    {
        return Err(Error::DangerousContent {
            entry: name.to_owned(),
            reason: "PHP code not allowed in HTML files".to_owned(),
        });
    }

    if let Some(sig) = SIGNATURES.iter().find(|s| s.pattern.is_match(content)) {
        tracing::debug!(entry = name, signature = sig.label, "content signature matched");
        return Err(Error::DangerousContent {
            entry: name.to_owned(),
            reason: format!("Potentially dangerous content detected in {name}"),
        });
    }

    Ok(())
}

/// Scan every eligible member, returning all rejections in archive order.
pub fn scan_members(members: &[ArchiveMember]) -> Vec<Error> {
    members
        .iter()
        .filter(|m| m.is_eligible() && !m.is_symlink)
        .filter_map(|m| scan_content(&m.name, &m.text()).err())
        .collect()
}
