//! Confines archive member names to an extraction root (zip-slip prevention).
//!
//! Everything here is pure string and path arithmetic: nothing touches the
//! filesystem, so the same name and root always give the same answer.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::entry::ArchiveMember;
use crate::error::{Error, Result};

/// Result of sanitizing an archive member name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    pub original: String,
    /// Normalized path relative to the root. Empty when the name resolves to the root.
    pub relative: PathBuf,
    pub resolved: PathBuf,
}

/// Sanitize a member, rejecting symlinks before looking at the name.
pub fn sanitize_member(member: &ArchiveMember, base: &Path) -> Result<SanitizedPath> {
    if member.is_symlink {
        return Err(Error::Symlink {
            entry: member.name.clone(),
        });
    }
    sanitize_path(&member.name, base)
}

/// Resolve `entry` against `base`, rejecting anything that could land outside it.
///
/// Both `/` and `\` are treated as separators.
pub fn sanitize_path(entry: &str, base: &Path) -> Result<SanitizedPath> {
    if entry.is_empty() || entry.contains('\0') {
        return Err(Error::InvalidPath {
            entry: entry.to_owned(),
        });
    }

    if is_absolute(entry) {
        return Err(Error::AbsolutePath {
            entry: entry.to_owned(),
        });
    }

    let segments = normalize(entry);
    if segments.contains(&"..") {
        let mut resolved = base.to_path_buf();
        resolved.extend(&segments);
        return Err(Error::ZipSlip {
            entry: entry.to_owned(),
            resolved,
        });
    }

    let relative: PathBuf = segments.iter().collect();
    let resolved = base.join(&relative);
    if !is_within(base, &resolved) {
        return Err(Error::ZipSlip {
            entry: entry.to_owned(),
            resolved,
        });
    }

    Ok(SanitizedPath {
        original: entry.to_owned(),
        relative,
        resolved,
    })
}

/// Leading separator, or a drive prefix such as `C:`.
fn is_absolute(entry: &str) -> bool {
    let bytes = entry.as_bytes();
    matches!(bytes.first(), Some(b'/' | b'\\'))
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Collapse `.` and `..`. A `..` that would climb above the start is kept,
/// so callers can see the escape attempt.
fn normalize(entry: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in entry.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// `candidate` is `base` itself or starts with `base` plus a separator.
///
/// Compared as strings so `/srv/root-evil` is never accepted for `/srv/root`.
fn is_within(base: &Path, candidate: &Path) -> bool {
    let base = base.to_string_lossy();
    let base = base.trim_end_matches(['/', MAIN_SEPARATOR]);
    let candidate = candidate.to_string_lossy();
    if candidate == base {
        return true;
    }
    candidate
        .strip_prefix(base)
        .is_some_and(|rest| rest.starts_with(['/', MAIN_SEPARATOR]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_base_path() -> &'static Path {
        if cfg!(windows) {
            Path::new("C:/srv/staging/req")
        } else {
            Path::new("/srv/staging/req")
        }
    }

    #[test]
    fn basic_path_sanitization() {
        let result = sanitize_path("css/site.css", test_base_path()).unwrap();
        assert_eq!(result.original, "css/site.css");
        assert_eq!(result.relative, Path::new("css/site.css"));
        assert!(result.resolved.starts_with(test_base_path()));
    }

    #[test]
    fn inner_parent_segments_collapse() {
        let result = sanitize_path("a/b/../c/./index.html", test_base_path()).unwrap();
        assert_eq!(result.relative, Path::new("a/c/index.html"));
    }

    #[test]
    fn name_resolving_to_root_is_accepted() {
        let result = sanitize_path("a/..", test_base_path()).unwrap();
        assert_eq!(result.relative, PathBuf::new());
        assert_eq!(result.resolved, test_base_path());
    }

    #[test]
    fn parent_traversal_rejected() {
        for name in ["../../etc/passwd", "..", "a/../../b", "..\\..\\win.ini"] {
            let result = sanitize_path(name, test_base_path());
            assert!(matches!(result, Err(Error::ZipSlip { .. })), "{name}");
        }
    }

    #[test]
    fn absolute_paths_rejected() {
        for name in ["/etc/passwd", "\\windows\\system32", "C:\\boot.ini", "c:/x"] {
            let result = sanitize_path(name, test_base_path());
            assert!(matches!(result, Err(Error::AbsolutePath { .. })), "{name}");
        }
    }

    #[test]
    fn empty_and_nul_rejected() {
        assert!(matches!(
            sanitize_path("", test_base_path()),
            Err(Error::InvalidPath { .. })
        ));
        assert!(matches!(
            sanitize_path("a\0b", test_base_path()),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn sibling_prefix_is_not_inside() {
        assert!(!is_within(Path::new("/srv/root"), Path::new("/srv/root-evil/x")));
        assert!(is_within(Path::new("/srv/root"), Path::new("/srv/root/x")));
        assert!(is_within(Path::new("/srv/root/"), Path::new("/srv/root/x")));
        assert!(is_within(Path::new("/srv/root"), Path::new("/srv/root")));
    }

    #[test]
    fn symlink_member_rejected() {
        let member = ArchiveMember::symlink("docs/link", "index.html");
        assert!(matches!(
            sanitize_member(&member, test_base_path()),
            Err(Error::Symlink { .. })
        ));
    }

    #[test]
    fn normalize_mixed_separators() {
        assert_eq!(normalize("foo//bar\\baz/../qux"), vec!["foo", "bar", "qux"]);
        assert_eq!(normalize("../a"), vec!["..", "a"]);
    }

    fn segment() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9._-]{1,6}",
            Just("..".to_string()),
            Just(".".to_string()),
            Just(String::new()),
            Just("C:".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn accepted_paths_stay_within_root(
            segments in prop::collection::vec(segment(), 1..8),
            sep in prop_oneof![Just("/"), Just("\\")],
            lead in prop_oneof![Just(""), Just("/"), Just("\\")],
        ) {
            let raw = format!("{lead}{}", segments.join(sep));
            if let Ok(sanitized) = sanitize_path(&raw, test_base_path()) {
                prop_assert!(sanitized.resolved.starts_with(test_base_path()));
                let escapes = sanitized.relative.components().any(|c| {
                    matches!(c, std::path::Component::ParentDir | std::path::Component::RootDir)
                });
                prop_assert!(!escapes);
            }
        }

        #[test]
        fn leading_traversal_always_rejected(rest in "[a-z/]{0,12}") {
            let raw = format!("../{rest}");
            prop_assert!(sanitize_path(&raw, test_base_path()).is_err());
        }

        #[test]
        fn arbitrary_input_never_panics(raw in "\\PC{0,40}") {
            let _ = sanitize_path(&raw, test_base_path());
        }
    }
}
