//! Directory-listing match rule.
//!
//! A browse path lists its direct children only. Entries deeper down are
//! represented by the child component they live under, shown as a
//! directory, and reported once. Manifests sort `/` before every other
//! byte, so all entries under one child are consecutive and remembering the
//! last reported child is enough to suppress repeats.

use super::json::StatRecord;
use crate::manifest::ManifestEntry;
use crate::proto::Command;

/// Strip trailing `/`s so that `/home//` and `/home` list the same thing.
/// A path made only of slashes is the root.
pub fn normalize(browse: &str) -> &str {
    let trimmed = browse.trim_end_matches('/');
    if trimmed.is_empty() && !browse.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// The direct child of `dir` that `path` lies under, and whether `path` is
/// deeper than that child. `None` when `path` is outside `dir` or is `dir`
/// itself.
///
/// An empty `dir` lists the top-level roots: `/` for absolute paths, the
/// drive (`C:`) for drive-prefixed ones.
pub fn direct_child(dir: &str, path: &str) -> Option<(String, bool)> {
    if dir.is_empty() {
        return Some(match path.find('/') {
            Some(0) => ("/".to_string(), path != "/"),
            Some(i) => (path[..i].to_string(), true),
            None => (path.to_string(), false),
        });
    }

    let rest = path.strip_prefix(dir)?;
    let rest = if dir.ends_with('/') {
        rest
    } else if rest.is_empty() {
        return None;
    } else {
        rest.strip_prefix('/')?
    };

    let (component, deeper) = match rest.find('/') {
        Some(i) => (&rest[..i], true),
        None => (rest, false),
    };
    if component.is_empty() {
        return None;
    }

    let child = if dir.ends_with('/') {
        format!("{dir}{component}")
    } else {
        format!("{dir}/{component}")
    };
    Some((child, deeper))
}

/// Decide whether `entry` shows up when listing `dir`.
///
/// `last_match` carries the most recently reported child across the scan.
pub fn check_browsedir(
    dir: &str,
    entry: &ManifestEntry,
    last_match: &mut Option<String>,
) -> Option<StatRecord> {
    let (child, deeper) = direct_child(dir, &entry.path)?;
    if last_match.as_deref() == Some(child.as_str()) {
        return None;
    }

    let mut stat = entry.stat.clone();
    if deeper || entry.cmd == Command::Directory {
        stat.fake_directory();
    }
    *last_match = Some(child.clone());
    Some(StatRecord::new(child, stat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::fixtures::entry;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/home/"), "/home");
        assert_eq!(normalize("/home//"), "/home");
        assert_eq!(normalize("/home///"), "/home");
        assert_eq!(normalize("//"), "/");
        assert_eq!(normalize("C:/"), "C:");
        assert_eq!(normalize("/home"), "/home");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_direct_child() {
        assert_eq!(direct_child("/a", "/a"), None);
        assert_eq!(direct_child("/a", "/a/b"), Some(("/a/b".into(), false)));
        assert_eq!(direct_child("/a", "/a/b/c"), Some(("/a/b".into(), true)));
        assert_eq!(direct_child("/a", "/ab"), None);
        assert_eq!(direct_child("/a", "/c"), None);
        assert_eq!(direct_child("/", "/"), None);
        assert_eq!(direct_child("/", "/etc"), Some(("/etc".into(), false)));
        assert_eq!(direct_child("/", "/etc/hosts"), Some(("/etc".into(), true)));
        assert_eq!(direct_child("C:", "C:/Users"), Some(("C:/Users".into(), false)));
    }

    #[test]
    fn test_direct_child_of_empty_lists_roots() {
        assert_eq!(direct_child("", "/"), Some(("/".into(), false)));
        assert_eq!(direct_child("", "/etc"), Some(("/".into(), true)));
        assert_eq!(direct_child("", "C:/Windows"), Some(("C:".into(), true)));
        assert_eq!(direct_child("", "C:"), Some(("C:".into(), false)));
    }

    #[test]
    fn test_deeper_entries_collapse_once() {
        let mut last = None;
        let file = entry(Command::File, "/a/b/c");
        let rec = check_browsedir("/a", &file, &mut last).unwrap();
        assert_eq!(rec.name, "/a/b");
        assert!(rec.stat.is_dir());
        assert_eq!(last.as_deref(), Some("/a/b"));

        let sibling = entry(Command::File, "/a/b/d");
        assert!(check_browsedir("/a", &sibling, &mut last).is_none());

        let next = entry(Command::File, "/a/c");
        let rec = check_browsedir("/a", &next, &mut last).unwrap();
        assert_eq!(rec.name, "/a/c");
        assert!(!rec.stat.is_dir());
    }

    #[test]
    fn test_non_matching_entries_leave_state_alone() {
        let mut last = Some("/a/b".to_string());
        assert!(check_browsedir("/a", &entry(Command::File, "/z"), &mut last).is_none());
        assert_eq!(last.as_deref(), Some("/a/b"));
    }
}
