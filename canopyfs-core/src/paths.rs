//! Path normalization and splitting helpers.
//!
//! The tree resolvers deliberately do not normalize their input; `fix_path`
//! is applied once at the registry boundary and everything below assumes the
//! result. Duplicate slashes, backslashes and trailing slashes are handled
//! here; `"./"` segments are additionally skipped per level by the resolvers
//! so that paths like `a/./b` survive the round trip.

/// Normalizes a caller-supplied path for tree resolution.
///
/// - backslashes become forward slashes
/// - leading `"./"` segments are dropped
/// - duplicate slashes collapse to one (a single leading slash survives,
///   addressing the root's empty-named child)
/// - trailing `"/"` and `"/."` are dropped
/// - a bare `"."` becomes the empty path (the tree root)
pub fn fix_path(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let mut rest = slashed.as_str();
    while let Some(r) = rest.strip_prefix("./") {
        rest = r;
    }

    let mut out = String::with_capacity(rest.len());
    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }

    loop {
        if let Some(stripped) = out.strip_suffix("/.") {
            out.truncate(stripped.len());
        } else if out.len() > 1 && out.ends_with('/') {
            out.truncate(out.len() - 1);
        } else {
            break;
        }
    }

    if out == "." {
        out.clear();
    }
    out
}

/// Everything before the last `/`, or the empty string for a bare name.
///
/// `"/name"` yields `"/"` so that absolute-style paths keep resolving
/// through the root's empty-named child.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

/// The last path segment (the bare file or directory name).
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Joins a parent path and a child name. The root's path is empty, so its
/// children carry their bare name as full path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_path_basic() {
        assert_eq!(fix_path("a/b/c.txt"), "a/b/c.txt");
        assert_eq!(fix_path("./a/b"), "a/b");
        assert_eq!(fix_path("././a"), "a");
        assert_eq!(fix_path("a\\b\\c"), "a/b/c");
    }

    #[test]
    fn test_fix_path_slashes() {
        assert_eq!(fix_path("a//b"), "a/b");
        assert_eq!(fix_path("a/b/"), "a/b");
        assert_eq!(fix_path("a/b//"), "a/b");
        assert_eq!(fix_path("//a"), "/a");
        assert_eq!(fix_path("/a/b"), "/a/b");
    }

    #[test]
    fn test_fix_path_degenerate() {
        assert_eq!(fix_path(""), "");
        assert_eq!(fix_path("."), "");
        assert_eq!(fix_path("./"), "");
        assert_eq!(fix_path("a/."), "a");
        assert_eq!(fix_path("a/./"), "a");
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_path("a/b/c.txt"), "a/b");
        assert_eq!(parent_path("c.txt"), "");
        assert_eq!(parent_path("/c.txt"), "/");
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(file_name("c.txt"), "c.txt");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b"), "a/b");
        assert_eq!(join("a/b", "c"), "a/b/c");
    }
}
