//! Path admission against an immutable allow-set.
//!
//! A candidate path is admitted iff its lexically normalized form equals one
//! of the allow-roots or sits strictly below one. Normalization resolves
//! `.`/`..` segments before matching, so `/a/../etc/passwd` is judged as
//! `/etc/passwd`. Symlinks are not resolved; an `open` that escapes through
//! a link inside an allow-root is out of scope here.

/// An ordered set of absolute allow-roots, normalized at construction and
/// immutable afterwards.
#[derive(Clone, Debug)]
pub struct PathPolicy {
    roots: Vec<String>,
}

impl PathPolicy {
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roots = roots
            .into_iter()
            .map(|root| normalize(root.as_ref()))
            .collect();
        Self { roots }
    }

    /// Admits `path` iff its normalized form equals a root or has a root as
    /// a strict directory prefix. Empty and non-absolute paths are denied.
    pub fn admit(&self, path: &str) -> bool {
        if path.is_empty() || !path.starts_with('/') {
            return false;
        }
        let path = normalize(path);
        self.roots.iter().any(|root| {
            root == "/" || path == *root || path.starts_with(&format!("{root}/"))
        })
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Lexical normalization: collapses repeated separators, drops `.` segments,
/// resolves `..` against the parent (never above the filesystem root), and
/// strips the trailing slash except for the root itself.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            segment => parts.push(segment),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_and_denies() {
        let cases = [
            ("/app/file.txt", vec!["/app"], true),
            ("/tmp/file.txt", vec!["/app"], false),
            ("/app/../etc/passwd", vec!["/app"], false),
            ("/app/sub/file.txt", vec!["/app"], true),
            ("/app", vec!["/app"], true),
            ("/appfile", vec!["/app"], false),
            ("/anything/at/all", vec!["/"], true),
            ("/etc/passwd", vec![], false),
            ("", vec!["/"], false),
            ("relative/path", vec!["/"], false),
        ];
        for (path, roots, expected) in cases {
            let policy = PathPolicy::new(roots.iter());
            assert_eq!(
                policy.admit(path),
                expected,
                "admit({path:?}, {roots:?})"
            );
        }
    }

    #[test]
    fn normalizes_before_matching() {
        let policy = PathPolicy::new(["/a"]);
        assert!(!policy.admit("/a/../etc/passwd"));
        assert!(policy.admit("/a/./b/../c"));
        assert!(policy.admit("//a///b"));
    }

    #[test]
    fn roots_are_normalized_at_construction() {
        let policy = PathPolicy::new(["/app/", "/var/log/../run"]);
        assert_eq!(policy.roots(), ["/app", "/var/run"]);
        assert!(policy.admit("/var/run/secrets"));
        assert!(!policy.admit("/var/log/syslog"));
    }

    #[test]
    fn dotdot_stops_at_root() {
        assert_eq!(normalize("/../../etc"), "/etc");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn prefix_match_requires_separator() {
        let policy = PathPolicy::new(["/app"]);
        assert!(policy.admit("/app/file"));
        assert!(!policy.admit("/appfile"));
    }
}
