//! Slash-delimited remote paths
//!
//! Remote paths are rooted at [`ROOT`]. A path without a leading slash is interpreted relative
//! to the root as well, there is no notion of a current remote directory.

pub const ROOT: &str = "/";

/// Canonical form: leading slash, no empty segments, no trailing slash.
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("{}{}", ROOT, segments.join("/"))
}

/// Splits `path` at the last separator into `(parent, leaf)`.
///
/// # Examples
///
/// ```
/// assert_eq!(
///     common::path::split("/backup/report.txt"),
///     ("/backup".to_string(), "report.txt".to_string())
/// );
/// assert_eq!(
///     common::path::split("report.txt"),
///     ("/".to_string(), "report.txt".to_string())
/// );
/// ```
pub fn split(path: &str) -> (String, String) {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) => (ROOT.to_string(), path[1..].to_string()),
        Some(pos) => (path[..pos].to_string(), path[pos + 1..].to_string()),
        None => (ROOT.to_string(), path),
    }
}

/// Destination path of a child named `name` under `base`.
pub fn join(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_basic() {
        assert_eq!(split("/a/b/c"), ("/a/b".to_string(), "c".to_string()));
        assert_eq!(split("/a"), ("/".to_string(), "a".to_string()));
        assert_eq!(split("a"), ("/".to_string(), "a".to_string()));
        assert_eq!(split("a/b/"), ("/a".to_string(), "b".to_string()));
        assert_eq!(split("//a//b"), ("/a".to_string(), "b".to_string()));
    }

    #[test]
    fn split_root() {
        assert_eq!(split("/"), ("/".to_string(), String::new()));
        assert_eq!(split(""), ("/".to_string(), String::new()));
    }

    #[test]
    fn join_basic() {
        assert_eq!(join("/archive/proj", "a.txt"), "/archive/proj/a.txt");
        assert_eq!(join("/", "a.txt"), "/a.txt");
        assert_eq!(join("/archive/", "a.txt"), "/archive/a.txt");
    }

    proptest! {
        #[test]
        fn split_then_join_is_normalized(segments in prop::collection::vec("[a-z0-9. ]{1,8}", 1..6)) {
            let path = segments.join("/");
            let (parent, leaf) = split(&path);
            prop_assert_eq!(&leaf, segments.last().unwrap());
            prop_assert_eq!(join(&parent, &leaf), normalize(&path));
        }
    }
}
