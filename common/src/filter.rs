//! Hidden-name policy for directory traversal
//!
//! Children whose name matches one of the hidden patterns are never recursed into and never
//! show up in the destination tree.
//!
//! # Pattern Syntax
//!
//! Patterns are globs matched against a single entry name:
//!
//! - `*` matches anything
//! - `?` matches a single character
//! - `[...]` character classes
//! - Trailing `/` matches only directories
//!
//! # Examples
//!
//! ```
//! use common::filter::HiddenPolicy;
//!
//! let policy = HiddenPolicy::dot_files();
//! assert!(policy.is_hidden(".git", true).is_some());
//! assert!(policy.is_hidden("README.md", false).is_none());
//!
//! let policy = HiddenPolicy::include_all();
//! assert!(policy.is_hidden(".git", true).is_none());
//! ```

use anyhow::{anyhow, Context};

/// Default pattern, hides dot-files.
pub const DOT_FILES: &str = ".*";

/// A compiled hidden-name pattern with its original form
#[derive(Debug, Clone)]
pub struct HiddenPattern {
    /// original pattern string, reported when a child is skipped
    pub original: String,
    matcher: globset::GlobMatcher,
    /// pattern ends with / (matches only directories)
    pub dir_only: bool,
}

impl HiddenPattern {
    pub fn parse(pattern: &str) -> Result<Self, anyhow::Error> {
        if pattern.is_empty() {
            return Err(anyhow!("empty pattern is not allowed"));
        }
        let dir_only = pattern.ends_with('/');
        let pattern_str = pattern.trim_end_matches('/');
        if pattern_str.is_empty() {
            return Err(anyhow!(
                "pattern '{}' results in empty glob after stripping / markers",
                pattern
            ));
        }
        if pattern_str.contains('/') {
            return Err(anyhow!(
                "pattern '{}' must match a single name, not a path",
                pattern
            ));
        }
        let glob = globset::GlobBuilder::new(pattern_str)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {}", pattern))?;
        Ok(Self {
            original: pattern.to_string(),
            matcher: glob.compile_matcher(),
            dir_only,
        })
    }

    pub fn matches(&self, name: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        self.matcher.is_match(name)
    }
}

/// Which child names are skipped during traversal
#[derive(Debug, Clone, Default)]
pub struct HiddenPolicy {
    pub patterns: Vec<HiddenPattern>,
}

impl HiddenPolicy {
    /// Nothing is hidden.
    pub fn include_all() -> Self {
        Self::default()
    }

    /// Names starting with a dot are hidden.
    pub fn dot_files() -> Self {
        let mut policy = Self::default();
        // DOT_FILES is a valid glob
        if let Ok(pattern) = HiddenPattern::parse(DOT_FILES) {
            policy.patterns.push(pattern);
        }
        policy
    }

    pub fn add_pattern(&mut self, pattern: &str) -> Result<(), anyhow::Error> {
        self.patterns.push(HiddenPattern::parse(pattern)?);
        Ok(())
    }

    /// Returns the pattern hiding `name`, if any.
    pub fn is_hidden(&self, name: &str, is_dir: bool) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(name, is_dir))
            .map(|pattern| pattern.original.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_files_hidden() {
        let policy = HiddenPolicy::dot_files();
        assert_eq!(policy.is_hidden(".DS_Store", false), Some(".*"));
        assert_eq!(policy.is_hidden(".config", true), Some(".*"));
        assert_eq!(policy.is_hidden("a.txt", false), None);
        assert_eq!(policy.is_hidden("trailing.", false), None);
    }

    #[test]
    fn custom_patterns() -> Result<(), anyhow::Error> {
        let mut policy = HiddenPolicy::include_all();
        assert_eq!(policy.is_hidden(".git", true), None);
        policy.add_pattern("*.tmp")?;
        policy.add_pattern("cache/")?;
        assert_eq!(policy.is_hidden("x.tmp", false), Some("*.tmp"));
        assert_eq!(policy.is_hidden("cache", true), Some("cache/"));
        // dir-only pattern does not hide a file of the same name
        assert_eq!(policy.is_hidden("cache", false), None);
        assert_eq!(policy.is_hidden(".hidden", false), None);
        Ok(())
    }

    #[test]
    fn invalid_patterns() {
        assert!(HiddenPattern::parse("").is_err());
        assert!(HiddenPattern::parse("/").is_err());
        assert!(HiddenPattern::parse("a/b").is_err());
        assert!(HiddenPattern::parse("[").is_err());
    }
}
