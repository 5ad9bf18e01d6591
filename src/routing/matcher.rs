//! Upstream URL matching.
//!
//! # Responsibilities
//! - Decide whether a URL string is an allowed GitHub-family upstream
//! - Enforce the operator's optional path-substring whitelist
//!
//! # Design Decisions
//! - Patterns compiled once into a `RegexSet`; a match is "any rule matches"
//! - Matching is case-insensitive and scheme-optional
//! - Pure: the same classifier is used at request entry and on every
//!   redirect hop

use regex::{RegexSet, RegexSetBuilder};

/// Allow-list shipped with the proxy.
pub const DEFAULT_PATTERNS: &[&str] = &[
    r"^(?:https?://)?raw\.(?:githubusercontent|github)\.com/[^/]+/[^/]+/[^/]+/.+$",
    r"^(?:https?://)?github\.com/[^/]+/[^/]+/(?:releases|archive)/.*$",
    r"^(?:https?://)?github\.com/[^/]+/[^/]+/tags.*$",
    r"^(?:https?://)?github\.com/[^/]+/[^/]+/(?:blob|raw)/.*$",
    r"^(?:https?://)?github\.com/[^/]+/[^/]+/(?:info|git-).*$",
    r"^(?:https?://)?gist\.(?:githubusercontent|github)\.com/[^/]+/[^/]+/.+$",
];

/// Compiled allow-list of upstream URL shapes.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    patterns: RegexSet,
}

impl UrlClassifier {
    /// Compile a pattern set. Patterns are matched case-insensitively.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { patterns })
    }

    /// The built-in GitHub allow-list.
    ///
    /// # Panics
    ///
    /// Panics if a default pattern fails to compile (compile-time invariant).
    pub fn github() -> Self {
        Self::new(DEFAULT_PATTERNS).expect("default upstream patterns must compile")
    }

    /// Returns true if `url` matches any allow-list rule.
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.is_match(url)
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::github()
    }
}

/// Operator-configured substrings a proxied target must contain.
#[derive(Debug, Clone, Default)]
pub struct WhiteList {
    entries: Vec<String>,
}

impl WhiteList {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// An empty whitelist permits every target.
    pub fn permits(&self, target: &str) -> bool {
        self.entries.is_empty() || self.entries.iter().any(|entry| target.contains(entry.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_allow_list() {
        let classifier = UrlClassifier::github();
        let cases = [
            ("raw.githubusercontent.com/a/b/main/f.txt", true),
            ("https://raw.githubusercontent.com/a/b/main/dir/f.txt", true),
            ("http://raw.github.com/a/b/main/f.txt", true),
            ("raw.githubusercontent.com/a/b/main", false),
            ("github.com/a/b/releases/v1", true),
            ("https://github.com/a/b/releases/download/v1/app.tar.gz", true),
            ("github.com/a/b/archive/refs/heads/main.zip", true),
            ("github.com/a/b/tags", true),
            ("github.com/a/b/tags/v1.0", true),
            ("https://github.com/a/b/blob/main/README.md", true),
            ("github.com/a/b/raw/main/f.txt", true),
            ("https://github.com/a/b/info/refs?service=git-upload-pack", true),
            ("https://github.com/a/b/git-upload-pack", true),
            ("gist.githubusercontent.com/u/abc123/raw/file.txt", true),
            ("https://gist.github.com/u/abc123/raw", true),
            ("github.com/a/b", false),
            ("github.com/a/b/issues/1", false),
            ("example.com/a/b/raw/f.txt", false),
            ("gitlab.com/a/b/raw/f.txt", false),
            ("https://evilgithub.com/a/b/raw/f.txt", false),
            ("https://example.com/?u=https://github.com/a/b/raw/f", false),
        ];

        for (url, expected) in cases {
            assert_eq!(classifier.matches(url), expected, "url: {}", url);
        }
    }

    #[test]
    fn test_case_insensitive() {
        let classifier = UrlClassifier::github();
        assert!(classifier.matches("HTTPS://GitHub.com/Octocat/Hello-World/RELEASES/latest"));
        assert!(classifier.matches("Raw.GitHubUserContent.com/a/b/main/f"));
    }

    #[test]
    fn test_custom_patterns() {
        let classifier = UrlClassifier::new(["^(?:https?://)?codeload\\.github\\.com/.+$"]).unwrap();
        assert_eq!(classifier.len(), 1);
        assert!(classifier.matches("https://codeload.github.com/a/b/zip/main"));
        assert!(!classifier.matches("github.com/a/b/releases/v1"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(UrlClassifier::new(["(unclosed"]).is_err());
    }

    #[test]
    fn test_whitelist() {
        assert!(WhiteList::default().permits("https://github.com/a/b/raw/x"));

        let whitelist = WhiteList::new(vec!["octocat/".into(), "rust-lang".into()]);
        assert!(whitelist.permits("https://github.com/octocat/hello/raw/main/f"));
        assert!(whitelist.permits("https://raw.githubusercontent.com/rust-lang/rust/master/x"));
        assert!(!whitelist.permits("https://github.com/someone/else/raw/main/f"));
    }
}
