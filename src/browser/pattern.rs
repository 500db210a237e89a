//! Glob-style URL patterns for response interception.
//!
//! `*` matches any run of characters, including `/`, so `**/xrpc/app.bsky.graph.getFollows`
//! matches that endpoint on any host. The query string is ignored.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    glob: String,
}

impl UrlPattern {
    pub fn new(glob: impl Into<String>) -> Self {
        Self { glob: glob.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }

    pub fn matches(&self, url: &str) -> bool {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        wildcard_match(self.glob.as_bytes(), without_query.as_bytes())
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glob)
    }
}

/// Greedy wildcard matcher with single-point backtracking.
fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_text = 0;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            while p < pattern.len() && pattern[p] == b'*' {
                p += 1;
            }
            star = Some(p);
            star_text = t;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(resume) = star {
            star_text += 1;
            t = star_text;
            p = resume;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
