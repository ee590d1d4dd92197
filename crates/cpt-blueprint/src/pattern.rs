//! Heading title patterns and slug helpers.
//!
//! A pattern is a regular expression only if it contains one of
//! `.^$*+?{}[]\|()`; otherwise it is a case-insensitive literal title.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

const REGEX_METACHARACTERS: &[char] = &[
    '.', '^', '$', '*', '+', '?', '{', '}', '[', ']', '\\', '|', '(', ')',
];

static NUMBER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+(?:\.\d+)*\.?\s+").expect("number prefix regex should compile")
});

pub fn is_regex_pattern(pattern: &str) -> bool {
    pattern.contains(REGEX_METACHARACTERS)
}

/// Strip a leading `3.2 ` / `1. ` style numeric prefix from a heading title.
pub fn strip_number_prefix(title: &str) -> &str {
    match NUMBER_PREFIX_RE.find(title) {
        Some(found) => &title[found.end()..],
        None => title,
    }
}

/// A compiled heading title matcher.
#[derive(Debug, Clone)]
pub enum TitlePattern {
    Literal(String),
    Regex(Regex),
}

impl TitlePattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        if is_regex_pattern(pattern) {
            let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            Ok(Self::Regex(regex))
        } else {
            Ok(Self::Literal(pattern.trim().to_lowercase()))
        }
    }

    /// Literal patterns compare against the full title; regex patterns search
    /// the title with its numeric prefix removed.
    pub fn matches(&self, title: &str) -> bool {
        match self {
            Self::Literal(expected) => {
                let title = title.trim().to_lowercase();
                title == *expected || strip_number_prefix(&title).trim() == expected
            }
            Self::Regex(regex) => regex.is_match(strip_number_prefix(title).trim()),
        }
    }
}

/// Lowercase, collapse every non-alphanumeric run to `-`, trim dashes.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// GitHub-style anchor for a heading title, used by generated tables of contents.
pub fn anchor(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|ch| match ch {
            ' ' => Some('-'),
            '-' | '_' => Some(ch),
            ch if ch.is_alphanumeric() => Some(ch),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns_are_case_insensitive_exact() {
        let pattern = TitlePattern::compile("Overview").unwrap();
        assert!(matches!(pattern, TitlePattern::Literal(_)));
        assert!(pattern.matches("overview"));
        assert!(pattern.matches("  OVERVIEW "));
        assert!(pattern.matches("1. Overview"));
        assert!(!pattern.matches("Overview and Scope"));
    }

    #[test]
    fn regex_patterns_search_title_without_number_prefix() {
        let pattern = TitlePattern::compile("^Actors?$").unwrap();
        assert!(matches!(pattern, TitlePattern::Regex(_)));
        assert!(pattern.matches("2.1 Actors"));
        assert!(pattern.matches("actor"));
        assert!(!pattern.matches("Primary Actors"));

        let search = TitlePattern::compile("Requirements?").unwrap();
        assert!(search.matches("3. Functional Requirements"));
    }

    #[test]
    fn strip_number_prefix_handles_dotted_and_trailing_dot_forms() {
        assert_eq!(strip_number_prefix("3.2 Data Model"), "Data Model");
        assert_eq!(strip_number_prefix("1. Overview"), "Overview");
        assert_eq!(strip_number_prefix("Overview"), "Overview");
        assert_eq!(strip_number_prefix("2024 roadmap"), "roadmap");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Functional Requirements"), "functional-requirements");
        assert_eq!(slugify("^Actors?$"), "actors");
        assert_eq!(slugify("  A -- B  "), "a-b");
    }

    #[test]
    fn anchor_matches_github_style() {
        assert_eq!(anchor("3.1 Data Model"), "31-data-model");
        assert_eq!(anchor("Actors & Roles"), "actors--roles");
    }
}
