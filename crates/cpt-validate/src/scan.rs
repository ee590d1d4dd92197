//! Document scanner: headings and identifier occurrences from markdown text.
//!
//! Fenced code blocks (``` or ~~~, closed by a run of the same character at
//! least as long as the opener) are opaque: nothing inside them is a heading
//! or an identifier.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.*?)(?:[ \t]+#+)?[ \t]*$").expect("heading regex")
});
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?[ \t]+\S").expect("number regex"));
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})(.*)$").expect("fence regex"));
static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_-])(cpt-[a-z0-9]+(?:-[a-z0-9]+)+)").expect("id regex")
});
static TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+\[([ xX])\]").expect("task regex"));
static PRIORITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`p(\d+)`").expect("priority regex"));

const DEFINITION_MARKER: &str = "**ID**";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedHeading {
    /// 1-based line.
    pub line: usize,
    pub level: u8,
    pub title: String,
    pub numbered: bool,
    pub number_parts: Vec<u32>,
}

impl ScannedHeading {
    /// `3.6` style rendering of the numeric prefix.
    pub fn number(&self) -> String {
        join_number(&self.number_parts)
    }
}

pub fn join_number(parts: &[u32]) -> String {
    parts
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceType {
    Definition,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedId {
    pub id: String,
    #[serde(rename = "type")]
    pub occurrence: OccurrenceType,
    pub line: usize,
    pub checked: bool,
    pub has_task: bool,
    pub priority: Option<u32>,
}

/// Tracks whether a line is inside a fenced code block.
#[derive(Debug, Default)]
struct FenceState {
    open: Option<(char, usize)>,
}

impl FenceState {
    /// Feed one line; returns true when the line is fence markup or fenced content.
    fn consume(&mut self, line: &str) -> bool {
        let fence = FENCE_RE.captures(line).and_then(|caps| {
            let run = caps.get(1)?.as_str();
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let ch = run.chars().next()?;
            Some((ch, run.len(), rest.trim().is_empty(), rest.contains('`')))
        });
        match (self.open, fence) {
            (Some((ch, len)), Some((fence_ch, fence_len, bare, _))) => {
                if fence_ch == ch && fence_len >= len && bare {
                    self.open = None;
                }
                true
            }
            (Some(_), None) => true,
            (None, Some((fence_ch, fence_len, _, info_has_backtick))) => {
                if fence_ch == '`' && info_has_backtick {
                    return false;
                }
                self.open = Some((fence_ch, fence_len));
                true
            }
            (None, None) => false,
        }
    }
}

pub fn scan_headings(text: &str) -> Vec<ScannedHeading> {
    let mut fences = FenceState::default();
    let mut out = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if fences.consume(line) {
            continue;
        }
        let Some(caps) = HEADING_RE.captures(line) else {
            continue;
        };
        let level = caps.get(1).map_or(0, |m| m.as_str().len());
        let title = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
        if title.is_empty() {
            continue;
        }
        let number_parts: Vec<u32> = NUMBER_RE
            .captures(&title)
            .and_then(|caps| caps.get(1))
            .map(|m| {
                m.as_str()
                    .split('.')
                    .filter_map(|part| part.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        out.push(ScannedHeading {
            line: index + 1,
            level: u8::try_from(level).unwrap_or(6),
            title,
            numbered: !number_parts.is_empty(),
            number_parts,
        });
    }
    out
}

pub fn scan_identifiers(text: &str) -> Vec<ScannedId> {
    let mut fences = FenceState::default();
    let mut out = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if fences.consume(line) {
            continue;
        }
        if !line.contains("cpt-") {
            continue;
        }
        let task = TASK_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str() != " ");
        let priority = PRIORITY_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        let definition_at = line.find(DEFINITION_MARKER);

        let mut definition_taken = false;
        for caps in ID_RE.captures_iter(line) {
            let Some(id) = caps.get(1) else {
                continue;
            };
            let is_definition = !definition_taken
                && definition_at.is_some_and(|marker_at| id.start() > marker_at);
            if is_definition {
                definition_taken = true;
            }
            out.push(ScannedId {
                id: id.as_str().to_string(),
                occurrence: if is_definition {
                    OccurrenceType::Definition
                } else {
                    OccurrenceType::Reference
                },
                line: index + 1,
                checked: task.unwrap_or(false),
                has_task: task.is_some(),
                priority,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_carry_numbering() {
        let text = "# Title\n\n## 1. Overview\n\n### 3.2 Data Model ##\n\n## Appendix\n";
        let headings = scan_headings(text);
        assert_eq!(headings.len(), 4);
        assert_eq!(headings[0].level, 1);
        assert!(!headings[0].numbered);
        assert_eq!(headings[1].number_parts, vec![1]);
        assert_eq!(headings[1].title, "1. Overview");
        assert_eq!(headings[2].title, "3.2 Data Model");
        assert_eq!(headings[2].number(), "3.2");
        assert_eq!(headings[2].line, 5);
        assert!(!headings[3].numbered);
    }

    #[test]
    fn fenced_blocks_are_opaque() {
        let text = "## Real\n\n````markdown\n## Not a heading\n```\n- **ID**: `cpt-app-fr-hidden`\n```\n````\n\n~~~\n# also hidden\n~~~\n## After\n";
        let headings = scan_headings(text);
        let titles: Vec<_> = headings.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Real", "After"]);
        assert!(scan_identifiers(text).is_empty());
    }

    #[test]
    fn definitions_references_tasks_and_priorities() {
        let text = "- [x] `p1` - **ID**: `cpt-app-fr-login` implements `cpt-app-uc-signin`\n\
                    - [ ] cpt-app-fr-login\n\
                    See cpt-app-fr-logout.\n";
        let ids = scan_identifiers(text);
        assert_eq!(ids.len(), 4);

        assert_eq!(ids[0].id, "cpt-app-fr-login");
        assert_eq!(ids[0].occurrence, OccurrenceType::Definition);
        assert!(ids[0].has_task && ids[0].checked);
        assert_eq!(ids[0].priority, Some(1));

        assert_eq!(ids[1].id, "cpt-app-uc-signin");
        assert_eq!(ids[1].occurrence, OccurrenceType::Reference);

        assert_eq!(ids[2].occurrence, OccurrenceType::Reference);
        assert!(ids[2].has_task && !ids[2].checked);
        assert_eq!(ids[2].line, 2);

        assert_eq!(ids[3].id, "cpt-app-fr-logout");
        assert!(!ids[3].has_task);
        assert_eq!(ids[3].priority, None);
    }

    #[test]
    fn ids_embedded_in_words_are_ignored() {
        let ids = scan_identifiers("xcpt-app-fr-a and my_cpt-app-fr-b but (cpt-app-fr-c)\n");
        let raw: Vec<_> = ids.iter().map(|id| id.id.as_str()).collect();
        assert_eq!(raw, vec!["cpt-app-fr-c"]);
    }
}
