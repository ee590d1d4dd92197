//! Blueprint parser: paired `@cpt:TYPE` / `@/cpt:TYPE` marker blocks.
//!
//! Parsing never fails on malformed markup. Unclosed markers, unclosed
//! fences, bad TOML, and unknown marker types are collected as
//! [`BlueprintIssue`]s and the scan continues.

use crate::error::BlueprintError;
use crate::marker::{BlueprintPayload, Marker, MarkerKind, MarkerPayload};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static MARKER_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*`@cpt:([A-Za-z][A-Za-z0-9_-]*)`\s*$").expect("marker open regex")
});
static FENCE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(`{3,})\s*([^`\s]*)[^`]*$").expect("fence open regex"));
static FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(`{3,})\s*$").expect("fence close regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlueprintIssueKind {
    UnclosedMarker { marker: String },
    UnknownMarker { marker: String },
    UnclosedFence { marker: String },
    InvalidToml { marker: String, message: String },
    InvalidPayload { marker: String, message: String },
}

/// One structural problem found while parsing a blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintIssue {
    /// 1-based source line.
    pub line: usize,
    pub kind: BlueprintIssueKind,
}

impl fmt::Display for BlueprintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.line;
        match &self.kind {
            BlueprintIssueKind::UnclosedMarker { marker } => {
                write!(f, "line {line}: unclosed marker `@cpt:{marker}`")
            }
            BlueprintIssueKind::UnknownMarker { marker } => {
                write!(f, "line {line}: unknown marker type `@cpt:{marker}`")
            }
            BlueprintIssueKind::UnclosedFence { marker } => {
                write!(f, "line {line}: unclosed code fence in `@cpt:{marker}`")
            }
            BlueprintIssueKind::InvalidToml { marker, message } => {
                write!(f, "line {line}: invalid toml in `@cpt:{marker}`: {message}")
            }
            BlueprintIssueKind::InvalidPayload { marker, message } => {
                write!(f, "line {line}: invalid `@cpt:{marker}` payload: {message}")
            }
        }
    }
}

/// One blueprint file after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBlueprint {
    pub path: PathBuf,
    pub markers: Vec<Marker>,
    /// Declared artifact kind; empty or the file stem for codebase blueprints.
    pub artifact_kind: String,
    pub kit_slug: Option<String>,
    pub version: Option<String>,
    pub toc: bool,
    pub description: Option<String>,
    /// True when no `blueprint` marker declares an `artifact`.
    pub codebase: bool,
    pub errors: Vec<BlueprintIssue>,
}

impl ParsedBlueprint {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn markers_of(&self, kind: MarkerKind) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |marker| marker.kind == kind)
    }

    /// Display name for rendered documents.
    pub fn title(&self) -> &str {
        if !self.artifact_kind.is_empty() {
            return &self.artifact_kind;
        }
        self.kit_slug.as_deref().unwrap_or("codebase")
    }
}

/// Read and parse one blueprint file.
pub fn parse_blueprint(path: impl AsRef<Path>) -> Result<ParsedBlueprint, BlueprintError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| BlueprintError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_blueprint_str(path, &text))
}

/// Parse blueprint text that was already read from `path`.
pub fn parse_blueprint_str(path: impl AsRef<Path>, text: &str) -> ParsedBlueprint {
    let path = path.as_ref();
    let lines: Vec<&str> = text.lines().collect();
    let mut markers = Vec::new();
    let mut errors = Vec::new();

    let mut index = 0;
    while index < lines.len() {
        let Some(tag) = MARKER_OPEN_RE
            .captures(lines[index])
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        else {
            index += 1;
            continue;
        };

        let close = format!("`@/cpt:{tag}`");
        let Some(close_index) =
            (index + 1..lines.len()).find(|&candidate| lines[candidate].trim() == close)
        else {
            errors.push(BlueprintIssue {
                line: index + 1,
                kind: BlueprintIssueKind::UnclosedMarker { marker: tag },
            });
            index += 1;
            continue;
        };

        match MarkerKind::from_tag(&tag) {
            Some(kind) => {
                match parse_block(kind, &lines[index + 1..close_index], index) {
                    Ok(marker) => markers.push(marker),
                    Err(issue) => errors.push(issue),
                }
            }
            None => errors.push(BlueprintIssue {
                line: index + 1,
                kind: BlueprintIssueKind::UnknownMarker { marker: tag },
            }),
        }
        index = close_index + 1;
    }

    let header = markers.iter().find_map(|marker| match &marker.payload {
        MarkerPayload::Blueprint(payload) => Some(payload.clone()),
        _ => None,
    });
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (artifact_kind, codebase, header) = match header {
        Some(header) => match header.artifact.clone() {
            Some(artifact) => (artifact, false, header),
            None => (String::new(), true, header),
        },
        None => (stem, true, BlueprintPayload::default()),
    };

    tracing::debug!(
        path = %path.display(),
        markers = markers.len(),
        errors = errors.len(),
        artifact = %artifact_kind,
        "parsed blueprint"
    );

    ParsedBlueprint {
        path: path.to_path_buf(),
        markers,
        artifact_kind,
        kit_slug: header.kit,
        version: header.version,
        toc: header.toc,
        description: header.description,
        codebase,
        errors,
    }
}

/// Parse the inner lines of one marker block. `offset` is the 0-based index
/// of the opening marker line.
fn parse_block(kind: MarkerKind, body: &[&str], offset: usize) -> Result<Marker, BlueprintIssue> {
    let mut toml_text: Option<(usize, String)> = None;
    let mut markdown: Option<String> = None;

    let mut cursor = 0;
    while cursor < body.len() {
        let Some(caps) = FENCE_OPEN_RE.captures(body[cursor]) else {
            cursor += 1;
            continue;
        };
        let ticks = caps.get(1).map_or(3, |m| m.as_str().len());
        let info = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();

        let close = (cursor + 1..body.len()).find(|&candidate| {
            FENCE_CLOSE_RE
                .captures(body[candidate])
                .and_then(|close| close.get(1))
                .is_some_and(|run| run.as_str().len() >= ticks)
        });
        let Some(close) = close else {
            return Err(BlueprintIssue {
                line: offset + cursor + 2,
                kind: BlueprintIssueKind::UnclosedFence {
                    marker: kind.as_str().to_string(),
                },
            });
        };

        let content = body[cursor + 1..close].join("\n");
        match info.as_str() {
            "toml" if toml_text.is_none() => toml_text = Some((offset + cursor + 3, content)),
            "markdown" | "md" if markdown.is_none() => markdown = Some(content),
            _ => {}
        }
        cursor = close + 1;
    }

    let table = match toml_text {
        Some((line, text)) => {
            text.parse::<toml::Table>()
                .map_err(|error| BlueprintIssue {
                    line,
                    kind: BlueprintIssueKind::InvalidToml {
                        marker: kind.as_str().to_string(),
                        message: error.message().to_string(),
                    },
                })?
        }
        None => toml::Table::new(),
    };

    let payload = MarkerPayload::decode(kind, &table).map_err(|error| BlueprintIssue {
        line: offset + 1,
        kind: BlueprintIssueKind::InvalidPayload {
            marker: kind.as_str().to_string(),
            message: error.message().to_string(),
        },
    })?;

    Ok(Marker {
        kind,
        payload,
        table,
        markdown,
        line_start: offset + 1,
        line_end: offset + body.len() + 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerPayload;

    const PRD_BLUEPRINT: &str = r#"# PRD blueprint

`@cpt:blueprint`
```toml
artifact = "PRD"
kit = "sdlc"
version = "1.0"
toc = true
```
`@/cpt:blueprint`

`@cpt:heading`
```toml
id = "overview"
level = 2
pattern = "Overview"
```
`@/cpt:heading`

`@cpt:prompt`
````markdown
Describe the product.

```text
nested fence stays in the body
```
````
`@/cpt:prompt`
"#;

    #[test]
    fn parses_markers_in_line_order() {
        let parsed = parse_blueprint_str("kits/sdlc/PRD.md", PRD_BLUEPRINT);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let kinds: Vec<_> = parsed.markers.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MarkerKind::Blueprint, MarkerKind::Heading, MarkerKind::Prompt]
        );
        assert_eq!(parsed.artifact_kind, "PRD");
        assert_eq!(parsed.kit_slug.as_deref(), Some("sdlc"));
        assert_eq!(parsed.version.as_deref(), Some("1.0"));
        assert!(parsed.toc);
        assert!(!parsed.codebase);
        assert_eq!(parsed.markers[0].line_start, 3);
        assert_eq!(parsed.markers[0].line_end, 10);
    }

    #[test]
    fn markdown_body_keeps_nested_shorter_fences() {
        let parsed = parse_blueprint_str("PRD.md", PRD_BLUEPRINT);
        let prompt = parsed
            .markers_of(MarkerKind::Prompt)
            .next()
            .expect("prompt marker");
        let body = prompt.markdown.as_deref().expect("markdown body");
        assert!(body.starts_with("Describe the product."));
        assert!(body.contains("nested fence stays in the body"));
        assert!(body.ends_with("```"));
    }

    #[test]
    fn unclosed_marker_is_recorded_and_scan_continues() {
        let text = "`@cpt:heading`\n```toml\nid = \"a\"\n```\n\n`@cpt:prompt`\n```markdown\nhi\n```\n`@/cpt:prompt`\n";
        let parsed = parse_blueprint_str("x.md", text);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(
            parsed.errors[0].kind,
            BlueprintIssueKind::UnclosedMarker {
                marker: "heading".to_string()
            }
        );
        assert_eq!(parsed.errors[0].line, 1);
        assert_eq!(parsed.markers.len(), 1);
        assert_eq!(parsed.markers[0].kind, MarkerKind::Prompt);
    }

    #[test]
    fn only_first_toml_and_markdown_fences_are_used() {
        let text = "`@cpt:id`\n```toml\nkind = \"fr\"\n```\n```toml\nkind = \"nfr\"\n```\n```markdown\nfirst\n```\n```markdown\nsecond\n```\n`@/cpt:id`\n";
        let parsed = parse_blueprint_str("x.md", text);
        assert!(parsed.errors.is_empty());
        let marker = &parsed.markers[0];
        let MarkerPayload::Id(id) = &marker.payload else {
            panic!("expected id payload");
        };
        assert_eq!(id.kind.as_deref(), Some("fr"));
        assert_eq!(marker.markdown.as_deref(), Some("first"));
    }

    #[test]
    fn unclosed_fence_drops_only_that_marker() {
        let text = "`@cpt:rule`\n```markdown\nnever closed\n`@/cpt:rule`\n`@cpt:example`\n```markdown\nok\n```\n`@/cpt:example`\n";
        let parsed = parse_blueprint_str("x.md", text);
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(
            parsed.errors[0].kind,
            BlueprintIssueKind::UnclosedFence { .. }
        ));
        assert_eq!(parsed.markers.len(), 1);
        assert_eq!(parsed.markers[0].kind, MarkerKind::Example);
    }

    #[test]
    fn unknown_marker_type_is_an_error() {
        let text = "`@cpt:widget`\n`@/cpt:widget`\n";
        let parsed = parse_blueprint_str("x.md", text);
        assert!(parsed.markers.is_empty());
        assert_eq!(
            parsed.error_messages(),
            vec!["line 1: unknown marker type `@cpt:widget`".to_string()]
        );
    }

    #[test]
    fn invalid_toml_is_scoped_to_marker() {
        let text = "`@cpt:heading`\n```toml\nid = \n```\n`@/cpt:heading`\n";
        let parsed = parse_blueprint_str("x.md", text);
        assert!(parsed.markers.is_empty());
        assert!(matches!(
            parsed.errors[0].kind,
            BlueprintIssueKind::InvalidToml { .. }
        ));
        assert_eq!(parsed.errors[0].line, 3);
    }

    #[test]
    fn missing_blueprint_marker_defaults_to_file_stem() {
        let parsed = parse_blueprint_str("kits/sdlc/codebase.md", "nothing here\n");
        assert_eq!(parsed.artifact_kind, "codebase");
        assert!(parsed.codebase);
        assert!(parsed.markers.is_empty());
    }

    #[test]
    fn blueprint_marker_without_artifact_is_codebase() {
        let text = "`@cpt:blueprint`\n```toml\nkit = \"sdlc\"\n```\n`@/cpt:blueprint`\n";
        let parsed = parse_blueprint_str("kits/sdlc/conventions.md", text);
        assert!(parsed.codebase);
        assert_eq!(parsed.artifact_kind, "");
        assert_eq!(parsed.title(), "sdlc");
    }
}
