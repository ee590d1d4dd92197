//! Marker kinds and their decoded payloads.
//!
//! Every `@cpt:TYPE` block maps onto one closed [`MarkerKind`]. The `toml`
//! fence of a block is decoded once, at parse time, into the matching
//! [`MarkerPayload`] variant.

use crate::model::{Coverage, Policy};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerKind {
    Blueprint,
    Heading,
    Id,
    Rules,
    Rule,
    Checklist,
    Check,
    Prompt,
    Example,
}

impl MarkerKind {
    pub const ALL: [MarkerKind; 9] = [
        Self::Blueprint,
        Self::Heading,
        Self::Id,
        Self::Rules,
        Self::Rule,
        Self::Checklist,
        Self::Check,
        Self::Prompt,
        Self::Example,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blueprint => "blueprint",
            Self::Heading => "heading",
            Self::Id => "id",
            Self::Rules => "rules",
            Self::Rule => "rule",
            Self::Checklist => "checklist",
            Self::Check => "check",
            Self::Prompt => "prompt",
            Self::Example => "example",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `version = "1.2"` as well as `version = 3`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn deserialize_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let repr = Option::<VersionRepr>::deserialize(deserializer)?;
    Ok(repr.map(|value| match value {
        VersionRepr::Text(text) => text,
        VersionRepr::Integer(number) => number.to_string(),
        VersionRepr::Float(number) => number.to_string(),
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlueprintPayload {
    #[serde(default)]
    pub artifact: Option<String>,
    #[serde(default)]
    pub kit: Option<String>,
    #[serde(default, deserialize_with = "deserialize_version")]
    pub version: Option<String>,
    #[serde(default)]
    pub toc: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HeadingPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub multiple: Option<Policy>,
    #[serde(default)]
    pub numbered: Option<Policy>,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    /// Title written into `template.md`.
    #[serde(default)]
    pub template: Option<String>,
    /// Titles written into `example.md`.
    #[serde(default)]
    pub examples: Vec<String>,
}

impl HeadingPayload {
    pub const DEFAULT_LEVEL: u8 = 2;

    pub fn level(&self) -> u8 {
        self.level.unwrap_or(Self::DEFAULT_LEVEL)
    }

    /// Title used when rendering the template skeleton.
    pub fn template_title(&self) -> Option<&str> {
        self.template
            .as_deref()
            .or_else(|| {
                self.pattern
                    .as_deref()
                    .filter(|pattern| !crate::pattern::is_regex_pattern(pattern))
            })
            .or(self.description.as_deref())
            .or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReferencePayload {
    #[serde(default)]
    pub coverage: Option<Coverage>,
    #[serde(default)]
    pub task: Option<Policy>,
    #[serde(default)]
    pub priority: Option<Policy>,
    #[serde(default)]
    pub headings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IdPayload {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub task: Option<Policy>,
    #[serde(default)]
    pub priority: Option<Policy>,
    #[serde(default)]
    pub to_code: bool,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub nested: Vec<String>,
    #[serde(default)]
    pub references: BTreeMap<String, ReferencePayload>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Section {
    pub key: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Section {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RulesPayload {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RulePayload {
    /// Key of the `rules` section this rule belongs to.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChecklistPayload {
    #[serde(default)]
    pub domains: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerPayload {
    Blueprint(BlueprintPayload),
    Heading(HeadingPayload),
    Id(IdPayload),
    Rules(RulesPayload),
    Rule(RulePayload),
    Checklist(ChecklistPayload),
    Check(CheckPayload),
    /// `prompt` and `example` markers carry only a markdown body.
    Body,
}

impl MarkerPayload {
    /// Decode a block's structured table into the payload for `kind`.
    pub fn decode(kind: MarkerKind, table: &toml::Table) -> Result<Self, toml::de::Error> {
        let value = toml::Value::Table(table.clone());
        Ok(match kind {
            MarkerKind::Blueprint => Self::Blueprint(value.try_into()?),
            MarkerKind::Heading => Self::Heading(value.try_into()?),
            MarkerKind::Id => Self::Id(value.try_into()?),
            MarkerKind::Rules => Self::Rules(value.try_into()?),
            MarkerKind::Rule => Self::Rule(value.try_into()?),
            MarkerKind::Checklist => Self::Checklist(value.try_into()?),
            MarkerKind::Check => Self::Check(value.try_into()?),
            MarkerKind::Prompt | MarkerKind::Example => Self::Body,
        })
    }
}

/// One parsed `@cpt:TYPE ... @/cpt:TYPE` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub payload: MarkerPayload,
    /// The raw structured table, in source key order.
    pub table: toml::Table,
    pub markdown: Option<String>,
    /// 1-based line of the opening marker.
    pub line_start: usize,
    /// 1-based line of the closing marker.
    pub line_end: usize,
}
