//! Normalized constraint schema produced by the compiler.
//!
//! One [`ArtifactKindConstraints`] per artifact kind. Heading constraints are
//! ordered (order encodes the expected outline); identifier constraints are
//! keyed by kind in a `BTreeMap` so serialization is lexicographic.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Tri-state policy shared by `task`, `priority`, `multiple`, and `numbered`.
///
/// Blueprints may also spell these as booleans: `true` is `required`,
/// `false` is `prohibited`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case", try_from = "PolicyRepr")]
pub enum Policy {
    Required,
    #[default]
    Allowed,
    Prohibited,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Allowed => "allowed",
            Self::Prohibited => "prohibited",
        }
    }

    /// Check a presence flag against the policy.
    ///
    /// Returns `Some(Policy::Required)` when the flag is missing but required,
    /// `Some(Policy::Prohibited)` when present but prohibited.
    pub fn violation(self, present: bool) -> Option<Policy> {
        match (self, present) {
            (Self::Required, false) => Some(Self::Required),
            (Self::Prohibited, true) => Some(Self::Prohibited),
            _ => None,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyRepr {
    Flag(bool),
    Text(String),
}

impl TryFrom<PolicyRepr> for Policy {
    type Error = String;

    fn try_from(value: PolicyRepr) -> Result<Self, Self::Error> {
        match value {
            PolicyRepr::Flag(true) => Ok(Self::Required),
            PolicyRepr::Flag(false) => Ok(Self::Prohibited),
            PolicyRepr::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "required" | "require" => Ok(Self::Required),
                "allowed" | "allow" | "optional" => Ok(Self::Allowed),
                "prohibited" | "prohibit" | "forbidden" => Ok(Self::Prohibited),
                other => Err(format!(
                    "invalid policy `{other}` (expected required|allowed|prohibited)"
                )),
            },
        }
    }
}

/// Whether identifiers of a kind must be referenced from another artifact kind.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case", try_from = "CoverageRepr")]
pub enum Coverage {
    Required,
    #[default]
    Optional,
    Prohibited,
}

impl Coverage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Prohibited => "prohibited",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoverageRepr {
    Flag(bool),
    Text(String),
}

impl TryFrom<CoverageRepr> for Coverage {
    type Error = String;

    fn try_from(value: CoverageRepr) -> Result<Self, Self::Error> {
        match value {
            CoverageRepr::Flag(true) => Ok(Self::Required),
            CoverageRepr::Flag(false) => Ok(Self::Optional),
            CoverageRepr::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "required" => Ok(Self::Required),
                "optional" | "allowed" => Ok(Self::Optional),
                "prohibited" | "forbidden" => Ok(Self::Prohibited),
                other => Err(format!(
                    "invalid coverage `{other}` (expected required|optional|prohibited)"
                )),
            },
        }
    }
}

/// One heading slot in an artifact outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingConstraint {
    pub id: String,
    pub level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub multiple: Policy,
    pub numbered: Policy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// How identifiers of one kind must be referenced from one target artifact kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRule {
    pub coverage: Coverage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Policy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Policy>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub headings: BTreeSet<String>,
}

/// Policy for one identifier kind defined by one artifact kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdConstraint {
    pub kind: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub task: Policy,
    pub priority: Policy,
    pub to_code: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub headings: BTreeSet<String>,
    /// Kinds that may trail this kind in a composite identifier.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub nested: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, ReferenceRule>,
}

/// Everything the validator needs to check documents of one artifact kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactKindConstraints {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub headings: Vec<HeadingConstraint>,
    pub defined_id: BTreeMap<String, IdConstraint>,
}

impl ArtifactKindConstraints {
    pub fn heading(&self, id: &str) -> Option<&HeadingConstraint> {
        self.headings.iter().find(|heading| heading.id == id)
    }

    pub fn id_constraint(&self, kind: &str) -> Option<&IdConstraint> {
        self.defined_id.get(kind)
    }
}

pub const SCHEMA_VERSION: u32 = 1;
pub const SCHEMA_KIND: &str = "cpt.constraints.v1";

/// The compiled constraint schema for a whole kit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSchema {
    pub schema: u32,
    pub kind: String,
    /// `sha256:`-prefixed digest over the canonical `artifacts` body.
    pub digest: String,
    pub artifacts: BTreeMap<String, ArtifactKindConstraints>,
}

impl ConstraintSchema {
    pub fn artifact(&self, kind: &str) -> Option<&ArtifactKindConstraints> {
        self.artifacts.get(kind)
    }

    /// Every identifier kind declared by any artifact kind.
    pub fn id_kinds(&self) -> BTreeSet<String> {
        self.artifacts
            .values()
            .flat_map(|artifact| artifact.defined_id.keys().cloned())
            .collect()
    }

    /// Union of nested-kind sets, keyed by the outer kind.
    pub fn nested_kinds(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for constraint in self.artifacts.values().flat_map(|a| a.defined_id.values()) {
            if constraint.nested.is_empty() {
                continue;
            }
            out.entry(constraint.kind.clone())
                .or_default()
                .extend(constraint.nested.iter().cloned());
        }
        out
    }

    /// Find the constraint for `kind`, preferring the given artifact kind.
    pub fn find_id_constraint(&self, artifact_kind: &str, kind: &str) -> Option<&IdConstraint> {
        self.artifact(artifact_kind)
            .and_then(|artifact| artifact.id_constraint(kind))
            .or_else(|| {
                self.artifacts
                    .values()
                    .find_map(|artifact| artifact.id_constraint(kind))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        task: Policy,
        coverage: Coverage,
    }

    #[test]
    fn policy_accepts_words_and_booleans() {
        let probe: Probe = toml::from_str("task = true\ncoverage = \"required\"").unwrap();
        assert_eq!(probe.task, Policy::Required);
        assert_eq!(probe.coverage, Coverage::Required);

        let probe: Probe = toml::from_str("task = \"allow\"\ncoverage = false").unwrap();
        assert_eq!(probe.task, Policy::Allowed);
        assert_eq!(probe.coverage, Coverage::Optional);
    }

    #[test]
    fn policy_rejects_unknown_words() {
        let err = toml::from_str::<Probe>("task = \"sometimes\"\ncoverage = \"optional\"")
            .err()
            .expect("unknown policy should fail");
        assert!(err.to_string().contains("invalid policy"));
    }

    #[test]
    fn policy_violation_reports_direction() {
        assert_eq!(Policy::Required.violation(false), Some(Policy::Required));
        assert_eq!(Policy::Prohibited.violation(true), Some(Policy::Prohibited));
        assert_eq!(Policy::Allowed.violation(true), None);
        assert_eq!(Policy::Required.violation(true), None);
    }
}
