//! Per-document identifier checks.
//!
//! Scanned identifiers are resolved through the identifier grammar and
//! annotated with the heading ids in effect at their line. Definitions are
//! then checked against the artifact kind's identifier constraints.

use crate::context::ValidationContext;
use crate::headings::HeadingScopes;
use crate::ids::ParentRef;
use crate::report::{Issue, IssueCode};
use crate::scan::{OccurrenceType, ScannedId};
use cpt_blueprint::{ArtifactKindConstraints, Policy};
use serde::Serialize;
use std::collections::BTreeMap;

/// A resolved identifier occurrence within one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierOccurrence {
    pub raw_id: String,
    pub system: String,
    pub kind: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    #[serde(rename = "type")]
    pub occurrence: OccurrenceType,
    pub line: usize,
    pub checked: bool,
    pub has_task: bool,
    pub has_priority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub active_headings: Vec<String>,
    /// Index of the enclosing heading section, if any.
    #[serde(skip)]
    pub section: Option<usize>,
}

impl IdentifierOccurrence {
    pub fn is_definition(&self) -> bool {
        self.occurrence == OccurrenceType::Definition
    }
}

/// Resolve scanned identifiers; tokens the grammar rejects are dropped.
pub fn resolve_occurrences(
    ctx: &ValidationContext,
    scanned: &[ScannedId],
    scopes: &HeadingScopes,
) -> Vec<IdentifierOccurrence> {
    scanned
        .iter()
        .filter_map(|id| {
            let Some(parsed) = ctx.parse_id(&id.id) else {
                tracing::debug!(id = %id.id, line = id.line, "unparseable identifier skipped");
                return None;
            };
            Some(IdentifierOccurrence {
                raw_id: parsed.raw,
                system: parsed.system,
                kind: parsed.kind,
                slug: parsed.slug,
                parent: parsed.parent,
                occurrence: id.occurrence,
                line: id.line,
                checked: id.checked,
                has_task: id.has_task,
                has_priority: id.priority.is_some(),
                priority: id.priority,
                active_headings: scopes.active_at(id.line).to_vec(),
                section: scopes.section_at(id.line),
            })
        })
        .collect()
}

pub fn validate_identifiers(
    path: &str,
    artifact: &ArtifactKindConstraints,
    occurrences: &[IdentifierOccurrence],
    scopes: &HeadingScopes,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut first_definition: BTreeMap<&str, usize> = BTreeMap::new();
    let definitions: Vec<&IdentifierOccurrence> =
        occurrences.iter().filter(|occ| occ.is_definition()).collect();

    for def in &definitions {
        if let Some(&first_line) = first_definition.get(def.raw_id.as_str()) {
            issues.push(
                Issue::error(
                    IssueCode::IdDuplicateDefinition,
                    path,
                    format!("`{}` is already defined at line {first_line}", def.raw_id),
                )
                .at(def.line)
                .with("id", def.raw_id.as_str())
                .with("first_line", first_line),
            );
        } else {
            first_definition.insert(def.raw_id.as_str(), def.line);
        }

        let Some(constraint) = artifact.id_constraint(&def.kind) else {
            issues.push(
                Issue::error(
                    IssueCode::IdKindNotAllowed,
                    path,
                    format!(
                        "`{}` has kind `{}`, which {} does not define",
                        def.raw_id, def.kind, artifact.name
                    ),
                )
                .at(def.line)
                .with("id", def.raw_id.as_str())
                .with("kind", def.kind.as_str())
                .with("allowed", artifact.defined_id.keys().cloned().collect::<Vec<_>>()),
            );
            continue;
        };

        if let Some(violation) = constraint.task.violation(def.has_task) {
            let (code, message) = match violation {
                Policy::Required => (IssueCode::IdTaskRequired, "needs a task checkbox"),
                _ => (IssueCode::IdTaskProhibited, "must not carry a task checkbox"),
            };
            issues.push(policy_issue(path, def, code, message));
        }
        if let Some(violation) = constraint.priority.violation(def.has_priority) {
            let (code, message) = match violation {
                Policy::Required => (IssueCode::IdPriorityRequired, "needs a priority marker"),
                _ => (IssueCode::IdPriorityProhibited, "must not carry a priority marker"),
            };
            issues.push(policy_issue(path, def, code, message));
        }

        if !constraint.headings.is_empty()
            && !def
                .active_headings
                .iter()
                .any(|heading| constraint.headings.contains(heading))
        {
            issues.push(
                Issue::error(
                    IssueCode::IdWrongHeading,
                    path,
                    format!(
                        "`{}` must be defined under one of: {}",
                        def.raw_id,
                        constraint.headings.iter().cloned().collect::<Vec<_>>().join(", ")
                    ),
                )
                .at(def.line)
                .with("id", def.raw_id.as_str())
                .with("allowed", constraint.headings.iter().cloned().collect::<Vec<_>>())
                .with("found", def.active_headings.clone()),
            );
        }
    }

    issues.extend(check_nested_completion(path, &definitions, scopes));

    for constraint in artifact.defined_id.values().filter(|c| c.required) {
        if !definitions.iter().any(|def| def.kind == constraint.kind) {
            issues.push(
                Issue::error(
                    IssueCode::RequiredIdKindMissing,
                    path,
                    format!(
                        "{} must define at least one `{}` identifier",
                        artifact.name, constraint.kind
                    ),
                )
                .with("kind", constraint.kind.as_str()),
            );
        }
    }

    tracing::debug!(
        path,
        definitions = definitions.len(),
        issues = issues.len(),
        "identifiers checked"
    );
    issues
}

fn policy_issue(
    path: &str,
    def: &IdentifierOccurrence,
    code: IssueCode,
    message: &str,
) -> Issue {
    Issue::error(code, path, format!("`{}` {message}", def.raw_id))
        .at(def.line)
        .with("id", def.raw_id.as_str())
        .with("kind", def.kind.as_str())
}

/// Task-tracked definitions in deeper sections are children of a
/// task-tracked definition in an enclosing section.
fn check_nested_completion(
    path: &str,
    definitions: &[&IdentifierOccurrence],
    scopes: &HeadingScopes,
) -> Vec<Issue> {
    let tracked: Vec<&IdentifierOccurrence> = definitions
        .iter()
        .copied()
        .filter(|def| def.has_task)
        .collect();
    let mut issues = Vec::new();
    for parent in &tracked {
        let Some(parent_section) = parent.section else {
            continue;
        };
        let children: Vec<&IdentifierOccurrence> = tracked
            .iter()
            .copied()
            .filter(|child| {
                child.section.is_some_and(|section| {
                    section != parent_section && scopes.contains(parent_section, section)
                })
            })
            .collect();
        if children.is_empty() {
            continue;
        }
        let unchecked: Vec<&str> = children
            .iter()
            .filter(|child| !child.checked)
            .map(|child| child.raw_id.as_str())
            .collect();
        if !parent.checked && unchecked.is_empty() {
            issues.push(
                Issue::error(
                    IssueCode::ParentUncheckedAllDone,
                    path,
                    format!(
                        "`{}` is unchecked but all {} nested item(s) are done",
                        parent.raw_id,
                        children.len()
                    ),
                )
                .at(parent.line)
                .with("id", parent.raw_id.as_str()),
            );
        } else if parent.checked && !unchecked.is_empty() {
            issues.push(
                Issue::error(
                    IssueCode::ParentCheckedNestedUnchecked,
                    path,
                    format!(
                        "`{}` is checked but nested item(s) are not done: {}",
                        parent.raw_id,
                        unchecked.join(", ")
                    ),
                )
                .at(parent.line)
                .with("id", parent.raw_id.as_str())
                .with("unchecked", unchecked),
            );
        }
    }
    issues
}
