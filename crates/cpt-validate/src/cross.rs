//! Cross-document checks over the whole validated set.
//!
//! Every check walks the documents in the order supplied, so output order
//! follows input order.

use crate::context::ValidationContext;
use crate::identifiers::IdentifierOccurrence;
use crate::report::{Issue, IssueCode};
use cpt_blueprint::{Coverage, IdConstraint, Policy, ReferenceRule};
use std::collections::{BTreeMap, BTreeSet};

/// Resolved identifiers of one document, ready for cross-document checks.
#[derive(Debug, Clone)]
pub struct DocumentScan {
    pub path: String,
    pub artifact_kind: String,
    pub occurrences: Vec<IdentifierOccurrence>,
}

#[derive(Clone, Copy)]
struct Located<'a> {
    order: usize,
    doc: &'a DocumentScan,
    occ: &'a IdentifierOccurrence,
}

impl Located<'_> {
    fn issue(&self, code: IssueCode, message: String) -> Issue {
        Issue::error(code, self.doc.path.as_str(), message)
            .at(self.occ.line)
            .with("id", self.occ.raw_id.as_str())
    }

    fn warning(&self, code: IssueCode, message: String) -> Issue {
        Issue::warning(code, self.doc.path.as_str(), message)
            .at(self.occ.line)
            .with("id", self.occ.raw_id.as_str())
    }
}

struct Index<'a> {
    definitions: BTreeMap<&'a str, Vec<Located<'a>>>,
    references: Vec<Located<'a>>,
    kinds_in_scope: BTreeSet<&'a str>,
}

impl<'a> Index<'a> {
    fn build(docs: &'a [DocumentScan]) -> Self {
        let mut definitions: BTreeMap<&str, Vec<Located<'_>>> = BTreeMap::new();
        let mut references = Vec::new();
        for (order, doc) in docs.iter().enumerate() {
            for occ in &doc.occurrences {
                let located = Located { order, doc, occ };
                if occ.is_definition() {
                    definitions.entry(occ.raw_id.as_str()).or_default().push(located);
                } else {
                    references.push(located);
                }
            }
        }
        Self {
            definitions,
            references,
            kinds_in_scope: docs.iter().map(|doc| doc.artifact_kind.as_str()).collect(),
        }
    }

    fn definitions_of(&self, id: &str) -> &[Located<'a>] {
        self.definitions.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn tracked_definitions(&self, id: &str) -> Vec<Located<'a>> {
        self.definitions_of(id)
            .iter()
            .copied()
            .filter(|def| def.occ.has_task)
            .collect()
    }

    /// First definition of every id, in document order.
    fn primary_definitions(&self) -> Vec<Located<'a>> {
        let mut out: Vec<Located<'a>> = self
            .definitions
            .values()
            .filter_map(|defs| defs.first().copied())
            .collect();
        out.sort_by_key(|def| (def.order, def.occ.line));
        out
    }
}

pub fn validate_cross(ctx: &ValidationContext, docs: &[DocumentScan]) -> Vec<Issue> {
    let index = Index::build(docs);
    let mut issues = Vec::new();

    for reference in &index.references {
        if index.definitions_of(&reference.occ.raw_id).is_empty()
            && !ctx.is_external(&reference.occ.system)
        {
            issues.push(reference.issue(
                IssueCode::RefNoDefinition,
                format!("`{}` is referenced but never defined", reference.occ.raw_id),
            ));
        }
    }

    for reference in &index.references {
        let defs = index.tracked_definitions(&reference.occ.raw_id);
        if reference.occ.checked && !defs.is_empty() && defs.iter().any(|def| !def.occ.checked) {
            let open = defs.iter().find(|def| !def.occ.checked).copied();
            let mut issue = reference.issue(
                IssueCode::RefDoneDefNotDone,
                format!(
                    "`{}` is checked here but its definition is not done",
                    reference.occ.raw_id
                ),
            );
            if let Some(def) = open {
                issue = with_target(issue, def);
            }
            issues.push(issue);
        }
    }

    for reference in &index.references {
        let defs = index.tracked_definitions(&reference.occ.raw_id);
        if reference.occ.has_task
            && !reference.occ.checked
            && !defs.is_empty()
            && defs.iter().all(|def| def.occ.checked)
        {
            issues.push(with_target(
                reference.issue(
                    IssueCode::DefDoneRefNotDone,
                    format!(
                        "`{}` is done at its definition but unchecked here",
                        reference.occ.raw_id
                    ),
                ),
                defs[0],
            ));
        }
    }

    for reference in &index.references {
        let defs = index.definitions_of(&reference.occ.raw_id);
        if !reference.occ.has_task || defs.is_empty() || defs.iter().any(|def| def.occ.has_task) {
            continue;
        }
        let rule = governing_rule(ctx, defs[0], &reference.doc.artifact_kind);
        if rule.is_some_and(|rule| matches!(rule.task, Some(Policy::Allowed | Policy::Required))) {
            continue;
        }
        issues.push(with_target(
            reference.warning(
                IssueCode::RefTaskDefNoTask,
                format!(
                    "`{}` has a task checkbox but its definition is not task-tracked",
                    reference.occ.raw_id
                ),
            ),
            defs[0],
        ));
    }

    let definitions = index.primary_definitions();
    for def in &definitions {
        let Some(constraint) = constraint_for(ctx, *def) else {
            continue;
        };
        let coverable = def.occ.checked || !def.occ.has_task;
        for (target_kind, rule) in &constraint.references {
            match rule.coverage {
                Coverage::Required if coverable => {
                    issues.extend(check_required_coverage(&index, *def, target_kind, rule));
                }
                Coverage::Prohibited => {
                    for reference in references_from(&index, &def.occ.raw_id, target_kind) {
                        issues.push(with_target(
                            reference.issue(
                                IssueCode::RefFromProhibitedKind,
                                format!(
                                    "`{}` must not be referenced from {target_kind}",
                                    def.occ.raw_id
                                ),
                            ),
                            *def,
                        ));
                    }
                }
                _ => {}
            }
        }
    }

    for reference in &index.references {
        let Some(def) = index.definitions_of(&reference.occ.raw_id).first() else {
            continue;
        };
        let Some(rule) = governing_rule(ctx, *def, &reference.doc.artifact_kind) else {
            continue;
        };
        if let Some(violation) = rule.task.and_then(|task| task.violation(reference.occ.has_task)) {
            let (code, message) = match violation {
                Policy::Required => (IssueCode::RefTaskRequired, "needs a task checkbox"),
                _ => (IssueCode::RefTaskProhibited, "must not carry a task checkbox"),
            };
            issues.push(reference_policy_issue(reference, code, message));
        }
        if let Some(violation) = rule
            .priority
            .and_then(|priority| priority.violation(reference.occ.has_priority))
        {
            let (code, message) = match violation {
                Policy::Required => (IssueCode::RefPriorityRequired, "needs a priority marker"),
                _ => (IssueCode::RefPriorityProhibited, "must not carry a priority marker"),
            };
            issues.push(reference_policy_issue(reference, code, message));
        }
    }

    for def in &definitions {
        let defs = index.definitions_of(&def.occ.raw_id);
        let mut paths_seen = BTreeSet::from([def.doc.path.as_str()]);
        for other in defs.iter().skip(1) {
            if paths_seen.insert(other.doc.path.as_str()) {
                issues.push(with_target(
                    other.warning(
                        IssueCode::DefDuplicateAcrossDocuments,
                        format!(
                            "`{}` is also defined in {}",
                            def.occ.raw_id, def.doc.path
                        ),
                    ),
                    *def,
                ));
            }
        }
    }

    if let Some(code_refs) = ctx.code_references() {
        for def in &definitions {
            let to_code = constraint_for(ctx, *def).is_some_and(|constraint| constraint.to_code);
            if to_code && def.occ.checked && !code_refs.contains(&def.occ.raw_id) {
                issues.push(def.issue(
                    IssueCode::CodeRefMissing,
                    format!(
                        "`{}` is done but no code references it",
                        def.occ.raw_id
                    ),
                ));
            }
        }
    }

    tracing::debug!(
        documents = docs.len(),
        definitions = definitions.len(),
        references = index.references.len(),
        issues = issues.len(),
        "cross-document checks done"
    );
    issues
}

fn constraint_for<'c>(ctx: &'c ValidationContext, def: Located<'_>) -> Option<&'c IdConstraint> {
    ctx.schema()
        .find_id_constraint(&def.doc.artifact_kind, &def.occ.kind)
}

fn governing_rule<'c>(
    ctx: &'c ValidationContext,
    def: Located<'_>,
    referencing_kind: &str,
) -> Option<&'c ReferenceRule> {
    constraint_for(ctx, def).and_then(|constraint| constraint.references.get(referencing_kind))
}

fn references_from<'a>(
    index: &Index<'a>,
    id: &str,
    target_kind: &str,
) -> Vec<Located<'a>> {
    index
        .references
        .iter()
        .copied()
        .filter(|reference| reference.occ.raw_id == id && reference.doc.artifact_kind == target_kind)
        .collect()
}

fn check_required_coverage(
    index: &Index<'_>,
    def: Located<'_>,
    target_kind: &str,
    rule: &ReferenceRule,
) -> Option<Issue> {
    if !index.kinds_in_scope.contains(target_kind) {
        return Some(
            def.warning(
                IssueCode::RefTargetNotInScope,
                format!(
                    "`{}` needs a reference from {target_kind}, but no {target_kind} document is in scope",
                    def.occ.raw_id
                ),
            )
            .with("target_kind", target_kind),
        );
    }
    let references = references_from(index, &def.occ.raw_id, target_kind);
    if references.is_empty() {
        return Some(
            def.issue(
                IssueCode::RefMissingFromKind,
                format!(
                    "`{}` must be referenced from {target_kind}",
                    def.occ.raw_id
                ),
            )
            .with("target_kind", target_kind),
        );
    }
    if rule.headings.is_empty() {
        return None;
    }
    let placed = references.iter().any(|reference| {
        reference
            .occ
            .active_headings
            .iter()
            .any(|heading| rule.headings.contains(heading))
    });
    if placed {
        return None;
    }
    let found: BTreeSet<&str> = references
        .iter()
        .flat_map(|reference| reference.occ.active_headings.iter().map(String::as_str))
        .collect();
    Some(
        def.issue(
            IssueCode::RefWrongHeadings,
            format!(
                "`{}` is referenced from {target_kind} but not under: {}",
                def.occ.raw_id,
                rule.headings.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        )
        .with("target_kind", target_kind)
        .with("allowed", rule.headings.iter().cloned().collect::<Vec<_>>())
        .with("found", found.into_iter().collect::<Vec<_>>())
        .with(
            "reference_path",
            references[0].doc.path.as_str(),
        )
        .with("reference_line", references[0].occ.line),
    )
}

fn reference_policy_issue(reference: &Located<'_>, code: IssueCode, message: &str) -> Issue {
    reference
        .issue(
            code,
            format!(
                "reference to `{}` from {} {message}",
                reference.occ.raw_id, reference.doc.artifact_kind
            ),
        )
        .with("artifact_kind", reference.doc.artifact_kind.as_str())
}

fn with_target(issue: Issue, target: Located<'_>) -> Issue {
    issue
        .with("target_path", target.doc.path.as_str())
        .with("target_line", target.occ.line)
}
