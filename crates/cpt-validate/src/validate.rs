//! Validation pipeline: per-document phases, then cross-document checks.

use crate::config::ArtifactSpec;
use crate::context::ValidationContext;
use crate::cross::{DocumentScan, validate_cross};
use crate::headings::validate_headings;
use crate::identifiers::{resolve_occurrences, validate_identifiers};
use crate::report::{Issue, IssueCode, Report};
use crate::scan::{scan_headings, scan_identifiers};
use std::fs;

/// A document's text and the artifact kind it is validated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub artifact_kind: String,
    pub text: String,
}

impl Document {
    pub fn new(
        path: impl Into<String>,
        artifact_kind: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            artifact_kind: artifact_kind.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub issues: Vec<Issue>,
    /// `None` when the artifact kind is unknown to the schema.
    pub scan: Option<DocumentScan>,
}

/// Validate one document in isolation.
///
/// Identifier checks run only when the heading contract holds; the resolved
/// identifiers are returned either way for cross-document checks.
pub fn validate_document(ctx: &ValidationContext, doc: &Document) -> DocumentOutcome {
    let Some(artifact) = ctx.artifact(&doc.artifact_kind) else {
        let known: Vec<String> = ctx.schema().artifacts.keys().cloned().collect();
        return DocumentOutcome {
            issues: vec![
                Issue::error(
                    IssueCode::ArtifactKindUnknown,
                    doc.path.as_str(),
                    format!("artifact kind `{}` is not in the schema", doc.artifact_kind),
                )
                .with("artifact_kind", doc.artifact_kind.as_str())
                .with("known", known),
            ],
            scan: None,
        };
    };

    let headings = validate_headings(&doc.path, artifact, &scan_headings(&doc.text));
    let occurrences = resolve_occurrences(ctx, &scan_identifiers(&doc.text), &headings.scopes);
    let mut issues = Vec::new();
    if headings.has_errors() {
        tracing::debug!(path = %doc.path, "heading contract failed; identifier checks skipped");
    } else {
        issues.extend(validate_identifiers(
            &doc.path,
            artifact,
            &occurrences,
            &headings.scopes,
        ));
    }
    let mut all = headings.issues;
    all.append(&mut issues);

    DocumentOutcome {
        issues: all,
        scan: Some(DocumentScan {
            path: doc.path.clone(),
            artifact_kind: doc.artifact_kind.clone(),
            occurrences,
        }),
    }
}

/// Validate a document set and aggregate every finding into one report.
pub fn validate_documents(ctx: &ValidationContext, docs: &[Document]) -> Report {
    validate_with_read_failures(ctx, docs, Vec::new())
}

fn validate_with_read_failures(
    ctx: &ValidationContext,
    docs: &[Document],
    mut issues: Vec<Issue>,
) -> Report {
    let mut scans = Vec::with_capacity(docs.len());
    for doc in docs {
        let outcome = validate_document(ctx, doc);
        issues.extend(outcome.issues);
        scans.extend(outcome.scan);
    }
    issues.extend(validate_cross(ctx, &scans));
    let report = Report::from_issues(issues);
    tracing::debug!(
        documents = docs.len(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validation finished"
    );
    report
}

/// Read each artifact from disk and validate the readable ones.
///
/// An unreadable file becomes a `FILE_READ_FAILED` error for that path.
pub fn validate_paths(ctx: &ValidationContext, artifacts: &[ArtifactSpec]) -> Report {
    let mut docs = Vec::with_capacity(artifacts.len());
    let mut failures = Vec::new();
    for artifact in artifacts {
        let path = artifact.path.display().to_string();
        match fs::read_to_string(&artifact.path) {
            Ok(text) => docs.push(Document::new(path, artifact.kind.as_str(), text)),
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "document unreadable");
                failures.push(
                    Issue::error(
                        IssueCode::FileReadFailed,
                        path,
                        format!("failed to read document: {err}"),
                    )
                    .with("artifact_kind", artifact.kind.as_str()),
                );
            }
        }
    }
    validate_with_read_failures(ctx, &docs, failures)
}
