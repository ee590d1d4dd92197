//! Validation findings and the aggregated report.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    FileReadFailed,
    ArtifactKindUnknown,
    HeadingMissing,
    HeadingProhibitsMultiple,
    HeadingRequiresMultiple,
    HeadingNumberingRequired,
    HeadingNumberingProhibited,
    HeadingNumberSequence,
    IdKindNotAllowed,
    IdTaskRequired,
    IdTaskProhibited,
    IdPriorityRequired,
    IdPriorityProhibited,
    IdWrongHeading,
    IdDuplicateDefinition,
    ParentUncheckedAllDone,
    ParentCheckedNestedUnchecked,
    RequiredIdKindMissing,
    RefNoDefinition,
    RefDoneDefNotDone,
    DefDoneRefNotDone,
    RefTaskDefNoTask,
    RefMissingFromKind,
    RefWrongHeadings,
    RefTargetNotInScope,
    RefFromProhibitedKind,
    RefTaskRequired,
    RefTaskProhibited,
    RefPriorityRequired,
    RefPriorityProhibited,
    DefDuplicateAcrossDocuments,
    CodeRefMissing,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileReadFailed => "FILE_READ_FAILED",
            Self::ArtifactKindUnknown => "ARTIFACT_KIND_UNKNOWN",
            Self::HeadingMissing => "HEADING_MISSING",
            Self::HeadingProhibitsMultiple => "HEADING_PROHIBITS_MULTIPLE",
            Self::HeadingRequiresMultiple => "HEADING_REQUIRES_MULTIPLE",
            Self::HeadingNumberingRequired => "HEADING_NUMBERING_REQUIRED",
            Self::HeadingNumberingProhibited => "HEADING_NUMBERING_PROHIBITED",
            Self::HeadingNumberSequence => "HEADING_NUMBER_SEQUENCE",
            Self::IdKindNotAllowed => "ID_KIND_NOT_ALLOWED",
            Self::IdTaskRequired => "ID_TASK_REQUIRED",
            Self::IdTaskProhibited => "ID_TASK_PROHIBITED",
            Self::IdPriorityRequired => "ID_PRIORITY_REQUIRED",
            Self::IdPriorityProhibited => "ID_PRIORITY_PROHIBITED",
            Self::IdWrongHeading => "ID_WRONG_HEADING",
            Self::IdDuplicateDefinition => "ID_DUPLICATE_DEFINITION",
            Self::ParentUncheckedAllDone => "PARENT_UNCHECKED_ALL_DONE",
            Self::ParentCheckedNestedUnchecked => "PARENT_CHECKED_NESTED_UNCHECKED",
            Self::RequiredIdKindMissing => "REQUIRED_ID_KIND_MISSING",
            Self::RefNoDefinition => "REF_NO_DEFINITION",
            Self::RefDoneDefNotDone => "REF_DONE_DEF_NOT_DONE",
            Self::DefDoneRefNotDone => "DEF_DONE_REF_NOT_DONE",
            Self::RefTaskDefNoTask => "REF_TASK_DEF_NO_TASK",
            Self::RefMissingFromKind => "REF_MISSING_FROM_KIND",
            Self::RefWrongHeadings => "REF_WRONG_HEADINGS",
            Self::RefTargetNotInScope => "REF_TARGET_NOT_IN_SCOPE",
            Self::RefFromProhibitedKind => "REF_FROM_PROHIBITED_KIND",
            Self::RefTaskRequired => "REF_TASK_REQUIRED",
            Self::RefTaskProhibited => "REF_TASK_PROHIBITED",
            Self::RefPriorityRequired => "REF_PRIORITY_REQUIRED",
            Self::RefPriorityProhibited => "REF_PRIORITY_PROHIBITED",
            Self::DefDuplicateAcrossDocuments => "DEF_DUPLICATE_ACROSS_DOCUMENTS",
            Self::CodeRefMissing => "CODE_REF_MISSING",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding with its location and context fields.
///
/// Context keys are flattened into the JSON object next to `code`/`message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(flatten)]
    pub context: BTreeMap<String, Value>,
}

impl Issue {
    pub fn error(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            path: path.into(),
            line: None,
            context: BTreeMap::new(),
        }
    }

    pub fn warning(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, path, message)
        }
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}: [{}] {}", self.path, self.code, self.message),
            None => write!(f, "{}: [{}] {}", self.path, self.code, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub status: Status,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl Report {
    /// Split issues by severity; status is `FAIL` iff any error remains.
    pub fn from_issues(issues: impl IntoIterator<Item = Issue>) -> Self {
        let (errors, warnings): (Vec<Issue>, Vec<Issue>) =
            issues.into_iter().partition(Issue::is_error);
        let status = if errors.is_empty() {
            Status::Pass
        } else {
            Status::Fail
        };
        Self {
            status,
            errors,
            warnings,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }

    pub fn codes(&self) -> Vec<IssueCode> {
        self.errors.iter().map(|issue| issue.code).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_fields_flatten_into_issue_json() {
        let issue = Issue::error(IssueCode::HeadingMissing, "docs/PRD.md", "missing heading")
            .at(3)
            .with("heading_id", "overview")
            .with("prev", Value::Null);
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(
            value,
            json!({
                "code": "HEADING_MISSING",
                "severity": "error",
                "message": "missing heading",
                "path": "docs/PRD.md",
                "line": 3,
                "heading_id": "overview",
                "prev": null
            })
        );
    }

    #[test]
    fn warnings_alone_pass() {
        let report = Report::from_issues([Issue::warning(
            IssueCode::RefTargetNotInScope,
            "a.md",
            "no DESIGN document",
        )]);
        assert!(report.passed());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(serde_json::to_value(&report).unwrap()["status"], "PASS");

        let failed = Report::from_issues([Issue::error(IssueCode::RefNoDefinition, "a.md", "x")]);
        assert_eq!(failed.status, Status::Fail);
        assert_eq!(failed.codes(), vec![IssueCode::RefNoDefinition]);
    }
}
