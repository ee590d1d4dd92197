//! # cpt document validator
//!
//! Checks markdown artifacts against a compiled constraint schema.
//!
//! Per document: the outline is matched against the artifact kind's heading
//! constraints, then (only when that passes) identifier definitions are
//! checked against the kind's identifier constraints. Across the set:
//! references must resolve, completion state must agree between references
//! and definitions, and required reference coverage must exist.

pub mod config;
pub mod context;
pub mod cross;
pub mod error;
pub mod headings;
pub mod identifiers;
pub mod ids;
pub mod report;
pub mod scan;
pub mod validate;

pub use config::{ArtifactSpec, CONFIG_FILE, ProjectConfig};
pub use context::ValidationContext;
pub use cross::{DocumentScan, validate_cross};
pub use error::{ConfigError, ValidateError};
pub use headings::{HeadingReport, HeadingScopes, validate_headings};
pub use identifiers::{IdentifierOccurrence, resolve_occurrences, validate_identifiers};
pub use ids::{IdGrammar, ParentRef, ParsedId};
pub use report::{Issue, IssueCode, Report, Severity, Status};
pub use scan::{OccurrenceType, ScannedHeading, ScannedId, scan_headings, scan_identifiers};
pub use validate::{Document, DocumentOutcome, validate_document, validate_documents, validate_paths};
