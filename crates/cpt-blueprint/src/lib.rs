//! # cpt blueprint compiler
//!
//! Blueprints are markdown files annotated with paired `@cpt:TYPE` markers.
//! This crate parses them, renders the per-artifact authoring documents, and
//! compiles heading and identifier rules into one normalized schema keyed by
//! artifact kind.
//!
//! ```text
//! blueprint.md ──parse──▶ ParsedBlueprint ──render──▶ rules/checklist/template/example.md
//!                               │
//!                            compile (all blueprints of a kit)
//!                               ▼
//!                       ConstraintSchema ──write_schema──▶ constraints.json
//! ```

pub mod compile;
pub mod error;
pub mod marker;
pub mod model;
pub mod parse;
pub mod pattern;
pub mod render;
pub mod schema;

pub use compile::compile;
pub use error::{BlueprintError, CompileError, SchemaError};
pub use marker::{Marker, MarkerKind, MarkerPayload};
pub use model::{
    ArtifactKindConstraints, ConstraintSchema, Coverage, HeadingConstraint, IdConstraint, Policy,
    ReferenceRule,
};
pub use parse::{BlueprintIssue, BlueprintIssueKind, ParsedBlueprint, parse_blueprint, parse_blueprint_str};
pub use pattern::TitlePattern;
pub use render::{ArtifactOutputs, render_outputs, write_outputs};
pub use schema::{load_schema, render_schema, write_schema};
