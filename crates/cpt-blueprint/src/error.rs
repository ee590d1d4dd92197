//! Error types for blueprint parsing, compilation, and schema I/O.

use std::path::PathBuf;

/// Failures that stop a blueprint from being read or its outputs written.
///
/// Malformed markup inside a readable blueprint is not an error here; it is
/// collected on [`crate::ParsedBlueprint::errors`].
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error("failed to read blueprint: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output: {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("blueprint {path} has {count} parse error(s); generation skipped")]
    HasErrors { path: String, count: usize },
}

/// Compile-time invariant violations in the aggregated heading and id rules.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{artifact}: duplicate heading id `{id}` ({path}:{line})")]
    DuplicateHeadingId {
        artifact: String,
        id: String,
        path: String,
        line: usize,
    },

    #[error("{artifact}: heading `{id}` has invalid level {level} (expected 1..=6)")]
    InvalidHeadingLevel {
        artifact: String,
        id: String,
        level: u8,
    },

    #[error("{artifact}: heading `{id}` has invalid pattern `{pattern}`: {message}")]
    InvalidPattern {
        artifact: String,
        id: String,
        pattern: String,
        message: String,
    },

    #[error("{artifact}: heading `{id}` {field} points at unknown heading `{target}`")]
    UnknownHeadingRef {
        artifact: String,
        id: String,
        field: &'static str,
        target: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Compiled schema file read/write failures.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema: {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write schema: {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schema json at {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render schema json: {0}")]
    Render(#[source] serde_json::Error),

    #[error("{path}: unsupported schema kind `{kind}` (expected `{expected}`)")]
    UnsupportedKind {
        path: PathBuf,
        kind: String,
        expected: &'static str,
    },

    #[error("{path}: digest mismatch: recorded {recorded}, computed {computed}")]
    DigestMismatch {
        path: PathBuf,
        recorded: String,
        computed: String,
    },
}
