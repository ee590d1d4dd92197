//! Error types for validation setup.
//!
//! Findings about document content are never errors; they are
//! [`crate::Issue`] values in a [`crate::Report`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error(transparent)]
    Schema(#[from] cpt_blueprint::SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid artifact spec `{spec}` (expected KIND=PATH)")]
    InvalidArtifactSpec { spec: String },

    #[error("no documents to validate")]
    NoDocuments,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config toml at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path}: missing `schema` (set it in the config or pass --schema)")]
    MissingSchema { path: PathBuf },
}
