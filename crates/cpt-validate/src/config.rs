//! Project configuration (`cpt.toml`) and artifact selection.

use crate::error::{ConfigError, ValidateError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE: &str = "cpt.toml";

/// One document to validate and the artifact kind it claims to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub path: PathBuf,
    pub kind: String,
}

impl FromStr for ArtifactSpec {
    type Err = ValidateError;

    /// Parse `KIND=PATH`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidateError::InvalidArtifactSpec {
            spec: spec.to_string(),
        };
        let (kind, path) = spec.split_once('=').ok_or_else(invalid)?;
        let (kind, path) = (kind.trim(), path.trim());
        if kind.is_empty() || path.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            path: PathBuf::from(path),
            kind: kind.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub schema: Option<PathBuf>,
    #[serde(default)]
    pub systems: Vec<String>,
    #[serde(default)]
    pub external_systems: Vec<String>,
    /// Identifiers referenced from source code, when known.
    #[serde(default)]
    pub code_references: Option<Vec<String>>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
}

impl ProjectConfig {
    /// Load a config file; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.schema = config.schema.map(|schema| base.join(schema));
        for artifact in &mut config.artifacts {
            artifact.path = base.join(&artifact.path);
        }
        tracing::debug!(
            path = %path.display(),
            artifacts = config.artifacts.len(),
            systems = config.systems.len(),
            "loaded project config"
        );
        Ok(config)
    }

    /// The schema path, or an error naming the config that lacks one.
    pub fn schema_path(&self, config_path: &Path) -> Result<&Path, ConfigError> {
        self.schema
            .as_deref()
            .ok_or_else(|| ConfigError::MissingSchema {
                path: config_path.to_path_buf(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_spec_parses_kind_and_path() {
        let spec: ArtifactSpec = "PRD=docs/PRD.md".parse().unwrap();
        assert_eq!(spec.kind, "PRD");
        assert_eq!(spec.path, PathBuf::from("docs/PRD.md"));
        assert!("docs/PRD.md".parse::<ArtifactSpec>().is_err());
        assert!("=docs/PRD.md".parse::<ArtifactSpec>().is_err());
    }

    #[test]
    fn config_paths_resolve_against_config_dir() {
        let dir = std::env::temp_dir().join(format!("cpt-config-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
schema = "kit/constraints.json"
systems = ["app", "account-server"]
external_systems = ["billing"]

[[artifacts]]
path = "docs/PRD.md"
kind = "PRD"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.schema_path(&path).unwrap(), dir.join("kit/constraints.json"));
        assert_eq!(config.systems, vec!["app", "account-server"]);
        assert_eq!(config.external_systems, vec!["billing"]);
        assert_eq!(config.code_references, None);
        assert_eq!(config.artifacts[0].path, dir.join("docs/PRD.md"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = std::env::temp_dir().join(format!("cpt-config-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, "schemas = \"x.json\"\n").unwrap();
        let err = ProjectConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
        let _ = fs::remove_dir_all(&dir);
    }
}
