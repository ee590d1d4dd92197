//! Compiled schema file I/O.
//!
//! The schema is written as pretty JSON with lexicographically ordered keys.
//! Its `digest` covers only the `artifacts` body, so two compilations of
//! unchanged blueprints produce byte-identical files.

use crate::error::SchemaError;
use crate::model::{ArtifactKindConstraints, ConstraintSchema, SCHEMA_KIND};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub fn compute_digest(
    artifacts: &BTreeMap<String, ArtifactKindConstraints>,
) -> Result<String, SchemaError> {
    // BTreeMap keys and struct field order make this serialization canonical.
    let bytes = serde_json::to_vec(artifacts).map_err(SchemaError::Render)?;
    let hash = Sha256::digest(&bytes);
    let hex: String = hash.iter().map(|byte| format!("{byte:02x}")).collect();
    Ok(format!("sha256:{hex}"))
}

pub fn render_schema(schema: &ConstraintSchema) -> Result<String, SchemaError> {
    let mut rendered = serde_json::to_string_pretty(schema).map_err(SchemaError::Render)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Write the schema, returning `false` when the file already holds the same bytes.
pub fn write_schema(path: impl AsRef<Path>, schema: &ConstraintSchema) -> Result<bool, SchemaError> {
    let path = path.as_ref();
    let rendered = render_schema(schema)?;
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == rendered {
            tracing::debug!(path = %path.display(), "schema unchanged");
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SchemaError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, rendered).map_err(|source| SchemaError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

pub fn load_schema(path: impl AsRef<Path>) -> Result<ConstraintSchema, SchemaError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SchemaError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let schema: ConstraintSchema =
        serde_json::from_str(&text).map_err(|source| SchemaError::ParseJson {
            path: path.to_path_buf(),
            source,
        })?;
    if schema.kind != SCHEMA_KIND {
        return Err(SchemaError::UnsupportedKind {
            path: path.to_path_buf(),
            kind: schema.kind,
            expected: SCHEMA_KIND,
        });
    }
    let computed = compute_digest(&schema.artifacts)?;
    if computed != schema.digest {
        return Err(SchemaError::DigestMismatch {
            path: path.to_path_buf(),
            recorded: schema.digest,
            computed,
        });
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SCHEMA_VERSION;

    fn empty_schema() -> ConstraintSchema {
        let artifacts = BTreeMap::new();
        ConstraintSchema {
            schema: SCHEMA_VERSION,
            kind: SCHEMA_KIND.to_string(),
            digest: compute_digest(&artifacts).unwrap(),
            artifacts,
        }
    }

    #[test]
    fn digest_is_prefixed_hex() {
        let digest = compute_digest(&BTreeMap::new()).unwrap();
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), "sha256:".len() + 64);
    }

    #[test]
    fn write_then_load_and_skip_unchanged() {
        let dir = std::env::temp_dir().join(format!("cpt-schema-test-{}", std::process::id()));
        let path = dir.join("constraints.json");
        let schema = empty_schema();
        assert!(write_schema(&path, &schema).unwrap());
        assert!(!write_schema(&path, &schema).unwrap());
        assert_eq!(load_schema(&path).unwrap(), schema);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn tampered_digest_is_rejected() {
        let dir = std::env::temp_dir().join(format!("cpt-schema-tamper-{}", std::process::id()));
        let path = dir.join("constraints.json");
        let mut schema = empty_schema();
        schema.digest = "sha256:00".to_string();
        write_schema(&path, &schema).unwrap();
        let err = load_schema(&path).unwrap_err();
        assert!(matches!(err, SchemaError::DigestMismatch { .. }));
        let _ = fs::remove_dir_all(&dir);
    }
}
