//! Immutable inputs shared by every validator call in one invocation.

use crate::ids::{IdGrammar, ParsedId};
use cpt_blueprint::{ArtifactKindConstraints, ConstraintSchema};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ValidationContext {
    schema: ConstraintSchema,
    grammar: IdGrammar,
    external_systems: BTreeSet<String>,
    code_references: Option<BTreeSet<String>>,
}

impl ValidationContext {
    /// Build a context whose identifier grammar is derived from the schema's
    /// declared kinds plus the registered systems.
    pub fn new(schema: ConstraintSchema, systems: impl IntoIterator<Item = String>) -> Self {
        let grammar = IdGrammar::new(systems, schema.id_kinds(), schema.nested_kinds());
        Self {
            schema,
            grammar,
            external_systems: BTreeSet::new(),
            code_references: None,
        }
    }

    /// Systems whose identifiers are defined outside the validated set.
    pub fn with_external_systems(mut self, systems: impl IntoIterator<Item = String>) -> Self {
        self.external_systems.extend(systems);
        self
    }

    /// Identifiers known to be referenced from source code; enables the
    /// `to_code` coverage check.
    pub fn with_code_references(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.code_references = Some(ids.into_iter().collect());
        self
    }

    pub fn schema(&self) -> &ConstraintSchema {
        &self.schema
    }

    pub fn artifact(&self, kind: &str) -> Option<&ArtifactKindConstraints> {
        self.schema.artifact(kind)
    }

    pub fn parse_id(&self, raw: &str) -> Option<ParsedId> {
        self.grammar.parse(raw)
    }

    pub fn is_external(&self, system: &str) -> bool {
        self.external_systems.contains(system)
    }

    pub fn code_references(&self) -> Option<&BTreeSet<String>> {
        self.code_references.as_ref()
    }
}
