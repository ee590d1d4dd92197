//! Constraint compiler: aggregate heading and id markers per artifact kind.
//!
//! Blueprints are processed in path order, markers in file order, so the
//! heading sequence for a kind is stable no matter how callers order their
//! inputs. Heading markers with neither `id` nor `pattern`, and id markers
//! without `kind`, are dropped without a diagnostic.

use crate::error::CompileError;
use crate::marker::{HeadingPayload, IdPayload, MarkerPayload};
use crate::model::{
    ArtifactKindConstraints, ConstraintSchema, HeadingConstraint, IdConstraint, Policy,
    ReferenceRule, SCHEMA_KIND, SCHEMA_VERSION,
};
use crate::parse::ParsedBlueprint;
use crate::pattern::{TitlePattern, slugify};
use crate::schema::compute_digest;
use std::collections::{BTreeMap, BTreeSet};

pub fn compile(blueprints: &[ParsedBlueprint]) -> Result<ConstraintSchema, CompileError> {
    let mut ordered: Vec<&ParsedBlueprint> = blueprints
        .iter()
        .filter(|blueprint| !blueprint.codebase)
        .collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    let mut artifacts: BTreeMap<String, ArtifactKindConstraints> = BTreeMap::new();
    for blueprint in ordered {
        let path = blueprint.path.display().to_string();
        let artifact = artifacts
            .entry(blueprint.artifact_kind.clone())
            .or_insert_with(|| ArtifactKindConstraints {
                name: blueprint.artifact_kind.clone(),
                ..ArtifactKindConstraints::default()
            });
        if artifact.description.is_none() {
            artifact.description = blueprint.description.clone();
        }

        for marker in &blueprint.markers {
            match &marker.payload {
                MarkerPayload::Heading(payload) => {
                    let Some(constraint) = heading_constraint(payload) else {
                        continue;
                    };
                    if artifact.heading(&constraint.id).is_some() {
                        return Err(CompileError::DuplicateHeadingId {
                            artifact: artifact.name.clone(),
                            id: constraint.id,
                            path,
                            line: marker.line_start,
                        });
                    }
                    artifact.headings.push(constraint);
                }
                MarkerPayload::Id(payload) => {
                    let Some(constraint) = id_constraint(payload) else {
                        continue;
                    };
                    if artifact.defined_id.contains_key(&constraint.kind) {
                        tracing::warn!(
                            artifact = %artifact.name,
                            kind = %constraint.kind,
                            path = %path,
                            line = marker.line_start,
                            "duplicate identifier kind ignored; first declaration wins"
                        );
                        continue;
                    }
                    artifact
                        .defined_id
                        .insert(constraint.kind.clone(), constraint);
                }
                MarkerPayload::Blueprint(_)
                | MarkerPayload::Rules(_)
                | MarkerPayload::Rule(_)
                | MarkerPayload::Checklist(_)
                | MarkerPayload::Check(_)
                | MarkerPayload::Body => {}
            }
        }
    }

    for artifact in artifacts.values_mut() {
        check_headings(artifact)?;
        link_siblings(&mut artifact.headings);
    }

    let digest = compute_digest(&artifacts)?;
    tracing::debug!(
        artifacts = artifacts.len(),
        digest = %digest,
        "compiled constraint schema"
    );
    Ok(ConstraintSchema {
        schema: SCHEMA_VERSION,
        kind: SCHEMA_KIND.to_string(),
        digest,
        artifacts,
    })
}

fn heading_constraint(payload: &HeadingPayload) -> Option<HeadingConstraint> {
    let pattern = payload
        .pattern
        .as_deref()
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty());
    let id = match payload.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => pattern.map(slugify).filter(|slug| !slug.is_empty())?,
    };
    Some(HeadingConstraint {
        id,
        level: payload.level(),
        pattern: pattern.map(str::to_string),
        description: payload.description.clone(),
        required: payload.required.unwrap_or(true),
        multiple: payload.multiple.unwrap_or_default(),
        numbered: payload.numbered.unwrap_or_default(),
        prev: payload.prev.clone(),
        next: payload.next.clone(),
    })
}

fn id_constraint(payload: &IdPayload) -> Option<IdConstraint> {
    let kind = payload
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|kind| !kind.is_empty())?
        .to_string();
    let references = payload
        .references
        .iter()
        .map(|(target, rule)| {
            (
                target.clone(),
                ReferenceRule {
                    coverage: rule.coverage.unwrap_or_default(),
                    task: rule.task,
                    priority: rule.priority,
                    headings: rule.headings.iter().cloned().collect(),
                },
            )
        })
        .collect();
    Some(IdConstraint {
        kind,
        required: payload.required,
        name: payload.name.clone(),
        description: payload.description.clone(),
        template: payload.template.clone(),
        task: payload.task.unwrap_or(Policy::Allowed),
        priority: payload.priority.unwrap_or(Policy::Allowed),
        to_code: payload.to_code,
        headings: payload.headings.iter().cloned().collect(),
        nested: payload.nested.iter().cloned().collect(),
        references,
    })
}

fn check_headings(artifact: &ArtifactKindConstraints) -> Result<(), CompileError> {
    let ids: BTreeSet<&str> = artifact.headings.iter().map(|h| h.id.as_str()).collect();
    for heading in &artifact.headings {
        if !(1..=6).contains(&heading.level) {
            return Err(CompileError::InvalidHeadingLevel {
                artifact: artifact.name.clone(),
                id: heading.id.clone(),
                level: heading.level,
            });
        }
        if let Some(pattern) = &heading.pattern {
            TitlePattern::compile(pattern).map_err(|error| CompileError::InvalidPattern {
                artifact: artifact.name.clone(),
                id: heading.id.clone(),
                pattern: pattern.clone(),
                message: error.to_string(),
            })?;
        }
        for (field, target) in [("prev", &heading.prev), ("next", &heading.next)] {
            let Some(target) = target else {
                continue;
            };
            if !ids.contains(target.as_str()) {
                return Err(CompileError::UnknownHeadingRef {
                    artifact: artifact.name.clone(),
                    id: heading.id.clone(),
                    field,
                    target: target.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Fill undeclared `prev`/`next` with the adjacent sibling: the neighbouring
/// constraint at the same level under the same parent.
fn link_siblings(headings: &mut [HeadingConstraint]) {
    let mut groups: BTreeMap<(Option<usize>, u8), Vec<usize>> = BTreeMap::new();
    for index in 0..headings.len() {
        let level = headings[index].level;
        let parent = (0..index).rev().find(|&j| headings[j].level < level);
        groups.entry((parent, level)).or_default().push(index);
    }
    for members in groups.values() {
        for (position, &index) in members.iter().enumerate() {
            if headings[index].prev.is_none() && position > 0 {
                headings[index].prev = Some(headings[members[position - 1]].id.clone());
            }
            if headings[index].next.is_none() {
                if let Some(&next) = members.get(position + 1) {
                    headings[index].next = Some(headings[next].id.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_blueprint_str;

    fn heading(id: &str, level: u8, pattern: &str) -> String {
        format!(
            "`@cpt:heading`\n```toml\nid = \"{id}\"\nlevel = {level}\npattern = \"{pattern}\"\n```\n`@/cpt:heading`\n"
        )
    }

    fn artifact_blueprint(kind: &str, body: &str) -> String {
        format!("`@cpt:blueprint`\n```toml\nartifact = \"{kind}\"\n```\n`@/cpt:blueprint`\n{body}")
    }

    #[test]
    fn headings_keep_file_then_in_file_order() {
        let first = parse_blueprint_str(
            "kits/a/PRD.md",
            &artifact_blueprint(
                "PRD",
                &(heading("title", 1, "PRD") + &heading("overview", 2, "Overview")),
            ),
        );
        let second = parse_blueprint_str(
            "kits/b/PRD-extra.md",
            &artifact_blueprint("PRD", &heading("appendix", 2, "Appendix")),
        );
        let forward = compile(&[first.clone(), second.clone()]).unwrap();
        let backward = compile(&[second, first]).unwrap();
        assert_eq!(forward, backward);

        let ids: Vec<_> = forward.artifacts["PRD"]
            .headings
            .iter()
            .map(|h| h.id.as_str())
            .collect();
        assert_eq!(ids, vec!["title", "overview", "appendix"]);
    }

    #[test]
    fn missing_heading_id_is_slugified_from_pattern() {
        let text = artifact_blueprint(
            "DESIGN",
            "`@cpt:heading`\n```toml\npattern = \"Architecture Drivers\"\n```\n`@/cpt:heading`\n\
             `@cpt:heading`\n```toml\ndescription = \"no id, no pattern\"\n```\n`@/cpt:heading`\n",
        );
        let schema = compile(&[parse_blueprint_str("DESIGN.md", &text)]).unwrap();
        let headings = &schema.artifacts["DESIGN"].headings;
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].id, "architecture-drivers");
        assert!(headings[0].required);
        assert_eq!(headings[0].multiple, Policy::Allowed);
    }

    #[test]
    fn id_marker_without_kind_is_dropped() {
        let text = artifact_blueprint(
            "PRD",
            "`@cpt:id`\n```toml\nname = \"nameless\"\n```\n`@/cpt:id`\n\
             `@cpt:id`\n```toml\nkind = \"fr\"\nrequired = true\n```\n`@/cpt:id`\n",
        );
        let schema = compile(&[parse_blueprint_str("PRD.md", &text)]).unwrap();
        let ids: Vec<_> = schema.artifacts["PRD"].defined_id.keys().cloned().collect();
        assert_eq!(ids, vec!["fr".to_string()]);
    }

    #[test]
    fn siblings_are_linked_within_parent() {
        let body = heading("title", 1, "PRD")
            + &heading("overview", 2, "Overview")
            + &heading("goals", 3, "Goals")
            + &heading("scope", 3, "Scope")
            + &heading("requirements", 2, "Requirements");
        let text = artifact_blueprint("PRD", &body);
        let schema = compile(&[parse_blueprint_str("PRD.md", &text)]).unwrap();
        let prd = &schema.artifacts["PRD"];
        let overview = prd.heading("overview").unwrap();
        assert_eq!(overview.prev, None);
        assert_eq!(overview.next.as_deref(), Some("requirements"));
        let scope = prd.heading("scope").unwrap();
        assert_eq!(scope.prev.as_deref(), Some("goals"));
        assert_eq!(scope.next, None);
    }

    #[test]
    fn unknown_prev_is_a_compile_error() {
        let text = artifact_blueprint(
            "PRD",
            "`@cpt:heading`\n```toml\nid = \"a\"\nprev = \"ghost\"\n```\n`@/cpt:heading`\n",
        );
        let err = compile(&[parse_blueprint_str("PRD.md", &text)]).unwrap_err();
        assert!(matches!(err, CompileError::UnknownHeadingRef { field: "prev", .. }));
    }

    #[test]
    fn duplicate_heading_id_is_a_compile_error() {
        let text = artifact_blueprint(
            "PRD",
            &(heading("a", 2, "One") + &heading("a", 2, "Two")),
        );
        let err = compile(&[parse_blueprint_str("PRD.md", &text)]).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateHeadingId { .. }));
    }

    #[test]
    fn first_identifier_kind_declaration_wins() {
        let id = |required: bool| {
            format!("`@cpt:id`\n```toml\nkind = \"fr\"\nrequired = {required}\n```\n`@/cpt:id`\n")
        };
        let text = artifact_blueprint("PRD", &(id(true) + &id(false)));
        let schema = compile(&[parse_blueprint_str("PRD.md", &text)]).unwrap();
        let prd = &schema.artifacts["PRD"];
        assert_eq!(prd.defined_id.len(), 1);
        assert!(prd.defined_id["fr"].required);
    }

    #[test]
    fn invalid_regex_pattern_is_a_compile_error() {
        let text = artifact_blueprint("PRD", &heading("a", 2, "Broken ("));
        let err = compile(&[parse_blueprint_str("PRD.md", &text)]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidPattern { .. }));
    }

    #[test]
    fn codebase_blueprints_contribute_nothing() {
        let codebase = parse_blueprint_str("codebase.md", &heading("a", 2, "Anything"));
        let schema = compile(&[codebase]).unwrap();
        assert!(schema.artifacts.is_empty());
    }
}
