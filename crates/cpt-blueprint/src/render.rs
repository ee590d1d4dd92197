//! Artifact output generator: `rules.md`, `checklist.md`, `template.md`,
//! and `example.md` from the markers of one blueprint.
//!
//! Codebase blueprints only produce rules and checklist documents.

use crate::error::BlueprintError;
use crate::marker::{
    CheckPayload, HeadingPayload, Marker, MarkerKind, MarkerPayload, RulePayload, Section,
};
use crate::model::Policy;
use crate::parse::ParsedBlueprint;
use crate::pattern::anchor;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const RULES_FILE: &str = "rules.md";
pub const CHECKLIST_FILE: &str = "checklist.md";
pub const TEMPLATE_FILE: &str = "template.md";
pub const EXAMPLE_FILE: &str = "example.md";

/// Rendered documents for one blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOutputs {
    pub rules: String,
    pub checklist: String,
    pub template: Option<String>,
    pub example: Option<String>,
}

impl ArtifactOutputs {
    pub fn files(&self) -> Vec<(&'static str, &str)> {
        let mut files = vec![
            (RULES_FILE, self.rules.as_str()),
            (CHECKLIST_FILE, self.checklist.as_str()),
        ];
        if let Some(template) = &self.template {
            files.push((TEMPLATE_FILE, template.as_str()));
        }
        if let Some(example) = &self.example {
            files.push((EXAMPLE_FILE, example.as_str()));
        }
        files
    }

    /// Write every rendered file under `dir`, returning the written paths.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, BlueprintError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| BlueprintError::WriteFile {
            path: dir.display().to_string(),
            source,
        })?;
        let mut written = Vec::new();
        for (name, content) in self.files() {
            let path = dir.join(name);
            fs::write(&path, content).map_err(|source| BlueprintError::WriteFile {
                path: path.display().to_string(),
                source,
            })?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Render all outputs for `blueprint`. Blueprints with parse errors are refused.
pub fn render_outputs(blueprint: &ParsedBlueprint) -> Result<ArtifactOutputs, BlueprintError> {
    if blueprint.has_errors() {
        tracing::warn!(
            path = %blueprint.path.display(),
            errors = blueprint.errors.len(),
            "skipping generation for blueprint with parse errors"
        );
        return Err(BlueprintError::HasErrors {
            path: blueprint.path.display().to_string(),
            count: blueprint.errors.len(),
        });
    }
    let (template, example) = if blueprint.codebase {
        (None, None)
    } else {
        (Some(render_template(blueprint)), Some(render_example(blueprint)))
    };
    Ok(ArtifactOutputs {
        rules: render_rules(blueprint),
        checklist: render_checklist(blueprint),
        template,
        example,
    })
}

/// Render and write outputs into `dir`.
pub fn write_outputs(
    blueprint: &ParsedBlueprint,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, BlueprintError> {
    render_outputs(blueprint)?.write_to(dir)
}

struct RuleEntry<'a> {
    rule: &'a RulePayload,
    body: &'a str,
}

pub fn render_rules(blueprint: &ParsedBlueprint) -> String {
    let mut sections: Vec<Section> = Vec::new();
    let mut rules: Vec<RuleEntry<'_>> = Vec::new();
    let mut ids = Vec::new();
    let mut headings = Vec::new();
    for marker in &blueprint.markers {
        match &marker.payload {
            MarkerPayload::Rules(payload) => sections.extend(payload.sections.iter().cloned()),
            MarkerPayload::Rule(rule) => rules.push(RuleEntry {
                rule,
                body: marker.markdown.as_deref().unwrap_or_default(),
            }),
            MarkerPayload::Id(id) => ids.push(id),
            MarkerPayload::Heading(heading) => headings.push(heading),
            MarkerPayload::Blueprint(_)
            | MarkerPayload::Checklist(_)
            | MarkerPayload::Check(_)
            | MarkerPayload::Body => {}
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "# {} Rules", blueprint.title());
    if let Some(description) = &blueprint.description {
        let _ = writeln!(out, "\n{}", description.trim());
    }

    for section in &sections {
        let _ = writeln!(out, "\n## {}", section.title());
        for entry in rules
            .iter()
            .filter(|entry| entry.rule.kind.as_deref() == Some(section.key.as_str()))
        {
            write_rule(&mut out, entry);
        }
    }
    let orphans: Vec<&RuleEntry<'_>> = rules
        .iter()
        .filter(|entry| {
            !sections
                .iter()
                .any(|section| entry.rule.kind.as_deref() == Some(section.key.as_str()))
        })
        .collect();
    if !orphans.is_empty() {
        out.push_str("\n## Other Rules\n");
        for entry in orphans {
            write_rule(&mut out, entry);
        }
    }

    if !ids.is_empty() {
        out.push_str("\n## Identifiers\n\n");
        out.push_str("| Kind | Name | Required | Task | Priority | Headings |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for id in &ids {
            let Some(kind) = id.kind.as_deref() else {
                continue;
            };
            let _ = writeln!(
                out,
                "| `{kind}` | {} | {} | {} | {} | {} |",
                id.name.as_deref().unwrap_or("-"),
                if id.required { "yes" } else { "no" },
                id.task.unwrap_or(Policy::Allowed),
                id.priority.unwrap_or(Policy::Allowed),
                if id.headings.is_empty() {
                    "any".to_string()
                } else {
                    id.headings.join(", ")
                },
            );
        }
    }

    if !headings.is_empty() {
        out.push_str("\n## Structure\n\n");
        for heading in &headings {
            let Some(title) = heading.template_title() else {
                continue;
            };
            let _ = writeln!(
                out,
                "- `{} {}`{}",
                "#".repeat(usize::from(heading.level())),
                title,
                if heading.required.unwrap_or(true) {
                    ""
                } else {
                    " (optional)"
                },
            );
        }
    }
    out
}

fn write_rule(out: &mut String, entry: &RuleEntry<'_>) {
    if let Some(section) = &entry.rule.section {
        let _ = writeln!(out, "\n### {section}");
    }
    let body = entry.body.trim();
    if !body.is_empty() {
        let _ = writeln!(out, "\n{body}");
    }
}

pub fn render_checklist(blueprint: &ParsedBlueprint) -> String {
    let mut domains: Vec<Section> = Vec::new();
    let mut checks: Vec<(&CheckPayload, &str)> = Vec::new();
    for marker in &blueprint.markers {
        match &marker.payload {
            MarkerPayload::Checklist(payload) => domains.extend(payload.domains.iter().cloned()),
            MarkerPayload::Check(check) => {
                checks.push((check, marker.markdown.as_deref().unwrap_or_default()));
            }
            MarkerPayload::Blueprint(_)
            | MarkerPayload::Heading(_)
            | MarkerPayload::Id(_)
            | MarkerPayload::Rules(_)
            | MarkerPayload::Rule(_)
            | MarkerPayload::Body => {}
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "# {} Checklist", blueprint.title());
    for domain in &domains {
        let _ = writeln!(out, "\n## {}\n", domain.title());
        for (check, body) in checks
            .iter()
            .filter(|(check, _)| check.domain.as_deref() == Some(domain.key.as_str()))
        {
            write_check(&mut out, check, body);
        }
    }
    let orphans: Vec<_> = checks
        .iter()
        .filter(|(check, _)| {
            !domains
                .iter()
                .any(|domain| check.domain.as_deref() == Some(domain.key.as_str()))
        })
        .collect();
    if !orphans.is_empty() {
        out.push_str("\n## General\n\n");
        for (check, body) in orphans {
            write_check(&mut out, check, body);
        }
    }
    out
}

fn write_check(out: &mut String, check: &CheckPayload, body: &str) {
    let id = check.id.as_deref().unwrap_or("CHECK");
    let severity = check
        .severity
        .as_deref()
        .map(|severity| format!(" `{severity}`"))
        .unwrap_or_default();
    let title = check.title.as_deref().unwrap_or_default();
    let _ = writeln!(out, "- [ ] **{id}**{severity}: {title}");
    for line in body.trim().lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "  {line}");
        }
    }
}

fn toc_lines(headings: &[(u8, String)]) -> String {
    let mut out = String::from("## Table of Contents\n\n");
    for (level, title) in headings.iter().filter(|(level, _)| *level >= 2) {
        let indent = "  ".repeat(usize::from(level.saturating_sub(2)));
        let _ = writeln!(out, "{indent}- [{title}](#{})", anchor(title));
    }
    out
}

/// Walk markers in order, emitting heading lines and whatever `body_for`
/// selects from the other markers. A table of contents is inserted after the
/// level-1 heading when the blueprint asks for one.
fn render_skeleton<T, B>(blueprint: &ParsedBlueprint, title_for: T, body_for: B) -> String
where
    T: Fn(&HeadingPayload) -> Option<String>,
    B: Fn(&Marker) -> Option<String>,
{
    let headings: Vec<(u8, String)> = blueprint
        .markers
        .iter()
        .filter_map(|marker| match &marker.payload {
            MarkerPayload::Heading(heading) => {
                title_for(heading).map(|title| (heading.level(), title))
            }
            _ => None,
        })
        .collect();

    let mut out = String::new();
    let mut toc_pending = blueprint.toc;
    for marker in &blueprint.markers {
        let chunk = match &marker.payload {
            MarkerPayload::Heading(heading) => title_for(heading).map(|title| {
                let mut block = format!("{} {title}\n", "#".repeat(usize::from(heading.level())));
                if toc_pending && heading.level() == 1 {
                    toc_pending = false;
                    block.push('\n');
                    block.push_str(&toc_lines(&headings));
                }
                block
            }),
            _ => body_for(marker),
        };
        if let Some(chunk) = chunk {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(chunk.trim_end());
            out.push('\n');
        }
    }
    if toc_pending && !headings.is_empty() {
        out = format!("{}\n{out}", toc_lines(&headings));
    }
    out
}

pub fn render_template(blueprint: &ParsedBlueprint) -> String {
    render_skeleton(
        blueprint,
        |heading| heading.template_title().map(str::to_string),
        |marker| match marker.kind {
            MarkerKind::Prompt => marker.markdown.clone(),
            MarkerKind::Id => match &marker.payload {
                MarkerPayload::Id(id) => id.template.clone(),
                _ => None,
            },
            MarkerKind::Blueprint
            | MarkerKind::Heading
            | MarkerKind::Rules
            | MarkerKind::Rule
            | MarkerKind::Checklist
            | MarkerKind::Check
            | MarkerKind::Example => None,
        },
    )
}

pub fn render_example(blueprint: &ParsedBlueprint) -> String {
    render_skeleton(
        blueprint,
        |heading| {
            heading
                .examples
                .first()
                .cloned()
                .or_else(|| heading.template_title().map(str::to_string))
        },
        |marker| match marker.kind {
            MarkerKind::Example => marker.markdown.clone(),
            MarkerKind::Blueprint
            | MarkerKind::Heading
            | MarkerKind::Id
            | MarkerKind::Rules
            | MarkerKind::Rule
            | MarkerKind::Checklist
            | MarkerKind::Check
            | MarkerKind::Prompt => None,
        },
    )
}
