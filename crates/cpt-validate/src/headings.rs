//! Heading contract validation.
//!
//! Constraints are matched in order against the scanned outline. Each
//! constraint searches a scope window: from the cursor (just past the
//! previous constraint's last match) to the end of its structural parent's
//! section. The structural parent is the nearest preceding constraint with a
//! lower level; when that parent was never matched the child is skipped.

use crate::report::{Issue, IssueCode};
use crate::scan::{ScannedHeading, join_number};
use cpt_blueprint::{ArtifactKindConstraints, HeadingConstraint, Policy, TitlePattern};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of matching one document outline against its heading constraints.
#[derive(Debug, Clone)]
pub struct HeadingReport {
    pub issues: Vec<Issue>,
    pub scopes: HeadingScopes,
}

impl HeadingReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Title(TitlePattern),
    Never,
}

impl Matcher {
    fn for_constraint(constraint: &HeadingConstraint) -> Self {
        match constraint.pattern.as_deref() {
            None => Self::Any,
            Some(pattern) => match TitlePattern::compile(pattern) {
                Ok(compiled) => Self::Title(compiled),
                Err(err) => {
                    tracing::warn!(heading = %constraint.id, %pattern, error = %err, "unusable heading pattern");
                    Self::Never
                }
            },
        }
    }

    fn accepts(&self, level: u8, heading: &ScannedHeading) -> bool {
        if heading.level != level {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Title(pattern) => pattern.matches(&heading.title),
            Self::Never => false,
        }
    }
}

pub fn validate_headings(
    path: &str,
    artifact: &ArtifactKindConstraints,
    headings: &[ScannedHeading],
) -> HeadingReport {
    let constraints = &artifact.headings;
    let matchers: Vec<Matcher> = constraints.iter().map(Matcher::for_constraint).collect();
    let mut spans: Vec<Option<(usize, usize)>> = vec![None; constraints.len()];
    let mut assignments: Vec<Option<usize>> = vec![None; headings.len()];
    let mut issues = Vec::new();
    let mut cursor = 0;

    for (index, constraint) in constraints.iter().enumerate() {
        let (start, end, anchor_line) = match structural_parent(constraints, index) {
            Some(parent) => match spans[parent] {
                Some((first, last)) => (
                    cursor.max(first + 1),
                    section_end(headings, last),
                    Some(headings[first].line),
                ),
                None => {
                    tracing::debug!(heading = %constraint.id, "parent heading unmatched; skipping");
                    continue;
                }
            },
            None => (cursor, headings.len(), None),
        };

        let matcher = &matchers[index];
        let Some(first) = (start..end.max(start)).find(|&k| matcher.accepts(constraint.level, &headings[k]))
        else {
            if constraint.required {
                issues.push(missing_heading(path, constraint, anchor_line));
            }
            continue;
        };

        let sibling = next_sibling(constraints, index).map(|j| &matchers[j]);
        let mut hits = vec![first];
        for (k, heading) in headings.iter().enumerate().take(end).skip(first + 1) {
            if heading.level > constraint.level {
                continue;
            }
            if heading.level < constraint.level
                || !matcher.accepts(constraint.level, heading)
                || sibling.is_some_and(|s| s.accepts(constraint.level, heading))
            {
                break;
            }
            hits.push(k);
        }

        match constraint.multiple {
            Policy::Prohibited if hits.len() > 1 => issues.push(
                Issue::error(
                    IssueCode::HeadingProhibitsMultiple,
                    path,
                    format!(
                        "heading `{}` appears {} times but must appear once",
                        constraint.id,
                        hits.len()
                    ),
                )
                .at(headings[hits[1]].line)
                .with("heading_id", constraint.id.as_str())
                .with("count", hits.len()),
            ),
            Policy::Required if hits.len() < 2 => issues.push(
                Issue::error(
                    IssueCode::HeadingRequiresMultiple,
                    path,
                    format!("heading `{}` must appear more than once", constraint.id),
                )
                .at(headings[first].line)
                .with("heading_id", constraint.id.as_str())
                .with("count", hits.len()),
            ),
            _ => {}
        }

        for &k in &hits {
            let heading = &headings[k];
            if let Some(violation) = constraint.numbered.violation(heading.numbered) {
                issues.push(numbering_issue(path, constraint, heading, violation));
            }
            assignments[k] = Some(index);
        }

        let last = hits[hits.len() - 1];
        spans[index] = Some((first, last));
        cursor = last + 1;
    }

    issues.extend(check_number_sequence(path, headings));
    tracing::debug!(
        path,
        constraints = constraints.len(),
        headings = headings.len(),
        issues = issues.len(),
        "heading contract checked"
    );

    HeadingReport {
        issues,
        scopes: HeadingScopes::build(constraints, headings, &assignments),
    }
}

fn structural_parent(constraints: &[HeadingConstraint], index: usize) -> Option<usize> {
    let level = constraints[index].level;
    (0..index).rev().find(|&j| constraints[j].level < level)
}

fn next_sibling(constraints: &[HeadingConstraint], index: usize) -> Option<usize> {
    let level = constraints[index].level;
    for (j, constraint) in constraints.iter().enumerate().skip(index + 1) {
        if constraint.level < level {
            return None;
        }
        if constraint.level == level {
            return Some(j);
        }
    }
    None
}

/// Index one past the last heading inside the section opened at `index`.
fn section_end(headings: &[ScannedHeading], index: usize) -> usize {
    let level = headings[index].level;
    headings
        .iter()
        .enumerate()
        .skip(index + 1)
        .find(|(_, heading)| heading.level <= level)
        .map_or(headings.len(), |(k, _)| k)
}

fn missing_heading(path: &str, constraint: &HeadingConstraint, anchor_line: Option<usize>) -> Issue {
    let label = match constraint.pattern.as_deref() {
        Some(pattern) => format!("`{}` ({pattern})", constraint.id),
        None => format!("`{}`", constraint.id),
    };
    let mut issue = Issue::error(
        IssueCode::HeadingMissing,
        path,
        format!(
            "required level-{} heading {label} is missing",
            constraint.level
        ),
    )
    .with("heading_id", constraint.id.as_str())
    .with("level", constraint.level)
    .with("pattern", opt(constraint.pattern.as_deref()))
    .with("prev", opt(constraint.prev.as_deref()))
    .with("next", opt(constraint.next.as_deref()));
    if let Some(line) = anchor_line {
        issue = issue.at(line);
    }
    issue
}

fn numbering_issue(
    path: &str,
    constraint: &HeadingConstraint,
    heading: &ScannedHeading,
    violation: Policy,
) -> Issue {
    let (code, message) = match violation {
        Policy::Required => (
            IssueCode::HeadingNumberingRequired,
            format!("heading \"{}\" must be numbered", heading.title),
        ),
        _ => (
            IssueCode::HeadingNumberingProhibited,
            format!("heading \"{}\" must not be numbered", heading.title),
        ),
    };
    Issue::error(code, path, message)
        .at(heading.line)
        .with("heading_id", constraint.id.as_str())
        .with("title", heading.title.as_str())
}

fn opt(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

struct NumberRun {
    prefix: Vec<u32>,
    last: u32,
    line: usize,
}

/// Consecutive numbered siblings (same level, same parent prefix) must
/// increment by one. A shallower heading ends every deeper run; an
/// unnumbered heading ends the run at its own level.
pub fn check_number_sequence(path: &str, headings: &[ScannedHeading]) -> Vec<Issue> {
    let mut runs: BTreeMap<u8, NumberRun> = BTreeMap::new();
    let mut issues = Vec::new();
    for heading in headings {
        runs.retain(|&level, _| level <= heading.level);
        let Some((&number, prefix)) = heading.number_parts.split_last() else {
            runs.remove(&heading.level);
            continue;
        };
        let previous = runs.get(&heading.level).filter(|run| run.prefix == prefix);
        // A run ending at u32::MAX has no successor; the next heading starts a new run.
        if let Some((previous, expected)) =
            previous.and_then(|run| run.last.checked_add(1).map(|next| (run, next)))
        {
            if number != expected {
                let mut expected_parts = prefix.to_vec();
                expected_parts.push(expected);
                let mut previous_parts = prefix.to_vec();
                previous_parts.push(previous.last);
                let expected = join_number(&expected_parts);
                let previous_number = join_number(&previous_parts);
                issues.push(
                    Issue::error(
                        IssueCode::HeadingNumberSequence,
                        path,
                        format!(
                            "heading number {} should be {expected} (follows {previous_number})",
                            heading.number()
                        ),
                    )
                    .at(heading.line)
                    .with("expected", expected)
                    .with("found", heading.number())
                    .with("previous", previous_number)
                    .with("previous_line", previous.line),
                );
            }
        }
        runs.insert(
            heading.level,
            NumberRun {
                prefix: prefix.to_vec(),
                last: number,
                line: heading.line,
            },
        );
    }
    issues
}

/// Matched heading ids in effect at each point of a document.
#[derive(Debug, Clone, Default)]
pub struct HeadingScopes {
    lines: Vec<usize>,
    levels: Vec<u8>,
    active: Vec<Vec<String>>,
}

impl HeadingScopes {
    fn build(
        constraints: &[HeadingConstraint],
        headings: &[ScannedHeading],
        assignments: &[Option<usize>],
    ) -> Self {
        let mut stack: Vec<(u8, Option<&str>)> = Vec::new();
        let mut active = Vec::with_capacity(headings.len());
        for (heading, assigned) in headings.iter().zip(assignments) {
            while stack.last().is_some_and(|(level, _)| *level >= heading.level) {
                stack.pop();
            }
            stack.push((
                heading.level,
                assigned.map(|index| constraints[index].id.as_str()),
            ));
            active.push(
                stack
                    .iter()
                    .filter_map(|(_, id)| id.map(str::to_string))
                    .collect(),
            );
        }
        Self {
            lines: headings.iter().map(|heading| heading.line).collect(),
            levels: headings.iter().map(|heading| heading.level).collect(),
            active,
        }
    }

    /// Index of the heading whose section contains `line`.
    pub fn section_at(&self, line: usize) -> Option<usize> {
        self.lines.partition_point(|&start| start <= line).checked_sub(1)
    }

    /// Matched heading ids enclosing `line`, outermost first.
    pub fn active_at(&self, line: usize) -> &[String] {
        self.section_at(line)
            .map(|index| self.active[index].as_slice())
            .unwrap_or(&[])
    }

    /// Whether section `inner` lies within section `outer` (inclusive).
    pub fn contains(&self, outer: usize, inner: usize) -> bool {
        if inner < outer || inner >= self.levels.len() {
            return false;
        }
        self.levels[outer + 1..=inner]
            .iter()
            .all(|&level| level > self.levels[outer])
    }
}
