use super::print_json;
use cpt_blueprint::{ConstraintSchema, ParsedBlueprint, compile, parse_blueprint, write_schema};
use serde::Serialize;

#[derive(Serialize)]
struct SkippedBlueprint {
    path: String,
    errors: Vec<String>,
}

#[derive(Serialize)]
struct CompileSummary<'a> {
    out: String,
    changed: bool,
    digest: &'a str,
    artifacts: Vec<&'a str>,
    skipped: Vec<SkippedBlueprint>,
}

pub fn run(blueprints: Vec<String>, out: String, json_output: bool) {
    let mut parsed: Vec<ParsedBlueprint> = Vec::with_capacity(blueprints.len());
    let mut skipped = Vec::new();
    for path in &blueprints {
        let blueprint = parse_blueprint(path).unwrap_or_else(|err| {
            eprintln!("error: {err}");
            std::process::exit(2);
        });
        if blueprint.has_errors() {
            tracing::warn!(path = %path, errors = blueprint.errors.len(), "blueprint skipped");
            skipped.push(SkippedBlueprint {
                path: path.clone(),
                errors: blueprint.error_messages(),
            });
        } else {
            parsed.push(blueprint);
        }
    }

    let schema = compile(&parsed).unwrap_or_else(|err| {
        eprintln!("error: compile failed: {err}");
        std::process::exit(2);
    });
    let changed = write_schema(&out, &schema).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    let summary = CompileSummary {
        out,
        changed,
        digest: &schema.digest,
        artifacts: schema.artifacts.keys().map(String::as_str).collect(),
        skipped,
    };
    if json_output {
        print_json(&summary, "compile summary");
    } else {
        print_human_summary(&summary, &schema);
    }

    if !summary.skipped.is_empty() {
        std::process::exit(1);
    }
}

fn print_human_summary(summary: &CompileSummary<'_>, schema: &ConstraintSchema) {
    println!("cpt compile");
    println!("  Output: {}", summary.out);
    println!(
        "  Changed: {}",
        if summary.changed { "yes" } else { "no (identical)" }
    );
    println!("  Digest: {}", summary.digest);
    println!("  Artifacts:");
    for (kind, artifact) in &schema.artifacts {
        println!(
            "    - {kind}: {} heading(s), {} id kind(s)",
            artifact.headings.len(),
            artifact.defined_id.len()
        );
    }
    for blueprint in &summary.skipped {
        println!("  Skipped: {}", blueprint.path);
        for error in &blueprint.errors {
            println!("    - {error}");
        }
    }
}
