use super::print_json;
use cpt_blueprint::load_schema;
use cpt_validate::{
    ArtifactSpec, CONFIG_FILE, ProjectConfig, Report, ValidateError, ValidationContext,
    validate_paths,
};
use std::path::{Path, PathBuf};

pub struct Args {
    pub config: Option<String>,
    pub schema: Option<String>,
    pub systems: Vec<String>,
    pub external_systems: Vec<String>,
    pub artifacts: Vec<String>,
    pub code_refs: Vec<String>,
    pub json: bool,
}

struct Plan {
    schema: PathBuf,
    systems: Vec<String>,
    external_systems: Vec<String>,
    code_references: Option<Vec<String>>,
    artifacts: Vec<ArtifactSpec>,
}

pub fn run(args: Args) {
    let json_output = args.json;
    let plan = build_plan(args).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });
    let schema = load_schema(&plan.schema).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    let mut ctx =
        ValidationContext::new(schema, plan.systems).with_external_systems(plan.external_systems);
    if let Some(ids) = plan.code_references {
        ctx = ctx.with_code_references(ids);
    }
    let report = validate_paths(&ctx, &plan.artifacts);

    if json_output {
        print_json(&report, "validation report");
    } else {
        print_human_summary(&report, plan.artifacts.len());
    }

    if !report.passed() {
        std::process::exit(1);
    }
}

/// Merge the project config (explicit or `./cpt.toml`) with command-line flags.
fn build_plan(args: Args) -> Result<Plan, ValidateError> {
    let config_path = args.config.map(PathBuf::from).or_else(|| {
        let default = Path::new(CONFIG_FILE);
        default.is_file().then(|| default.to_path_buf())
    });
    let config = match &config_path {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::default(),
    };

    let schema = match (args.schema, &config_path) {
        (Some(schema), _) => PathBuf::from(schema),
        (None, Some(path)) => config.schema_path(path)?.to_path_buf(),
        (None, None) => PathBuf::from("constraints.json"),
    };

    let mut artifacts = config.artifacts;
    for spec in &args.artifacts {
        artifacts.push(spec.parse()?);
    }
    if artifacts.is_empty() {
        return Err(ValidateError::NoDocuments);
    }

    let code_references = match (config.code_references, args.code_refs.is_empty()) {
        (None, true) => None,
        (configured, _) => Some(
            configured
                .unwrap_or_default()
                .into_iter()
                .chain(args.code_refs)
                .collect(),
        ),
    };

    Ok(Plan {
        schema,
        systems: config.systems.into_iter().chain(args.systems).collect(),
        external_systems: config
            .external_systems
            .into_iter()
            .chain(args.external_systems)
            .collect(),
        code_references,
        artifacts,
    })
}

fn print_human_summary(report: &Report, documents: usize) {
    println!("cpt validate");
    println!("  Documents: {documents}");
    println!(
        "  Result: {}",
        if report.passed() { "PASS" } else { "FAIL" }
    );
    if !report.errors.is_empty() {
        println!("  Errors ({}):", report.errors.len());
        for issue in &report.errors {
            println!("    - {issue}");
        }
    }
    if !report.warnings.is_empty() {
        println!("  Warnings ({}):", report.warnings.len());
        for issue in &report.warnings {
            println!("    - {issue}");
        }
    }
}
