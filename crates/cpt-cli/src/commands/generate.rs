use super::print_json;
use cpt_blueprint::{BlueprintError, parse_blueprint, write_outputs};
use serde_json::json;

pub fn run(blueprint: String, out_dir: String, json_output: bool) {
    let parsed = parse_blueprint(&blueprint).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    match write_outputs(&parsed, &out_dir) {
        Ok(written) => {
            let files: Vec<String> = written
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            if json_output {
                print_json(
                    &json!({
                        "blueprint": blueprint,
                        "artifact": parsed.artifact_kind,
                        "codebase": parsed.codebase,
                        "written": files,
                    }),
                    "generate summary",
                );
            } else {
                println!("cpt generate");
                println!("  Blueprint: {blueprint}");
                println!("  Artifact: {}", parsed.artifact_kind);
                println!("  Written:");
                for file in &files {
                    println!("    - {file}");
                }
            }
        }
        Err(BlueprintError::HasErrors { .. }) => {
            let errors = parsed.error_messages();
            if json_output {
                print_json(
                    &json!({ "blueprint": blueprint, "errors": errors }),
                    "generate summary",
                );
            } else {
                eprintln!("error: {blueprint} has parse errors; nothing generated");
                for error in &errors {
                    eprintln!("  - {error}");
                }
            }
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    }
}
