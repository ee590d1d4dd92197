use super::print_json;
use cpt_validate::{OccurrenceType, scan_headings, scan_identifiers};
use serde_json::json;
use std::fs;

pub fn run(file: String, json_output: bool) {
    let text = fs::read_to_string(&file).unwrap_or_else(|err| {
        eprintln!("error: failed to read {file}: {err}");
        std::process::exit(2);
    });
    let headings = scan_headings(&text);
    let ids = scan_identifiers(&text);

    if json_output {
        print_json(
            &json!({ "path": file, "headings": headings, "ids": ids }),
            "scan",
        );
        return;
    }

    println!("cpt scan");
    println!("  File: {file}");
    println!("  Headings:");
    for heading in &headings {
        println!(
            "    {:>4}  {} {}",
            heading.line,
            "#".repeat(usize::from(heading.level)),
            heading.title
        );
    }
    println!("  Identifiers:");
    for id in &ids {
        let kind = match id.occurrence {
            OccurrenceType::Definition => "def",
            OccurrenceType::Reference => "ref",
        };
        let task = match (id.has_task, id.checked) {
            (false, _) => "   ",
            (true, false) => "[ ]",
            (true, true) => "[x]",
        };
        println!("    {:>4}  {kind} {task} {}", id.line, id.id);
    }
}
