pub mod compile;
pub mod generate;
pub mod scan;
pub mod validate;

use serde::Serialize;

/// Print pretty JSON on stdout, exiting 2 if it cannot be rendered.
pub fn print_json<T: Serialize>(value: &T, label: &str) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|err| {
        eprintln!("error: failed to render {label} JSON: {err}");
        std::process::exit(2);
    });
    println!("{rendered}");
}
