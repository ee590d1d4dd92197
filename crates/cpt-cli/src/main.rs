//! cpt CLI: the `cpt` command.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            blueprints,
            out,
            json,
        } => commands::compile::run(blueprints, out, json),

        Commands::Generate {
            blueprint,
            out_dir,
            json,
        } => commands::generate::run(blueprint, out_dir, json),

        Commands::Validate {
            config,
            schema,
            systems,
            external_systems,
            artifacts,
            code_refs,
            json,
        } => commands::validate::run(commands::validate::Args {
            config,
            schema,
            systems,
            external_systems,
            artifacts,
            code_refs,
            json,
        }),

        Commands::Scan { file, json } => commands::scan::run(file, json),
    }
}
