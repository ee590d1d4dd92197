use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cpt",
    about = "cpt: compile blueprints into constraints and validate documents against them",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile kit blueprints into one constraint schema
    Compile {
        /// Blueprint markdown files
        #[arg(required = true)]
        blueprints: Vec<String>,

        /// Schema output path
        #[arg(long, default_value = "constraints.json")]
        out: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render rules, checklist, template, and example for one blueprint
    Generate {
        /// Blueprint markdown file
        blueprint: String,

        /// Directory receiving the rendered documents
        #[arg(long)]
        out_dir: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate documents against a compiled schema
    Validate {
        /// Project config (defaults to ./cpt.toml when present)
        #[arg(long)]
        config: Option<String>,

        /// Compiled schema path (overrides the config)
        #[arg(long)]
        schema: Option<String>,

        /// Registered system (repeatable)
        #[arg(long = "system")]
        systems: Vec<String>,

        /// System defined outside the validated set (repeatable)
        #[arg(long = "external-system")]
        external_systems: Vec<String>,

        /// Document to validate as KIND=PATH (repeatable)
        #[arg(long = "artifact", value_name = "KIND=PATH")]
        artifacts: Vec<String>,

        /// Identifier referenced from code (repeatable; enables code coverage)
        #[arg(long = "code-ref")]
        code_refs: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the headings and identifiers scanned from one markdown file
    Scan {
        /// Markdown file
        file: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
