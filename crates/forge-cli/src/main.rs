//! # forge-cli
//!
//! Command-line interface for the forge graph construction engine.
//!
//! Schema definition files are loaded first, then declaration files are
//! built against them and printed as JSON.

use clap::Parser;
use forge_graph::Forge;
use forge_schema::Decl;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Schema-driven object graph builder")]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Build declarations against schemas and print the graphs as JSON
    Build {
        /// Declaration file path (YAML or JSON)
        input: PathBuf,

        /// Schema definition file path, repeatable
        #[arg(short, long)]
        schema: Vec<PathBuf>,

        /// Emit compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Check declarations against schemas without printing the graphs
    Check {
        /// Declaration file path (YAML or JSON)
        input: PathBuf,

        /// Schema definition file path, repeatable
        #[arg(short, long)]
        schema: Vec<PathBuf>,
    },

    /// List the schema names defined by the given files
    Schemas {
        /// Schema definition file paths
        schema: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            schema,
            compact,
        } => {
            let forge = load_schemas(&schema)?;
            for decl in Decl::many_from_file(&input)? {
                tracing::info!("Building declaration: {}", decl.name);
                let built = forge.build(&decl)?;
                let rendered = if compact {
                    serde_json::to_string(&built)?
                } else {
                    serde_json::to_string_pretty(&built)?
                };
                println!("{rendered}");
            }
            Ok(())
        }
        Commands::Check { input, schema } => {
            let forge = load_schemas(&schema)?;
            let decls = Decl::many_from_file(&input)?;
            for decl in &decls {
                tracing::info!("Checking declaration: {}", decl.name);
                forge.build(decl)?;
            }
            println!("{} declaration(s) OK", decls.len());
            Ok(())
        }
        Commands::Schemas { schema } => {
            let forge = load_schemas(&schema)?;
            for name in forge.schema_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// Define every schema from the given files into a fresh session.
fn load_schemas(paths: &[PathBuf]) -> anyhow::Result<Forge> {
    let mut forge = Forge::new();
    for path in paths {
        tracing::info!("Loading schema file: {}", path.display());
        for decl in Decl::many_from_file(path)? {
            forge.define(&decl)?;
        }
    }
    Ok(forge)
}
