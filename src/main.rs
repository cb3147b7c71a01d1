//! Template Graft CLI
//!
//! Usage:
//!   template-graft [OPTIONS] <COMMAND>
//!
//! Commands:
//!   compile <FILES>... --id <ID>  Print the compiled markup of one template
//!   check <FILES>...              Compile every template and report errors
//!   catalog <FILES>...            List translatable strings
//!
//! Options:
//!   -c, --config <FILE>  Engine configuration (TOML format)
//!   -h, --help           Print help
//!
//! Log verbosity follows `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use template_graft::{EngineConfig, TemplateEngine};

#[derive(Parser)]
#[command(name = "template-graft")]
#[command(about = "Compose markup templates through extension and patching")]
struct Cli {
    /// Engine configuration file (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the compiled markup of one template
    Compile {
        /// Template sources, loaded in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Template to compile
        #[arg(short, long)]
        id: String,
    },

    /// Compile every template and report errors
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List translatable strings as `context<TAB>message` lines
    Catalog {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("template_graft=info,warn")),
        )
        .try_init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    let engine = TemplateEngine::with_config(config);

    match cli.command {
        Command::Compile { files, id } => {
            load_all(&engine, &files);
            match engine.compile(&id) {
                Ok(compiled) => println!("{}", compiled.to_markup()),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Check { files } => {
            load_all(&engine, &files);
            let mut failures = 0;
            for (id, outcome) in engine.compile_all() {
                match outcome {
                    Ok(compiled) => println!("ok    {} ({} source(s))", id, compiled.contributors.len()),
                    Err(e) => {
                        failures += 1;
                        println!("error {}: {}", id, e);
                    }
                }
            }
            if failures > 0 {
                eprintln!("{} template(s) failed to compile", failures);
                std::process::exit(1);
            }
        }
        Command::Catalog { files } => {
            load_all(&engine, &files);
            match engine.export_catalog() {
                Ok(entries) => {
                    for entry in entries {
                        println!("{}\t{}", entry.context, entry.message);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Register every file, exiting on the first error
fn load_all(engine: &TemplateEngine, files: &[PathBuf]) {
    for path in files {
        load_file(engine, path);
    }
}

fn load_file(engine: &TemplateEngine, path: &Path) {
    let name = path.display().to_string();
    let source = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", name, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = engine.register_named_source(&name, &source) {
        eprintln!("{}", e.format(&source, &name));
        std::process::exit(1);
    }
}
