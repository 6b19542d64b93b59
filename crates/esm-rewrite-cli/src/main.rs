#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use esm_rewrite_core::RewriteConfig;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "esm-rewrite")]
#[command(author, version, long_about = None)]
#[command(about = "Rewrite module import specifiers for unbundled serving")]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Config file (defaults to esm-rewrite.json in the working directory)
    #[arg(long, global = true, value_name = "PATH", env = "ESM_REWRITE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Rewrite the import specifiers of a module and print the result
    Rewrite {
        /// Module to rewrite
        file: PathBuf,

        /// Importer path used for skipping and resolution (defaults to the file's absolute path)
        #[arg(long)]
        importer: Option<String>,
    },

    /// List the import occurrences found in a module
    Scan {
        /// Module to scan
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Rewrite { file, importer }) => {
            let config = RewriteConfig::discover(&cwd, cli.config.as_deref()).into_diagnostic()?;
            commands::rewrite::run(&cwd, config, &file, importer.as_deref(), cli.json)
        }
        Some(Commands::Scan { file }) => commands::scan::run(&cwd, &file, cli.json),
    }
}
