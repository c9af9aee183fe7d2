//! AQL command-line interface

use aql::cli::source::QuerySource;
use aql::cli::{analyze, check, compile, logging, output};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AQL command-line tool
#[derive(Parser)]
#[command(name = "aqlc")]
#[command(author, version, about = "openEHR Archetype Query Language (AQL) compiler", long_about = None)]
struct Cli {
    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an AQL query to PostgreSQL
    Compile {
        /// AQL query text
        query: Option<String>,

        /// Read the query from a file
        #[arg(long, conflicts_with = "query")]
        file: Option<PathBuf>,

        /// Query parameters as a JSON object, or @file
        #[arg(short, long)]
        params: Option<String>,

        /// Fetch (page size) request parameter
        #[arg(long)]
        fetch: Option<i64>,

        /// Offset request parameter
        #[arg(long)]
        offset: Option<i64>,

        /// Compiler configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Known templates (JSON array of template metadata)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Output format (text, json, pretty)
        #[arg(short = 'f', long, default_value = "text")]
        format: String,
    },

    /// Show the path cohesion trees of a query
    Analyze {
        /// AQL query text
        query: Option<String>,

        /// Read the query from a file
        #[arg(long, conflicts_with = "query")]
        file: Option<PathBuf>,
    },

    /// Check AQL files for errors and unsupported features
    Check {
        /// AQL files to check
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);
    logging::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            query,
            file,
            params,
            fetch,
            offset,
            config,
            templates,
            format,
        } => match QuerySource::from_args(query, file) {
            Ok(source) => {
                let config = compile::CompileConfig {
                    source,
                    params,
                    fetch,
                    offset,
                    config_file: config,
                    templates,
                    format: output::OutputFormat::parse(&format),
                    output_file: cli.output.clone(),
                };
                compile::compile(config).await
            }
            Err(e) => Err(e),
        },

        Commands::Analyze { query, file } => match QuerySource::from_args(query, file) {
            Ok(source) => {
                let config = analyze::AnalyzeConfig {
                    source,
                    output_file: cli.output.clone(),
                };
                analyze::analyze(config).await
            }
            Err(e) => Err(e),
        },

        Commands::Check { files } => {
            let config = check::CheckConfig {
                files,
                verbose: cli.verbose,
            };
            check::check(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
