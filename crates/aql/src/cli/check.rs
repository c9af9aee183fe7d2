//! Check command implementation

use super::output;
use super::source::{self, QuerySource};
use anyhow::Result;
use colored::*;
use std::path::PathBuf;

/// Configuration for check command
pub struct CheckConfig {
    pub files: Vec<PathBuf>,
    pub verbose: bool,
}

/// Check AQL files for syntax errors and unsupported features
pub async fn check(config: CheckConfig) -> Result<()> {
    if config.files.is_empty() {
        anyhow::bail!("No files specified for checking");
    }

    let compiler = source::load_compiler(None, None)?;
    let mut failed = 0;

    for file in &config.files {
        let query_source = QuerySource::File(file.clone());
        let result = query_source
            .load()
            .and_then(|aql| compiler.check(&aql).map_err(anyhow::Error::from));

        match result {
            Ok(query) => {
                println!("{} {}", "✓".green().bold(), file.display().to_string().cyan());
                if config.verbose {
                    println!("  {query}");
                }
            }
            Err(e) => {
                failed += 1;
                println!("{} {}", "✗".red().bold(), file.display().to_string().cyan());
                println!("  {}", output::format_error(&e));
            }
        }
    }

    println!();
    if failed == 0 {
        println!(
            "{}",
            output::format_success(&format!("All {} file(s) checked successfully", config.files.len()))
        );
        Ok(())
    } else {
        eprintln!(
            "{} {}",
            "Check failed:".red().bold(),
            format!("{failed} of {} file(s)", config.files.len()).red()
        );
        std::process::exit(1);
    }
}
