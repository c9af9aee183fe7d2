//! Analyze command implementation

use super::output;
use super::source::{self, QuerySource};
use anyhow::{Context, Result};
use colored::*;
use std::path::PathBuf;

/// Configuration for analyze command
pub struct AnalyzeConfig {
    pub source: QuerySource,
    pub output_file: Option<PathBuf>,
}

/// Print the path cohesion tree of every FROM identifier
pub async fn analyze(config: AnalyzeConfig) -> Result<()> {
    let compiler = source::load_compiler(None, None)?;
    let aql = config.source.load()?;

    let trees = compiler
        .analyze(&aql)
        .with_context(|| format!("Failed to analyze {}", config.source.name()))?;

    let mut content = String::new();
    for (identifier, tree) in &trees {
        content.push_str(&format!(
            "{} ({} nodes)\n{tree}\n",
            identifier.cyan().bold(),
            tree.size()
        ));
    }
    output::write_output(content.trim_end(), config.output_file.as_deref())
}
