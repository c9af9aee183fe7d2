//! Output formatting utilities

use crate::compiler::CompiledQuery;
use crate::diagnostics::AqlError;
use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use std::fs::File;
use std::io::{IsTerminal, Write};
use std::path::Path;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" | "json-pretty" => Self::JsonPretty,
            _ => Self::Text,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(std::io::stdout().is_terminal()),
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<AqlError>() {
        Some(aql) => format_aql_error(aql),
        None => format!("{} {}", "Error:".red().bold(), error),
    }
}

/// Format a compiler error with its location and context
pub fn format_aql_error(error: &AqlError) -> String {
    let diagnostic = error.to_diagnostic();
    let mut out = format!(
        "{} {}",
        format!("Error[{}]:", diagnostic.code).red().bold(),
        diagnostic.message
    );
    if let Some(location) = &diagnostic.location {
        out.push_str(&format!("\n  {} {}", "at".cyan(), location));
    }
    if let Some(help) = &diagnostic.help {
        out.push_str(&format!("\n  {} {}", "note:".yellow(), help));
    }
    out
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Plain text rendering of a compiled query
pub fn format_compiled(compiled: &CompiledQuery) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n{}\n", "-- SQL".dimmed(), compiled.sql));
    if !compiled.params.is_empty() {
        out.push_str(&format!("\n{}\n", "-- Parameters".dimmed()));
        for (i, param) in compiled.params.iter().enumerate() {
            out.push_str(&format!("${} = {param}\n", i + 1));
        }
    }
    out.push_str(&format!("\n{}\n", "-- Columns".dimmed()));
    for (i, column) in compiled.columns.iter().enumerate() {
        match &column.path {
            Some(path) if *path != column.name => {
                out.push_str(&format!("c{i}: {} ({path})\n", column.name.cyan()))
            }
            _ => out.push_str(&format!("c{i}: {}\n", column.name.cyan())),
        }
    }
    out
}

/// Serialize a value as JSON
pub fn format_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{content}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ResultColumn;
    use crate::diagnostics::AQL0102;
    use crate::asl::SqlValue;

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("pretty"), OutputFormat::JsonPretty);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("other"), OutputFormat::Text);
    }

    #[test]
    fn test_format_compiled() {
        colored::control::set_override(false);
        let compiled = CompiledQuery {
            sql: "SELECT 1".to_string(),
            params: vec![SqlValue::Long(0)],
            columns: vec![ResultColumn {
                name: "uid".to_string(),
                path: Some("c/uid/value".to_string()),
            }],
        };
        let text = format_compiled(&compiled);
        assert!(text.contains("SELECT 1"), "{text}");
        assert!(text.contains("$1 = "), "{text}");
        assert!(text.contains("c0: uid (c/uid/value)"), "{text}");
    }

    #[test]
    fn test_format_aql_error() {
        colored::control::set_override(false);
        let error = anyhow::Error::new(AqlError::semantic(AQL0102, "Unknown identifier: x"));
        let text = format_error(&error);
        assert!(text.starts_with("Error[AQL0102]:"), "{text}");
        assert!(text.contains("Unknown identifier: x"), "{text}");
    }
}
