//! Compile command implementation

use super::output::{self, OutputFormat};
use super::source::{self, QuerySource};
use crate::compiler::QueryRequest;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Configuration for compile command
pub struct CompileConfig {
    pub source: QuerySource,
    pub params: Option<String>,
    pub fetch: Option<i64>,
    pub offset: Option<i64>,
    pub config_file: Option<PathBuf>,
    pub templates: Option<PathBuf>,
    pub format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// Compile AQL to SQL
pub async fn compile(config: CompileConfig) -> Result<()> {
    let compiler = source::load_compiler(config.config_file.as_deref(), config.templates.as_deref())?;
    let aql = config.source.load()?;

    let mut request = QueryRequest::new().with_parameters(source::load_parameters(config.params.as_deref())?);
    request.fetch = config.fetch;
    request.offset = config.offset;

    let compiled = compiler
        .compile(&aql, &request)
        .with_context(|| format!("Failed to compile {}", config.source.name()))?;

    let content = match config.format {
        OutputFormat::Text => output::format_compiled(&compiled),
        OutputFormat::Json => output::format_json(&compiled, false)?,
        OutputFormat::JsonPretty => output::format_json(&compiled, true)?,
    };
    output::write_output(&content, config.output_file.as_deref())
}
