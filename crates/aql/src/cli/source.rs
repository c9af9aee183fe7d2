//! Loading of queries, configuration and template metadata for CLI commands

use crate::compiler::AqlCompiler;
use crate::config::CompilerConfig;
use crate::model::InMemoryKnowledgeCache;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the AQL text comes from
#[derive(Debug, Clone)]
pub enum QuerySource {
    Inline(String),
    File(PathBuf),
}

impl QuerySource {
    /// Inline text wins over a file
    pub fn from_args(query: Option<String>, file: Option<PathBuf>) -> Result<Self> {
        match (query, file) {
            (Some(query), _) => Ok(Self::Inline(query)),
            (None, Some(file)) => Ok(Self::File(file)),
            (None, None) => anyhow::bail!("No query given. Pass the AQL text or --file <path>"),
        }
    }

    pub fn load(&self) -> Result<String> {
        match self {
            Self::Inline(query) => Ok(query.clone()),
            Self::File(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read AQL file: {}", path.display())),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Inline(_) => "<query>".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Compiler built from optional configuration and template files
pub fn load_compiler(config: Option<&Path>, templates: Option<&Path>) -> Result<AqlCompiler> {
    let config = match config {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };

    let knowledge = match templates {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read templates file: {}", path.display()))?;
            let cache = InMemoryKnowledgeCache::from_json_str(&json)
                .with_context(|| format!("Invalid templates file: {}", path.display()))?;
            log::info!("Loaded {} templates from {}", cache.len(), path.display());
            cache
        }
        None => InMemoryKnowledgeCache::new(),
    };

    Ok(AqlCompiler::new(config, Arc::new(knowledge))?)
}

/// Parameters given as a JSON object, inline or as `@file`
pub fn load_parameters(params: Option<&str>) -> Result<Map<String, Value>> {
    let Some(params) = params else {
        return Ok(Map::new());
    };
    let json = match params.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters file: {path}"))?,
        None => params.to_string(),
    };
    match serde_json::from_str(&json).context("Invalid parameters JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Parameters must be a JSON object, got: {other}"),
    }
}
