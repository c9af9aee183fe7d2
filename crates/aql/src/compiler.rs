//! The compiler facade: AQL text in, bound PostgreSQL statement out

use crate::config::CompilerConfig;
use crate::features::check_features;
use crate::limit::LimitProcessor;
use crate::params::ParameterSubstitution;
use aql_analysis::{analyze_path_cohesion, AttributeInfos, PathCohesionTreeNode};
use aql_asl::{AslBuilder, AslPlan, SqlValue};
use aql_ast::{AqlQuery, ColumnExpression};
use aql_diagnostics::Result;
use aql_model::{InMemoryKnowledgeCache, KnowledgeCache};
use aql_sql::SqlBinder;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Per-request inputs besides the query text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub parameters: Map<String, Value>,
    pub fetch: Option<i64>,
    pub offset: Option<i64>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_fetch(mut self, fetch: i64) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A result column of the compiled statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultColumn {
    /// The alias, or the AQL expression as written
    pub name: String,
    /// The selected path, if the column is a path or an aggregate over one
    pub path: Option<String>,
}

/// A compiled query, ready to be executed with its parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub columns: Vec<ResultColumn>,
}

/// Compiles AQL queries to PostgreSQL
///
/// # Example
///
/// ```
/// use aql::{AqlCompiler, QueryRequest};
///
/// let compiler = AqlCompiler::with_defaults().unwrap();
/// let compiled = compiler
///     .compile("SELECT c/uid/value FROM EHR e CONTAINS COMPOSITION c", &QueryRequest::new())
///     .unwrap();
/// assert!(compiled.sql.starts_with("SELECT"));
/// assert_eq!(compiled.columns[0].name, "c/uid/value");
/// ```
pub struct AqlCompiler {
    config: CompilerConfig,
    infos: AttributeInfos,
    knowledge: Arc<dyn KnowledgeCache>,
}

impl AqlCompiler {
    pub fn new(config: CompilerConfig, knowledge: Arc<dyn KnowledgeCache>) -> Result<Self> {
        config.validate()?;
        let infos = AttributeInfos::openehr()?;
        Ok(Self {
            config,
            infos,
            knowledge,
        })
    }

    /// Default configuration without any known templates
    pub fn with_defaults() -> Result<Self> {
        Self::new(CompilerConfig::default(), Arc::new(InMemoryKnowledgeCache::new()))
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Parse a query and reject unsupported features; parameters stay unresolved
    pub fn check(&self, aql: &str) -> Result<AqlQuery> {
        let query = aql_parser::parse(aql)?;
        check_features(&query)?;
        Ok(query)
    }

    /// Path cohesion trees of every FROM identifier
    pub fn analyze(&self, aql: &str) -> Result<IndexMap<String, PathCohesionTreeNode>> {
        let query = self.check(aql)?;
        analyze_path_cohesion(&query)
    }

    /// Resolve parameters and paging of a checked query
    pub fn prepare(&self, aql: &str, request: &QueryRequest) -> Result<AqlQuery> {
        let mut query = self.check(aql)?;
        ParameterSubstitution::new(&request.parameters).apply(&mut query)?;
        LimitProcessor::new(&self.config).apply(&mut query, request.fetch, request.offset)?;
        log::debug!("Prepared query: {query}");
        Ok(query)
    }

    /// Relational plan of a prepared query
    pub fn plan(&self, query: &AqlQuery) -> Result<AslPlan> {
        AslBuilder::new(&self.infos, self.knowledge.as_ref(), &self.config.system_id)
            .known_templates_only(self.config.known_templates_only)
            .build(query)
    }

    pub fn compile(&self, aql: &str, request: &QueryRequest) -> Result<CompiledQuery> {
        let query = self.prepare(aql, request)?;
        self.compile_query(&query)
    }

    /// Compile an already prepared query
    pub fn compile_query(&self, query: &AqlQuery) -> Result<CompiledQuery> {
        let plan = self.plan(query)?;
        let bound = SqlBinder::new(&plan, &self.config.dialect, &self.config.system_id).bind()?;

        let mut columns: Vec<ResultColumn> = query
            .select
            .statements
            .iter()
            .map(|statement| ResultColumn {
                name: statement.column_name(),
                path: statement.column.identified_path().map(ToString::to_string),
            })
            .collect();
        let only_primitives = query
            .select
            .statements
            .iter()
            .all(|s| matches!(s.column, ColumnExpression::Primitive(_)));
        if only_primitives {
            columns.push(ResultColumn {
                name: "COUNT(*)".to_string(),
                path: None,
            });
        }
        log::info!(
            "Compiled query with {} columns and {} parameters",
            columns.len(),
            bound.params.len()
        );

        Ok(CompiledQuery {
            sql: bound.sql,
            params: bound.params,
            columns,
        })
    }
}
