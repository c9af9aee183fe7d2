//! openEHR Archetype Query Language (AQL) compiler for Rust
//!
//! This crate compiles AQL queries into parameterized PostgreSQL statements:
//! - Parsing AQL with `$parameter` placeholders
//! - Rejecting unsupported features and unknown identifiers
//! - Parameter substitution and LIMIT / OFFSET handling
//! - Path and containment analysis against the openEHR reference model
//! - Relational plan (ASL) construction and SQL binding
//!
//! # Example
//!
//! ```
//! use aql::{AqlCompiler, QueryRequest};
//!
//! let compiler = AqlCompiler::with_defaults()?;
//! let request = QueryRequest::new().with_parameter("ehr_id", "7d44b88c-4199-4bad-97dc-d78268e01398");
//! let compiled = compiler.compile(
//!     "SELECT c/uid/value FROM EHR e[ehr_id/value=$ehr_id] CONTAINS COMPOSITION c",
//!     &request,
//! )?;
//! assert!(!compiled.params.is_empty());
//! # Ok::<(), aql::AqlError>(())
//! ```

// Re-export all public APIs from internal crates
pub use aql_analysis as analysis;
pub use aql_asl as asl;
pub use aql_ast as ast;
pub use aql_diagnostics as diagnostics;
pub use aql_model as model;
pub use aql_parser as parser;
pub use aql_sql as sql;

pub mod compiler;
pub mod config;
pub mod features;
pub mod limit;
pub mod params;

// Convenience re-exports
pub use aql_ast::AqlQuery;
pub use aql_diagnostics::{AqlError, Result};
pub use aql_parser::parse;
pub use compiler::{AqlCompiler, CompiledQuery, QueryRequest, ResultColumn};
pub use config::{CompilerConfig, FetchPrecedence};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
