//! AQL Abstract Syntax Tree definitions
//!
//! This crate defines the AST nodes for openEHR AQL as consumed by the query compiler:
//! containment expressions, object paths with predicates, and the SELECT / WHERE /
//! ORDER BY / LIMIT clauses. Every node renders back to canonical AQL via `Display`.

mod condition;
mod containment;
mod path;
mod primitive;
mod query;

pub use condition::*;
pub use containment::*;
pub use path::*;
pub use primitive::*;
pub use query::*;
