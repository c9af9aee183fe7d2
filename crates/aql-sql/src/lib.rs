//! SQL synthesis for AQL
//!
//! This crate provides:
//! - The binder rendering an [`aql_asl::AslPlan`] into one PostgreSQL statement ([`SqlBinder`])
//! - Typed `$n` placeholders and their values ([`BindParams`])
//! - Dialect options such as the schema of the JSONB helper functions ([`SqlDialect`])

pub mod binder;
pub mod dialect;
pub mod params;

pub use binder::{BoundQuery, SqlBinder};
pub use dialect::SqlDialect;
pub use params::BindParams;

use aql_asl::AslPlan;
use aql_diagnostics::Result;

/// Render a plan with the given dialect
pub fn bind(plan: &AslPlan, dialect: &SqlDialect, system_id: &str) -> Result<BoundQuery> {
    SqlBinder::new(plan, dialect, system_id).bind()
}
