//! Compiler configuration

use aql_diagnostics::{AqlError, Result, AQL0400, AQL0401};
use aql_sql::SqlDialect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Value of `EHR/system_id` unless configured otherwise
pub const DEFAULT_SYSTEM_ID: &str = "local.ehrbase.org";

/// How a fetch parameter combines with a LIMIT in the query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchPrecedence {
    /// Fetch and offset parameters are rejected when the query has a LIMIT
    #[default]
    Reject,
    /// The smaller of LIMIT and fetch wins; rejected when the query has an OFFSET
    MinFetch,
}

impl fmt::Display for FetchPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPrecedence::Reject => f.write_str("REJECT"),
            FetchPrecedence::MinFetch => f.write_str("MIN_FETCH"),
        }
    }
}

/// Configuration of an [`crate::AqlCompiler`]
///
/// # Example
///
/// ```
/// use aql::{CompilerConfig, FetchPrecedence};
///
/// let config = CompilerConfig::from_json_str(r#"{"max_limit": 1000, "fetch_precedence": "MIN_FETCH"}"#).unwrap();
/// assert_eq!(config.max_limit, Some(1000));
/// assert_eq!(config.fetch_precedence, FetchPrecedence::MinFetch);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// LIMIT applied when neither the query nor the fetch parameter sets one
    pub default_limit: Option<i64>,
    /// Queries with a larger LIMIT are rejected
    pub max_limit: Option<i64>,
    /// Larger fetch parameters are rejected
    pub max_fetch: Option<i64>,
    pub fetch_precedence: FetchPrecedence,
    /// Returned for `EHR/system_id` and embedded in version uids
    pub system_id: String,
    /// COMPOSITION archetypes that no known template uses match nothing
    pub known_templates_only: bool,
    pub dialect: SqlDialect,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_limit: None,
            max_limit: None,
            max_fetch: None,
            fetch_precedence: FetchPrecedence::default(),
            system_id: DEFAULT_SYSTEM_ID.to_string(),
            known_templates_only: false,
            dialect: SqlDialect::default(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AqlError::system(AQL0400, format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AqlError::system(AQL0401, format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json).map_err(|e| e.with_context(path.display().to_string()))
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = Some(limit);
        self
    }

    pub fn with_max_limit(mut self, limit: i64) -> Self {
        self.max_limit = Some(limit);
        self
    }

    pub fn with_max_fetch(mut self, fetch: i64) -> Self {
        self.max_fetch = Some(fetch);
        self
    }

    pub fn with_fetch_precedence(mut self, precedence: FetchPrecedence) -> Self {
        self.fetch_precedence = precedence;
        self
    }

    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = system_id.into();
        self
    }

    pub fn with_known_templates_only(mut self, enabled: bool) -> Self {
        self.known_templates_only = enabled;
        self
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Check bounds for consistency
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("default_limit", self.default_limit),
            ("max_limit", self.max_limit),
            ("max_fetch", self.max_fetch),
        ] {
            if value.is_some_and(|v| v < 0) {
                return Err(AqlError::system(AQL0400, format!("{name} must not be negative")));
            }
        }
        if let (Some(default), Some(max)) = (self.default_limit, self.max_limit) {
            if default > max {
                return Err(AqlError::system(
                    AQL0400,
                    format!("default_limit {default} exceeds max_limit {max}"),
                ));
            }
        }
        if self.system_id.is_empty() {
            return Err(AqlError::system(AQL0400, "system_id must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.system_id, DEFAULT_SYSTEM_ID);
        assert_eq!(config.fetch_precedence, FetchPrecedence::Reject);
        assert!(config.default_limit.is_none());
        assert!(!config.known_templates_only);
        assert_eq!(CompilerConfig::from_json_str("{}").unwrap(), config);
    }

    #[test]
    fn test_partial_json() {
        let config = CompilerConfig::from_json_str(
            r#"{"default_limit": 100, "dialect": {"json_function_schema": "ehr"}}"#,
        )
        .unwrap();
        assert_eq!(config.default_limit, Some(100));
        assert_eq!(config.dialect.json_function_schema.as_deref(), Some("ehr"));
        assert_eq!(config.system_id, DEFAULT_SYSTEM_ID);
    }

    #[test]
    fn test_invalid_config() {
        let err = CompilerConfig::from_json_str(r#"{"fetch_precedence": "MAX"}"#).unwrap_err();
        assert_eq!(err.code(), AQL0400);

        let err = CompilerConfig::from_json_str(r#"{"default_limit": 50, "max_limit": 10}"#)
            .unwrap_err();
        assert!(err.message().contains("exceeds max_limit"), "{err}");

        let err = CompilerConfig::new().with_max_fetch(-1).validate().unwrap_err();
        assert_eq!(err.code(), AQL0400);
    }

    #[test]
    fn test_fetch_precedence_display() {
        assert_eq!(FetchPrecedence::MinFetch.to_string(), "MIN_FETCH");
        let json = serde_json::to_string(&FetchPrecedence::MinFetch).unwrap();
        assert_eq!(json, "\"MIN_FETCH\"");
    }
}
