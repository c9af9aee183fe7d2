//! PostgreSQL specifics: quoting and helper function names

use serde::{Deserialize, Serialize};

/// Aggregate reassembling an RM object from its structure rows
pub const JSONB_OBJECT_AGG: &str = "jsonb_object_agg";
/// Magnitude of an encoded DV_ORDERED value
pub const DV_ORDERED_MAGNITUDE: &str = "jsonb_dv_ordered_magnitude";
pub const MIN_DV_ORDERED: &str = "min_dv_ordered";
pub const MAX_DV_ORDERED: &str = "max_dv_ordered";

/// Options of the generated SQL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlDialect {
    /// Schema holding the JSONB helper functions; unqualified when `None`
    pub json_function_schema: Option<String>,
}

impl SqlDialect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json_function_schema(mut self, schema: impl Into<String>) -> Self {
        self.json_function_schema = Some(schema.into());
        self
    }

    /// Name of a JSONB helper function, qualified with the configured schema
    pub fn json_function(&self, name: &str) -> String {
        match &self.json_function_schema {
            Some(schema) => format!("{}.{name}", quote_ident(schema)),
            None => name.to_string(),
        }
    }
}

/// `"name"`, with embedded quotes doubled
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `'text'`, with embedded quotes doubled
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("sCO_c_0"), "\"sCO_c_0\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_json_function() {
        assert_eq!(SqlDialect::new().json_function(MIN_DV_ORDERED), "min_dv_ordered");
        assert_eq!(
            SqlDialect::new()
                .with_json_function_schema("ext")
                .json_function(DV_ORDERED_MAGNITUDE),
            "\"ext\".jsonb_dv_ordered_magnitude"
        );
    }

    #[test]
    fn test_dialect_from_json() {
        let dialect: SqlDialect = serde_json::from_str(r#"{"json_function_schema": "ehr"}"#).unwrap();
        assert_eq!(dialect.json_function_schema.as_deref(), Some("ehr"));
        let empty: SqlDialect = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SqlDialect::default());
    }
}
