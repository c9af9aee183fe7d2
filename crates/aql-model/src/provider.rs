//! RM type-introspection traits

use crate::rm_model::RmAttributeInfo;
use aql_diagnostics::{AqlError, AQL0301, AQL0401};
use indexmap::{IndexMap, IndexSet};

/// Read-only reflection over reference model types, used by path analysis
pub trait RmTypeIntrospection: Send + Sync {
    /// All attributes of a type including inherited ones, `None` for unknown types
    fn attributes_of(&self, rm_type: &str) -> Option<IndexMap<String, RmAttributeInfo>>;

    /// The type itself and all its transitive subtypes
    fn descendant_types_of(&self, rm_type: &str) -> IndexSet<String>;

    /// Non-abstract subtypes; names outside the model resolve to themselves
    fn concrete_types_of(&self, rm_type: &str) -> IndexSet<String>;

    /// Check if the model knows the type
    fn has_type(&self, rm_type: &str) -> bool;
}

/// Model provider error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelProviderError {
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<ModelProviderError> for AqlError {
    fn from(err: ModelProviderError) -> Self {
        match err {
            ModelProviderError::TypeNotFound(t) => AqlError::unknown_rm_type(t),
            ModelProviderError::ParseError(msg) => AqlError::model(AQL0301, msg),
            ModelProviderError::IoError(msg) => AqlError::system(AQL0401, msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aql_diagnostics::AQL0300;

    #[test]
    fn test_error_conversion() {
        let err: AqlError = ModelProviderError::TypeNotFound("FOO".to_string()).into();
        assert_eq!(err.code(), AQL0300);
        let err: AqlError = ModelProviderError::ParseError("bad".to_string()).into();
        assert_eq!(err.code(), AQL0301);
    }
}
