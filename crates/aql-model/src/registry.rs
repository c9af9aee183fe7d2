//! Model registry implementing RmTypeIntrospection
//!
//! This module provides a concrete implementation of RmTypeIntrospection using RmModel.

use crate::provider::{ModelProviderError, RmTypeIntrospection};
use crate::rm_model::{OPENEHR_RM_JSON, RmAttributeInfo, RmModel};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use std::sync::Arc;

/// Model registry that implements RmTypeIntrospection
#[derive(Clone)]
pub struct RmModelRegistry {
    model: Arc<RwLock<RmModel>>,
}

impl RmModelRegistry {
    /// Create a new model registry from an RmModel
    pub fn new(model: RmModel) -> Self {
        Self {
            model: Arc::new(RwLock::new(model)),
        }
    }

    /// The bundled openEHR reference model
    pub fn openehr() -> Result<Self, ModelProviderError> {
        Self::from_json(OPENEHR_RM_JSON)
    }

    /// Load an RmModel from JSON string
    pub fn from_json(json: &str) -> Result<Self, ModelProviderError> {
        let model = crate::rm_model::parse_json(json)
            .map_err(|e| ModelProviderError::ParseError(e.to_string()))?;
        Ok(Self::new(model))
    }

    /// Load an RmModel from JSON file at runtime
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ModelProviderError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ModelProviderError::IoError(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Load a model file, checking the extension
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ModelProviderError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            Some(ext) => Err(ModelProviderError::ParseError(format!(
                "Unsupported file extension: .{}. Expected .json",
                ext
            ))),
            None => Err(ModelProviderError::ParseError(
                "No file extension found. Expected .json".to_string(),
            )),
        }
    }

    /// Get the model name
    pub fn model_name(&self) -> String {
        self.model.read().name.clone()
    }

    /// Get the model version
    pub fn model_version(&self) -> String {
        self.model.read().version.clone()
    }

    /// All type names in declaration order
    pub fn type_names(&self) -> Vec<String> {
        self.model.read().type_infos.keys().cloned().collect()
    }

    /// Whether the type is abstract; unknown types are not
    pub fn is_abstract(&self, rm_type: &str) -> bool {
        self.model
            .read()
            .get_type(rm_type)
            .is_some_and(|t| t.is_abstract)
    }

    /// Direct subtypes of a type
    pub fn direct_descendants_of(&self, rm_type: &str) -> Vec<String> {
        self.model
            .read()
            .direct_descendants_of(rm_type)
            .into_iter()
            .map(|t| t.name.clone())
            .collect()
    }

    /// Look up an attribute, failing for unknown types
    pub fn attribute(
        &self,
        rm_type: &str,
        attribute: &str,
    ) -> Result<Option<RmAttributeInfo>, ModelProviderError> {
        let model = self.model.read();
        if !model.has_type(rm_type) {
            return Err(ModelProviderError::TypeNotFound(rm_type.to_string()));
        }
        Ok(model.get_attribute(rm_type, attribute).cloned())
    }
}

impl RmTypeIntrospection for RmModelRegistry {
    fn attributes_of(&self, rm_type: &str) -> Option<IndexMap<String, RmAttributeInfo>> {
        self.model.read().attributes_of(rm_type)
    }

    fn descendant_types_of(&self, rm_type: &str) -> IndexSet<String> {
        self.model.read().descendant_types_of(rm_type)
    }

    fn concrete_types_of(&self, rm_type: &str) -> IndexSet<String> {
        self.model.read().concrete_types_of(rm_type)
    }

    fn has_type(&self, rm_type: &str) -> bool {
        self.model.read().has_type(rm_type)
    }
}
