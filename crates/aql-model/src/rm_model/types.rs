//! Reference model type metadata

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Reflection metadata for a reference model (type hierarchy and declared attributes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmModel {
    /// Model name (e.g., "openEHR-RM")
    pub name: String,
    /// Model version
    pub version: String,
    /// Specification URL
    pub url: String,
    /// Type definitions, in declaration order
    pub type_infos: IndexMap<String, RmTypeInfo>,
}

impl RmModel {
    /// Create an empty model
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url: String::new(),
            type_infos: IndexMap::new(),
        }
    }

    /// Get type info by name
    pub fn get_type(&self, name: &str) -> Option<&RmTypeInfo> {
        self.type_infos.get(name)
    }

    /// Check if model contains type
    pub fn has_type(&self, name: &str) -> bool {
        self.type_infos.contains_key(name)
    }

    /// Get an attribute, traversing base types if necessary
    pub fn get_attribute(&self, type_name: &str, attribute: &str) -> Option<&RmAttributeInfo> {
        let mut current = self.get_type(type_name)?;
        loop {
            if let Some(att) = current.get_attribute(attribute) {
                return Some(att);
            }
            current = self.get_type(current.base_type.as_deref()?)?;
        }
    }

    /// All attributes of a type including inherited ones.
    ///
    /// Attributes redeclared by a subtype shadow the inherited declaration.
    pub fn attributes_of(&self, type_name: &str) -> Option<IndexMap<String, RmAttributeInfo>> {
        let mut chain = Vec::new();
        let mut current = Some(self.get_type(type_name)?);
        while let Some(type_info) = current {
            chain.push(type_info);
            current = type_info.base_type.as_deref().and_then(|b| self.get_type(b));
        }

        let mut attributes = IndexMap::new();
        for type_info in chain.into_iter().rev() {
            for att in &type_info.elements {
                attributes.insert(att.name.clone(), att.clone());
            }
        }
        Some(attributes)
    }

    /// Check if one type is derived from another (considers inheritance)
    pub fn is_derived_from(&self, child_type: &str, parent_type: &str) -> bool {
        if child_type == parent_type {
            return true;
        }

        let mut current = match self.get_type(child_type) {
            Some(t) => t,
            None => return false,
        };

        while let Some(ref base_type_name) = current.base_type {
            if base_type_name == parent_type {
                return true;
            }
            current = match self.get_type(base_type_name) {
                Some(t) => t,
                None => return false,
            };
        }

        false
    }

    /// The type itself and all its (transitive) descendants
    pub fn descendant_types_of(&self, type_name: &str) -> IndexSet<String> {
        self.type_infos
            .keys()
            .filter(|t| self.is_derived_from(t, type_name))
            .cloned()
            .collect()
    }

    /// Direct subtypes of a type
    pub fn direct_descendants_of(&self, type_name: &str) -> Vec<&RmTypeInfo> {
        self.type_infos
            .values()
            .filter(|t| t.base_type.as_deref() == Some(type_name))
            .collect()
    }

    /// Non-abstract descendants, including the type itself when it is concrete.
    ///
    /// Names that are not part of the model (foundation types) resolve to themselves.
    pub fn concrete_types_of(&self, type_name: &str) -> IndexSet<String> {
        if !self.has_type(type_name) {
            return IndexSet::from([type_name.to_string()]);
        }
        self.type_infos
            .values()
            .filter(|t| !t.is_abstract && self.is_derived_from(&t.name, type_name))
            .map(|t| t.name.clone())
            .collect()
    }
}

/// Type information for a reference model type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmTypeInfo {
    /// Type name (e.g., "OBSERVATION")
    pub name: String,
    /// Base type name
    pub base_type: Option<String>,
    /// Whether the type is abstract
    pub is_abstract: bool,
    /// Attributes declared by this type (not inherited ones)
    pub elements: Vec<RmAttributeInfo>,
}

impl RmTypeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: None,
            is_abstract: false,
            elements: Vec::new(),
        }
    }

    /// Get a declared attribute by name
    pub fn get_attribute(&self, name: &str) -> Option<&RmAttributeInfo> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// Attribute declared on a reference model type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RmAttributeInfo {
    /// Attribute name (snake_case, as used in AQL paths)
    pub name: String,
    /// Declared type; for collections the element type
    pub element_type: String,
    /// Whether the attribute is a collection
    pub is_multiple: bool,
}

impl RmAttributeInfo {
    pub fn new(name: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element_type: element_type.into(),
            is_multiple: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> RmModel {
        let mut model = RmModel::new("test", "1");
        let mut base = RmTypeInfo::new("BASE");
        base.is_abstract = true;
        base.elements.push(RmAttributeInfo::new("name", "STRING"));
        let mut child = RmTypeInfo::new("CHILD");
        child.base_type = Some("BASE".to_string());
        child.elements.push(RmAttributeInfo::new("value", "LONG"));
        let mut grandchild = RmTypeInfo::new("GRANDCHILD");
        grandchild.base_type = Some("CHILD".to_string());
        for t in [base, child, grandchild] {
            model.type_infos.insert(t.name.clone(), t);
        }
        model
    }

    #[test]
    fn test_inherited_attributes() {
        let model = sample_model();
        let attributes = model.attributes_of("GRANDCHILD").unwrap();
        assert_eq!(
            attributes.keys().collect::<Vec<_>>(),
            vec!["name", "value"]
        );
        assert_eq!(model.get_attribute("GRANDCHILD", "name").unwrap().element_type, "STRING");
        assert!(model.attributes_of("UNKNOWN").is_none());
    }

    #[test]
    fn test_descendants() {
        let model = sample_model();
        assert!(model.is_derived_from("GRANDCHILD", "BASE"));
        assert!(!model.is_derived_from("BASE", "CHILD"));
        assert_eq!(model.descendant_types_of("CHILD").len(), 2);
        assert_eq!(
            model.concrete_types_of("BASE"),
            IndexSet::from(["CHILD".to_string(), "GRANDCHILD".to_string()])
        );
        assert_eq!(
            model.concrete_types_of("STRING"),
            IndexSet::from(["STRING".to_string()])
        );
        assert_eq!(model.direct_descendants_of("BASE").len(), 1);
    }
}
