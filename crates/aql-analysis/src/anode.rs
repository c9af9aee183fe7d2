//! Analyzed path nodes and node categories

use crate::attribute_infos::AttInfo;
use aql_diagnostics::{AqlError, Result, AQL0104, AQL0202};
use aql_model::{FoundationType, StructureRmType};
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;

/// How the values of a node are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeCategory {
    /// Structure entries with a row of their own: LOCATABLEs and EVENT_CONTEXT
    Structure,
    /// Objects that may contain structure entries without being one,
    /// e.g. FEEDER_AUDIT_DETAILS or INSTRUCTION_DETAILS
    StructureIntermediate,
    /// Any other RM type, stored inside the JSON of its owning structure entry
    RmType,
    /// Foundation types
    Foundation,
    /// Mixture of foundation and RM types, e.g. `ELEMENT/value/value` which is a
    /// DV_CODED_TEXT for DV_STATE and a DV_PARSABLE for time specifications
    FoundationExtended,
}

impl NodeCategory {
    pub fn of_type(type_name: &str) -> Self {
        match StructureRmType::by_type_name(type_name) {
            Some(t) if t.is_structure_entry() => NodeCategory::Structure,
            Some(_) => NodeCategory::StructureIntermediate,
            None if FoundationType::is_foundation_type(type_name) => NodeCategory::Foundation,
            None => NodeCategory::RmType,
        }
    }

    /// Whether values are read from JSON rather than from structure rows
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            NodeCategory::RmType | NodeCategory::Foundation | NodeCategory::FoundationExtended
        )
    }

    /// Combine the categories of two candidate types of the same node
    pub fn merge(self, other: NodeCategory) -> Result<NodeCategory> {
        if self == other {
            return Ok(self);
        }
        match self.min(other) {
            NodeCategory::Structure | NodeCategory::StructureIntermediate => Err(AqlError::semantic(
                AQL0104,
                format!("Incompatible node types: {self:?}, {other:?}"),
            )),
            NodeCategory::RmType | NodeCategory::Foundation => Ok(NodeCategory::FoundationExtended),
            NodeCategory::FoundationExtended => Err(AqlError::internal(
                AQL0202,
                format!("Inconsistent node types: {self:?}, {other:?}"),
            )),
        }
    }
}

/// A node of an analyzed path.
///
/// Holds the RM types the node may have after every constraint from the path, its
/// predicates and the reference model was applied. An empty candidate set means the
/// constraints cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ANode {
    pub(crate) candidate_types: IndexSet<String>,
    pub(crate) attributes: IndexMap<String, ANode>,
    pub(crate) attribute_infos: IndexMap<String, AttInfo>,
}

impl ANode {
    pub fn candidate_types(&self) -> &IndexSet<String> {
        &self.candidate_types
    }

    pub fn attribute(&self, attribute: &str) -> Option<&ANode> {
        self.attributes.get(attribute)
    }

    pub fn attributes(&self) -> &IndexMap<String, ANode> {
        &self.attributes
    }

    /// Attribute facts for a child, restricted to the candidate types of both ends
    pub fn attribute_info(&self, attribute: &str) -> Option<&AttInfo> {
        self.attribute_infos.get(attribute)
    }

    /// Follow a chain of attributes
    pub fn descend<'a, I>(&self, attributes: I) -> Option<&ANode>
    where
        I: IntoIterator<Item = &'a str>,
    {
        attributes
            .into_iter()
            .try_fold(self, |node, attribute| node.attribute(attribute))
    }

    pub fn categories(&self) -> BTreeSet<NodeCategory> {
        self.candidate_types
            .iter()
            .map(|t| NodeCategory::of_type(t))
            .collect()
    }

    /// The merged category of all candidate types
    pub fn category(&self) -> Result<NodeCategory> {
        let mut categories = self.categories().into_iter();
        let first = categories
            .next()
            .ok_or_else(|| AqlError::plan("Node without candidate types"))?;
        categories.try_fold(first, NodeCategory::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_of_types() {
        assert_eq!(NodeCategory::of_type("OBSERVATION"), NodeCategory::Structure);
        assert_eq!(NodeCategory::of_type("EVENT_CONTEXT"), NodeCategory::Structure);
        assert_eq!(
            NodeCategory::of_type("FEEDER_AUDIT_DETAILS"),
            NodeCategory::StructureIntermediate
        );
        assert_eq!(NodeCategory::of_type("DV_TEXT"), NodeCategory::RmType);
        assert_eq!(NodeCategory::of_type("STRING"), NodeCategory::Foundation);
    }

    #[test]
    fn test_merge() {
        use NodeCategory::*;
        assert_eq!(RmType.merge(Foundation).unwrap(), FoundationExtended);
        assert_eq!(Foundation.merge(RmType).unwrap(), FoundationExtended);
        assert_eq!(Structure.merge(Structure).unwrap(), Structure);
        let err = Structure.merge(RmType).unwrap_err();
        assert_eq!(err.code(), AQL0104);
        assert!(FoundationExtended.merge(RmType).is_ok());
    }

    #[test]
    fn test_category_of_mixed_node() {
        let node = ANode {
            candidate_types: IndexSet::from(["DV_CODED_TEXT".to_string(), "STRING".to_string()]),
            ..Default::default()
        };
        assert_eq!(node.category().unwrap(), NodeCategory::FoundationExtended);
        assert!(ANode::default().category().is_err());
    }
}
