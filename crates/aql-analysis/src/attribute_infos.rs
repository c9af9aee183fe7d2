//! Attribute tables derived from the reference model
//!
//! The tables cover every type reachable from the storable roots (COMPOSITION,
//! EHR_STATUS and ORIGINAL_VERSION) plus the synthetic EHR type, whose attributes are
//! stored in dedicated columns rather than in the model.

use aql_model::constants::{COMPOSITION, DV_ORDERED, EHR, EHR_STATUS, ORIGINAL_VERSION};
use aql_model::{RmModelRegistry, RmTypeIntrospection};
use aql_diagnostics::Result;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// Attribute facts for one `(parent type, attribute)` combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttInfo {
    pub multiple_valued: bool,
    /// Concrete types the attribute may hold
    pub target_types: IndexSet<String>,
}

impl AttInfo {
    pub fn new(multiple_valued: bool, target_types: IndexSet<String>) -> Self {
        Self {
            multiple_valued,
            target_types,
        }
    }

    /// Union of two infos for the same attribute on different parent types
    pub fn union(&self, other: &AttInfo) -> AttInfo {
        AttInfo {
            multiple_valued: self.multiple_valued || other.multiple_valued,
            target_types: self.target_types.union(&other.target_types).cloned().collect(),
        }
    }
}

/// Lookup tables used by path type analysis.
///
/// Built once from an [`RmTypeIntrospection`] and shared read-only between compilations.
#[derive(Debug, Clone)]
pub struct AttributeInfos {
    rm_types: IndexSet<String>,
    /// attribute -> parent types declaring it
    base_types_by_attribute: IndexMap<String, IndexSet<String>>,
    /// attribute -> parent type -> concrete child types
    typed_attributes: IndexMap<String, IndexMap<String, IndexSet<String>>>,
    /// attribute -> parent type -> info
    attribute_infos: IndexMap<String, IndexMap<String, AttInfo>>,
    concrete_types: IndexMap<String, IndexSet<String>>,
    dv_ordered_types: IndexSet<String>,
}

const EHR_ATTRIBUTES: &[(&str, &str)] = &[
    ("ehr_id", "HIER_OBJECT_ID"),
    ("time_created", "DV_DATE_TIME"),
    ("ehr_status", EHR_STATUS),
    ("compositions", COMPOSITION),
    ("system_id", "HIER_OBJECT_ID"),
];

impl AttributeInfos {
    pub fn new(model: &dyn RmTypeIntrospection) -> Self {
        let mut rm_types = IndexSet::new();
        for root in [COMPOSITION, EHR_STATUS, ORIGINAL_VERSION] {
            rm_types.extend(contained_types(model, root));
        }

        let mut base_types_by_attribute: IndexMap<String, IndexSet<String>> = IndexMap::new();
        let mut typed_attributes: IndexMap<String, IndexMap<String, IndexSet<String>>> =
            IndexMap::new();
        let mut attribute_infos: IndexMap<String, IndexMap<String, AttInfo>> = IndexMap::new();

        for rm_type in &rm_types {
            let Some(attributes) = model.attributes_of(rm_type) else {
                continue;
            };
            for (name, att) in attributes {
                base_types_by_attribute
                    .entry(name.clone())
                    .or_default()
                    .insert(rm_type.clone());
                let targets = model.concrete_types_of(&att.element_type);
                if targets.is_empty() {
                    continue;
                }
                typed_attributes
                    .entry(name.clone())
                    .or_default()
                    .entry(rm_type.clone())
                    .or_default()
                    .extend(targets.iter().cloned());
                attribute_infos
                    .entry(name)
                    .or_default()
                    .insert(rm_type.clone(), AttInfo::new(att.is_multiple, targets));
            }
        }

        rm_types.insert(EHR.to_string());
        for (name, target) in EHR_ATTRIBUTES {
            let targets = IndexSet::from([target.to_string()]);
            base_types_by_attribute
                .entry(name.to_string())
                .or_default()
                .insert(EHR.to_string());
            typed_attributes
                .entry(name.to_string())
                .or_default()
                .insert(EHR.to_string(), targets.clone());
            attribute_infos
                .entry(name.to_string())
                .or_default()
                .insert(EHR.to_string(), AttInfo::new(false, targets));
        }

        let mut concrete_types: IndexMap<String, IndexSet<String>> = rm_types
            .iter()
            .map(|t| (t.clone(), model.concrete_types_of(t)))
            .collect();
        concrete_types.insert(EHR.to_string(), IndexSet::from([EHR.to_string()]));

        let infos = Self {
            dv_ordered_types: model.descendant_types_of(DV_ORDERED),
            rm_types,
            base_types_by_attribute,
            typed_attributes,
            attribute_infos,
            concrete_types,
        };
        log::debug!(
            "attribute tables built: {} types, {} attributes",
            infos.rm_types.len(),
            infos.attribute_infos.len()
        );
        infos
    }

    /// Tables for the embedded openEHR reference model
    pub fn openehr() -> Result<Self> {
        let registry = RmModelRegistry::openehr()?;
        Ok(Self::new(&registry))
    }

    /// Every type reachable from the storable roots, plus EHR
    pub fn rm_types(&self) -> &IndexSet<String> {
        &self.rm_types
    }

    pub fn contains_attribute(&self, attribute: &str) -> bool {
        self.attribute_infos.contains_key(attribute)
    }

    /// Types declaring `attribute`
    pub fn base_types_of_attribute(&self, attribute: &str) -> Option<&IndexSet<String>> {
        self.base_types_by_attribute.get(attribute)
    }

    /// Parent type -> concrete child types for `attribute`
    pub fn typed_attribute(&self, attribute: &str) -> Option<&IndexMap<String, IndexSet<String>>> {
        self.typed_attributes.get(attribute)
    }

    /// Parent type -> info for `attribute`
    pub fn attribute_infos_of(&self, attribute: &str) -> Option<&IndexMap<String, AttInfo>> {
        self.attribute_infos.get(attribute)
    }

    pub fn attribute_info(&self, parent_type: &str, attribute: &str) -> Option<&AttInfo> {
        self.attribute_infos.get(attribute)?.get(parent_type)
    }

    /// Concrete descendants of `rm_type`; names outside the tables resolve to themselves
    pub fn concrete_types_of(&self, rm_type: &str) -> IndexSet<String> {
        self.concrete_types
            .get(rm_type)
            .cloned()
            .unwrap_or_else(|| IndexSet::from([rm_type.to_string()]))
    }

    /// DV_ORDERED and all of its subtypes
    pub fn dv_ordered_types(&self) -> &IndexSet<String> {
        &self.dv_ordered_types
    }

    pub fn is_dv_ordered(&self, rm_type: &str) -> bool {
        self.dv_ordered_types.contains(rm_type)
    }
}

/// Breadth-first closure over subtypes and attribute types starting at `root`
fn contained_types(model: &dyn RmTypeIntrospection, root: &str) -> Vec<String> {
    let mut seen = IndexSet::from([root.to_string()]);
    let mut queue = VecDeque::from([root.to_string()]);
    let mut out = Vec::new();

    while let Some(rm_type) = queue.pop_front() {
        for descendant in model.descendant_types_of(&rm_type) {
            if seen.insert(descendant.clone()) {
                queue.push_back(descendant);
            }
        }
        if let Some(attributes) = model.attributes_of(&rm_type) {
            for att in attributes.values() {
                if model.has_type(&att.element_type) && seen.insert(att.element_type.clone()) {
                    queue.push_back(att.element_type.clone());
                }
            }
        }
        out.push(rm_type);
    }
    out
}
