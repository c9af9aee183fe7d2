//! Static type analysis of AQL paths
//!
//! Starting from the RM type of a containment, every node of a path (and of the paths
//! inside its predicates) gets the set of concrete RM or foundation types it may hold.
//! The sets are narrowed by:
//!
//! - the attribute being declared on the parent type
//! - archetype ids in `archetype_node_id` predicates
//! - literal values compared in predicates (`value[value=10.0]` drops DV_TEXT)
//! - the constraints of child attributes, propagated until nothing changes
//!
//! Narrowing happens on a private mutable builder; callers only see the frozen [`ANode`].

use crate::anode::ANode;
use crate::attribute_infos::{AttInfo, AttributeInfos};
use aql_ast::{AndPredicate, AqlObjectPath, PathNode, PredicateOperator, PredicateValue, Primitive};
use aql_diagnostics::{AqlError, Result, AQL0100, AQL0101};
use aql_model::FoundationType;
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::sync::LazyLock;

static ARCHETYPE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^openEHR-EHR-([A-Z][A-Z0-9_]*)\.[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)*\.v\d+(?:\.\d+)*$")
        .expect("Invalid archetype id regex")
});

/// RM class of an archetype id, e.g. `OBSERVATION` for `openEHR-EHR-OBSERVATION.bp.v2`
pub fn rm_type_from_archetype(archetype_id: &str) -> Option<&str> {
    ARCHETYPE_ID_REGEX
        .captures(archetype_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Types a predicate literal can be compared with; `None` when unconstrained
pub fn value_candidate_types(value: &PredicateValue) -> Option<IndexSet<String>> {
    let PredicateValue::Primitive(primitive) = value else {
        return None;
    };
    let types: &[FoundationType] = match primitive {
        Primitive::Long(_) | Primitive::Double(_) => &[
            FoundationType::Double,
            FoundationType::Integer,
            FoundationType::Long,
        ],
        Primitive::Boolean(_) => &[FoundationType::Boolean],
        Primitive::Temporal(_) => &[
            FoundationType::String,
            FoundationType::Temporal,
            FoundationType::TemporalAccessor,
            FoundationType::TemporalAmount,
        ],
        Primitive::String(_) => &[
            FoundationType::String,
            FoundationType::Char,
            FoundationType::Uri,
        ],
    };
    Some(types.iter().map(|t| t.type_name().to_string()).collect())
}

/// Mutable node used while constraints are collected.
///
/// `types == None` means the node is not constrained yet.
#[derive(Debug, Default)]
struct TypeNode {
    types: Option<IndexSet<String>>,
    attributes: IndexMap<String, TypeNode>,
}

/// Analyzes path types against shared [`AttributeInfos`]
#[derive(Debug, Clone, Copy)]
pub struct PathAnalyzer<'a> {
    infos: &'a AttributeInfos,
}

impl<'a> PathAnalyzer<'a> {
    pub fn new(infos: &'a AttributeInfos) -> Self {
        Self { infos }
    }

    pub fn infos(&self) -> &'a AttributeInfos {
        self.infos
    }

    /// Determine the possible types of every node of `path` below `root_type`.
    ///
    /// `variable_predicates` are the predicates written on the identifier inside the
    /// path (`o[...]/data`), `root_predicates` those of the containment in FROM.
    /// `candidate_types` constrains the last node, e.g. from the operand of a condition.
    ///
    /// Fails with the offending segment in the message when an attribute is unknown or
    /// is not declared on any candidate type of its parent.
    pub fn analyze_path_types(
        &self,
        root_type: &str,
        variable_predicates: &[AndPredicate],
        root_predicates: &[AndPredicate],
        path: Option<&AqlObjectPath>,
        candidate_types: Option<&IndexSet<String>>,
    ) -> Result<ANode> {
        let root_types = IndexSet::from([root_type.to_string()]);
        let mut root = self.new_node(Some(&root_types), variable_predicates, root_predicates);
        if let Some(path) = path {
            self.append_path(&mut root, path, candidate_types);
        }

        validate_attribute_names(self.infos, &root)?;
        if let Some(path) = path {
            self.check_segments(&root, path)?;
        }

        let mut passes = 1;
        while self.apply_child_attribute_constraints(&mut root) {
            passes += 1;
        }
        log::trace!(
            "analyzed {root_type}/{} in {passes} passes",
            path.map(ToString::to_string).unwrap_or_default()
        );

        Ok(self.freeze(root))
    }

    fn new_node(
        &self,
        rm_types: Option<&IndexSet<String>>,
        parent_predicates: &[AndPredicate],
        predicates: &[AndPredicate],
    ) -> TypeNode {
        let types = rm_types.map(|types| {
            types
                .iter()
                .flat_map(|t| self.infos.concrete_types_of(t))
                .collect()
        });
        let mut node = TypeNode {
            types,
            attributes: IndexMap::new(),
        };
        node.types = self.constrain_by_archetype(node.types.take(), parent_predicates);
        node.types = self.constrain_by_archetype(node.types.take(), predicates);
        self.add_predicate_constraints(&mut node, parent_predicates);
        self.add_predicate_constraints(&mut node, predicates);
        node
    }

    fn append_path(
        &self,
        root: &mut TypeNode,
        path: &AqlObjectPath,
        candidate_types: Option<&IndexSet<String>>,
    ) {
        let mut node = root;
        for path_node in &path.nodes {
            node = self.add_attribute(node, path_node);
        }
        if let Some(candidates) = candidate_types {
            node.types = Some(match node.types.take() {
                None => candidates.clone(),
                Some(types) => types.into_iter().filter(|t| candidates.contains(t)).collect(),
            });
        }
    }

    fn add_attribute<'n>(&self, parent: &'n mut TypeNode, path_node: &PathNode) -> &'n mut TypeNode {
        match parent.attributes.entry(path_node.attribute.clone()) {
            Entry::Occupied(entry) => {
                let child = entry.into_mut();
                child.types = self.constrain_by_archetype(child.types.take(), &path_node.predicates);
                self.add_predicate_constraints(child, &path_node.predicates);
                child
            }
            Entry::Vacant(entry) => entry.insert(self.new_node(None, &[], &path_node.predicates)),
        }
    }

    /// Value comparisons of a predicate become typed child paths.
    ///
    /// Only a single `and` alternative constrains the node; `or` alternatives and `!=`
    /// comparisons say nothing about what the node must contain.
    fn add_predicate_constraints(&self, node: &mut TypeNode, predicates: &[AndPredicate]) {
        let [and] = predicates else {
            return;
        };
        for operand in and
            .operands
            .iter()
            .filter(|op| op.operator != PredicateOperator::Neq)
        {
            let candidates = value_candidate_types(&operand.value);
            self.append_path(node, &operand.path, candidates.as_ref());
        }
    }

    fn constrain_by_archetype(
        &self,
        types: Option<IndexSet<String>>,
        predicates: &[AndPredicate],
    ) -> Option<IndexSet<String>> {
        if predicates.is_empty() || types.as_ref().is_some_and(IndexSet::is_empty) {
            return types;
        }
        let mut constraint: Option<IndexSet<String>> = None;
        for and in predicates {
            // an alternative without archetype leaves the node unconstrained
            let Some(alternative) = self.archetype_constraint(and) else {
                return types;
            };
            match &mut constraint {
                None => constraint = Some(alternative),
                Some(union) => union.extend(alternative),
            }
        }
        intersect(types, constraint)
    }

    /// Types allowed by the archetype ids of one `and` alternative
    fn archetype_constraint(&self, and: &AndPredicate) -> Option<IndexSet<String>> {
        and.operands
            .iter()
            .filter(|op| op.is_archetype_node_id())
            .filter_map(|op| op.eq_string_value())
            .filter_map(rm_type_from_archetype)
            .map(|rm_type| self.infos.concrete_types_of(rm_type))
            .reduce(|a, b| a.intersection(&b).cloned().collect())
    }

    /// Walk the main path and report the first segment no candidate type declares
    fn check_segments(&self, root: &TypeNode, path: &AqlObjectPath) -> Result<()> {
        let Some(mut current) = root.types.clone() else {
            return Ok(());
        };
        if current.is_empty() {
            return Ok(());
        }
        for (index, path_node) in path.nodes.iter().enumerate() {
            let declared: IndexSet<String> = self
                .infos
                .typed_attribute(&path_node.attribute)
                .map(|by_parent| {
                    current
                        .iter()
                        .filter_map(|t| by_parent.get(t))
                        .flatten()
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let next = self
                .constrain_by_archetype(Some(declared), &path_node.predicates)
                .unwrap_or_default();
            if next.is_empty() {
                return Err(AqlError::semantic(
                    AQL0101,
                    format!(
                        "Path {} is not valid at segment: {}",
                        path.sub_path(0, index + 1),
                        path_node.attribute
                    ),
                ));
            }
            current = next;
        }
        Ok(())
    }

    fn apply_child_attribute_constraints(&self, node: &mut TypeNode) -> bool {
        if node.attributes.is_empty() || node.types.as_ref().is_some_and(IndexSet::is_empty) {
            return false;
        }
        let TypeNode { types, attributes } = node;
        let mut changed = false;
        for (attribute, child) in attributes.iter_mut() {
            changed |= self.apply_attribute_constraints(types, attribute, child);
            changed |= self.apply_child_attribute_constraints(child);
        }
        changed
    }

    /// Narrow parent and child so that every parent type can hold a child type and
    /// every child type is held by a parent type
    fn apply_attribute_constraints(
        &self,
        parent_types: &mut Option<IndexSet<String>>,
        attribute: &str,
        child: &mut TypeNode,
    ) -> bool {
        let Some(constellations) = self.infos.typed_attribute(attribute) else {
            let changed = parent_types.as_ref().is_none_or(|t| !t.is_empty())
                || child.types.as_ref().is_none_or(|t| !t.is_empty());
            *parent_types = Some(IndexSet::new());
            child.types = Some(IndexSet::new());
            return changed;
        };

        match parent_types {
            None => {
                let all_children: IndexSet<String> =
                    constellations.values().flatten().cloned().collect();
                match child.types.as_mut() {
                    None => {
                        *parent_types = Some(constellations.keys().cloned().collect());
                        child.types = Some(all_children);
                    }
                    Some(child_types) => {
                        child_types.retain(|t| all_children.contains(t));
                        *parent_types = Some(
                            constellations
                                .iter()
                                .filter(|(_, children)| {
                                    children.iter().any(|t| child_types.contains(t))
                                })
                                .map(|(parent, _)| parent.clone())
                                .collect(),
                        );
                    }
                }
                true
            }
            Some(parent) => {
                let before = parent.len();
                parent.retain(|t| match constellations.get(t) {
                    Some(supported) if !supported.is_empty() => child
                        .types
                        .as_ref()
                        .is_none_or(|c| supported.iter().any(|s| c.contains(s))),
                    _ => false,
                });
                let mut changed = parent.len() != before;

                let child_constraints: IndexSet<String> = constellations
                    .iter()
                    .filter(|(p, _)| parent.contains(*p))
                    .flat_map(|(_, children)| children.iter().cloned())
                    .collect();
                match child.types.as_mut() {
                    None => {
                        child.types = Some(child_constraints);
                        changed = true;
                    }
                    Some(child_types) => {
                        let before = child_types.len();
                        child_types.retain(|t| child_constraints.contains(t));
                        changed |= child_types.len() != before;
                    }
                }
                changed
            }
        }
    }

    fn freeze(&self, node: TypeNode) -> ANode {
        let candidate_types = node.types.unwrap_or_default();
        let mut attributes = IndexMap::with_capacity(node.attributes.len());
        let mut attribute_infos = IndexMap::new();
        for (name, child) in node.attributes {
            let child = self.freeze(child);
            if let Some(info) = self.attribute_info(&candidate_types, &name, &child) {
                attribute_infos.insert(name.clone(), info);
            }
            attributes.insert(name, child);
        }
        ANode {
            candidate_types,
            attributes,
            attribute_infos,
        }
    }

    /// Union of the attribute infos of all parent types whose targets fit the child
    fn attribute_info(
        &self,
        parent_types: &IndexSet<String>,
        attribute: &str,
        child: &ANode,
    ) -> Option<AttInfo> {
        self.infos
            .attribute_infos_of(attribute)?
            .iter()
            .filter(|(parent, _)| parent_types.contains(*parent))
            .map(|(_, info)| info)
            .filter(|info| {
                info.target_types
                    .iter()
                    .any(|t| child.candidate_types.contains(t))
            })
            .fold(None, |acc: Option<AttInfo>, info| {
                Some(match acc {
                    None => info.clone(),
                    Some(acc) => acc.union(info),
                })
            })
    }
}

fn validate_attribute_names(infos: &AttributeInfos, node: &TypeNode) -> Result<()> {
    for (attribute, child) in &node.attributes {
        if !infos.contains_attribute(attribute) {
            return Err(AqlError::semantic(
                AQL0100,
                format!("Unknown attribute: {attribute}"),
            ));
        }
        validate_attribute_names(infos, child)?;
    }
    Ok(())
}

fn intersect(
    types: Option<IndexSet<String>>,
    constraint: Option<IndexSet<String>>,
) -> Option<IndexSet<String>> {
    match (types, constraint) {
        (types, None) => types,
        (None, constraint) => constraint,
        (Some(types), Some(constraint)) => Some(
            types
                .into_iter()
                .filter(|t| constraint.contains(t))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("openEHR-EHR-OBSERVATION.blood_pressure.v2", Some("OBSERVATION"))]
    #[case("openEHR-EHR-COMPOSITION.encounter.v1", Some("COMPOSITION"))]
    #[case("openEHR-EHR-CLUSTER.device-details.v1.0.2", Some("CLUSTER"))]
    #[case("openEHR-EHR-ITEM_TREE.null_flavour-specialised.v0", Some("ITEM_TREE"))]
    #[case("at0001", None)]
    #[case("openEHR-EHR-OBSERVATION", None)]
    #[case("openEHR-DEMOGRAPHIC-PERSON.person.v1", None)]
    fn test_rm_type_from_archetype(#[case] id: &str, #[case] expected: Option<&str>) {
        assert_eq!(rm_type_from_archetype(id), expected);
    }

    #[test]
    fn test_value_candidate_types() {
        let numeric = value_candidate_types(&PredicateValue::Primitive(Primitive::Long(1))).unwrap();
        assert!(numeric.contains("LONG") && numeric.contains("DOUBLE"));
        let text = value_candidate_types(&PredicateValue::Primitive(Primitive::String("x".into())))
            .unwrap();
        assert!(text.contains("STRING") && !text.contains("LONG"));
        assert!(value_candidate_types(&PredicateValue::Parameter("p".into())).is_none());
    }

    #[test]
    fn test_or_alternatives_are_united() {
        let infos = AttributeInfos::openehr().unwrap();
        let analyzer = PathAnalyzer::new(&infos);
        let types = infos.concrete_types_of("CARE_ENTRY");
        let predicates = vec![
            AndPredicate::archetype("openEHR-EHR-OBSERVATION.a.v1"),
            AndPredicate::archetype("openEHR-EHR-EVALUATION.b.v1"),
        ];
        let constrained = analyzer.constrain_by_archetype(Some(types.clone()), &predicates).unwrap();
        assert_eq!(
            constrained,
            IndexSet::from(["OBSERVATION".to_string(), "EVALUATION".to_string()])
        );

        // one unconstrained alternative keeps every type
        let predicates = vec![
            AndPredicate::archetype("openEHR-EHR-OBSERVATION.a.v1"),
            AndPredicate::archetype("at0001"),
        ];
        let constrained = analyzer.constrain_by_archetype(Some(types.clone()), &predicates).unwrap();
        assert_eq!(constrained, types);
    }
}
