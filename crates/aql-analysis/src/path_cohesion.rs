//! Path cohesion analysis
//!
//! All paths below one FROM variable are folded into a tree keyed by attribute and
//! normalized predicate. Paths sharing a tree node share the joins that resolve it, so
//! e.g. `o/data[at0001]/events/time` and `o/data[at0001]/events/data` read the same
//! EVENT rows instead of producing a cartesian product.

use aql_ast::{
    AndPredicate, AqlObjectPath, AqlQuery, ComparisonPredicate, Containment, IdentifiedPath,
    PathNode, PredicateOperator, PredicateValue, Primitive,
};
use aql_diagnostics::{AqlError, Result, AQL0102, AQL0103};
use aql_model::constants::{ORIGINAL_VERSION, VERSION};
use indexmap::IndexMap;
use std::fmt;

/// A variable bound in the FROM clause
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentRoot {
    pub identifier: String,
    /// RM type of the class expression, `VERSION` for version expressions
    pub rm_type: String,
    pub predicates: Vec<AndPredicate>,
}

impl ContainmentRoot {
    pub fn is_version(&self) -> bool {
        self.rm_type == VERSION
    }

    /// Root type used for path type analysis
    pub fn analysis_type(&self) -> &str {
        if self.is_version() {
            ORIGINAL_VERSION
        } else {
            &self.rm_type
        }
    }
}

/// Variables of a FROM clause in declaration order.
///
/// Fails when an identifier is bound twice.
pub fn containment_roots(from: &Containment) -> Result<IndexMap<String, ContainmentRoot>> {
    let mut roots = IndexMap::new();
    collect_roots(from, &mut roots)?;
    Ok(roots)
}

fn collect_roots(
    containment: &Containment,
    roots: &mut IndexMap<String, ContainmentRoot>,
) -> Result<()> {
    let (root, contains) = match containment {
        Containment::Class(c) => (
            c.identifier.as_ref().map(|id| ContainmentRoot {
                identifier: id.clone(),
                rm_type: c.rm_type.clone(),
                predicates: c.predicates.clone(),
            }),
            c.contains.as_deref(),
        ),
        Containment::Version(v) => (
            v.identifier.as_ref().map(|id| ContainmentRoot {
                identifier: id.clone(),
                rm_type: VERSION.to_string(),
                predicates: Vec::new(),
            }),
            v.contains.as_deref(),
        ),
        Containment::Set(set) => {
            for value in &set.values {
                collect_roots(value, roots)?;
            }
            return Ok(());
        }
        Containment::Not(inner) => return collect_roots(inner, roots),
    };
    if let Some(root) = root {
        if roots.contains_key(&root.identifier) {
            return Err(AqlError::semantic(
                AQL0103,
                format!("Duplicate identifier: {}", root.identifier),
            ));
        }
        roots.insert(root.identifier.clone(), root);
    }
    match contains {
        Some(inner) => collect_roots(inner, roots),
        None => Ok(()),
    }
}

/// Classification of the predicates of a path segment, deciding which predicates
/// distinguish tree nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// No usable predicate; all paths share one node
    Base,
    /// `[openEHR-EHR-...]`
    Archetype,
    /// `[at0001]`, optionally with a name
    Node,
    /// `[name/value='...']`
    Name,
}

impl AttributeType {
    /// Type of an `or`-list of predicates
    pub fn of_predicates(predicates: &[AndPredicate]) -> AttributeType {
        predicates
            .iter()
            .map(AttributeType::of_and)
            .reduce(AttributeType::merge)
            .unwrap_or(AttributeType::Base)
    }

    fn of_and(and: &AndPredicate) -> AttributeType {
        and.operands
            .iter()
            .filter_map(AttributeType::of_operand)
            .reduce(AttributeType::merge_and)
            .unwrap_or(AttributeType::Base)
    }

    fn of_operand(op: &ComparisonPredicate) -> Option<AttributeType> {
        if op.operator != PredicateOperator::Eq {
            return None;
        }
        if op.path == AqlObjectPath::name_value() {
            Some(AttributeType::Name)
        } else if op.is_archetype_node_id() {
            match &op.value {
                PredicateValue::Primitive(Primitive::String(id)) if id.starts_with("openEHR-") => {
                    Some(AttributeType::Archetype)
                }
                PredicateValue::Primitive(Primitive::String(_)) => Some(AttributeType::Node),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Combine the types of two paths (or two `or` alternatives) at the same attribute
    pub fn merge(self, other: AttributeType) -> AttributeType {
        use AttributeType::{Archetype, Base, Name, Node};
        if self == other {
            return self;
        }
        match self {
            Base => Base,
            Archetype if other == Node => Archetype,
            Archetype => Base,
            Node if other == Name => Base,
            Node => other,
            Name => Base,
        }
    }

    fn merge_and(self, other: AttributeType) -> AttributeType {
        if self == other {
            self
        } else {
            AttributeType::Node
        }
    }

    fn keeps(self, op: &ComparisonPredicate) -> bool {
        if self == AttributeType::Base
            || op.operator != PredicateOperator::Eq
            || !matches!(op.value, PredicateValue::Primitive(Primitive::String(_)))
        {
            return false;
        }
        if op.path == AqlObjectPath::name_value() {
            self != AttributeType::Archetype
        } else if op.is_archetype_node_id() {
            self != AttributeType::Name
        } else {
            false
        }
    }

    /// Reduce predicates to the archetype/node id and name comparisons relevant for
    /// this type, in a canonical order
    pub fn cleanup_predicates(self, predicates: &[AndPredicate]) -> Vec<AndPredicate> {
        let archetype_node_id = AqlObjectPath::archetype_node_id();
        let name_value = AqlObjectPath::name_value();
        let mut cleaned: Vec<AndPredicate> = predicates
            .iter()
            .filter_map(|and| {
                let archetype = and
                    .operands
                    .iter()
                    .find(|op| op.path == archetype_node_id && self.keeps(op));
                let mut name = and
                    .operands
                    .iter()
                    .find(|op| op.path == name_value && self.keeps(op));
                if self == AttributeType::Node
                    && archetype
                        .and_then(|op| op.eq_string_value())
                        .is_some_and(|id| !id.starts_with("openEHR-"))
                {
                    name = None;
                }
                if archetype.is_none() && name.is_none() {
                    return None;
                }
                Some(AndPredicate::new(
                    archetype.into_iter().chain(name).cloned(),
                ))
            })
            .collect();
        cleaned.sort_by(|a, b| {
            let key = |and: &AndPredicate| {
                (
                    and.operand(&archetype_node_id)
                        .and_then(ComparisonPredicate::eq_string_value)
                        .map(str::to_string),
                    and.operand(&name_value)
                        .and_then(ComparisonPredicate::eq_string_value)
                        .map(str::to_string),
                )
            };
            key(a).cmp(&key(b))
        });
        cleaned
    }
}

/// A node of the cohesion tree of one FROM variable
#[derive(Debug, Clone, PartialEq)]
pub struct PathCohesionTreeNode {
    id: usize,
    attribute: PathNode,
    paths: Vec<IdentifiedPath>,
    paths_ending_at_node: Vec<IdentifiedPath>,
    children: Vec<PathCohesionTreeNode>,
    root: bool,
}

impl PathCohesionTreeNode {
    fn new(attribute: PathNode, paths: Vec<IdentifiedPath>, root: bool) -> Self {
        Self {
            id: 0,
            attribute,
            paths_ending_at_node: paths.clone(),
            paths,
            children: Vec::new(),
            root,
        }
    }

    /// Pre-order position within the tree, the root being 0
    pub fn id(&self) -> usize {
        self.id
    }

    /// Attribute with its normalized predicates; for the root the RM type of the variable
    pub fn attribute(&self) -> &PathNode {
        &self.attribute
    }

    /// Every path passing through this node
    pub fn paths(&self) -> &[IdentifiedPath] {
        &self.paths
    }

    pub fn paths_ending_at_node(&self) -> &[IdentifiedPath] {
        &self.paths_ending_at_node
    }

    pub fn children(&self) -> &[PathCohesionTreeNode] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Number of nodes in this subtree
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(PathCohesionTreeNode::size).sum::<usize>()
    }

    fn add_child(&mut self, attribute: PathNode, paths: Vec<IdentifiedPath>) {
        self.paths_ending_at_node.retain(|p| !paths.contains(p));
        self.children
            .push(PathCohesionTreeNode::new(attribute, paths, false));
    }

    fn fill(&mut self, level: usize) {
        let mut by_attribute: IndexMap<String, Vec<IdentifiedPath>> = IndexMap::new();
        for path in &self.paths {
            if let Some(node) = segment(path, level) {
                by_attribute
                    .entry(node.attribute.clone())
                    .or_default()
                    .push(path.clone());
            }
        }

        for (attribute, paths) in by_attribute {
            let attribute_type = paths
                .iter()
                .filter_map(|p| segment(p, level))
                .map(|n| AttributeType::of_predicates(&n.predicates))
                .reduce(AttributeType::merge)
                .unwrap_or(AttributeType::Base);
            if attribute_type == AttributeType::Base {
                self.add_child(PathNode::new(attribute), paths);
                continue;
            }
            let mut by_predicates: IndexMap<Vec<AndPredicate>, Vec<IdentifiedPath>> =
                IndexMap::new();
            for path in paths {
                let predicates = segment(&path, level)
                    .map(|n| attribute_type.cleanup_predicates(&n.predicates))
                    .unwrap_or_default();
                by_predicates.entry(predicates).or_default().push(path);
            }
            for (predicates, paths) in by_predicates {
                self.add_child(
                    PathNode::with_predicates(attribute.clone(), predicates),
                    paths,
                );
            }
        }

        for child in &mut self.children {
            child.fill(level + 1);
        }
    }

    fn number(&mut self, next: &mut usize) {
        self.id = *next;
        *next += 1;
        for child in &mut self.children {
            child.number(next);
        }
    }

    /// Depth-first lookup by id
    pub fn find(&self, id: usize) -> Option<&PathCohesionTreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.attribute, indent = depth * 2)?;
        if !self.paths_ending_at_node.is_empty() {
            let ending = self
                .paths_ending_at_node
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " <- {ending}")?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PathCohesionTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

fn segment(path: &IdentifiedPath, level: usize) -> Option<&PathNode> {
    path.path.as_ref().and_then(|p| p.nodes.get(level))
}

/// Build the cohesion tree of every FROM variable referenced by a path.
///
/// The result is keyed by identifier in order of first reference. Fails when a path
/// references an identifier that is not bound in FROM.
pub fn analyze_path_cohesion(query: &AqlQuery) -> Result<IndexMap<String, PathCohesionTreeNode>> {
    let roots = containment_roots(&query.from)?;
    build_cohesion_trees(query, &roots)
}

pub(crate) fn build_cohesion_trees(
    query: &AqlQuery,
    roots: &IndexMap<String, ContainmentRoot>,
) -> Result<IndexMap<String, PathCohesionTreeNode>> {
    let mut paths_by_root: IndexMap<&str, Vec<IdentifiedPath>> = IndexMap::new();
    for path in query.identified_paths() {
        let paths = paths_by_root.entry(path.root.as_str()).or_default();
        if !paths.contains(path) {
            paths.push(path.clone());
        }
    }

    let mut trees = IndexMap::with_capacity(paths_by_root.len());
    for (identifier, paths) in paths_by_root {
        let root = roots.get(identifier).ok_or_else(|| {
            AqlError::semantic(AQL0102, format!("Unknown identifier: {identifier}"))
        })?;
        let attribute_type = AttributeType::of_predicates(&root.predicates);
        let root_node = PathNode::with_predicates(
            root.rm_type.clone(),
            attribute_type.cleanup_predicates(&root.predicates),
        );
        let mut tree = PathCohesionTreeNode::new(root_node, paths, true);
        tree.fill(0);
        tree.number(&mut 0);
        log::debug!("path cohesion of {identifier}:\n{tree}");
        trees.insert(identifier.to_string(), tree);
    }
    Ok(trees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aql_ast::ContainmentClass;
    use pretty_assertions::assert_eq;

    fn node_predicate(id: &str) -> Vec<AndPredicate> {
        vec![AndPredicate::archetype(id)]
    }

    #[test]
    fn test_attribute_types() {
        assert_eq!(AttributeType::of_predicates(&[]), AttributeType::Base);
        assert_eq!(
            AttributeType::of_predicates(&node_predicate("at0001")),
            AttributeType::Node
        );
        assert_eq!(
            AttributeType::of_predicates(&node_predicate("openEHR-EHR-CLUSTER.x.v1")),
            AttributeType::Archetype
        );
        assert_eq!(
            AttributeType::of_predicates(&[AndPredicate::new([ComparisonPredicate::name_value(
                "x"
            )])]),
            AttributeType::Name
        );
        assert_eq!(
            AttributeType::of_predicates(&[AndPredicate::archetype_and_name("at0001", "x")]),
            AttributeType::Node
        );
    }

    #[test]
    fn test_merge_table() {
        use AttributeType::{Archetype, Base, Name, Node};
        assert_eq!(Base.merge(Node), Base);
        assert_eq!(Archetype.merge(Node), Archetype);
        assert_eq!(Archetype.merge(Name), Base);
        assert_eq!(Node.merge(Archetype), Archetype);
        assert_eq!(Node.merge(Name), Base);
        assert_eq!(Name.merge(Node), Base);
        assert_eq!(Name.merge(Name), Name);
    }

    #[test]
    fn test_cleanup_drops_names_of_node_ids() {
        let predicates = vec![AndPredicate::archetype_and_name("at0001", "Systolic")];
        assert_eq!(
            AttributeType::Node.cleanup_predicates(&predicates),
            vec![AndPredicate::archetype("at0001")]
        );
        let predicates = vec![AndPredicate::archetype_and_name(
            "openEHR-EHR-CLUSTER.x.v1",
            "Device",
        )];
        assert_eq!(AttributeType::Node.cleanup_predicates(&predicates), predicates);
        assert_eq!(
            AttributeType::Archetype.cleanup_predicates(&predicates),
            vec![AndPredicate::archetype("openEHR-EHR-CLUSTER.x.v1")]
        );
    }

    #[test]
    fn test_cleanup_sorts_alternatives() {
        let predicates = vec![
            AndPredicate::archetype("openEHR-EHR-CLUSTER.b.v1"),
            AndPredicate::archetype("openEHR-EHR-CLUSTER.a.v1"),
        ];
        let cleaned = AttributeType::Archetype.cleanup_predicates(&predicates);
        assert_eq!(cleaned[0], AndPredicate::archetype("openEHR-EHR-CLUSTER.a.v1"));
    }

    #[test]
    fn test_duplicate_identifier() {
        let from = Containment::Class(
            ContainmentClass::new("COMPOSITION", Some("c"))
                .containing(Containment::class("OBSERVATION", Some("c"))),
        );
        let err = containment_roots(&from).unwrap_err();
        assert_eq!(err.code(), AQL0103);
    }

    #[test]
    fn test_version_root() {
        let from = Containment::Version(aql_ast::ContainmentVersion {
            identifier: Some("v".to_string()),
            selector: aql_ast::VersionSelector::Latest,
            contains: Some(Box::new(Containment::class("COMPOSITION", Some("c")))),
        });
        let roots = containment_roots(&from).unwrap();
        assert_eq!(roots.keys().collect::<Vec<_>>(), vec!["v", "c"]);
        assert_eq!(roots["v"].analysis_type(), "ORIGINAL_VERSION");
        assert_eq!(roots["c"].analysis_type(), "COMPOSITION");
    }
}
