//! Type information for the nodes of a cohesion tree

use crate::anode::{ANode, NodeCategory};
use crate::attribute_infos::AttInfo;
use crate::path_analysis::PathAnalyzer;
use crate::path_cohesion::{
    build_cohesion_trees, containment_roots, ContainmentRoot, PathCohesionTreeNode,
};
use aql_ast::{AqlQuery, IdentifiedPath, PathNode};
use aql_diagnostics::{AqlError, Result, AQL0101, AQL0203};
use aql_model::constants::EHR;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;
use std::sync::Arc;

/// How a cohesion tree node is joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinMode {
    /// The FROM variable itself
    Root,
    /// Data is read at this node
    Data,
    /// Structure node with exactly one structure child and no data
    InternalSingleChild,
    /// Structure node with several structure children and no data
    InternalFork,
}

/// Clause a path is used in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryClause {
    Select,
    Where,
    OrderBy,
}

/// Merged type information of all paths through a cohesion tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub category: NodeCategory,
    pub rm_types: IndexSet<String>,
    pub path_from_root: Vec<PathNode>,
    pub multiple_valued: bool,
    /// Candidate types that are DV_ORDERED subtypes
    pub dv_ordered_types: IndexSet<String>,
}

impl NodeInfo {
    fn merge(self, other: NodeInfo) -> Result<NodeInfo> {
        Ok(NodeInfo {
            category: self.category.merge(other.category)?,
            rm_types: self.rm_types.union(&other.rm_types).cloned().collect(),
            path_from_root: self.path_from_root,
            multiple_valued: self.multiple_valued || other.multiple_valued,
            dv_ordered_types: self
                .dv_ordered_types
                .union(&other.dv_ordered_types)
                .cloned()
                .collect(),
        })
    }
}

/// Analysis result for one FROM variable: its cohesion tree plus type information for
/// every tree node
#[derive(Debug, Clone)]
pub struct PathInfo {
    containment: ContainmentRoot,
    cohesion_tree_root: PathCohesionTreeNode,
    /// indexed by [`PathCohesionTreeNode::id`]
    node_infos: Vec<NodeInfo>,
    path_to_clause: Arc<IndexMap<IdentifiedPath, BTreeSet<QueryClause>>>,
}

impl PathInfo {
    pub fn new(
        analyzer: &PathAnalyzer<'_>,
        containment: ContainmentRoot,
        cohesion_tree_root: PathCohesionTreeNode,
        path_to_clause: Arc<IndexMap<IdentifiedPath, BTreeSet<QueryClause>>>,
    ) -> Result<Self> {
        let mut analyzed = IndexMap::with_capacity(cohesion_tree_root.paths().len());
        for path in cohesion_tree_root.paths() {
            let node = analyzer.analyze_path_types(
                containment.analysis_type(),
                &path.root_predicates,
                &containment.predicates,
                path.path.as_ref(),
                None,
            )?;
            if node.candidate_types().is_empty() {
                return Err(AqlError::semantic(
                    AQL0101,
                    format!("Path {path} is not valid"),
                ));
            }
            analyzed.insert(path.clone(), node);
        }

        let mut node_infos = Vec::with_capacity(cohesion_tree_root.size());
        fill_node_infos(analyzer, &analyzed, &cohesion_tree_root, 0, &mut node_infos)?;

        Ok(Self {
            containment,
            cohesion_tree_root,
            node_infos,
            path_to_clause,
        })
    }

    pub fn containment(&self) -> &ContainmentRoot {
        &self.containment
    }

    pub fn cohesion_tree_root(&self) -> &PathCohesionTreeNode {
        &self.cohesion_tree_root
    }

    pub fn node_info(&self, node: &PathCohesionTreeNode) -> &NodeInfo {
        &self.node_infos[node.id()]
    }

    pub fn node_category(&self, node: &PathCohesionTreeNode) -> NodeCategory {
        self.node_info(node).category
    }

    pub fn target_types(&self, node: &PathCohesionTreeNode) -> &IndexSet<String> {
        &self.node_info(node).rm_types
    }

    pub fn dv_ordered_types(&self, node: &PathCohesionTreeNode) -> &IndexSet<String> {
        &self.node_info(node).dv_ordered_types
    }

    pub fn is_multiple_valued(&self, node: &PathCohesionTreeNode) -> bool {
        self.node_info(node).multiple_valued
    }

    pub fn path_to_node(&self, node: &PathCohesionTreeNode) -> &[PathNode] {
        &self.node_info(node).path_from_root
    }

    fn clauses_ending_at(&self, node: &PathCohesionTreeNode) -> impl Iterator<Item = QueryClause> {
        node.paths_ending_at_node()
            .iter()
            .filter_map(|p| self.path_to_clause.get(p))
            .flatten()
            .copied()
    }

    pub fn is_used_in_select(&self, node: &PathCohesionTreeNode) -> bool {
        self.clauses_ending_at(node)
            .any(|c| c == QueryClause::Select)
    }

    pub fn is_used_in_where_or_order_by(&self, node: &PathCohesionTreeNode) -> bool {
        self.clauses_ending_at(node)
            .any(|c| matches!(c, QueryClause::Where | QueryClause::OrderBy))
    }

    pub fn join_mode(&self, node: &PathCohesionTreeNode) -> Result<JoinMode> {
        if node.is_root() {
            return Ok(JoinMode::Root);
        }
        let has_data = !node.paths_ending_at_node().is_empty()
            || node
                .children()
                .iter()
                .any(|c| self.node_category(c).is_data());
        if has_data {
            return Ok(JoinMode::Data);
        }
        let structure_children = node
            .children()
            .iter()
            .filter(|c| !self.node_category(c).is_data())
            .count();
        match structure_children {
            0 => Err(AqlError::internal(
                AQL0203,
                format!("Internal node without children: {}", node.attribute()),
            )),
            1 => Ok(JoinMode::InternalSingleChild),
            _ => Ok(JoinMode::InternalFork),
        }
    }
}

fn fill_node_infos(
    analyzer: &PathAnalyzer<'_>,
    analyzed: &IndexMap<IdentifiedPath, ANode>,
    node: &PathCohesionTreeNode,
    depth: usize,
    out: &mut Vec<NodeInfo>,
) -> Result<()> {
    debug_assert_eq!(out.len(), node.id());
    let mut merged: Option<NodeInfo> = None;
    for path in node.paths() {
        let analysis = analyzed
            .get(path)
            .ok_or_else(|| AqlError::plan(format!("Path {path} was not analyzed")))?;
        let info = node_info_at_depth(analyzer, analysis, path, depth)?;
        merged = Some(match merged {
            None => info,
            Some(acc) => acc.merge(info)?,
        });
    }
    let info = merged.ok_or_else(|| {
        AqlError::plan(format!("Cohesion node without paths: {}", node.attribute()))
    })?;
    out.push(info);
    for child in node.children() {
        fill_node_infos(analyzer, analyzed, child, depth + 1, out)?;
    }
    Ok(())
}

fn node_info_at_depth(
    analyzer: &PathAnalyzer<'_>,
    analysis: &ANode,
    path: &IdentifiedPath,
    depth: usize,
) -> Result<NodeInfo> {
    let nodes = path.path.as_ref().map(|p| p.nodes.as_slice()).unwrap_or_default();
    let prefix = nodes
        .get(..depth)
        .ok_or_else(|| AqlError::plan(format!("Path {path} is shorter than {depth}")))?;

    let mut node = analysis;
    let mut att_info: Option<&AttInfo> = None;
    for segment in prefix {
        att_info = node.attribute_info(&segment.attribute);
        node = node.attribute(&segment.attribute).ok_or_else(|| {
            AqlError::plan(format!("Path {path} has no node {}", segment.attribute))
        })?;
    }

    let infos = analyzer.infos();
    Ok(NodeInfo {
        category: node.category()?,
        rm_types: att_info
            .map(|i| i.target_types.clone())
            .unwrap_or_else(|| node.candidate_types().clone()),
        path_from_root: prefix.to_vec(),
        multiple_valued: att_info.is_some_and(|i| i.multiple_valued),
        dv_ordered_types: att_info
            .map(|i| {
                i.target_types
                    .iter()
                    .filter(|t| infos.is_dv_ordered(t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// Clauses each identified path of the query is used in
pub fn path_clauses(query: &AqlQuery) -> IndexMap<IdentifiedPath, BTreeSet<QueryClause>> {
    let select = query
        .select
        .statements
        .iter()
        .filter_map(|s| s.column.identified_path())
        .map(|p| (p, QueryClause::Select));
    let where_paths = query
        .where_clause
        .iter()
        .flat_map(|w| w.paths())
        .map(|p| (p, QueryClause::Where));
    let order_by = query
        .order_by
        .iter()
        .map(|o| (&o.statement, QueryClause::OrderBy));

    let mut clauses: IndexMap<IdentifiedPath, BTreeSet<QueryClause>> = IndexMap::new();
    for (path, clause) in select.chain(where_paths).chain(order_by) {
        clauses.entry(path.clone()).or_default().insert(clause);
    }
    clauses
}

/// Analyze every FROM variable referenced by a path, except EHR variables whose
/// attributes are plain columns.
///
/// The result is keyed by identifier in order of first reference.
pub fn create_path_infos(
    query: &AqlQuery,
    analyzer: &PathAnalyzer<'_>,
) -> Result<IndexMap<String, PathInfo>> {
    let roots = containment_roots(&query.from)?;
    let trees = build_cohesion_trees(query, &roots)?;
    let path_to_clause = Arc::new(path_clauses(query));

    let mut infos = IndexMap::with_capacity(trees.len());
    for (identifier, tree) in trees {
        let Some(root) = roots.get(&identifier) else {
            continue;
        };
        if root.rm_type == EHR {
            continue;
        }
        let info = PathInfo::new(analyzer, root.clone(), tree, Arc::clone(&path_to_clause))?;
        infos.insert(identifier, info);
    }
    Ok(infos)
}
