//! Static analysis of AQL paths
//!
//! This crate provides:
//! - Attribute tables derived from the reference model ([`AttributeInfos`])
//! - Path type analysis: candidate RM types of every path node ([`PathAnalyzer`])
//! - Path cohesion: paths of one FROM variable folded into a shared join tree
//! - Per-node type, multiplicity and join information ([`PathInfo`])

pub mod anode;
pub mod attribute_infos;
pub mod path_analysis;
pub mod path_cohesion;
pub mod path_info;

pub use anode::{ANode, NodeCategory};
pub use attribute_infos::{AttInfo, AttributeInfos};
pub use path_analysis::{rm_type_from_archetype, value_candidate_types, PathAnalyzer};
pub use path_cohesion::{
    analyze_path_cohesion, containment_roots, AttributeType, ContainmentRoot,
    PathCohesionTreeNode,
};
pub use path_info::{create_path_infos, path_clauses, JoinMode, NodeInfo, PathInfo, QueryClause};
