//! Tests for path cohesion and path info
//!
//! Covers:
//! - Merging of paths sharing attributes and compatible predicates
//! - Distinct branches for differing archetype, node id and name predicates
//! - Per-variable trees in order of first reference
//! - Node categories, multiplicity and join modes of tree nodes

use aql_analysis::{
    analyze_path_cohesion, create_path_infos, AttributeInfos, JoinMode, NodeCategory,
    PathAnalyzer, PathCohesionTreeNode,
};
use aql_ast::AqlQuery;
use aql_diagnostics::{AQL0101, AQL0102};
use aql_parser::parse;
use pretty_assertions::assert_eq;
use std::sync::LazyLock;

static INFOS: LazyLock<AttributeInfos> =
    LazyLock::new(|| AttributeInfos::openehr().expect("embedded model"));

fn parse_query(input: &str) -> AqlQuery {
    parse(input).unwrap_or_else(|e| panic!("Failed to parse '{}': {:?}", input, e))
}

fn tree(query: &str, identifier: &str) -> PathCohesionTreeNode {
    let trees = analyze_path_cohesion(&parse_query(query)).unwrap();
    trees
        .get(identifier)
        .unwrap_or_else(|| panic!("no tree for {identifier}"))
        .clone()
}

fn child_names(node: &PathCohesionTreeNode) -> Vec<String> {
    node.children()
        .iter()
        .map(|c| c.attribute().to_string())
        .collect()
}

// === Merging ===

#[test]
fn test_shared_prefix_merges() {
    let tree = tree(
        "SELECT o/data[at0001]/events[at0006]/time/value, \
         o/data[at0001]/events[at0006]/data/items[at0004]/value/magnitude \
         FROM OBSERVATION o",
        "o",
    );
    insta::assert_snapshot!(tree.to_string().trim_end(), @r"
    OBSERVATION
      data[at0001]
        events[at0006]
          time
            value <- o/data[at0001]/events[at0006]/time/value
          data
            items[at0004]
              value
                magnitude <- o/data[at0001]/events[at0006]/data/items[at0004]/value/magnitude
    ");
    assert_eq!(tree.size(), 9);
    assert!(tree.is_root());
}

#[test]
fn test_bare_attribute_merges_with_specific() {
    let tree = tree(
        "SELECT c/content/name/value, c/content[openEHR-EHR-SECTION.adhoc.v1]/uid/value \
         FROM COMPOSITION c",
        "c",
    );
    assert_eq!(child_names(&tree), vec!["content"]);
    assert_eq!(tree.children()[0].paths().len(), 2);
}

#[test]
fn test_distinct_archetypes_stay_apart() {
    let tree = tree(
        "SELECT c/content[openEHR-EHR-SECTION.adhoc.v1]/name/value, \
         c/content[openEHR-EHR-OBSERVATION.blood_pressure.v2]/name/value \
         FROM COMPOSITION c",
        "c",
    );
    assert_eq!(
        child_names(&tree),
        vec![
            "content[openEHR-EHR-SECTION.adhoc.v1]",
            "content[openEHR-EHR-OBSERVATION.blood_pressure.v2]"
        ]
    );
}

#[test]
fn test_node_id_and_archetype_stay_apart() {
    let tree = tree(
        "SELECT cl/items[at0005]/value, cl/items[openEHR-EHR-CLUSTER.device.v1]/name/value \
         FROM CLUSTER cl",
        "cl",
    );
    assert_eq!(
        child_names(&tree),
        vec!["items[at0005]", "items[openEHR-EHR-CLUSTER.device.v1]"]
    );
}

#[test]
fn test_name_predicates_stay_apart() {
    let tree = tree(
        "SELECT cl/items[name/value='Systolic']/value, cl/items[name/value='Diastolic']/value \
         FROM CLUSTER cl",
        "cl",
    );
    assert_eq!(tree.children().len(), 2);
    assert_eq!(
        tree.children()[1].attribute().to_string(),
        "items[name/value='Diastolic']"
    );
}

#[test]
fn test_node_id_names_are_dropped() {
    let tree = tree(
        "SELECT cl/items[at0001, 'A']/value, cl/items[at0001, 'B']/value FROM CLUSTER cl",
        "cl",
    );
    assert_eq!(child_names(&tree), vec!["items[at0001]"]);
}

#[test]
fn test_value_predicates_do_not_split() {
    let tree = tree(
        "SELECT cl/items[value/magnitude > 3]/value, cl/items/name FROM CLUSTER cl",
        "cl",
    );
    assert_eq!(child_names(&tree), vec!["items"]);
}

#[test]
fn test_paths_ending_at_node() {
    let tree = tree(
        "SELECT o, o/data FROM OBSERVATION o WHERE o/data/events/time/value > '2024-01-01'",
        "o",
    );
    assert_eq!(tree.paths().len(), 3);
    assert_eq!(tree.paths_ending_at_node().len(), 1);
    let data = &tree.children()[0];
    assert_eq!(data.paths_ending_at_node().len(), 1);
    assert_eq!(data.paths().len(), 2);
}

#[test]
fn test_analysis_is_deterministic() {
    let query = parse_query(
        "SELECT c/content[openEHR-EHR-OBSERVATION.a.v1]/data, c/context/start_time, \
         c/content[openEHR-EHR-OBSERVATION.b.v1]/data FROM EHR e CONTAINS COMPOSITION c",
    );
    let first = analyze_path_cohesion(&query).unwrap();
    let second = analyze_path_cohesion(&query).unwrap();
    assert_eq!(first, second);
}

// === Variables ===

#[test]
fn test_trees_per_variable() {
    let query = parse_query(
        "SELECT c/uid/value, ev/name/value, cl/items FROM EHR e CONTAINS COMPOSITION c \
         CONTAINS (EVALUATION ev CONTAINS CLUSTER cl) WHERE e/ehr_id/value = 'x'",
    );
    let trees = analyze_path_cohesion(&query).unwrap();
    assert_eq!(trees.keys().collect::<Vec<_>>(), vec!["c", "ev", "cl", "e"]);

    let analyzer = PathAnalyzer::new(&INFOS);
    let infos = create_path_infos(&query, &analyzer).unwrap();
    assert_eq!(infos.keys().collect::<Vec<_>>(), vec!["c", "ev", "cl"]);
}

#[test]
fn test_unknown_identifier() {
    let query = parse_query("SELECT x/name/value FROM COMPOSITION c");
    let err = analyze_path_cohesion(&query).unwrap_err();
    assert_eq!(err.code(), AQL0102);
    assert!(err.message().contains(": x"));
}

// === Path info ===

#[test]
fn test_node_infos() {
    let query = parse_query(
        "SELECT o/data[at0001]/events[at0006]/data/items[at0004]/value/magnitude \
         FROM COMPOSITION c CONTAINS OBSERVATION o ORDER BY o/data[at0001]/events[at0006]/time/value",
    );
    let analyzer = PathAnalyzer::new(&INFOS);
    let infos = create_path_infos(&query, &analyzer).unwrap();
    let info = &infos["o"];
    let root = info.cohesion_tree_root();
    assert_eq!(info.join_mode(root).unwrap(), JoinMode::Root);

    let data = &root.children()[0];
    assert_eq!(info.node_category(data), NodeCategory::Structure);
    assert!(!info.is_multiple_valued(data));

    let events = &data.children()[0];
    assert!(info.is_multiple_valued(events));
    assert_eq!(info.join_mode(events).unwrap(), JoinMode::Data);
    assert_eq!(
        info.path_to_node(events)
            .iter()
            .map(|n| n.attribute.as_str())
            .collect::<Vec<_>>(),
        vec!["data", "events"]
    );

    let time = events
        .children()
        .iter()
        .find(|c| c.attribute().attribute == "time")
        .unwrap();
    assert_eq!(info.node_category(time), NodeCategory::RmType);
    assert!(info.dv_ordered_types(time).contains("DV_DATE_TIME"));
    let time_value = &time.children()[0];
    assert!(info.is_used_in_where_or_order_by(time_value));
    assert!(!info.is_used_in_select(time_value));

    let magnitude = events
        .children()
        .iter()
        .find(|c| c.attribute().attribute == "data")
        .and_then(|d| d.children().first())
        .and_then(|i| i.children().first())
        .and_then(|v| v.children().first())
        .unwrap();
    assert_eq!(info.node_category(magnitude), NodeCategory::Foundation);
    assert!(info.is_used_in_select(magnitude));
}

#[test]
fn test_internal_join_modes() {
    let query = parse_query(
        "SELECT c/content[openEHR-EHR-SECTION.a.v1]/items[openEHR-EHR-OBSERVATION.x.v1]/name/value, \
         c/content[openEHR-EHR-SECTION.a.v1]/items[openEHR-EHR-EVALUATION.y.v1]/name/value \
         FROM COMPOSITION c",
    );
    let analyzer = PathAnalyzer::new(&INFOS);
    let infos = create_path_infos(&query, &analyzer).unwrap();
    let info = &infos["c"];
    let section = &info.cohesion_tree_root().children()[0];
    assert_eq!(info.join_mode(section).unwrap(), JoinMode::InternalFork);
    let observation = &section.children()[0];
    assert_eq!(info.join_mode(observation).unwrap(), JoinMode::Data);
}

#[test]
fn test_unsatisfiable_path_is_rejected() {
    let query = parse_query(
        "SELECT o/data FROM OBSERVATION o[openEHR-EHR-EVALUATION.problem.v1]",
    );
    let analyzer = PathAnalyzer::new(&INFOS);
    let err = create_path_infos(&query, &analyzer).unwrap_err();
    assert_eq!(err.code(), AQL0101);
}
