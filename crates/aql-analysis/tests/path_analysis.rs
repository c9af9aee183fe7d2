//! Tests for path type analysis
//!
//! Covers:
//! - Narrowing of candidate types by attributes, archetype ids and literal values
//! - Attribute infos (multiplicity, target types) of analyzed nodes
//! - Segment-level errors for invalid paths
//! - Random walks over the model never yielding empty candidate sets

use aql_analysis::{AttributeInfos, NodeCategory, PathAnalyzer};
use aql_ast::AqlObjectPath;
use aql_diagnostics::{AQL0100, AQL0101};
use aql_model::{RmModelRegistry, RmTypeIntrospection};
use aql_parser::parse_object_path;
use indexmap::IndexSet;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use std::sync::LazyLock;

static REGISTRY: LazyLock<RmModelRegistry> =
    LazyLock::new(|| RmModelRegistry::openehr().expect("embedded model"));
static INFOS: LazyLock<AttributeInfos> = LazyLock::new(|| AttributeInfos::new(&*REGISTRY));

fn analyzer() -> PathAnalyzer<'static> {
    PathAnalyzer::new(&INFOS)
}

fn path(text: &str) -> AqlObjectPath {
    parse_object_path(text).unwrap_or_else(|e| panic!("Failed to parse '{text}': {e:?}"))
}

fn set(types: &[&str]) -> IndexSet<String> {
    types.iter().map(|t| t.to_string()).collect()
}

// === Narrowing ===

#[test]
fn test_attribute_narrows_abstract_root() {
    let p = path("data");
    let node = analyzer()
        .analyze_path_types("CARE_ENTRY", &[], &[], Some(&p), None)
        .unwrap();
    assert_eq!(node.candidate_types(), &set(&["OBSERVATION", "EVALUATION"]));
    let data = node.attribute("data").unwrap();
    assert!(data.candidate_types().contains("HISTORY"));
    assert!(data.candidate_types().contains("ITEM_TREE"));
}

#[test]
fn test_literal_predicate_narrows_data_value() {
    let p = path("item/value[value=10.0]/value");
    let node = analyzer()
        .analyze_path_types("ITEM_STRUCTURE", &[], &[], Some(&p), None)
        .unwrap();
    assert_eq!(node.candidate_types(), &set(&["ITEM_SINGLE"]));
    let value = node.descend(["item", "value"]).unwrap();
    assert_eq!(value.candidate_types(), &set(&["DV_ORDINAL", "DV_SCALE"]));
    let leaf = value.attribute("value").unwrap();
    assert_eq!(leaf.candidate_types(), &set(&["DOUBLE", "LONG"]));
}

#[test]
fn test_candidate_types_narrow_last_node() {
    let p = path("item/value/value");
    let numeric = set(&["DOUBLE", "INTEGER", "LONG"]);
    let node = analyzer()
        .analyze_path_types("ITEM_STRUCTURE", &[], &[], Some(&p), Some(&numeric))
        .unwrap();
    let value = node.descend(["item", "value"]).unwrap();
    assert_eq!(value.candidate_types(), &set(&["DV_ORDINAL", "DV_SCALE"]));
}

#[test]
fn test_archetype_predicate_narrows_content() {
    let p = path("content[openEHR-EHR-OBSERVATION.blood_pressure.v2]/data/events");
    let node = analyzer()
        .analyze_path_types("COMPOSITION", &[], &[], Some(&p), None)
        .unwrap();
    let content = node.attribute("content").unwrap();
    assert_eq!(content.candidate_types(), &set(&["OBSERVATION"]));
    assert_eq!(content.category().unwrap(), NodeCategory::Structure);

    let info = node.attribute_info("content").unwrap();
    assert!(info.multiple_valued);

    let events = content.descend(["data", "events"]).unwrap();
    assert_eq!(events.candidate_types(), &set(&["POINT_EVENT", "INTERVAL_EVENT"]));
}

#[test]
fn test_root_predicates_constrain_root() {
    let predicates = vec![aql_ast::AndPredicate::archetype(
        "openEHR-EHR-EVALUATION.problem_diagnosis.v1",
    )];
    let node = analyzer()
        .analyze_path_types("CARE_ENTRY", &[], &predicates, None, None)
        .unwrap();
    assert_eq!(node.candidate_types(), &set(&["EVALUATION"]));
}

#[test]
fn test_mismatching_archetype_empties_root() {
    let predicates = vec![aql_ast::AndPredicate::archetype(
        "openEHR-EHR-EVALUATION.problem_diagnosis.v1",
    )];
    let node = analyzer()
        .analyze_path_types("OBSERVATION", &[], &predicates, None, None)
        .unwrap();
    assert!(node.candidate_types().is_empty());
}

#[test]
fn test_foundation_leaf_category() {
    let p = path("name/value");
    let node = analyzer()
        .analyze_path_types("COMPOSITION", &[], &[], Some(&p), None)
        .unwrap();
    let value = node.descend(["name", "value"]).unwrap();
    assert_eq!(value.category().unwrap(), NodeCategory::Foundation);
    let name = node.attribute("name").unwrap();
    assert_eq!(name.category().unwrap(), NodeCategory::RmType);
}

#[test]
fn test_ehr_attributes() {
    let p = path("ehr_status/subject");
    let node = analyzer()
        .analyze_path_types("EHR", &[], &[], Some(&p), None)
        .unwrap();
    assert_eq!(
        node.attribute("ehr_status").unwrap().candidate_types(),
        &set(&["EHR_STATUS"])
    );
}

// === Errors ===

#[rstest]
#[case("COMPOSITION", "content/magnitude", "magnitude")]
#[case("COMPOSITION", "context/items", "items")]
#[case("OBSERVATION", "data/events/width/magnitude", "magnitude")]
fn test_invalid_segment(#[case] root: &str, #[case] text: &str, #[case] segment: &str) {
    let p = path(text);
    let err = analyzer()
        .analyze_path_types(root, &[], &[], Some(&p), None)
        .unwrap_err();
    assert_eq!(err.code(), AQL0101);
    assert!(
        err.message().contains(&format!(": {segment}")),
        "message was: {}",
        err.message()
    );
}

#[test]
fn test_unknown_attribute() {
    let p = path("context/no_such_attribute/value");
    let err = analyzer()
        .analyze_path_types("COMPOSITION", &[], &[], Some(&p), None)
        .unwrap_err();
    assert_eq!(err.code(), AQL0100);
    assert!(err.message().contains(": no_such_attribute"));
}

// === Properties ===

/// Build a path by following declared attributes from `root`
fn walk(root: &str, choices: &[prop::sample::Index]) -> Option<AqlObjectPath> {
    let mut current = INFOS.concrete_types_of(root);
    let mut attributes = Vec::new();
    for choice in choices {
        let rm_type = choice.get(&current.iter().cloned().collect::<Vec<_>>()).clone();
        let declared: Vec<(String, IndexSet<String>)> = REGISTRY
            .attributes_of(&rm_type)?
            .keys()
            .filter_map(|a| {
                INFOS
                    .typed_attribute(a)
                    .and_then(|m| m.get(&rm_type))
                    .map(|targets| (a.clone(), targets.clone()))
            })
            .collect();
        if declared.is_empty() {
            break;
        }
        let (attribute, targets) = choice.get(&declared).clone();
        attributes.push(attribute);
        current = targets;
        if !current.iter().any(|t| REGISTRY.has_type(t)) {
            break;
        }
        current.retain(|t| REGISTRY.has_type(t));
    }
    (!attributes.is_empty()).then(|| AqlObjectPath::from_attributes(attributes))
}

fn assert_non_empty(node: &aql_analysis::ANode) {
    assert!(!node.candidate_types().is_empty());
    for child in node.attributes().values() {
        assert_non_empty(child);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_declared_paths_are_valid(
        root in prop::sample::select(vec!["COMPOSITION", "OBSERVATION", "EHR_STATUS", "CLUSTER"]),
        choices in prop::collection::vec(any::<prop::sample::Index>(), 1..6),
    ) {
        if let Some(p) = walk(root, &choices) {
            let node = analyzer().analyze_path_types(root, &[], &[], Some(&p), None);
            prop_assert!(node.is_ok(), "{root}/{p}: {:?}", node.as_ref().err());
            if let Ok(node) = node {
                assert_non_empty(&node);
            }
        }
    }
}
