//! Tests for the bundled openEHR reference model
//!
//! Covers:
//! - Type hierarchy queries used by path analysis
//! - Structure types and foundation types against the model
//! - Multiplicity of collection attributes

use aql_model::constants::{COMPOSITION, DV_ORDERED, ELEMENT};
use aql_model::{FoundationType, RmModelRegistry, RmTypeIntrospection, StructureRmType};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::LazyLock;

static REGISTRY: LazyLock<RmModelRegistry> =
    LazyLock::new(|| RmModelRegistry::openehr().expect("embedded model"));

#[test]
fn test_every_structure_type_is_modelled() {
    for entry in StructureRmType::entries() {
        assert!(
            REGISTRY.has_type(entry.type_name()),
            "{} missing from model",
            entry.type_name()
        );
    }
}

#[test]
fn test_foundation_types_are_not_structure_types() {
    for name in ["STRING", "LONG", "DOUBLE", "BOOLEAN"] {
        assert!(FoundationType::is_foundation_type(name));
        assert!(StructureRmType::by_type_name(name).is_none());
    }
}

#[rstest]
#[case("CARE_ENTRY", &["OBSERVATION", "EVALUATION", "INSTRUCTION", "ACTION"])]
#[case("EVENT", &["POINT_EVENT", "INTERVAL_EVENT"])]
fn test_concrete_types(#[case] rm_type: &str, #[case] expected: &[&str]) {
    let concrete = REGISTRY.concrete_types_of(rm_type);
    for t in expected {
        assert!(concrete.contains(*t), "{rm_type} lacks {t}");
    }
    assert!(!concrete.contains(rm_type));
}

#[test]
fn test_dv_ordered_descendants() {
    let ordered = REGISTRY.descendant_types_of(DV_ORDERED);
    for t in ["DV_QUANTITY", "DV_COUNT", "DV_DATE_TIME", "DV_ORDINAL"] {
        assert!(ordered.contains(t), "{t} is not DV_ORDERED");
    }
    assert!(!ordered.contains("DV_TEXT"));
}

#[test]
fn test_collection_attributes() {
    let composition = REGISTRY.attributes_of(COMPOSITION).unwrap();
    assert!(composition["content"].is_multiple);
    assert!(!composition["context"].is_multiple);

    let element = REGISTRY.attributes_of(ELEMENT).unwrap();
    assert!(element.contains_key("value"));
    assert!(element.contains_key("null_flavour"));
}

#[test]
fn test_unknown_type() {
    assert!(!REGISTRY.has_type("NO_SUCH_TYPE"));
    assert_eq!(REGISTRY.attributes_of("NO_SUCH_TYPE"), None);
    assert_eq!(
        REGISTRY.concrete_types_of("NO_SUCH_TYPE").into_iter().collect::<Vec<_>>(),
        vec!["NO_SUCH_TYPE".to_string()]
    );
}
