//! Tests for AQL statement parsing
//!
//! Covers:
//! - SELECT expressions, aliases and aggregates
//! - FROM containment trees
//! - WHERE conditions
//! - ORDER BY / LIMIT / OFFSET

use aql_ast::{
    AggregateFunctionName, AqlQuery, ColumnExpression, ComparisonOperator, Containment,
    ContainmentSetOperator, LogicalOperator, Operand, OrderByDirection, Primitive,
    VersionSelector, WhereCondition,
};
use aql_parser::parse;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn parse_query(input: &str) -> AqlQuery {
    parse(input).unwrap_or_else(|e| panic!("Failed to parse '{}': {:?}", input, e))
}

// === SELECT ===

#[test]
fn test_simple_select() {
    let query = parse_query("SELECT c/uid/value FROM COMPOSITION c");
    assert_eq!(query.select.statements.len(), 1);
    match &query.select.statements[0].column {
        ColumnExpression::Path(p) => {
            assert_eq!(p.root, "c");
            assert_eq!(p.to_string(), "c/uid/value");
        }
        other => panic!("Expected path, got: {:?}", other),
    }
    assert_eq!(query.from, Containment::class("COMPOSITION", Some("c")));
}

#[test]
fn test_select_aliases_and_aggregates() {
    let query = parse_query(
        "select distinct count(distinct c/uid/value) as n, max(o/data/events/time/value), count(*) \
         from EHR e contains COMPOSITION c contains OBSERVATION o",
    );
    assert!(query.select.distinct);
    let columns: Vec<_> = query
        .select
        .statements
        .iter()
        .map(|s| s.column_name())
        .collect();
    assert_eq!(
        columns,
        vec![
            "n",
            "MAX(o/data/events/time/value)",
            "COUNT(*)"
        ]
    );
    match &query.select.statements[0].column {
        ColumnExpression::Aggregate(a) => {
            assert_eq!(a.function, AggregateFunctionName::Count);
            assert!(a.distinct);
        }
        other => panic!("Expected aggregate, got: {:?}", other),
    }
}

#[test]
fn test_select_primitive() {
    let query = parse_query("SELECT 1, 'x' FROM EHR e");
    assert_eq!(
        query.select.statements[0].column,
        ColumnExpression::Primitive(Primitive::Long(1))
    );
}

#[test]
fn test_top_becomes_limit() {
    let query = parse_query("SELECT TOP 5 e/ehr_id/value FROM EHR e");
    assert_eq!(query.limit, Some(5));
    assert!(parse("SELECT TOP 5 e/ehr_id/value FROM EHR e LIMIT 3").is_err());
}

// === FROM ===

#[test]
fn test_nested_containment_with_or() {
    let query = parse_query(
        "SELECT c/uid/value, ev/name/value FROM EHR e CONTAINS COMPOSITION c CONTAINS \
         ((OBSERVATION o CONTAINS CLUSTER cl) OR EVALUATION ev)",
    );
    assert_eq!(query.from.identifiers(), vec!["e", "c", "o", "cl", "ev"]);

    let Containment::Class(ehr) = &query.from else {
        panic!("Expected class containment");
    };
    let Some(Containment::Class(composition)) = ehr.contains.as_deref() else {
        panic!("Expected composition");
    };
    match composition.contains.as_deref() {
        Some(Containment::Set(set)) => {
            assert_eq!(set.operator, ContainmentSetOperator::Or);
            assert_eq!(set.values.len(), 2);
        }
        other => panic!("Expected OR set, got: {:?}", other),
    }
}

#[test]
fn test_containment_predicates() {
    let query = parse_query(
        "SELECT o FROM COMPOSITION c[openEHR-EHR-COMPOSITION.encounter.v1] \
         CONTAINS OBSERVATION o[openEHR-EHR-OBSERVATION.blood_pressure.v2]",
    );
    assert_eq!(
        query.from.to_string(),
        "COMPOSITION c[openEHR-EHR-COMPOSITION.encounter.v1] CONTAINS \
         OBSERVATION o[openEHR-EHR-OBSERVATION.blood_pressure.v2]"
    );
}

#[test]
fn test_version_and_not_contains() {
    let query = parse_query(
        "SELECT v/uid/value FROM VERSION v[ALL_VERSIONS] CONTAINS COMPOSITION c NOT CONTAINS SECTION s",
    );
    let Containment::Version(version) = &query.from else {
        panic!("Expected VERSION");
    };
    assert_eq!(version.selector, VersionSelector::All);
    let Some(Containment::Class(c)) = version.contains.as_deref() else {
        panic!("Expected COMPOSITION");
    };
    assert!(matches!(c.contains.as_deref(), Some(Containment::Not(_))));
}

// === WHERE ===

#[test]
fn test_where_precedence() {
    let query = parse_query(
        "SELECT c FROM COMPOSITION c WHERE c/name/value = 'a' OR c/name/value = 'b' AND NOT EXISTS c/context",
    );
    match query.where_clause {
        Some(WhereCondition::Logical { operator, values }) => {
            assert_eq!(operator, LogicalOperator::Or);
            assert!(matches!(
                values[1],
                WhereCondition::Logical {
                    operator: LogicalOperator::And,
                    ..
                }
            ));
        }
        other => panic!("Expected OR, got: {:?}", other),
    }
}

#[rstest]
#[case("c/name/value = 'x'", ComparisonOperator::Eq)]
#[case("c/name/value != 'x'", ComparisonOperator::Neq)]
#[case("c/name/value >= 'x'", ComparisonOperator::Ge)]
#[case("c/name/value<'x'", ComparisonOperator::Lt)]
fn test_comparison_operators(#[case] condition: &str, #[case] expected: ComparisonOperator) {
    let query = parse_query(&format!("SELECT c FROM COMPOSITION c WHERE {condition}"));
    match query.where_clause {
        Some(WhereCondition::Comparison { operator, .. }) => assert_eq!(operator, expected),
        other => panic!("Expected comparison, got: {:?}", other),
    }
}

#[test]
fn test_matches_like_and_parameters() {
    let query = parse_query(
        "SELECT c FROM COMPOSITION c WHERE c/name/value MATCHES {'a', $b} AND c/name/value LIKE 'Vital*' \
         AND c/context/start_time/value > '2024-01-01T00:00:00'",
    );
    let Some(WhereCondition::Logical { values, .. }) = query.where_clause else {
        panic!("Expected AND");
    };
    match &values[0] {
        WhereCondition::Matches { values, .. } => {
            assert_eq!(values[1], Operand::Parameter("b".to_string()));
        }
        other => panic!("Expected MATCHES, got: {:?}", other),
    }
    match &values[2] {
        WhereCondition::Comparison {
            value: Operand::Primitive(Primitive::Temporal(_)),
            ..
        } => {}
        other => panic!("Expected temporal comparison, got: {:?}", other),
    }
}

// === ORDER BY / LIMIT ===

#[test]
fn test_order_limit_offset() {
    let query = parse_query(
        "SELECT c/uid/value FROM COMPOSITION c -- all compositions\n\
         ORDER BY c/context/start_time/value DESCENDING, c/uid/value LIMIT 10 OFFSET 20",
    );
    assert_eq!(query.order_by.len(), 2);
    assert_eq!(query.order_by[0].direction, OrderByDirection::Desc);
    assert_eq!(query.order_by[1].direction, OrderByDirection::Asc);
    assert_eq!(query.limit, Some(10));
    assert_eq!(query.offset, Some(20));
}

#[test]
fn test_render_round_trip() {
    let text = "SELECT c/uid/value AS id FROM EHR e CONTAINS COMPOSITION c \
                WHERE e/ehr_id/value = 'abc' ORDER BY c/uid/value ASC LIMIT 10";
    assert_eq!(parse_query(text).to_string(), text);
}

// === Errors ===

#[rstest]
#[case("SELECT FROM COMPOSITION c")]
#[case("SELECT c/uid/value COMPOSITION c")]
#[case("SELECT c/uid/value FROM COMPOSITION c WHERE")]
#[case("SELECT c/uid/value FROM COMPOSITION c LIMIT x")]
fn test_parse_errors(#[case] text: &str) {
    let err = parse(text).expect_err("query should not parse");
    assert_eq!(err.code(), aql_diagnostics::AQL0001);
}
