//! Rejection of AQL constructs the compiler does not translate

use aql_analysis::containment_roots;
use aql_ast::{
    AggregateFunctionName, AqlQuery, ColumnExpression, ComparisonOperator, Containment, IdentifiedPath, Operand,
    WhereCondition, ARCHETYPE_NODE_ID,
};
use aql_diagnostics::{AqlError, Result, AQL0102, AQL0106};
use aql_model::constants::EHR;
use aql_model::ExtractedColumn;

fn unsupported(what: impl std::fmt::Display) -> AqlError {
    AqlError::semantic(AQL0106, format!("Not supported: {what}"))
}

/// Check a parsed query for unsupported features and unknown identifiers
///
/// Parameters may still be unresolved.
pub fn check_features(query: &AqlQuery) -> Result<()> {
    check_containment(&query.from)?;
    let roots = containment_roots(&query.from)?;

    for statement in &query.select.statements {
        if let ColumnExpression::Aggregate(aggregate) = &statement.column {
            if aggregate.path.is_none() && aggregate.function != AggregateFunctionName::Count {
                return Err(unsupported(format!("{aggregate} without a path")));
            }
        }
    }

    for path in query.identified_paths() {
        let root = roots.get(&path.root).ok_or_else(|| {
            AqlError::semantic(AQL0102, format!("Unknown identifier: {}", path.root))
        })?;
        if root.rm_type == EHR {
            check_ehr_path(path)?;
        }
    }

    if let Some(condition) = &query.where_clause {
        check_condition(condition)?;
    }
    Ok(())
}

fn check_containment(containment: &Containment) -> Result<()> {
    match containment {
        Containment::Class(class) => match class.contains.as_deref() {
            Some(inner) => check_containment(inner),
            None => Ok(()),
        },
        Containment::Version(_) => Err(unsupported("VERSION containment")),
        Containment::Set(set) => set.values.iter().try_for_each(check_containment),
        Containment::Not(_) => Err(unsupported("NOT CONTAINS")),
    }
}

fn check_ehr_path(path: &IdentifiedPath) -> Result<()> {
    match &path.path {
        None => Err(unsupported(format!("selecting the whole EHR {}", path.root))),
        Some(object_path) if ExtractedColumn::find(EHR, object_path).is_none() => {
            Err(unsupported(format!("path {path} of EHR")))
        }
        Some(_) => Ok(()),
    }
}

fn is_archetype_node_id(path: &IdentifiedPath) -> bool {
    path.path
        .as_ref()
        .and_then(|p| p.last())
        .is_some_and(|n| n.attribute == ARCHETYPE_NODE_ID)
}

fn check_condition(condition: &WhereCondition) -> Result<()> {
    match condition {
        WhereCondition::Comparison {
            statement,
            operator,
            value,
        } => {
            if let Operand::Path(other) = value {
                return Err(unsupported(format!("comparing {statement} with path {other}")));
            }
            if is_archetype_node_id(statement)
                && !matches!(operator, ComparisonOperator::Eq | ComparisonOperator::Neq)
            {
                return Err(unsupported(format!(
                    "operator {} on {statement}",
                    operator.symbol()
                )));
            }
            Ok(())
        }
        WhereCondition::Like { statement, value } => match value {
            Operand::Path(other) => Err(unsupported(format!("{statement} LIKE path {other}"))),
            _ => Ok(()),
        },
        WhereCondition::Matches { statement, values } => {
            match values.iter().find(|v| matches!(v, Operand::Path(_))) {
                Some(other) => Err(unsupported(format!("{statement} MATCHES path {other}"))),
                None => Ok(()),
            }
        }
        WhereCondition::Exists(_) => Ok(()),
        WhereCondition::Not(inner) => check_condition(inner),
        WhereCondition::Logical { values, .. } => values.iter().try_for_each(check_condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aql_diagnostics::AQL0103;
    use aql_parser::parse;
    use rstest::rstest;

    fn check(aql: &str) -> Result<()> {
        let query = parse(aql).unwrap_or_else(|e| panic!("Failed to parse '{aql}': {e:?}"));
        check_features(&query)
    }

    #[rstest]
    #[case("SELECT c/uid/value FROM COMPOSITION c")]
    #[case("SELECT e/ehr_id/value, e/time_created FROM EHR e CONTAINS COMPOSITION c")]
    #[case("SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value = $name")]
    #[case("SELECT COUNT(*) FROM EHR e")]
    #[case("SELECT o/archetype_node_id FROM OBSERVATION o WHERE o/archetype_node_id != 'x'")]
    #[case("SELECT c/uid/value FROM EHR e CONTAINS (COMPOSITION c AND EHR_STATUS s)")]
    fn test_supported(#[case] aql: &str) {
        check(aql).unwrap_or_else(|e| panic!("'{aql}' rejected: {e}"));
    }

    #[rstest]
    #[case("SELECT c/uid/value FROM VERSION v[LATEST_VERSION] CONTAINS COMPOSITION c")]
    #[case("SELECT c/uid/value FROM COMPOSITION c NOT CONTAINS SECTION s")]
    #[case("SELECT e FROM EHR e")]
    #[case("SELECT e/ehr_status FROM EHR e")]
    #[case("SELECT o/uid/value FROM OBSERVATION o WHERE o/archetype_node_id > 'a'")]
    #[case("SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value = c/uid/value")]
    #[case("SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value MATCHES {'a', c/uid/value}")]
    fn test_unsupported(#[case] aql: &str) {
        let err = check(aql).expect_err("query should be rejected");
        assert_eq!(err.code(), AQL0106, "{err}");
        assert!(err.message().starts_with("Not supported: "), "{err}");
    }

    #[test]
    fn test_unknown_identifier() {
        let err = check("SELECT x/uid/value FROM COMPOSITION c").unwrap_err();
        assert_eq!(err.code(), AQL0102);
        assert_eq!(err.message(), "Unknown identifier: x");
    }

    #[test]
    fn test_duplicate_identifier() {
        let err = check("SELECT c/uid/value FROM COMPOSITION c CONTAINS OBSERVATION c").unwrap_err();
        assert_eq!(err.code(), AQL0103);
    }
}
