//! Normalization of the query before plan building
//!
//! - NOT is pushed down to the leaves of the WHERE clause
//! - containment expressions are measured to decide how OR alternatives are joined

use aql_ast::{
    ComparisonOperator, Containment, ContainmentSetOperator, LogicalOperator, Operand,
    WhereCondition,
};

/// Push NOT down to the leaves of a condition.
///
/// Comparisons take the negated operator and `NOT MATCHES` becomes a conjunction of `!=`.
/// `LIKE` and `EXISTS` keep an explicit NOT.
pub fn push_down_not(condition: &WhereCondition) -> WhereCondition {
    wrap(condition, false)
}

fn wrap(condition: &WhereCondition, negated: bool) -> WhereCondition {
    match condition {
        WhereCondition::Not(inner) => wrap(inner, !negated),
        WhereCondition::Logical { operator, values } => {
            let operator = match (operator, negated) {
                (op, false) => *op,
                (LogicalOperator::And, true) => LogicalOperator::Or,
                (LogicalOperator::Or, true) => LogicalOperator::And,
            };
            WhereCondition::Logical {
                operator,
                values: values.iter().map(|v| wrap(v, negated)).collect(),
            }
        }
        WhereCondition::Comparison {
            statement,
            operator,
            value,
        } => WhereCondition::Comparison {
            statement: statement.clone(),
            operator: if negated { operator.negate() } else { *operator },
            value: value.clone(),
        },
        WhereCondition::Matches { statement, values } if negated => WhereCondition::and(
            values
                .iter()
                .map(|v| WhereCondition::Comparison {
                    statement: statement.clone(),
                    operator: ComparisonOperator::Neq,
                    value: v.clone(),
                })
                .collect(),
        ),
        leaf if negated => WhereCondition::Not(Box::new(leaf.clone())),
        leaf => leaf.clone(),
    }
}

/// Whether a MATCHES list only holds literals
pub fn is_literal_list(values: &[Operand]) -> bool {
    values.iter().all(|v| matches!(v, Operand::Primitive(_)))
}

/// Number of class expressions in a containment expression
pub fn chain_length(containment: &Containment) -> usize {
    match containment {
        Containment::Class(c) => 1 + c.contains.as_deref().map_or(0, chain_length),
        Containment::Version(v) => 1 + v.contains.as_deref().map_or(0, chain_length),
        Containment::Set(s) => s.values.iter().map(chain_length).sum(),
        Containment::Not(inner) => chain_length(inner),
    }
}

/// Whether an alternative of an OR set must be wrapped in its own subquery so that its
/// inner joins do not restrict the other alternatives
pub fn needs_or_wrapper(containment: &Containment) -> bool {
    match containment {
        Containment::Set(s) if s.operator == ContainmentSetOperator::Or => true,
        other => chain_length(other) > 1,
    }
}
