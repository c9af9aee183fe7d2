//! WHERE clause conditions

use crate::query::IdentifiedPath;
use crate::Primitive;
use std::fmt;

/// Comparison operators of the WHERE clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Neq => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "<=",
        }
    }

    /// Operator that holds when this one does not
    pub fn negate(&self) -> Self {
        match self {
            ComparisonOperator::Eq => ComparisonOperator::Neq,
            ComparisonOperator::Neq => ComparisonOperator::Eq,
            ComparisonOperator::Gt => ComparisonOperator::Le,
            ComparisonOperator::Ge => ComparisonOperator::Lt,
            ComparisonOperator::Lt => ComparisonOperator::Ge,
            ComparisonOperator::Le => ComparisonOperator::Gt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Value side of a WHERE comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Primitive(Primitive),
    /// `$name`
    Parameter(String),
    Path(IdentifiedPath),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Primitive(p) => write!(f, "{p}"),
            Operand::Parameter(name) => write!(f, "${name}"),
            Operand::Path(path) => write!(f, "{path}"),
        }
    }
}

/// Boolean condition of the WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum WhereCondition {
    /// `path op value`
    Comparison {
        statement: IdentifiedPath,
        operator: ComparisonOperator,
        value: Operand,
    },
    /// `path LIKE 'pattern'`
    Like {
        statement: IdentifiedPath,
        value: Operand,
    },
    /// `path MATCHES {v1, v2}`
    Matches {
        statement: IdentifiedPath,
        values: Vec<Operand>,
    },
    /// `EXISTS path`
    Exists(IdentifiedPath),
    Not(Box<WhereCondition>),
    Logical {
        operator: LogicalOperator,
        values: Vec<WhereCondition>,
    },
}

impl WhereCondition {
    pub fn and(values: Vec<WhereCondition>) -> Self {
        WhereCondition::Logical {
            operator: LogicalOperator::And,
            values,
        }
    }

    pub fn or(values: Vec<WhereCondition>) -> Self {
        WhereCondition::Logical {
            operator: LogicalOperator::Or,
            values,
        }
    }

    /// Every identified path referenced by this condition, left to right
    pub fn paths(&self) -> Vec<&IdentifiedPath> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a IdentifiedPath>) {
        match self {
            WhereCondition::Comparison {
                statement, value, ..
            }
            | WhereCondition::Like { statement, value } => {
                out.push(statement);
                if let Operand::Path(p) = value {
                    out.push(p);
                }
            }
            WhereCondition::Matches { statement, values } => {
                out.push(statement);
                out.extend(values.iter().filter_map(|v| match v {
                    Operand::Path(p) => Some(p),
                    _ => None,
                }));
            }
            WhereCondition::Exists(path) => out.push(path),
            WhereCondition::Not(inner) => inner.collect_paths(out),
            WhereCondition::Logical { values, .. } => {
                for v in values {
                    v.collect_paths(out);
                }
            }
        }
    }
}

impl fmt::Display for WhereCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereCondition::Comparison {
                statement,
                operator,
                value,
            } => write!(f, "{statement} {} {value}", operator.symbol()),
            WhereCondition::Like { statement, value } => write!(f, "{statement} LIKE {value}"),
            WhereCondition::Matches { statement, values } => {
                let rendered = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{statement} MATCHES {{{rendered}}}")
            }
            WhereCondition::Exists(path) => write!(f, "EXISTS {path}"),
            WhereCondition::Not(inner) => write!(f, "NOT ({inner})"),
            WhereCondition::Logical { operator, values } => {
                let sep = match operator {
                    LogicalOperator::And => " AND ",
                    LogicalOperator::Or => " OR ",
                };
                let rendered = values
                    .iter()
                    .map(|v| match v {
                        WhereCondition::Logical { .. } => format!("({v})"),
                        _ => v.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(sep);
                f.write_str(&rendered)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AqlObjectPath;
    use pretty_assertions::assert_eq;

    fn path(root: &str, attrs: &[&str]) -> IdentifiedPath {
        IdentifiedPath::new(root, Some(AqlObjectPath::from_attributes(attrs.iter().copied())))
    }

    #[test]
    fn test_negate_operator() {
        assert_eq!(ComparisonOperator::Gt.negate(), ComparisonOperator::Le);
        assert_eq!(ComparisonOperator::Eq.negate().negate(), ComparisonOperator::Eq);
    }

    #[test]
    fn test_collect_paths() {
        let cond = WhereCondition::and(vec![
            WhereCondition::Comparison {
                statement: path("c", &["uid", "value"]),
                operator: ComparisonOperator::Eq,
                value: Operand::Path(path("o", &["uid", "value"])),
            },
            WhereCondition::Not(Box::new(WhereCondition::Exists(path("e", &["ehr_id"])))),
        ]);
        let roots: Vec<_> = cond.paths().iter().map(|p| p.root.as_str()).collect();
        assert_eq!(roots, vec!["c", "o", "e"]);
        assert_eq!(
            cond.to_string(),
            "c/uid/value = o/uid/value AND NOT (EXISTS e/ehr_id)"
        );
    }
}
