//! Query root and SELECT / ORDER BY clauses

use crate::path::{render_predicates, AndPredicate, AqlObjectPath};
use crate::{Containment, Primitive, WhereCondition};
use std::fmt;

/// A parsed AQL statement
#[derive(Debug, Clone, PartialEq)]
pub struct AqlQuery {
    pub select: SelectClause,
    pub from: Containment,
    pub where_clause: Option<WhereCondition>,
    pub order_by: Vec<OrderByExpression>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AqlQuery {
    pub fn new(select: SelectClause, from: Containment) -> Self {
        Self {
            select,
            from,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Every identified path of SELECT, WHERE and ORDER BY in order of appearance
    pub fn identified_paths(&self) -> Vec<&IdentifiedPath> {
        let mut out: Vec<&IdentifiedPath> = self
            .select
            .statements
            .iter()
            .filter_map(|s| s.column.identified_path())
            .collect();
        if let Some(condition) = &self.where_clause {
            out.extend(condition.paths());
        }
        out.extend(self.order_by.iter().map(|o| &o.statement));
        out
    }
}

impl fmt::Display for AqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} FROM {}", self.select, self.from)?;
        if let Some(condition) = &self.where_clause {
            write!(f, " WHERE {condition}")?;
        }
        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " ORDER BY {order}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

/// `SELECT [DISTINCT] expr [AS alias], ...`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub statements: Vec<SelectExpression>,
}

impl fmt::Display for SelectClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        let columns = self
            .statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&columns)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpression {
    pub column: ColumnExpression,
    pub alias: Option<String>,
}

impl SelectExpression {
    pub fn new(column: ColumnExpression) -> Self {
        Self {
            column,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Result column name: the alias, or the rendered expression
    pub fn column_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.column.to_string())
    }
}

impl fmt::Display for SelectExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// A selectable expression
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpression {
    Path(IdentifiedPath),
    Aggregate(AggregateFunction),
    Primitive(Primitive),
}

impl ColumnExpression {
    pub fn identified_path(&self) -> Option<&IdentifiedPath> {
        match self {
            ColumnExpression::Path(p) => Some(p),
            ColumnExpression::Aggregate(a) => a.path.as_ref(),
            ColumnExpression::Primitive(_) => None,
        }
    }
}

impl fmt::Display for ColumnExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnExpression::Path(p) => write!(f, "{p}"),
            ColumnExpression::Aggregate(a) => write!(f, "{a}"),
            ColumnExpression::Primitive(p) => write!(f, "{p}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunctionName {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateFunctionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunctionName::Count => "COUNT",
            AggregateFunctionName::Min => "MIN",
            AggregateFunctionName::Max => "MAX",
            AggregateFunctionName::Sum => "SUM",
            AggregateFunctionName::Avg => "AVG",
        }
    }
}

/// `COUNT(DISTINCT c/uid/value)`, `MAX(o/data/...)`, `COUNT(*)`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFunction {
    pub function: AggregateFunctionName,
    /// `None` for `COUNT(*)`
    pub path: Option<IdentifiedPath>,
    pub distinct: bool,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function.as_str())?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        match &self.path {
            Some(p) => write!(f, "{p})"),
            None => f.write_str("*)"),
        }
    }
}

/// A containment identifier with an optional path, e.g. `o[at0001]/data/events`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentifiedPath {
    pub root: String,
    pub root_predicates: Vec<AndPredicate>,
    pub path: Option<AqlObjectPath>,
}

impl IdentifiedPath {
    pub fn new(root: impl Into<String>, path: Option<AqlObjectPath>) -> Self {
        Self {
            root: root.into(),
            root_predicates: Vec::new(),
            path,
        }
    }

    /// The path, or an empty path when only the identifier is referenced
    pub fn object_path(&self) -> AqlObjectPath {
        self.path.clone().unwrap_or_default()
    }
}

impl fmt::Display for IdentifiedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        if !self.root_predicates.is_empty() {
            write!(f, "[{}]", render_predicates(&self.root_predicates))?;
        }
        if let Some(path) = &self.path {
            write!(f, "/{path}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderByDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpression {
    pub statement: IdentifiedPath,
    pub direction: OrderByDirection,
}

impl fmt::Display for OrderByExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            OrderByDirection::Asc => write!(f, "{} ASC", self.statement),
            OrderByDirection::Desc => write!(f, "{} DESC", self.statement),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_query() {
        let uid = IdentifiedPath::new("c", Some(AqlObjectPath::from_attributes(["uid", "value"])));
        let mut query = AqlQuery::new(
            SelectClause {
                distinct: true,
                statements: vec![
                    SelectExpression::new(ColumnExpression::Path(uid.clone())).with_alias("id"),
                    SelectExpression::new(ColumnExpression::Aggregate(AggregateFunction {
                        function: AggregateFunctionName::Count,
                        path: None,
                        distinct: false,
                    })),
                ],
            },
            Containment::class("COMPOSITION", Some("c")),
        );
        query.order_by.push(OrderByExpression {
            statement: uid,
            direction: OrderByDirection::Desc,
        });
        query.limit = Some(10);

        assert_eq!(
            query.to_string(),
            "SELECT DISTINCT c/uid/value AS id, COUNT(*) FROM COMPOSITION c ORDER BY c/uid/value DESC LIMIT 10"
        );
        assert_eq!(query.identified_paths().len(), 2);
        assert_eq!(query.select.statements[1].column_name(), "COUNT(*)");
    }
}
