//! Query structure parser using winnow

use crate::combinators::{
    identifier, integer, keyword, lit, padded_keyword, parameter, primitive, symbol, ws, Input,
    PResult,
};
use crate::path::{identified_path, predicate_block};
use aql_ast::{
    AggregateFunction, AggregateFunctionName, AqlQuery, ColumnExpression, ComparisonOperator,
    Containment, ContainmentClass, ContainmentSet, ContainmentSetOperator, ContainmentVersion,
    Operand, OrderByDirection, OrderByExpression, SelectClause, SelectExpression,
    VersionSelector, WhereCondition,
};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;

/// A query together with its `TOP` value, which is folded into LIMIT after parsing
pub struct ParsedQuery {
    pub query: AqlQuery,
    pub top: Option<i64>,
}

pub fn query_parser(input: &mut Input<'_>) -> PResult<ParsedQuery> {
    ws(input)?;
    padded_keyword("select")(input)?;
    let distinct = opt(padded_keyword("distinct")).parse_next(input)?.is_some();
    let top = opt(preceded(padded_keyword("top"), integer)).parse_next(input)?;
    ws(input)?;

    let mut statements = vec![select_expression(input)?];
    while opt(symbol(",")).parse_next(input)?.is_some() {
        statements.push(select_expression(input)?);
    }

    padded_keyword("from")(input)?;
    let from = containment_or(input)?;

    let where_clause = opt(preceded(padded_keyword("where"), where_or)).parse_next(input)?;

    let mut order_by = Vec::new();
    if opt((padded_keyword("order"), padded_keyword("by")))
        .parse_next(input)?
        .is_some()
    {
        order_by.push(order_by_expression(input)?);
        while opt(symbol(",")).parse_next(input)?.is_some() {
            order_by.push(order_by_expression(input)?);
        }
    }

    let limit = opt(preceded(padded_keyword("limit"), integer)).parse_next(input)?;
    let offset = opt(preceded(padded_keyword("offset"), integer)).parse_next(input)?;
    ws(input)?;

    let mut query = AqlQuery::new(
        SelectClause {
            distinct,
            statements,
        },
        from,
    );
    query.where_clause = where_clause;
    query.order_by = order_by;
    query.limit = limit;
    query.offset = offset;
    Ok(ParsedQuery { query, top })
}

// === SELECT ===

fn select_expression(input: &mut Input<'_>) -> PResult<SelectExpression> {
    let column = alt((
        aggregate_function.map(ColumnExpression::Aggregate),
        primitive.map(ColumnExpression::Primitive),
        identified_path.map(ColumnExpression::Path),
    ))
    .parse_next(input)?;
    let alias = opt(preceded(padded_keyword("as"), identifier)).parse_next(input)?;
    ws(input)?;
    Ok(SelectExpression {
        column,
        alias: alias.map(str::to_string),
    })
}

fn aggregate_function(input: &mut Input<'_>) -> PResult<AggregateFunction> {
    let function = alt((
        keyword("count").value(AggregateFunctionName::Count),
        keyword("min").value(AggregateFunctionName::Min),
        keyword("max").value(AggregateFunctionName::Max),
        keyword("sum").value(AggregateFunctionName::Sum),
        keyword("avg").value(AggregateFunctionName::Avg),
    ))
    .parse_next(input)?;
    symbol("(")(input)?;
    let distinct = opt(padded_keyword("distinct")).parse_next(input)?.is_some();
    let path = if function == AggregateFunctionName::Count
        && opt(symbol("*")).parse_next(input)?.is_some()
    {
        None
    } else {
        Some(identified_path(input)?)
    };
    symbol(")")(input)?;
    Ok(AggregateFunction {
        function,
        path,
        distinct,
    })
}

// === FROM ===

fn containment_or(input: &mut Input<'_>) -> PResult<Containment> {
    let mut values = vec![containment_and(input)?];
    while opt(padded_keyword("or")).parse_next(input)?.is_some() {
        values.push(containment_and(input)?);
    }
    Ok(containment_set(ContainmentSetOperator::Or, values))
}

fn containment_and(input: &mut Input<'_>) -> PResult<Containment> {
    let mut values = vec![contains_expression(input)?];
    while opt(padded_keyword("and")).parse_next(input)?.is_some() {
        values.push(contains_expression(input)?);
    }
    Ok(containment_set(ContainmentSetOperator::And, values))
}

fn containment_set(operator: ContainmentSetOperator, mut values: Vec<Containment>) -> Containment {
    if values.len() == 1 {
        if let Some(single) = values.pop() {
            return single;
        }
    }
    Containment::Set(ContainmentSet { operator, values })
}

fn contains_expression(input: &mut Input<'_>) -> PResult<Containment> {
    ws(input)?;
    if opt(symbol("(")).parse_next(input)?.is_some() {
        let inner = containment_or(input)?;
        symbol(")")(input)?;
        return Ok(inner);
    }

    let mut operand = alt((version_operand, class_operand)).parse_next(input)?;
    let negated = opt(padded_keyword("not")).parse_next(input)?.is_some();
    let contains = if negated {
        padded_keyword("contains")(input)?;
        Some(Containment::Not(Box::new(contains_expression(input)?)))
    } else if opt(padded_keyword("contains")).parse_next(input)?.is_some() {
        Some(contains_expression(input)?)
    } else {
        None
    };

    if let Some(contains) = contains {
        match &mut operand {
            Containment::Class(c) => c.contains = Some(Box::new(contains)),
            Containment::Version(v) => v.contains = Some(Box::new(contains)),
            Containment::Set(_) | Containment::Not(_) => {}
        }
    }
    Ok(operand)
}

fn class_operand(input: &mut Input<'_>) -> PResult<Containment> {
    let rm_type = identifier(input)?;
    ws(input)?;
    let ident = opt(identifier).parse_next(input)?;
    let predicates = opt(predicate_block).parse_next(input)?.unwrap_or_default();
    ws(input)?;
    Ok(Containment::Class(
        ContainmentClass::new(rm_type, ident).with_predicates(predicates),
    ))
}

fn version_operand(input: &mut Input<'_>) -> PResult<Containment> {
    keyword("version")(input)?;
    ws(input)?;
    let ident = opt(identifier).parse_next(input)?;
    let selector = opt(preceded(
        symbol("["),
        alt((
            keyword("latest_version").value(VersionSelector::Latest),
            keyword("all_versions").value(VersionSelector::All),
        )),
    ))
    .parse_next(input)?;
    if selector.is_some() {
        symbol("]")(input)?;
    }
    ws(input)?;
    Ok(Containment::Version(ContainmentVersion {
        identifier: ident.map(str::to_string),
        selector: selector.unwrap_or(VersionSelector::Latest),
        contains: None,
    }))
}

// === WHERE ===

fn where_or(input: &mut Input<'_>) -> PResult<WhereCondition> {
    let mut values = vec![where_and(input)?];
    while opt(padded_keyword("or")).parse_next(input)?.is_some() {
        values.push(where_and(input)?);
    }
    Ok(if values.len() == 1 {
        values.remove(0)
    } else {
        WhereCondition::or(values)
    })
}

fn where_and(input: &mut Input<'_>) -> PResult<WhereCondition> {
    let mut values = vec![where_unary(input)?];
    while opt(padded_keyword("and")).parse_next(input)?.is_some() {
        values.push(where_unary(input)?);
    }
    Ok(if values.len() == 1 {
        values.remove(0)
    } else {
        WhereCondition::and(values)
    })
}

fn where_unary(input: &mut Input<'_>) -> PResult<WhereCondition> {
    ws(input)?;
    if opt(padded_keyword("not")).parse_next(input)?.is_some() {
        return Ok(WhereCondition::Not(Box::new(where_unary(input)?)));
    }
    if opt(padded_keyword("exists")).parse_next(input)?.is_some() {
        let path = identified_path(input)?;
        ws(input)?;
        return Ok(WhereCondition::Exists(path));
    }
    if opt(symbol("(")).parse_next(input)?.is_some() {
        let inner = where_or(input)?;
        symbol(")")(input)?;
        return Ok(inner);
    }
    comparison(input)
}

fn comparison(input: &mut Input<'_>) -> PResult<WhereCondition> {
    let statement = identified_path(input)?;
    ws(input)?;
    if opt(padded_keyword("like")).parse_next(input)?.is_some() {
        let value = operand(input)?;
        return Ok(WhereCondition::Like { statement, value });
    }
    if opt(padded_keyword("matches")).parse_next(input)?.is_some() {
        symbol("{")(input)?;
        let mut values = vec![operand(input)?];
        while opt(symbol(",")).parse_next(input)?.is_some() {
            values.push(operand(input)?);
        }
        symbol("}")(input)?;
        return Ok(WhereCondition::Matches { statement, values });
    }
    let operator = comparison_operator(input)?;
    let value = operand(input)?;
    Ok(WhereCondition::Comparison {
        statement,
        operator,
        value,
    })
}

fn comparison_operator(input: &mut Input<'_>) -> PResult<ComparisonOperator> {
    ws(input)?;
    let operator = alt((
        lit(">=").value(ComparisonOperator::Ge),
        lit("<=").value(ComparisonOperator::Le),
        lit("!=").value(ComparisonOperator::Neq),
        lit("<>").value(ComparisonOperator::Neq),
        lit("=").value(ComparisonOperator::Eq),
        lit(">").value(ComparisonOperator::Gt),
        lit("<").value(ComparisonOperator::Lt),
    ))
    .parse_next(input)?;
    ws(input)?;
    Ok(operator)
}

fn operand(input: &mut Input<'_>) -> PResult<Operand> {
    ws(input)?;
    let value = alt((
        primitive.map(Operand::Primitive),
        parameter.map(Operand::Parameter),
        identified_path.map(Operand::Path),
    ))
    .parse_next(input)?;
    ws(input)?;
    Ok(value)
}

// === ORDER BY ===

fn order_by_expression(input: &mut Input<'_>) -> PResult<OrderByExpression> {
    let statement = identified_path(input)?;
    ws(input)?;
    let direction = opt(alt((
        keyword("ascending").value(OrderByDirection::Asc),
        keyword("asc").value(OrderByDirection::Asc),
        keyword("descending").value(OrderByDirection::Desc),
        keyword("desc").value(OrderByDirection::Desc),
    )))
    .parse_next(input)?
    .unwrap_or_default();
    ws(input)?;
    Ok(OrderByExpression {
        statement,
        direction,
    })
}
