//! Object path and path predicate parser

use crate::combinators::{
    backtrack, identifier, is_ident_char, keyword, lit, number, padded_keyword, parameter,
    string_literal, symbol, ws, Input, PResult,
};
use aql_ast::{
    AndPredicate, AqlObjectPath, ComparisonPredicate, IdentifiedPath, PathNode,
    PredicateOperator, PredicateValue, Primitive,
};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;
use winnow::token::take_while;

/// `c[predicate]/path`
pub fn identified_path(input: &mut Input<'_>) -> PResult<IdentifiedPath> {
    let root = identifier(input)?;
    let root_predicates = opt(predicate_block).parse_next(input)?.unwrap_or_default();
    let path = opt(preceded(lit("/"), object_path)).parse_next(input)?;
    Ok(IdentifiedPath {
        root: root.to_string(),
        root_predicates,
        path,
    })
}

/// `attribute[predicate]/attribute/...`
pub fn object_path(input: &mut Input<'_>) -> PResult<AqlObjectPath> {
    let mut nodes = vec![path_node(input)?];
    while let Some(node) = opt(preceded(lit("/"), path_node)).parse_next(input)? {
        nodes.push(node);
    }
    Ok(AqlObjectPath::new(nodes))
}

fn attribute_name<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    take_while(1.., is_ident_char)
        .verify(|s: &str| !s.starts_with(|c: char| c.is_ascii_digit()))
        .parse_next(input)
}

fn path_node(input: &mut Input<'_>) -> PResult<PathNode> {
    let attribute = attribute_name(input)?;
    let predicates = opt(predicate_block).parse_next(input)?.unwrap_or_default();
    Ok(PathNode::with_predicates(attribute, predicates))
}

/// `[ ... ]` holding an `or`-list of `and`-predicates
pub fn predicate_block(input: &mut Input<'_>) -> PResult<Vec<AndPredicate>> {
    lit("[")(input)?;
    ws(input)?;
    let mut predicates = vec![and_predicate(input)?];
    while opt(padded_keyword("or")).parse_next(input)?.is_some() {
        predicates.push(and_predicate(input)?);
    }
    symbol("]")(input)?;
    Ok(predicates)
}

fn and_predicate(input: &mut Input<'_>) -> PResult<AndPredicate> {
    let mut operands = predicate_atom(input)?;
    while opt(padded_keyword("and")).parse_next(input)?.is_some() {
        operands.extend(predicate_atom(input)?);
    }
    Ok(AndPredicate::new(operands))
}

fn predicate_atom(input: &mut Input<'_>) -> PResult<Vec<ComparisonPredicate>> {
    alt((node_predicate, comparison_predicate)).parse_next(input)
}

/// Shorthand `[at0001]`, `[openEHR-EHR-...v1, 'name']`, `[$node, $name]`
fn node_predicate(input: &mut Input<'_>) -> PResult<Vec<ComparisonPredicate>> {
    let node_id = alt((
        node_id.map(|id| PredicateValue::Primitive(Primitive::String(id))),
        parameter.map(PredicateValue::Parameter),
    ))
    .parse_next(input)?;
    let mut operands = vec![ComparisonPredicate::new(
        AqlObjectPath::archetype_node_id(),
        PredicateOperator::Eq,
        node_id,
    )];
    if opt(symbol(",")).parse_next(input)?.is_some() {
        let name = alt((
            string_literal.map(|s| PredicateValue::Primitive(Primitive::String(s))),
            parameter.map(PredicateValue::Parameter),
        ))
        .parse_next(input)?;
        operands.push(ComparisonPredicate::new(
            AqlObjectPath::name_value(),
            PredicateOperator::Eq,
            name,
        ));
    }
    ws(input)?;
    Ok(operands)
}

/// Archetype id (`openEHR-EHR-OBSERVATION.blood_pressure.v2`) or node code (`at0001`, `id3.1`)
pub fn node_id(input: &mut Input<'_>) -> PResult<String> {
    alt((archetype_id, node_code)).parse_next(input)
}

fn archetype_id(input: &mut Input<'_>) -> PResult<String> {
    (
        lit("openEHR-"),
        take_while(1.., |c: char| is_ident_char(c) || c == '-' || c == '.'),
    )
        .take()
        .map(str::to_string)
        .parse_next(input)
}

fn node_code(input: &mut Input<'_>) -> PResult<String> {
    let start = input.checkpoint();
    let code = (
        alt((lit("at"), lit("id"))),
        take_while(1.., |c: char| c.is_ascii_digit()),
        take_while(0.., |c: char| c.is_ascii_digit() || c == '.'),
    )
        .take()
        .parse_next(input)?;
    if input.starts_with(is_ident_char) || code.ends_with('.') {
        input.reset(&start);
        return backtrack();
    }
    Ok(code.to_string())
}

fn comparison_predicate(input: &mut Input<'_>) -> PResult<Vec<ComparisonPredicate>> {
    let path = object_path(input)?;
    ws(input)?;
    let operator = predicate_operator(input)?;
    ws(input)?;
    let value = predicate_value(input)?;
    ws(input)?;
    Ok(vec![ComparisonPredicate::new(path, operator, value)])
}

fn predicate_operator(input: &mut Input<'_>) -> PResult<PredicateOperator> {
    alt((
        lit(">=").value(PredicateOperator::Ge),
        lit("<=").value(PredicateOperator::Le),
        lit("!=").value(PredicateOperator::Neq),
        lit("<>").value(PredicateOperator::Neq),
        lit("=").value(PredicateOperator::Eq),
        lit(">").value(PredicateOperator::Gt),
        lit("<").value(PredicateOperator::Lt),
    ))
    .parse_next(input)
}

fn predicate_value(input: &mut Input<'_>) -> PResult<PredicateValue> {
    if let Some(s) = opt(string_literal).parse_next(input)? {
        return Ok(PredicateValue::Primitive(Primitive::from_string(s)));
    }
    if let Some(n) = opt(number).parse_next(input)? {
        return Ok(PredicateValue::Primitive(n));
    }
    if opt(keyword("true")).parse_next(input)?.is_some() {
        return Ok(PredicateValue::Primitive(Primitive::Boolean(true)));
    }
    if opt(keyword("false")).parse_next(input)?.is_some() {
        return Ok(PredicateValue::Primitive(Primitive::Boolean(false)));
    }
    if let Some(p) = opt(parameter).parse_next(input)? {
        return Ok(PredicateValue::Parameter(p));
    }
    if let Some(id) = opt(node_id).parse_next(input)? {
        return Ok(PredicateValue::Primitive(Primitive::String(id)));
    }
    object_path.map(PredicateValue::Path).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_path(text: &str) -> AqlObjectPath {
        let mut input = text;
        let path = object_path(&mut input).unwrap_or_else(|e| panic!("{text}: {e:?}"));
        assert_eq!(input, "", "unparsed input for {text}");
        path
    }

    #[test]
    fn test_node_codes() {
        let mut input = "at0001.1]";
        assert_eq!(node_id(&mut input).ok(), Some("at0001.1".to_string()));
        let mut input = "attestations";
        assert!(node_id(&mut input).is_err());
    }

    #[test]
    fn test_render_back() {
        for text in [
            "content[openEHR-EHR-OBSERVATION.bp.v1]/data[at0001]/events",
            "items[at0004, 'Systolic']/value/magnitude",
            "items[archetype_node_id=at0004 and value/magnitude>3 and name/value='Systolic']",
            "items[name/value='A' or name/value='B']/value",
        ] {
            assert_eq!(parse_path(text).to_string(), text);
        }
    }

    #[test]
    fn test_general_predicate_structure() {
        let path = parse_path("item[value/value>3]/value[value < 100]/value");
        assert_eq!(path.len(), 3);
        let first = &path.nodes[0].predicates[0].operands[0];
        assert_eq!(first.operator, PredicateOperator::Gt);
        assert_eq!(first.value, PredicateValue::Primitive(Primitive::Long(3)));
        assert_eq!(path.nodes[1].to_string(), "value[value<100]");
    }

    #[test]
    fn test_parameter_shorthand() {
        let path = parse_path("content[$node, $name]");
        let ops = &path.nodes[0].predicates[0].operands;
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].value, PredicateValue::Parameter("name".to_string()));
    }
}
