//! AQL parser using Winnow
//!
//! Recursive descent parser for the AQL subset understood by the compiler: SELECT with
//! aggregates and aliases, FROM containment expressions, WHERE conditions, ORDER BY and
//! LIMIT / OFFSET. Keywords are case-insensitive and `--` line comments are ignored.

mod combinators;
mod path;
mod query;

use aql_ast::{AqlObjectPath, AqlQuery};
use aql_diagnostics::{AqlError, Result, SourceLocation, Span, AQL0001, AQL0006};
use combinators::{preprocess, ws, Input};

/// Parse an AQL statement
pub fn parse(source: &str) -> Result<AqlQuery> {
    let cleaned = preprocess(source);
    let mut input: Input<'_> = &cleaned;

    let parsed = query::query_parser(&mut input)
        .map_err(|_| parse_error(source, &cleaned, input, "Parse error"))?;
    if !input.is_empty() {
        return Err(parse_error(source, &cleaned, input, "Unexpected input"));
    }

    let mut query = parsed.query;
    if let Some(top) = parsed.top {
        if query.limit.is_some() {
            return Err(AqlError::parse(
                AQL0001,
                "TOP and LIMIT cannot be combined",
                source,
            ));
        }
        query.limit = Some(top);
    }
    log::debug!("parsed AQL: {query}");
    Ok(query)
}

/// Parse a bare object path such as `data[at0001]/events/data/items[at0004]/value`
pub fn parse_object_path(source: &str) -> Result<AqlObjectPath> {
    let mut input: Input<'_> = source;
    let path = path::object_path(&mut input)
        .map_err(|_| AqlError::parse(AQL0006, format!("Invalid path: {source}"), source))?;
    let _ = ws(&mut input);
    if !input.is_empty() {
        return Err(AqlError::parse(
            AQL0006,
            format!("Invalid path: {source}"),
            source,
        ));
    }
    Ok(path)
}

fn parse_error(source: &str, cleaned: &str, rest: &str, prefix: &str) -> AqlError {
    let offset = cleaned.len() - rest.len();
    let snippet: String = rest.trim_start().chars().take(24).collect();
    let location = SourceLocation::from_span(Span::point(offset), source);
    let message = if snippet.is_empty() {
        format!("{prefix} at {location}: unexpected end of query")
    } else {
        format!("{prefix} at {location} near '{snippet}'")
    };
    AqlError::parse_at(AQL0001, message, source, location)
}
