//! Common parser combinators for AQL

use aql_ast::Primitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use winnow::ascii::{digit1, Caseless};
use winnow::combinator::opt;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, literal, one_of, take_while};

/// Parser input
pub type Input<'a> = &'a str;

/// Parser result
pub type PResult<T> = winnow::error::ModalResult<T>;

/// Words that can never be used as identifiers
const RESERVED: &[&str] = &[
    "select", "from", "where", "order", "by", "limit", "offset", "contains", "and", "or",
    "not", "as", "distinct", "top", "exists", "like", "matches", "asc", "desc", "ascending",
    "descending", "true", "false", "null",
];

/// Recoverable failure, lets `alt`/`opt` try the next alternative
pub fn backtrack<T>() -> PResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// Unrecoverable failure
pub fn cut<T>() -> PResult<T> {
    Err(ErrMode::Cut(ContextError::new()))
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Blank out `--` line comments, keeping byte offsets intact
pub fn preprocess(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    while let Some(c) = chars.next() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            } else {
                out.extend(std::iter::repeat_n(' ', c.len_utf8()));
            }
            continue;
        }
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '-' && chars.peek() == Some(&'-') => {
                in_comment = true;
                out.push(' ');
            }
            None => out.push(c),
        }
    }
    out
}

/// Skip whitespace
pub fn ws(input: &mut Input<'_>) -> PResult<()> {
    take_while(0.., char::is_whitespace)
        .void()
        .parse_next(input)
}

fn caseless<'a>(input: &mut Input<'a>, word: &'static str) -> PResult<&'a str> {
    literal(Caseless(word)).parse_next(input)
}

/// Case-insensitive keyword that is not followed by an identifier character
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&mut Input<'a>) -> PResult<&'a str> {
    move |input: &mut Input<'a>| {
        let start = input.checkpoint();
        let matched = caseless(input, word)?;
        if input.starts_with(is_ident_char) {
            input.reset(&start);
            return backtrack();
        }
        Ok(matched)
    }
}

/// Keyword surrounded by optional whitespace
pub fn padded_keyword<'a>(word: &'static str) -> impl FnMut(&mut Input<'a>) -> PResult<&'a str> {
    let mut kw = keyword(word);
    move |input: &mut Input<'a>| {
        ws(input)?;
        let matched = kw(input)?;
        ws(input)?;
        Ok(matched)
    }
}

/// Exact literal text
pub fn lit<'a>(text: &'static str) -> impl FnMut(&mut Input<'a>) -> PResult<&'a str> {
    move |input: &mut Input<'a>| -> PResult<&'a str> { literal(text).parse_next(input) }
}

/// Literal text surrounded by optional whitespace
pub fn symbol<'a>(text: &'static str) -> impl FnMut(&mut Input<'a>) -> PResult<&'a str> {
    move |input: &mut Input<'a>| {
        ws(input)?;
        let matched = lit(text)(input)?;
        ws(input)?;
        Ok(matched)
    }
}

fn raw_identifier<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)
}

/// Identifier that is not a reserved word
pub fn identifier<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    let start = input.checkpoint();
    let ident = raw_identifier(input)?;
    if RESERVED.iter().any(|r| r.eq_ignore_ascii_case(ident)) {
        input.reset(&start);
        return backtrack();
    }
    Ok(ident)
}

/// `$name`
pub fn parameter(input: &mut Input<'_>) -> PResult<String> {
    let _ = lit("$")(input)?;
    let name = raw_identifier(input)?;
    Ok(name.to_string())
}

fn next_char(input: &mut Input<'_>) -> PResult<char> {
    any.parse_next(input)
}

fn quote_char(input: &mut Input<'_>) -> PResult<char> {
    one_of(['\'', '"']).parse_next(input)
}

/// Single- or double-quoted string with backslash escapes
pub fn string_literal(input: &mut Input<'_>) -> PResult<String> {
    let quote = quote_char(input)?;
    let mut out = String::new();
    loop {
        let Ok(c) = next_char(input) else {
            return cut();
        };
        match c {
            c if c == quote => return Ok(out),
            '\\' => {
                let Ok(escaped) = next_char(input) else {
                    return cut();
                };
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
}

fn number_text<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    (
        opt('-'),
        digit1,
        opt(('.', digit1)),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .parse_next(input)
}

/// Integer or real number
pub fn number(input: &mut Input<'_>) -> PResult<Primitive> {
    let start = input.checkpoint();
    let text = number_text(input)?;
    if input.starts_with(is_ident_char) {
        input.reset(&start);
        return backtrack();
    }
    if text.contains(['e', 'E']) {
        return Decimal::from_scientific(text)
            .map(Primitive::Double)
            .or_else(|_| cut());
    }
    if text.contains('.') {
        return Decimal::from_str(text)
            .map(Primitive::Double)
            .or_else(|_| cut());
    }
    text.parse::<i64>().map(Primitive::Long).or_else(|_| cut())
}

/// Non-negative integer, used by TOP / LIMIT / OFFSET
pub fn integer(input: &mut Input<'_>) -> PResult<i64> {
    let digits = digits(input)?;
    digits.parse::<i64>().or_else(|_| cut())
}

fn digits<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    digit1.parse_next(input)
}

/// `true` / `false`
pub fn boolean(input: &mut Input<'_>) -> PResult<bool> {
    if opt(keyword("true")).parse_next(input)?.is_some() {
        return Ok(true);
    }
    keyword("false")(input).map(|_| false)
}

/// String, number or boolean literal; ISO-8601 strings become temporal literals
pub fn primitive(input: &mut Input<'_>) -> PResult<Primitive> {
    if let Some(s) = opt(string_literal).parse_next(input)? {
        return Ok(Primitive::from_string(s));
    }
    if let Some(n) = opt(number).parse_next(input)? {
        return Ok(n);
    }
    boolean(input).map(Primitive::Boolean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_strips_comments() {
        let source = "SELECT c -- the composition\nFROM COMPOSITION c";
        let cleaned = preprocess(source);
        assert_eq!(cleaned.len(), source.len());
        assert!(!cleaned.contains("composition\n"));
        assert!(cleaned.contains("FROM COMPOSITION c"));
    }

    #[test]
    fn test_preprocess_keeps_dashes_in_strings() {
        let source = "WHERE c/name/value = 'a -- b'";
        assert_eq!(preprocess(source), source);
    }

    #[test]
    fn test_keyword_requires_boundary() {
        let mut input = "selection";
        assert!(keyword("select")(&mut input).is_err());
        let mut input = "SELECT c";
        assert_eq!(keyword("select")(&mut input).ok(), Some("SELECT"));
    }

    #[test]
    fn test_string_escapes() {
        let mut input = r"'O\'Neil' rest";
        assert_eq!(string_literal(&mut input).ok(), Some("O'Neil".to_string()));
        assert_eq!(input, " rest");
    }

    #[test]
    fn test_numbers() {
        let mut input = "-42";
        assert_eq!(number(&mut input).ok(), Some(Primitive::Long(-42)));
        let mut input = "10.0";
        assert_eq!(
            number(&mut input).ok(),
            Some(Primitive::Double(Decimal::from_str("10.0").unwrap_or_default()))
        );
    }
}
