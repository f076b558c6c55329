//! Expression parser for `${source}` reference syntax
//!
//! Parses a string value into an ordered list of literal fragments and
//! variable expressions. Supported forms:
//!
//! - `${name:address}` — passes `address` as a string argument;
//! - `${name(p1, p2, ...)}` — passes a parameter list;
//! - either form optionally followed by `, fallbackLiteral` before the
//!   closing `}`, where the fallback is a quoted string or the bare token
//!   `null`.
//!
//! Addresses and parameters may themselves contain nested expressions, and a
//! string may mix literal text with any number of expressions. A `${...}`
//! body that is not a source reference stays literal text; an unmatched
//! `${` is a parse error.

use thiserror::Error;

/// One piece of a parsed string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Literal text, emitted verbatim.
    Literal(String),
    /// A variable expression to be resolved against a source.
    Expression(Expression),
}

/// A parsed `${...}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// The source name.
    pub source: String,
    /// The colon-form address argument, itself a parsed fragment list.
    pub argument: Option<Vec<Fragment>>,
    /// The call-form parameters, each a parsed fragment list.
    pub params: Option<Vec<Vec<Fragment>>>,
    /// The literal substituted when the source yields nothing.
    pub fallback: Option<Fallback>,
}

/// A fallback literal attached to an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// A string literal (quotes stripped).
    Text(String),
    /// The bare token `null`.
    Null,
}

/// Syntactic errors detected while parsing a string value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// An opening `${` with no matching closing brace.
    #[error("unterminated variable expression in \"{0}\"")]
    Unterminated(String),
}

/// Fast check for whether a string can contain any expression at all.
#[must_use]
pub fn contains_expression(input: &str) -> bool {
    input.contains("${")
}

/// Returns true when the fragment list is exactly one expression with no
/// surrounding literal text, i.e. its result need not be a string.
#[must_use]
pub fn is_whole_value(fragments: &[Fragment]) -> bool {
    matches!(fragments, [Fragment::Expression(_)])
}

/// Parses a string value into literal fragments and expressions.
///
/// # Errors
///
/// Returns [`ParseError::Unterminated`] when an opening `${` never closes.
///
/// # Examples
///
/// ```
/// use skylift_resolver::parser::{Fragment, parse};
///
/// let fragments = parse("foo${env:REGION}").unwrap();
/// assert_eq!(fragments.len(), 2);
/// assert_eq!(fragments[0], Fragment::Literal("foo".to_string()));
/// ```
pub fn parse(input: &str) -> Result<Vec<Fragment>, ParseError> {
    let bytes = input.as_bytes();
    let mut fragments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            let body_start = i + 2;
            let Some(body_end) = find_closing_brace(bytes, body_start) else {
                return Err(ParseError::Unterminated(input.to_string()));
            };
            if let Some(expression) = parse_expression(&input[body_start..body_end])? {
                if literal_start < i {
                    fragments.push(Fragment::Literal(input[literal_start..i].to_string()));
                }
                fragments.push(Fragment::Expression(expression));
                literal_start = body_end + 1;
            }
            // A body that is not a reference stays part of the literal run.
            i = body_end + 1;
        } else {
            i += 1;
        }
    }

    if literal_start < bytes.len() {
        fragments.push(Fragment::Literal(input[literal_start..].to_string()));
    }
    Ok(fragments)
}

/// Finds the brace closing the expression whose body starts at `start`.
/// Tracks nested `${}` pairs and skips quoted spans.
fn find_closing_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = start;

    while i < bytes.len() {
        let byte = bytes[i];
        if let Some(open) = quote {
            if byte == open {
                quote = None;
            }
        } else {
            match byte {
                b'\'' | b'"' => quote = Some(byte),
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    depth += 1;
                    i += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Parses one expression body (the text between `${` and `}`).
///
/// Returns `Ok(None)` when the body is not a source reference; the caller
/// keeps it as literal text.
fn parse_expression(body: &str) -> Result<Option<Expression>, ParseError> {
    let body = body.trim();
    let name_len = source_name_len(body);
    if name_len == 0 {
        return Ok(None);
    }
    let source = body[..name_len].to_string();
    let mut rest = &body[name_len..];

    let mut params = None;
    if let Some(after_open) = rest.strip_prefix('(') {
        let Some(close) = find_closing_paren(after_open.as_bytes()) else {
            return Ok(None);
        };
        params = Some(parse_params(&after_open[..close])?);
        rest = after_open[close + 1..].trim_start();
    }

    let mut argument = None;
    let mut fallback = None;
    if let Some(after_colon) = rest.strip_prefix(':') {
        match top_level_comma(after_colon) {
            Some(comma) => {
                argument = Some(parse(after_colon[..comma].trim())?);
                fallback = Some(parse_fallback(&after_colon[comma + 1..]));
            }
            None => argument = Some(parse(after_colon.trim())?),
        }
        rest = "";
    } else if let Some(after_comma) = rest.strip_prefix(',') {
        fallback = Some(parse_fallback(after_comma));
        rest = "";
    }

    // The grammar requires a colon or call form; anything else (including
    // trailing junk) is not a variable.
    if !rest.trim().is_empty() || (params.is_none() && argument.is_none()) {
        return Ok(None);
    }

    Ok(Some(Expression {
        source,
        argument,
        params,
        fallback,
    }))
}

/// Length of the leading source identifier, or 0 when there is none.
fn source_name_len(body: &str) -> usize {
    let bytes = body.as_bytes();
    match bytes.first() {
        Some(first) if first.is_ascii_alphabetic() || *first == b'_' => bytes
            .iter()
            .take_while(|byte| byte.is_ascii_alphanumeric() || **byte == b'_')
            .count(),
        _ => 0,
    }
}

/// Finds the parenthesis closing a parameter list starting right after `(`.
fn find_closing_paren(bytes: &[u8]) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;

    for (i, byte) in bytes.iter().enumerate() {
        if let Some(open) = quote {
            if *byte == open {
                quote = None;
            }
            continue;
        }
        match byte {
            b'\'' | b'"' => quote = Some(*byte),
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the first comma at nesting depth zero (outside quotes, `${}`
/// pairs and parentheses), if any.
fn top_level_comma(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut braces = 0usize;
    let mut parens = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if let Some(open) = quote {
            if byte == open {
                quote = None;
            }
        } else {
            match byte {
                b'\'' | b'"' => quote = Some(byte),
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    braces += 1;
                    i += 1;
                }
                b'}' if braces > 0 => braces -= 1,
                b'(' => parens += 1,
                b')' if parens > 0 => parens -= 1,
                b',' if braces == 0 && parens == 0 => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Parses a comma-separated parameter list. Quoted parameters are literals;
/// anything else runs through the fragment parser again.
fn parse_params(inner: &str) -> Result<Vec<Vec<Fragment>>, ParseError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut params = Vec::new();
    let mut rest = inner;
    loop {
        let (part, tail) = match top_level_comma(rest) {
            Some(comma) => (&rest[..comma], Some(&rest[comma + 1..])),
            None => (rest, None),
        };
        let part = part.trim();
        match quoted_inner(part) {
            Some(literal) => params.push(vec![Fragment::Literal(literal.to_string())]),
            None => params.push(parse(part)?),
        }
        match tail {
            Some(tail) => rest = tail,
            None => break,
        }
    }
    Ok(params)
}

/// Parses a fallback literal: `null`, a quoted string, or bare text.
fn parse_fallback(text: &str) -> Fallback {
    let text = text.trim();
    if text == "null" {
        return Fallback::Null;
    }
    match quoted_inner(text) {
        Some(inner) => Fallback::Text(inner.to_string()),
        None => Fallback::Text(text.to_string()),
    }
}

/// Returns the content of a fully quoted token (`'x'` or `"x"`).
fn quoted_inner(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}
