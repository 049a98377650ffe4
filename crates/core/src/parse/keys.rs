//! Fact-map key shapes and their version-aware ordering.
//!
//! Keys have the form `{rowPath}!{colPath}`. A path is either `T` (the
//! total) or numeric segments joined by `_`, one segment per grouping
//! level. Subtotals use a shorter path, so a data cell is recognised by
//! having exactly as many segments as there are grouping levels.

use std::cmp::Ordering;

use regex::Regex;

use crate::error::ReportError;

/// Pattern for a path of `depth` numeric segments; `T` when `depth` is 0.
pub fn path_pattern(depth: usize) -> String {
    if depth == 0 {
        return "T".to_string();
    }
    vec!["[0-9]+"; depth].join("_")
}

fn compile(pattern: &str) -> Result<Regex, ReportError> {
    Regex::new(pattern).map_err(|e| ReportError::MalformedPayload(e.to_string()))
}

/// Summary data keys: `{rowPath}!T` with `depth` row segments.
pub fn summary_key(depth: usize) -> Result<Regex, ReportError> {
    compile(&format!("^{}!T$", path_pattern(depth)))
}

/// Matrix data keys, capturing the row path and the column path.
pub fn matrix_key(down: usize, across: usize) -> Result<Regex, ReportError> {
    compile(&format!(
        "^({})!({})$",
        path_pattern(down),
        path_pattern(across)
    ))
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn tokenize(key: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let bytes = key.as_bytes();
    while start < bytes.len() {
        let digit = bytes[start].is_ascii_digit();
        let end = bytes[start..]
            .iter()
            .position(|b| b.is_ascii_digit() != digit)
            .map_or(bytes.len(), |n| start + n);
        let part = &key[start..end];
        tokens.push(if digit { Token::Number(part) } else { Token::Text(part) });
        start = end;
    }
    tokens
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare keys so that digit runs order numerically: `9_0!0_0` sorts
/// before `10_0!0_0`. Numbers sort before text at the same position.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    let (ta, tb) = (tokenize(a), tokenize(b));
    for (x, y) in ta.iter().zip(tb.iter()) {
        let ord = match (x, y) {
            (Token::Number(x), Token::Number(y)) => compare_numbers(x, y),
            (Token::Number(_), Token::Text(_)) => Ordering::Less,
            (Token::Text(_), Token::Number(_)) => Ordering::Greater,
            (Token::Text(x), Token::Text(y)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ta.len().cmp(&tb.len())
}
