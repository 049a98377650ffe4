//! Filter operators, filter values, boolean-filter arithmetic and date inputs.

use std::fmt;
use std::str::FromStr;

use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::ReportError;
use crate::value::{format_time, format_timestamp, parse_time_of_day, parse_timestamp, Scalar};

// ──────────────────────────────────────────────
// FilterOperator
// ──────────────────────────────────────────────

/// Comparison operators understood by the reports API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContain,
    StartsWith,
}

impl FilterOperator {
    /// Keyword sent in the `operator` field of a report filter.
    pub fn keyword(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEqual => "notEqual",
            FilterOperator::GreaterThan => "greaterThan",
            FilterOperator::LessThan => "lessThan",
            FilterOperator::GreaterOrEqual => "greaterOrEqual",
            FilterOperator::LessOrEqual => "lessOrEqual",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContain => "notContain",
            FilterOperator::StartsWith => "startsWith",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = ReportError;

    /// Parse the symbolic form users write: `==`, `!=`, `>`, `<`, `>=`,
    /// `<=`, `contains`, `not contains`, `startswith`.
    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        match symbol.trim() {
            "==" => Ok(FilterOperator::Equals),
            "!=" => Ok(FilterOperator::NotEqual),
            ">" => Ok(FilterOperator::GreaterThan),
            "<" => Ok(FilterOperator::LessThan),
            ">=" => Ok(FilterOperator::GreaterOrEqual),
            "<=" => Ok(FilterOperator::LessOrEqual),
            "contains" => Ok(FilterOperator::Contains),
            "not contains" => Ok(FilterOperator::NotContain),
            "startswith" => Ok(FilterOperator::StartsWith),
            other => Err(ReportError::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ──────────────────────────────────────────────
// FilterValue
// ──────────────────────────────────────────────

/// A user-supplied filter value: one scalar or a list matched as "any of".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl FilterValue {
    fn items(&self) -> &[Scalar] {
        match self {
            FilterValue::One(s) => std::slice::from_ref(s),
            FilterValue::Many(list) => list,
        }
    }

    /// Format for a column: temporal columns get `YYYY-MM-DDTHH:MM:SS`,
    /// anything else is double quoted. Lists are comma joined.
    pub fn format(&self, temporal: bool) -> Result<String, ReportError> {
        let parts = self
            .items()
            .iter()
            .map(|item| {
                if temporal {
                    temporal_filter_value(item)
                } else {
                    Ok(format!("\"{}\"", item.render().unwrap_or_default()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(","))
    }
}

fn temporal_filter_value(item: &Scalar) -> Result<String, ReportError> {
    match item {
        Scalar::Timestamp(ts) => Ok(format_timestamp(*ts)),
        Scalar::Time(t) => Ok(format_time(*t)),
        Scalar::Text(raw) => parse_datetime_input(raw)
            .map(format_timestamp)
            .or_else(|err| parse_time_of_day(raw).map(format_time).ok_or(err)),
        other => Err(ReportError::InvalidDate(
            other.render().unwrap_or_default(),
        )),
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::One(Scalar::Text(s.to_string()))
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::One(Scalar::Text(s))
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::One(Scalar::Number(n.into()))
    }
}

impl From<Scalar> for FilterValue {
    fn from(s: Scalar) -> Self {
        FilterValue::One(s)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(list: Vec<T>) -> Self {
        let items = list
            .into_iter()
            .flat_map(|v| match v.into() {
                FilterValue::One(s) => vec![s],
                FilterValue::Many(inner) => inner,
            })
            .collect();
        FilterValue::Many(items)
    }
}

/// One filter as the caller describes it: column label, operator symbol, value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub column: String,
    pub operator: String,
    pub value: FilterValue,
}

impl FilterSpec {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        FilterSpec {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

// ──────────────────────────────────────────────
// Boolean filter
// ──────────────────────────────────────────────

/// Extend a boolean filter with one more clause, ANDed at the end.
///
/// `"1 AND 2"` becomes `"1 AND 2 AND 3"`. The new clause number is one past
/// the last number in the expression once parentheses are removed. An empty
/// expression stays empty.
pub fn increment_logic(logic: &str) -> Result<String, ReportError> {
    if logic.trim().is_empty() {
        return Ok(logic.to_string());
    }
    let stripped = logic.replace(['(', ')'], " ");
    let last = stripped
        .split_whitespace()
        .last()
        .and_then(|token| token.parse::<u32>().ok())
        .ok_or_else(|| ReportError::InvalidBooleanFilter(logic.to_string()))?;
    Ok(format!("{} AND {}", logic, last + 1))
}

// ──────────────────────────────────────────────
// Partial updates
// ──────────────────────────────────────────────

/// A field update that can leave a value alone, null it, or replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Keep,
        }
    }
}

// ──────────────────────────────────────────────
// Date inputs
// ──────────────────────────────────────────────

/// Parse a user date: ISO (`2020-01-31`, `2020-01-31T10:00:00`) or day-first
/// (`31-01-2020`, `31/01/2020`, `31.01.2020`). Dates resolve to midnight UTC.
pub fn parse_datetime_input(raw: &str) -> Result<OffsetDateTime, ReportError> {
    if let Some(ts) = parse_timestamp(raw) {
        return Ok(ts);
    }
    let trimmed = raw.trim();
    let layouts = [
        format_description!("[day]-[month]-[year]"),
        format_description!("[day]/[month]/[year]"),
        format_description!("[day].[month].[year]"),
    ];
    layouts
        .iter()
        .find_map(|layout| Date::parse(trimmed, *layout).ok())
        .map(|d| d.midnight().assume_utc())
        .ok_or_else(|| ReportError::InvalidDate(raw.to_string()))
}

/// [`parse_datetime_input`] truncated to the calendar date.
pub fn parse_date_input(raw: &str) -> Result<Date, ReportError> {
    parse_datetime_input(raw).map(|ts| ts.date())
}
