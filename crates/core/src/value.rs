//! Column data types, decoded cell scalars and the cell decoder.
//!
//! The reports API returns every cell as `{"label": ..., "value": ...}`.
//! Which half carries the useful datum depends on the column's data type:
//! numbers and dates live in `value`, currencies nest an `amount` inside
//! `value`, and everything else is best read from the rendered `label`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::{format_description, offset};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

// ──────────────────────────────────────────────
// DataType
// ──────────────────────────────────────────────

/// A column data type as reported in `dataType` by the describe call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Double,
    Percent,
    Int,
    DateTime,
    Date,
    Time,
    Currency,
    Id,
    Reference,
    Boolean,
    Text,
    Picklist,
    Other(String),
}

impl DataType {
    /// `double`, `percent` and `int`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Double | DataType::Percent | DataType::Int)
    }

    /// `datetime`, `date` and `time`.
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::DateTime | DataType::Date | DataType::Time)
    }

    /// Types the service orders totally when sorting, which makes a
    /// greater-than cursor safe to page with.
    pub fn is_sortable_key(&self) -> bool {
        self.is_numeric()
            || self.is_temporal()
            || matches!(
                self,
                DataType::Currency | DataType::Id | DataType::Reference
            )
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataType::Double => "double",
            DataType::Percent => "percent",
            DataType::Int => "int",
            DataType::DateTime => "datetime",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::Currency => "currency",
            DataType::Id => "id",
            DataType::Reference => "reference",
            DataType::Boolean => "boolean",
            DataType::Text => "string",
            DataType::Picklist => "picklist",
            DataType::Other(name) => name,
        }
    }
}

impl From<String> for DataType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "double" => DataType::Double,
            "percent" => DataType::Percent,
            "int" => DataType::Int,
            "datetime" => DataType::DateTime,
            "date" => DataType::Date,
            "time" => DataType::Time,
            "currency" => DataType::Currency,
            "id" => DataType::Id,
            "reference" => DataType::Reference,
            "boolean" => DataType::Boolean,
            "string" => DataType::Text,
            "picklist" => DataType::Picklist,
            _ => DataType::Other(name),
        }
    }
}

impl From<&str> for DataType {
    fn from(name: &str) -> Self {
        DataType::from(name.to_string())
    }
}

impl From<DataType> for String {
    fn from(dtype: DataType) -> Self {
        dtype.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Cell
// ──────────────────────────────────────────────

/// One cell as returned by the service, either a detail data cell or an
/// aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Cell {
    pub fn new(label: impl Into<String>, value: serde_json::Value) -> Self {
        Cell {
            label: label.into(),
            value,
        }
    }
}

// ──────────────────────────────────────────────
// Scalar
// ──────────────────────────────────────────────

/// A decoded cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Decimal),
    Timestamp(OffsetDateTime),
    Time(Time),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Render the scalar the way filter values are written: numbers
    /// normalized, timestamps as `YYYY-MM-DDTHH:MM:SS`. `None` for nulls.
    pub fn render(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Number(d) => Some(d.normalize().to_string()),
            Scalar::Timestamp(ts) => Some(format_timestamp(*ts)),
            Scalar::Time(t) => Some(format_time(*t)),
            Scalar::Text(s) => Some(s.clone()),
        }
    }

    /// Convert a raw JSON value without any type hint.
    pub fn from_json(value: &serde_json::Value) -> Scalar {
        match value {
            serde_json::Value::Null => Scalar::Null,
            serde_json::Value::Bool(b) => Scalar::Bool(*b),
            serde_json::Value::Number(n) => parse_decimal(&n.to_string())
                .map(Scalar::Number)
                .unwrap_or_else(|| Scalar::Text(n.to_string())),
            serde_json::Value::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Some(s) => f.write_str(&s),
            None => Ok(()),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(d) => {
                let d = d.normalize();
                if d.scale() == 0 {
                    if let Some(i) = d.to_i64() {
                        return serializer.serialize_i64(i);
                    }
                }
                match d.to_f64() {
                    Some(f) => serializer.serialize_f64(f),
                    None => serializer.serialize_str(&d.to_string()),
                }
            }
            Scalar::Timestamp(ts) => {
                let s = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&s)
            }
            Scalar::Time(t) => serializer.serialize_str(&format_time(*t)),
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

// ──────────────────────────────────────────────
// Decoder
// ──────────────────────────────────────────────

/// Decode one cell according to its column's data type.
///
/// Numeric types take `value` verbatim, temporal types parse `value`,
/// currency reads `value.amount` (or `value` itself when the service sends a
/// bare number), and every other type returns the display `label`.
pub fn decode(cell: &Cell, dtype: &DataType) -> Scalar {
    if dtype.is_numeric() {
        return Scalar::from_json(&cell.value);
    }
    if dtype.is_temporal() {
        return match &cell.value {
            serde_json::Value::String(raw) => {
                parse_temporal(raw, dtype).unwrap_or_else(|| Scalar::Text(raw.clone()))
            }
            other => Scalar::from_json(other),
        };
    }
    if *dtype == DataType::Currency {
        return match cell.value.get("amount") {
            Some(amount) => Scalar::from_json(amount),
            None => Scalar::from_json(&cell.value),
        };
    }
    Scalar::Text(cell.label.clone())
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn parse_temporal(raw: &str, dtype: &DataType) -> Option<Scalar> {
    if *dtype == DataType::Time {
        return parse_time_of_day(raw).map(Scalar::Time);
    }
    parse_timestamp(raw).map(Scalar::Timestamp)
}

/// Parse a service timestamp: RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS`
/// (taken as UTC) or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    let trimmed = raw.trim_end_matches('Z');
    if let Ok(dt) = PrimitiveDateTime::parse(trimmed, naive) {
        return Some(dt.assume_offset(offset!(UTC)));
    }
    let with_offset = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory][offset_minute]"
    );
    if let Ok(ts) = OffsetDateTime::parse(raw, with_offset) {
        return Some(ts);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_offset(offset!(UTC)))
}

pub(crate) fn parse_time_of_day(raw: &str) -> Option<Time> {
    let trimmed = raw.trim().trim_end_matches('Z');
    Time::parse(
        trimmed,
        format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .ok()
}

/// `YYYY-MM-DDTHH:MM:SS`, the layout used for temporal filter values.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let layout = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    ts.format(layout)
        .unwrap_or_else(|_| ts.date().to_string())
}

/// `HH:MM:SS`, the layout used for time-of-day filter values.
pub(crate) fn format_time(t: Time) -> String {
    t.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| t.to_string())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::{datetime, time};

    fn dec(s: &str) -> Scalar {
        Scalar::Number(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn numeric_types_take_value() {
        let cell = Cell::new("12.5%", json!(12.5));
        assert_eq!(decode(&cell, &DataType::Percent), dec("12.5"));
        let cell = Cell::new("3", json!(3));
        assert_eq!(decode(&cell, &DataType::Int), dec("3"));
    }

    #[test]
    fn numeric_null_is_null() {
        let cell = Cell::new("-", json!(null));
        assert_eq!(decode(&cell, &DataType::Double), Scalar::Null);
    }

    #[test]
    fn currency_composite_reads_amount() {
        let cell = Cell::new("USD 1,500.00", json!({"amount": 1500.0, "currency": "USD"}));
        assert_eq!(decode(&cell, &DataType::Currency), dec("1500.0"));
    }

    #[test]
    fn currency_bare_value_is_kept() {
        let cell = Cell::new("$30", json!(30));
        assert_eq!(decode(&cell, &DataType::Currency), dec("30"));
    }

    #[test]
    fn datetime_parses_rfc3339() {
        let cell = Cell::new("1/31/2020 10:00 AM", json!("2020-01-31T10:00:00Z"));
        assert_eq!(
            decode(&cell, &DataType::DateTime),
            Scalar::Timestamp(datetime!(2020-01-31 10:00:00 UTC))
        );
    }

    #[test]
    fn datetime_parses_compact_offset() {
        let cell = Cell::new("x", json!("2020-01-31T10:00:00.000+0000"));
        assert_eq!(
            decode(&cell, &DataType::DateTime),
            Scalar::Timestamp(datetime!(2020-01-31 10:00:00 UTC))
        );
    }

    #[test]
    fn date_is_midnight_utc() {
        let cell = Cell::new("1/31/2020", json!("2020-01-31"));
        assert_eq!(
            decode(&cell, &DataType::Date),
            Scalar::Timestamp(datetime!(2020-01-31 00:00:00 UTC))
        );
    }

    #[test]
    fn time_of_day_parses() {
        let cell = Cell::new("10:30 AM", json!("10:30:00.000Z"));
        assert_eq!(decode(&cell, &DataType::Time), Scalar::Time(time!(10:30:00)));
    }

    #[test]
    fn unparseable_temporal_keeps_raw_text() {
        let cell = Cell::new("soon", json!("not a date"));
        assert_eq!(
            decode(&cell, &DataType::Date),
            Scalar::Text("not a date".to_string())
        );
    }

    #[test]
    fn picklist_uses_label() {
        let cell = Cell::new("Closed Won", json!("Closed_Won"));
        assert_eq!(
            decode(&cell, &DataType::Picklist),
            Scalar::Text("Closed Won".to_string())
        );
    }

    #[test]
    fn unknown_dtype_falls_through_to_label() {
        let cell = Cell::new("someone@example.com", json!("mailto"));
        let dtype = DataType::from("email");
        assert_eq!(dtype, DataType::Other("email".to_string()));
        assert_eq!(
            decode(&cell, &dtype),
            Scalar::Text("someone@example.com".to_string())
        );
    }

    #[test]
    fn numeric_branch_ignores_label() {
        let a = Cell::new("one", json!(1));
        let b = Cell::new("uno", json!(1));
        assert_eq!(decode(&a, &DataType::Int), decode(&b, &DataType::Int));
    }

    #[test]
    fn decode_is_repeatable() {
        let cell = Cell::new("USD 5", json!({"amount": 5}));
        let first = decode(&cell, &DataType::Currency);
        assert_eq!(first, decode(&cell, &DataType::Currency));
    }

    #[test]
    fn dtype_round_trips_through_strings() {
        for name in ["double", "currency", "datetime", "string", "picklist", "textarea"] {
            assert_eq!(String::from(DataType::from(name)), name);
        }
    }

    #[test]
    fn render_formats_for_filters() {
        assert_eq!(dec("100.0").render().as_deref(), Some("100"));
        assert_eq!(
            Scalar::Timestamp(datetime!(2020-02-01 00:00:00 UTC)).render().as_deref(),
            Some("2020-02-01T00:00:00")
        );
        assert_eq!(Scalar::Null.render(), None);
    }

    #[test]
    fn serializes_numbers_as_json_numbers() {
        let out = serde_json::to_value(vec![dec("3"), dec("1.5"), Scalar::Null]).unwrap();
        assert_eq!(out, json!([3, 1.5, null]));
    }
}
