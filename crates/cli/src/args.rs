//! Argument parsers and request assembly for the `report` subcommand.

use factmap_core::{parse_date_input, DateRange, FilterSpec, FilterValue, ReportRequest};
use time::Date;

/// A `--sort` argument: column label and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortKey {
    pub column: String,
    pub direction: String,
}

/// Everything the `report` subcommand collects before building a request.
pub(crate) struct ReportArgs {
    pub id: String,
    pub id_column: Option<String>,
    pub filters: Vec<FilterSpec>,
    pub logic: Option<String>,
    pub start: Option<Date>,
    pub end: Option<Date>,
    pub date_column: Option<String>,
    pub duration: Option<String>,
    pub sort: Option<SortKey>,
}

/// `COLUMN|OP|VALUE`. A value with commas becomes a list.
pub(crate) fn parse_filter(raw: &str) -> Result<FilterSpec, String> {
    let mut parts = raw.splitn(3, '|');
    let (Some(column), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected COLUMN|OP|VALUE, got '{}'", raw));
    };
    if column.trim().is_empty() || operator.trim().is_empty() {
        return Err(format!("expected COLUMN|OP|VALUE, got '{}'", raw));
    }
    let value: FilterValue = if value.contains(',') {
        value
            .split(',')
            .map(|v| v.trim().to_string())
            .collect::<Vec<_>>()
            .into()
    } else {
        value.into()
    };
    Ok(FilterSpec::new(column.trim(), operator.trim(), value))
}

pub(crate) fn parse_date(raw: &str) -> Result<Date, String> {
    parse_date_input(raw).map_err(|e| e.to_string())
}

/// `COLUMN` or `COLUMN:asc` / `COLUMN:desc`.
pub(crate) fn parse_sort(raw: &str) -> Result<SortKey, String> {
    let (column, direction) = match raw.rsplit_once(':') {
        Some((column, dir)) if matches!(dir.to_ascii_lowercase().as_str(), "asc" | "desc") => {
            (column, dir)
        }
        _ => (raw, "asc"),
    };
    if column.is_empty() {
        return Err(format!("missing sort column in '{}'", raw));
    }
    Ok(SortKey {
        column: column.to_string(),
        direction: direction.to_string(),
    })
}

pub(crate) fn build_request(args: ReportArgs) -> ReportRequest {
    let mut request = ReportRequest::new(args.id);
    request.id_column = args.id_column;
    request.filters = args.filters;
    request.logic = args.logic;
    if args.start.is_some() || args.end.is_some() || args.date_column.is_some() {
        request.date_range = Some(DateRange {
            start: args.start.into(),
            end: args.end.into(),
            column: args.date_column.into(),
        });
    }
    request.duration = args.duration;
    request.sort = args.sort.map(|s| (s.column, s.direction));
    request
}
