//! factmap-core: report payload decoding and pagination engine.
//!
//! Turns the analytics API's self-describing report documents into flat or
//! multi-level tables, and pages past the per-request row cap by injecting
//! exclusion filters into the report's own metadata.
//!
//! # Public API
//!
//! - [`ReportClient`] -- fetch loop with a bounded metadata cache
//! - [`Transport`] -- the describe/run/summary seam implemented by clients
//! - [`ReportMetadata`] -- typed describe document and its mutators
//! - [`ReportPage`] / [`ReportTable`] -- decoded results
//! - [`decode()`] and [`flatten()`] -- cell decoder and grouping flattener
//! - [`ReportError`] -- error type for all of the above

pub mod error;
pub mod filter;
pub mod grouping;
pub mod metadata;
pub mod page;
pub mod pagination;
pub mod parse;
pub mod report;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::ReportError;
pub use filter::{increment_logic, parse_date_input, FieldUpdate, FilterOperator, FilterSpec, FilterValue};
pub use grouping::{flatten, GroupingNode, GroupingTree};
pub use metadata::{ReportFormat, ReportMetadata};
pub use page::{ColumnIndex, ReportPage, ReportTable, RowIndex};
pub use pagination::{PaginationCursor, PaginationMode};
pub use parse::{grand_total, parse_page, ReportPayload};
pub use report::{DateRange, FetchOptions, PageStream, ReportClient, ReportRequest, Transport};
pub use value::{decode, Cell, DataType, Scalar};
