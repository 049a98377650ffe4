//! Paging past the per-request row cap.
//!
//! The service returns at most a fixed number of rows per run and flags the
//! page as incomplete when more exist. To fetch the rest the client re-runs
//! the report with one extra filter on an identifier column that excludes
//! every row already seen. Two shapes of that filter exist:
//!
//! - **cursor**: the report is sorted ascending by the identifier and the
//!   filter is `identifier > last seen value`;
//! - **exclusion**: the filter is `identifier != v1,v2,...` with every value
//!   seen so far.
//!
//! The filter is appended once, when the first incomplete page arrives, and
//! only its value changes afterwards.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info};

use crate::error::ReportError;
use crate::filter::{FilterOperator, FilterValue};
use crate::metadata::{ReportFilter, ReportFormat, ReportMetadata};
use crate::page::ReportPage;
use crate::value::{DataType, Scalar};

/// Row cap the service applies to a single run.
pub const DEFAULT_PAGE_ROW_LIMIT: usize = 2000;

/// Placeholder for missing identifier values in an exclusion list.
const MISSING_VALUE: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    Cursor,
    Exclusion,
}

impl fmt::Display for PaginationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginationMode::Cursor => f.write_str("cursor"),
            PaginationMode::Exclusion => f.write_str("exclusion"),
        }
    }
}

#[derive(Debug, Clone)]
struct Engaged {
    mode: PaginationMode,
    /// Position of the synthetic filter in `reportFilters`.
    position: usize,
    /// Running exclusion list.
    seen: String,
}

/// Pagination state for one report fetch.
#[derive(Debug, Clone)]
pub struct PaginationCursor {
    label: String,
    field_id: String,
    dtype: DataType,
    cursor_eligible: bool,
    page_row_limit: usize,
    engaged: Option<Engaged>,
}

impl PaginationCursor {
    /// Resolve the identifier column against the report.
    pub fn new(
        metadata: &ReportMetadata,
        id_column: &str,
        page_row_limit: usize,
    ) -> Result<Self, ReportError> {
        let field_id = metadata.resolve_field_id(id_column)?;
        let dtype = metadata.resolve_dtype(&field_id)?;
        let cursor_eligible =
            metadata.format() == ReportFormat::Tabular && dtype.is_sortable_key();
        Ok(PaginationCursor {
            label: id_column.to_string(),
            field_id,
            dtype,
            cursor_eligible,
            page_row_limit,
            engaged: None,
        })
    }

    /// Sort ascending by the identifier when a cursor may be used, so the
    /// first page already ends on its largest identifier.
    pub fn prepare(&self, metadata: &mut ReportMetadata) -> Result<(), ReportError> {
        if self.cursor_eligible {
            metadata.set_sort(&self.label, "asc")?;
        }
        Ok(())
    }

    /// Whether a greater-than cursor may be chosen at the first
    /// incomplete page.
    pub fn cursor_eligible(&self) -> bool {
        self.cursor_eligible
    }

    /// Page by exclusion only, leaving the report's sort alone.
    pub fn exclusion_only(mut self) -> Self {
        self.cursor_eligible = false;
        self
    }

    pub fn mode(&self) -> Option<PaginationMode> {
        self.engaged.as_ref().map(|e| e.mode)
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Update the metadata so the next run excludes every row of `page`.
    pub fn advance(&mut self, page: &ReportPage, metadata: &mut ReportMetadata) -> Result<(), ReportError> {
        let ids = page
            .column_values(&self.label)
            .ok_or_else(|| ReportError::UnknownColumn(self.label.clone()))?;
        if ids.is_empty() {
            return Err(ReportError::MalformedPayload(
                "incomplete page carried no rows".to_string(),
            ));
        }

        match self.engaged.as_mut() {
            None => {
                let mode = self.choose_mode(&ids);
                let (operator, value, seen) = match mode {
                    PaginationMode::Cursor => (
                        FilterOperator::GreaterThan,
                        self.cursor_value(&ids, metadata)?,
                        String::new(),
                    ),
                    PaginationMode::Exclusion => {
                        let joined = exclusion_list(&ids);
                        (FilterOperator::NotEqual, joined.clone(), joined)
                    }
                };
                info!(
                    column = %self.field_id,
                    dtype = %self.dtype,
                    %mode,
                    rows = ids.len(),
                    "report incomplete, paging"
                );
                let position =
                    metadata.push_filter(ReportFilter::new(self.field_id.clone(), operator, value))?;
                self.engaged = Some(Engaged { mode, position, seen });
            }
            Some(engaged) => {
                let value = match engaged.mode {
                    PaginationMode::Cursor => {
                        let last = ids.last().copied().cloned().unwrap_or(Scalar::Null);
                        metadata.format_value(&FilterValue::One(last), &self.field_id)?
                    }
                    PaginationMode::Exclusion => {
                        engaged.seen.push(',');
                        engaged.seen.push_str(&exclusion_list(&ids));
                        engaged.seen.clone()
                    }
                };
                debug!(position = engaged.position, "updating pagination filter");
                metadata.set_filter_value(engaged.position, value)?;
            }
        }
        Ok(())
    }

    /// Cursor paging needs a totally ordered key and a first page that is
    /// full of distinct, present identifiers.
    fn choose_mode(&self, ids: &[&Scalar]) -> PaginationMode {
        if !self.cursor_eligible || ids.len() < self.page_row_limit {
            return PaginationMode::Exclusion;
        }
        let mut distinct = HashSet::with_capacity(ids.len());
        let unique = ids
            .iter()
            .all(|id| id.render().is_some_and(|r| distinct.insert(r)));
        if unique {
            PaginationMode::Cursor
        } else {
            PaginationMode::Exclusion
        }
    }

    fn cursor_value(&self, ids: &[&Scalar], metadata: &ReportMetadata) -> Result<String, ReportError> {
        let last = ids.last().copied().cloned().unwrap_or(Scalar::Null);
        metadata.format_value(&FilterValue::One(last), &self.field_id)
    }
}

fn exclusion_list(ids: &[&Scalar]) -> String {
    ids.iter()
        .map(|id| id.render().unwrap_or_else(|| MISSING_VALUE.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}
