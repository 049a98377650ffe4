//! Report orchestration: metadata cache, request configuration and the
//! fetch loop.
//!
//! A fetch moves through describe, configure, run, and then repeats
//! "advance pagination, run" until the server reports all data. Pages are
//! exposed lazily through [`PageStream`]; [`ReportClient::get_report`]
//! drains the stream and concatenates the pages.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use time::Date;
use tracing::{debug, warn};

use crate::error::ReportError;
use crate::filter::{FieldUpdate, FilterSpec, FilterValue};
use crate::metadata::{ReportFormat, ReportMetadata};
use crate::page::{ReportPage, ReportTable};
use crate::pagination::{PaginationCursor, DEFAULT_PAGE_ROW_LIMIT};
use crate::parse::{grand_total, parse_page, ReportPayload};
use crate::value::Scalar;

// ──────────────────────────────────────────────
// Transport seam
// ──────────────────────────────────────────────

/// The calls a report fetch makes against the service.
pub trait Transport {
    /// Describe a report: its metadata document.
    fn describe(&self, report_id: &str) -> Result<serde_json::Value, ReportError>;

    /// Run a report with the given metadata document as the request body.
    fn run(&self, report_id: &str, metadata: &serde_json::Value) -> Result<serde_json::Value, ReportError>;

    /// Run a report without detail rows, for its totals.
    fn summary(&self, report_id: &str) -> Result<serde_json::Value, ReportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn describe(&self, report_id: &str) -> Result<serde_json::Value, ReportError> {
        (**self).describe(report_id)
    }

    fn run(&self, report_id: &str, metadata: &serde_json::Value) -> Result<serde_json::Value, ReportError> {
        (**self).run(report_id, metadata)
    }

    fn summary(&self, report_id: &str) -> Result<serde_json::Value, ReportError> {
        (**self).summary(report_id)
    }
}

// ──────────────────────────────────────────────
// Requests
// ──────────────────────────────────────────────

/// Custom standard date range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: FieldUpdate<Date>,
    pub end: FieldUpdate<Date>,
    /// Date column label.
    pub column: FieldUpdate<String>,
}

/// Everything a caller can ask of a report fetch.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub report_id: String,
    /// Column with row-unique values, required to page past the row cap.
    pub id_column: Option<String>,
    pub filters: Vec<FilterSpec>,
    pub logic: Option<String>,
    pub date_range: Option<DateRange>,
    /// Named duration label, applied after `date_range`.
    pub duration: Option<String>,
    /// Column label and direction.
    pub sort: Option<(String, String)>,
}

impl ReportRequest {
    pub fn new(report_id: impl Into<String>) -> Self {
        ReportRequest {
            report_id: report_id.into(),
            ..Default::default()
        }
    }

    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn filter(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filters.push(FilterSpec::new(column, operator, value));
        self
    }

    pub fn logic(mut self, logic: impl Into<String>) -> Self {
        self.logic = Some(logic.into());
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn duration(mut self, label: impl Into<String>) -> Self {
        self.duration = Some(label.into());
        self
    }

    pub fn sort(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort = Some((column.into(), direction.into()));
        self
    }
}

/// Tuning knobs for a [`ReportClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Rows a full page holds; a first page this long with distinct
    /// identifiers enables cursor paging.
    pub page_row_limit: usize,
    /// Runs allowed per report before giving up.
    pub max_pages: usize,
    /// Describe documents kept in memory.
    pub cache_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            page_row_limit: DEFAULT_PAGE_ROW_LIMIT,
            max_pages: 1000,
            cache_size: 8,
        }
    }
}

// ──────────────────────────────────────────────
// ReportClient
// ──────────────────────────────────────────────

/// Fetches reports through a [`Transport`], memoizing describe documents.
pub struct ReportClient<T: Transport> {
    transport: T,
    options: FetchOptions,
    cache: Mutex<LruCache<String, Arc<ReportMetadata>>>,
}

impl<T: Transport> ReportClient<T> {
    pub fn new(transport: T) -> Self {
        ReportClient::with_options(transport, FetchOptions::default())
    }

    pub fn with_options(transport: T, options: FetchOptions) -> Self {
        let capacity = NonZeroUsize::new(options.cache_size).unwrap_or(NonZeroUsize::MIN);
        ReportClient {
            transport,
            options,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// A private copy of the report's describe document. The cached
    /// template is never handed out.
    pub fn metadata(&self, report_id: &str) -> Result<ReportMetadata, ReportError> {
        if let Some(cached) = self.cache.lock().get(report_id) {
            debug!(report_id, "metadata cache hit");
            return Ok(ReportMetadata::clone(cached));
        }
        let raw = self.transport.describe(report_id)?;
        let metadata = Arc::new(ReportMetadata::from_json(raw)?);
        self.cache
            .lock()
            .put(report_id.to_string(), Arc::clone(&metadata));
        Ok(ReportMetadata::clone(&metadata))
    }

    /// Apply filters, logic, date range, named duration and sort to a fresh
    /// copy of the report's metadata.
    pub fn configure(&self, request: &ReportRequest) -> Result<ReportMetadata, ReportError> {
        let mut metadata = self.metadata(&request.report_id)?;
        metadata.append_filters(&request.filters)?;
        if let Some(logic) = &request.logic {
            metadata.set_boolean_filter(logic.clone());
        }
        if let Some(range) = &request.date_range {
            let column = match &range.column {
                FieldUpdate::Set(label) => FieldUpdate::Set(label.as_str()),
                FieldUpdate::Clear => FieldUpdate::Clear,
                FieldUpdate::Keep => FieldUpdate::Keep,
            };
            metadata.set_date_range(range.start.clone(), range.end.clone(), column)?;
        }
        if let Some(label) = &request.duration {
            metadata.set_named_duration(label)?;
        }
        if let Some((column, direction)) = &request.sort {
            metadata.set_sort(column, direction)?;
        }
        Ok(metadata)
    }

    /// Lazily fetch the pages of a report.
    pub fn pages(&self, request: &ReportRequest) -> Result<PageStream<'_, T>, ReportError> {
        let mut metadata = self.configure(request)?;
        let cursor = match &request.id_column {
            Some(_) if metadata.format() == ReportFormat::Matrix => {
                warn!(
                    report_id = %request.report_id,
                    "identifier column ignored for matrix reports"
                );
                None
            }
            Some(column) => {
                let mut cursor =
                    PaginationCursor::new(&metadata, column, self.options.page_row_limit)?;
                if request.sort.is_some() && cursor.cursor_eligible() {
                    warn!(
                        report_id = %request.report_id,
                        id_column = %column,
                        "explicit sort kept; paging by exclusion instead of cursor"
                    );
                    cursor = cursor.exclusion_only();
                }
                cursor.prepare(&mut metadata)?;
                Some(cursor)
            }
            None => None,
        };
        Ok(PageStream {
            client: self,
            report_id: request.report_id.clone(),
            metadata,
            cursor,
            fetched: 0,
            done: false,
        })
    }

    /// Fetch every page of a report and concatenate them.
    pub fn get_report(&self, request: &ReportRequest) -> Result<ReportTable, ReportError> {
        let pages = self.pages(request)?.collect::<Result<Vec<_>, _>>()?;
        ReportTable::concat(pages)
    }

    /// The report's grand total: first aggregate of the total bucket.
    pub fn get_total(&self, report_id: &str) -> Result<Scalar, ReportError> {
        let raw = self.transport.summary(report_id)?;
        grand_total(&ReportPayload::from_json(raw)?)
    }
}

// ──────────────────────────────────────────────
// PageStream
// ──────────────────────────────────────────────

/// Finite, non-restartable sequence of report pages.
///
/// Each page is fetched only after the previous one has updated the
/// pagination filter. The stream ends after the first error.
pub struct PageStream<'a, T: Transport> {
    client: &'a ReportClient<T>,
    report_id: String,
    metadata: ReportMetadata,
    cursor: Option<PaginationCursor>,
    fetched: usize,
    done: bool,
}

impl<T: Transport> PageStream<'_, T> {
    /// The metadata document the next run will send.
    pub fn metadata(&self) -> &ReportMetadata {
        &self.metadata
    }

    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    fn fetch_next(&mut self) -> Result<ReportPage, ReportError> {
        if self.fetched >= self.client.options.max_pages {
            return Err(ReportError::PageLimitExceeded {
                report_id: self.report_id.clone(),
                pages: self.fetched,
            });
        }
        let body = self.metadata.to_json()?;
        let raw = self.client.transport.run(&self.report_id, &body)?;
        let payload = ReportPayload::from_json(raw)?;
        let page = parse_page(&payload, &self.metadata)?;
        self.fetched += 1;
        debug!(
            report_id = %self.report_id,
            page = self.fetched,
            rows = page.row_count(),
            all_data = page.all_data,
            "fetched report page"
        );

        if page.all_data {
            self.done = true;
            return Ok(page);
        }
        match self.cursor.as_mut() {
            Some(cursor) => cursor.advance(&page, &mut self.metadata)?,
            None => {
                warn!(
                    report_id = %self.report_id,
                    rows = page.row_count(),
                    "report incomplete and no identifier column given; returning first page only"
                );
                self.done = true;
            }
        }
        Ok(page)
    }
}

impl<T: Transport> Iterator for PageStream<'_, T> {
    type Item = Result<ReportPage, ReportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.fetch_next();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
