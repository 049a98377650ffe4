/// All errors that can be returned while configuring, fetching or decoding a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// A column label could not be found in the selected columns nor in the
    /// report type's full field catalog.
    #[error("unknown column: '{0}'")]
    UnknownColumn(String),

    /// Sort direction other than `asc`/`desc` (case-insensitive).
    #[error("orientation should be either 'asc' or 'desc', not '{0}'")]
    InvalidOrientation(String),

    /// Filter operator symbol with no service keyword.
    #[error("unknown filter operator: '{0}'")]
    InvalidOperator(String),

    /// Named date duration absent from the report's duration catalog.
    #[error("unknown date duration: '{0}'")]
    UnknownDuration(String),

    /// Date input that matches none of the accepted layouts.
    #[error("invalid date: '{0}'")]
    InvalidDate(String),

    /// Boolean filter whose last token is not a filter number.
    #[error("cannot extend boolean filter '{0}'")]
    InvalidBooleanFilter(String),

    /// The service answered with an error body instead of a report.
    #[error("service error {code}: {message}")]
    ServiceError { code: String, message: String },

    /// No authenticated session was supplied.
    #[error("no authenticated session")]
    MissingSession,

    /// The payload does not have the shape the parsers expect.
    #[error("malformed report payload: {0}")]
    MalformedPayload(String),

    /// Socket or HTTP failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server kept reporting incomplete data past the page bound.
    #[error("report '{report_id}' still incomplete after {pages} pages")]
    PageLimitExceeded { report_id: String, pages: usize },
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::MalformedPayload(err.to_string())
    }
}
