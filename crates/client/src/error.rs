use factmap_core::ReportError;

/// All errors that can be returned by the HTTP client, login and config layers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Any error from the report engine, including service error bodies.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// The SOAP login was refused; carries the fault string.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Writing a downloaded spreadsheet failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        ClientError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
