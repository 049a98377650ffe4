//! factmap-client: HTTP side of factmap.
//!
//! Implements the [`factmap_core::Transport`] seam over the analytics REST
//! API with a blocking `ureq` agent, plus SOAP login, the spreadsheet
//! download and configuration loading.

pub mod config;
pub mod error;
pub mod excel;
pub mod http;
pub mod login;

pub use config::ClientConfig;
pub use error::ClientError;
pub use excel::{disposition_filename, EXCEL_MIME};
pub use http::{detect_service_error, HttpTransport, Session, DEFAULT_API_VERSION};
pub use login::{soap_login, Credentials};

use factmap_core::ReportClient;

/// Resolve a session from `config` and build a report client on top of it.
pub fn connect(config: &ClientConfig) -> Result<ReportClient<HttpTransport>, ClientError> {
    let session = config.resolve_session()?;
    let transport = HttpTransport::new(session, config.api_version.clone());
    Ok(ReportClient::with_options(transport, config.fetch_options()))
}
