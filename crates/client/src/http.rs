//! HTTP transport over the analytics reports REST API.

use std::io::Read;

use factmap_core::{ReportError, Transport};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "47.0";

/// An authenticated session: bearer token plus the instance it is valid on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_token: String,
    /// Host name of the instance, e.g. `na1.salesforce.com`.
    pub instance_host: String,
}

impl Session {
    /// Build a session, accepting the instance as a bare host or a URL.
    pub fn new(session_token: impl Into<String>, instance: &str) -> Self {
        Session {
            session_token: session_token.into(),
            instance_host: normalize_host(instance),
        }
    }
}

/// Strip scheme, path and trailing slashes from an instance address. A
/// non-default port is kept.
pub fn normalize_host(instance: &str) -> String {
    let instance = instance.trim();
    if instance.contains("://") {
        if let Ok(url) = Url::parse(instance) {
            if let Some(host) = url.host_str() {
                return match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
            }
        }
    }
    instance
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: String,
    message: String,
}

/// Recognise the service's error shape, `[{"errorCode": .., "message": ..}]`.
///
/// Anything else, including binary content and invalid JSON, is not an
/// error body and yields `None`.
pub fn detect_service_error(body: &[u8]) -> Option<ReportError> {
    let errors: Vec<ErrorBody> = serde_json::from_slice(body).ok()?;
    errors.into_iter().next().map(|e| ReportError::ServiceError {
        code: e.error_code,
        message: e.message,
    })
}

/// [`Transport`] implementation backed by a blocking `ureq` agent.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    session: Option<Session>,
    api_version: String,
    scheme: &'static str,
}

impl HttpTransport {
    pub fn new(session: Session, api_version: impl Into<String>) -> Self {
        HttpTransport {
            agent: build_agent(),
            session: Some(session),
            api_version: api_version.into(),
            scheme: "https",
        }
    }

    /// A transport with no session; every call fails with `MissingSession`.
    pub fn unauthenticated(api_version: impl Into<String>) -> Self {
        HttpTransport {
            agent: build_agent(),
            session: None,
            api_version: api_version.into(),
            scheme: "https",
        }
    }

    /// Talk plain HTTP, for local proxies and test servers.
    pub fn plain_http(mut self) -> Self {
        self.scheme = "http";
        self
    }

    pub fn session(&self) -> Result<&Session, ReportError> {
        self.session.as_ref().ok_or(ReportError::MissingSession)
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub(crate) fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    pub(crate) fn bearer(&self) -> Result<String, ReportError> {
        Ok(format!("Bearer {}", self.session()?.session_token))
    }

    /// `https://{host}/services/data/v{version}/analytics/reports/{id}`
    pub fn report_url(&self, report_id: &str) -> Result<Url, ReportError> {
        let session = self.session()?;
        let base = format!(
            "{}://{}/services/data/v{}/analytics/reports/",
            self.scheme, session.instance_host, self.api_version
        );
        Url::parse(&base)
            .and_then(|u| u.join(report_id))
            .map_err(|e| ReportError::Transport(format!("invalid report url: {}", e)))
    }

    fn get_json(&self, url: Url) -> Result<serde_json::Value, ReportError> {
        let auth = self.bearer()?;
        debug!(%url, "GET");
        let response = self
            .agent
            .get(url.as_str())
            .header("Authorization", &auth)
            .call()
            .map_err(transport_error)?;
        read_json_response(response)
    }
}

impl Transport for HttpTransport {
    fn describe(&self, report_id: &str) -> Result<serde_json::Value, ReportError> {
        let mut url = self.report_url(report_id)?;
        url.path_segments_mut()
            .map_err(|_| ReportError::Transport("report url cannot be a base".to_string()))?
            .push("describe");
        self.get_json(url)
    }

    fn run(&self, report_id: &str, metadata: &serde_json::Value) -> Result<serde_json::Value, ReportError> {
        let url = self.report_url(report_id)?;
        let auth = self.bearer()?;
        debug!(%url, "POST");
        let response = self
            .agent
            .post(url.as_str())
            .header("Authorization", &auth)
            .send_json(metadata)
            .map_err(transport_error)?;
        read_json_response(response)
    }

    fn summary(&self, report_id: &str) -> Result<serde_json::Value, ReportError> {
        let mut url = self.report_url(report_id)?;
        url.query_pairs_mut().append_pair("includeDetails", "false");
        self.get_json(url)
    }
}

fn build_agent() -> ureq::Agent {
    // Error bodies carry the service's error code, so statuses are read by hand.
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into()
}

pub(crate) fn transport_error(err: ureq::Error) -> ReportError {
    ReportError::Transport(err.to_string())
}

pub(crate) fn read_body(response: ureq::http::Response<ureq::Body>) -> Result<(u16, Vec<u8>), ReportError> {
    let status = response.status().as_u16();
    let mut bytes = Vec::new();
    response
        .into_body()
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| ReportError::Transport(e.to_string()))?;
    Ok((status, bytes))
}

fn read_json_response(response: ureq::http::Response<ureq::Body>) -> Result<serde_json::Value, ReportError> {
    let (status, bytes) = read_body(response)?;
    check_status(status, &bytes)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Turn an error body into `ServiceError`, any other failing status into
/// `Transport`.
pub(crate) fn check_status(status: u16, body: &[u8]) -> Result<(), ReportError> {
    if let Some(err) = detect_service_error(body) {
        return Err(err);
    }
    if !(200..300).contains(&status) {
        let snippet: String = String::from_utf8_lossy(body).chars().take(200).collect();
        return Err(ReportError::Transport(format!("HTTP {}: {}", status, snippet)));
    }
    Ok(())
}
