//! SOAP partner login: exchanges a username, password and security token
//! for a session id and the instance host to talk to.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::info;
use url::Url;

use crate::error::ClientError;
use crate::http::{read_body, transport_error, Session};

/// Login domain used when none is configured (`test` for sandboxes).
pub const DEFAULT_LOGIN_DOMAIN: &str = "login";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub security_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security_token", &"<redacted>")
            .finish()
    }
}

/// `https://{domain}.salesforce.com/services/Soap/u/{version}`
pub fn login_url(domain: &str, version: &str) -> String {
    format!("https://{}.salesforce.com/services/Soap/u/{}", domain, version)
}

/// The partner `login` envelope. The security token is appended to the
/// password.
pub fn login_envelope(credentials: &Credentials) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:env="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
        escape(credentials.username.as_str()),
        escape(credentials.password.as_str()),
        escape(credentials.security_token.as_str()),
    )
}

/// Log in and return the session to use for report calls.
pub fn soap_login(credentials: &Credentials, domain: &str, version: &str) -> Result<Session, ClientError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into();
    let response = agent
        .post(&login_url(domain, version))
        .header("Content-Type", "text/xml; charset=UTF-8")
        .header("SOAPAction", "login")
        .send(login_envelope(credentials))
        .map_err(transport_error)?;
    let (status, bytes) = read_body(response)?;
    let body = String::from_utf8_lossy(&bytes);
    if status != 200 {
        return Err(ClientError::Authentication(read_fault(&body)?));
    }
    let session = read_login_result(&body)?;
    info!(instance = %session.instance_host, "logged in");
    Ok(session)
}

/// Text content of every element with one of `names` as its local name,
/// in document order.
fn element_texts(xml: &str, names: &[&str]) -> Result<Vec<(String, String)>, ClientError> {
    let mut reader = Reader::from_str(xml);
    let mut current: Option<String> = None;
    let mut found = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                current = names.contains(&local.as_str()).then_some(local);
            }
            Ok(Event::Text(t)) => {
                if let Some(name) = current.take() {
                    let text = t.unescape().map_err(xml_error)?;
                    found.push((name, text.trim().to_string()));
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(xml_error(e)),
        }
    }
    Ok(found)
}

fn xml_error(err: quick_xml::Error) -> ClientError {
    ClientError::Authentication(format!("unreadable login response: {}", err))
}

/// Session id and instance host from a successful login response.
pub fn read_login_result(xml: &str) -> Result<Session, ClientError> {
    let texts = element_texts(xml, &["sessionId", "serverUrl"])?;
    let find = |name: &str| {
        texts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| ClientError::Authentication(format!("login response has no {}", name)))
    };
    let session_id = find("sessionId")?;
    let server_url = find("serverUrl")?;
    let host = Url::parse(&server_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| ClientError::Authentication(format!("bad server url '{}'", server_url)))?;
    Ok(Session {
        session_token: session_id,
        instance_host: host,
    })
}

/// The `faultstring` of a failed login response.
pub fn read_fault(xml: &str) -> Result<String, ClientError> {
    let texts = element_texts(xml, &["faultstring"])?;
    Ok(texts
        .into_iter()
        .next()
        .map(|(_, v)| v)
        .unwrap_or_else(|| "login failed".to_string()))
}
