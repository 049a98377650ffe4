//! Client configuration: a TOML file overridden by environment variables.
//!
//! # Example
//!
//! ```toml
//! instance_host = "na1.salesforce.com"
//! session_token = "00D...!AQ..."
//! api_version = "47.0"
//!
//! # Or log in with credentials instead of a token:
//! username = "someone@example.com"
//! password = "..."
//! security_token = "..."
//! login_domain = "login"
//!
//! metadata_cache_size = 8
//! page_row_limit = 2000
//! max_pages = 1000
//! ```

use std::path::Path;

use factmap_core::{FetchOptions, ReportError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientError;
use crate::http::{Session, DEFAULT_API_VERSION};
use crate::login::{soap_login, Credentials, DEFAULT_LOGIN_DOMAIN};

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub instance_host: Option<String>,
    pub session_token: Option<String>,
    pub api_version: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security_token: Option<String>,
    pub login_domain: String,
    pub metadata_cache_size: usize,
    pub page_row_limit: usize,
    pub max_pages: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        ClientConfig {
            instance_host: None,
            session_token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            username: None,
            password: None,
            security_token: None,
            login_domain: DEFAULT_LOGIN_DOMAIN.to_string(),
            metadata_cache_size: fetch.cache_size,
            page_row_limit: fetch.page_row_limit,
            max_pages: fetch.max_pages,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ClientError> {
        toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Read `path` if given, then apply `FACTMAP_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| ClientError::io(path, e))?;
                Self::from_toml_str(&content).map_err(|e| match e {
                    ClientError::Config(msg) => {
                        ClientError::Config(format!("could not parse '{}': {}", path.display(), msg))
                    }
                    other => other,
                })?
            }
            None => ClientConfig::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                debug!(key, "config override from environment");
                *slot = Some(v);
            }
        };
        set(&mut self.instance_host, "FACTMAP_INSTANCE");
        set(&mut self.session_token, "FACTMAP_SESSION_TOKEN");
        set(&mut self.username, "FACTMAP_USERNAME");
        set(&mut self.password, "FACTMAP_PASSWORD");
        set(&mut self.security_token, "FACTMAP_SECURITY_TOKEN");

        let mut version = None;
        set(&mut version, "FACTMAP_API_VERSION");
        if let Some(v) = version {
            self.api_version = v;
        }
        let mut domain = None;
        set(&mut domain, "FACTMAP_DOMAIN");
        if let Some(d) = domain {
            self.login_domain = d;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ClientError> {
        let version_ok = self
            .api_version
            .split_once('.')
            .is_some_and(|(major, minor)| {
                !major.is_empty()
                    && major.chars().all(|c| c.is_ascii_digit())
                    && minor.chars().all(|c| c.is_ascii_digit())
            });
        if !version_ok {
            return Err(ClientError::Config(format!(
                "api_version must look like '47.0', got '{}'",
                self.api_version
            )));
        }
        if self.max_pages == 0 {
            return Err(ClientError::Config("max_pages must be at least 1".to_string()));
        }
        Ok(())
    }

    // ── Derived settings ──────────────────────────────────────────────────────

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_row_limit: self.page_row_limit,
            max_pages: self.max_pages,
            cache_size: self.metadata_cache_size,
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            username: self.username.clone()?,
            password: self.password.clone()?,
            security_token: self.security_token.clone().unwrap_or_default(),
        })
    }

    /// A session from an explicit token and host, when both are set.
    pub fn explicit_session(&self) -> Option<Session> {
        match (&self.session_token, &self.instance_host) {
            (Some(token), Some(host)) => Some(Session::new(token.clone(), host)),
            _ => None,
        }
    }

    /// The explicit session if configured, else a SOAP login with the
    /// configured credentials.
    pub fn resolve_session(&self) -> Result<Session, ClientError> {
        if let Some(session) = self.explicit_session() {
            return Ok(session);
        }
        match self.credentials() {
            Some(creds) => soap_login(&creds, &self.login_domain, &self.api_version),
            None => Err(ReportError::MissingSession.into()),
        }
    }
}
