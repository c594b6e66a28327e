//! Exporter connection string.
//!
//! Format: `scheme://<token>@host[:port]/<project_id>`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Why a DSN string was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DsnError {
    #[error("not a URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("missing token before '@'")]
    MissingToken,
    #[error("missing host")]
    MissingHost,
    #[error("missing project id path segment")]
    MissingProjectId,
}

/// Parsed exporter DSN.
#[derive(Clone, PartialEq, Eq)]
pub struct Dsn {
    scheme: String,
    host: String,
    port: Option<u16>,
    token: String,
    project_id: String,
}

impl Dsn {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// URL the HTTP exporter posts batches to.
    pub fn ingest_url(&self) -> String {
        format!(
            "{}://{}/v1/projects/{}/metrics",
            self.scheme,
            self.authority(),
            self.project_id
        )
    }

    fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl FromStr for Dsn {
    type Err = DsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s.trim())?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(DsnError::UnsupportedScheme(scheme.to_string()));
        }

        let token = url.username();
        if token.is_empty() {
            return Err(DsnError::MissingToken);
        }

        let host = url.host_str().filter(|h| !h.is_empty()).ok_or(DsnError::MissingHost)?;

        let project_id = url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|seg| !seg.is_empty()))
            .ok_or(DsnError::MissingProjectId)?;

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port: url.port(),
            token: token.to_string(),
            project_id: project_id.to_string(),
        })
    }
}

// Never print the token.
impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://***@{}/{}", self.scheme, self.authority(), self.project_id)
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dsn({})", self)
    }
}
