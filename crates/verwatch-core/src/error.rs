use thiserror::Error;

/// Errors that make an engine component impossible to construct.
///
/// These indicate a programming or configuration mistake, so they are
/// surfaced to the caller instead of silently disabling update checks.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid update endpoint '{url}': {details}")]
    InvalidEndpoint { url: String, details: String },

    #[error("invalid proxy '{proxy}': {details}")]
    InvalidProxy { proxy: String, details: String },

    #[error("unknown {kind} '{value}'")]
    UnknownTag { kind: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("{context}: {source}")]
    Runtime {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn invalid_endpoint(url: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            details: details.to_string(),
        }
    }

    pub fn invalid_proxy(proxy: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self::InvalidProxy {
            proxy: proxy.into(),
            details: details.to_string(),
        }
    }

    pub fn runtime(context: &'static str, source: std::io::Error) -> Self {
        Self::Runtime { context, source }
    }
}

/// Why a single fetch attempt produced no answer.
///
/// Fetch errors never escape an update check; they are logged and kept as
/// the fetcher's last error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}{body_snippet}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("failed to parse response from {url}: {details}")]
    Parse { url: String, details: String },

    #[error("{url} did not return a version")]
    Empty { url: String },

    #[error("background request task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

impl FetchError {
    pub fn request(url: &reqwest::Url, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            source,
        }
    }

    pub fn parse(url: &reqwest::Url, details: impl std::fmt::Display) -> Self {
        Self::Parse {
            url: url.to_string(),
            details: details.to_string(),
        }
    }

    pub fn empty(url: &reqwest::Url) -> Self {
        Self::Empty {
            url: url.to_string(),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_timeout())
    }
}
