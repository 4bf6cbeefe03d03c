//! Error types shared by the sampling pipeline.
//!
//! Every failure the exporter can observe at runtime (an unreachable instance,
//! a Jolokia error status, a missing attribute, an unexpected discovery payload)
//! is represented here. Apart from [`ExporterError::Client`], raised once at
//! startup, none of them is fatal to the process: callers log the error and
//! degrade the affected metrics instead of propagating it further.

/// Errors produced by discovery backends and the Jolokia transport.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// The HTTP request itself failed (connect, timeout, decode).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote agent answered, but with an error status.
    #[error("{url} answered with status {status}: {message}")]
    Remote {
        url: String,
        status: u16,
        message: String,
    },

    /// A requested attribute was absent from the response.
    #[error("attribute '{attribute}' missing from {mbean}")]
    MissingAttribute { mbean: String, attribute: String },

    /// An attribute was present but had an unexpected shape.
    #[error("attribute '{attribute}' of {mbean} is malformed: {value}")]
    Malformed {
        mbean: String,
        attribute: String,
        value: String,
    },

    /// The HTTP client could not be constructed (TLS backend, resolver).
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The discovery backend returned something we could not interpret.
    #[error("discovery via {backend} failed: {message}")]
    Discovery { backend: String, message: String },
}

impl ExporterError {
    pub(crate) fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn discovery(backend: &str, message: impl Into<String>) -> Self {
        Self::Discovery {
            backend: backend.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
