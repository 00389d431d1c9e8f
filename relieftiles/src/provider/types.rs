//! Provider types and errors

use std::fmt;

use bytes::Bytes;

/// Errors that can occur while talking to a tile server.
///
/// A non-200 status is not an error at this level: the response is returned
/// and the fetch client classifies it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The HTTP client could not be constructed
    ClientBuild(String),
    /// The request or body read exceeded the timeout
    Timeout(String),
    /// Connection, TLS or protocol failure
    Transport(String),
    /// Layer definition is unusable
    InvalidLayer(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::ClientBuild(msg) => write!(f, "Failed to create HTTP client: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            ProviderError::Transport(msg) => write!(f, "Request failed: {}", msg),
            ProviderError::InvalidLayer(msg) => write!(f, "Invalid layer: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is exactly 200 OK.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}
