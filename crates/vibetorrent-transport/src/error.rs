use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// Every variant means the call did not produce a usable response body.
/// None of them are retried here: repeating a mutating call (say `d.erase`)
/// is the caller's decision.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured endpoint string could not be understood.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The endpoint names a transport this platform lacks (Unix sockets on
    /// Windows).
    #[error("unsupported endpoint: {0}")]
    Unsupported(String),

    /// Connecting to the daemon failed (refused, no such socket file, ...).
    #[error("connect to {endpoint} failed: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting took longer than the connect timeout.
    #[error("connect to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// Writing the request failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading the response failed (reset, broken pipe, ...).
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// No complete response arrived within the read timeout.
    #[error("no complete response within {timeout:?}")]
    ReadTimeout { timeout: Duration },

    /// The daemon closed the connection without sending anything.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The daemon closed the connection before the closing
    /// `</methodResponse>` tag arrived.
    #[error("connection closed mid-response after {received} bytes")]
    IncompleteResponse { received: usize },

    /// The response grew past the configured ceiling.
    #[error("response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// A complete response arrived but holds no XML document.
    #[error("no XML envelope in {received}-byte response")]
    MissingEnvelope { received: usize },

    /// An SCGI request could not be parsed (server side only).
    #[error("invalid SCGI frame: {0}")]
    InvalidFrame(String),
}

impl TransportError {
    /// Returns `true` for either timeout variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. } | Self::ReadTimeout { .. })
    }
}
