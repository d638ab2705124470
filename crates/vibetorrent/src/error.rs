//! Unified error type for the vibetorrent client.

use vibetorrent_protocol::{Fault, ProtocolError};
use vibetorrent_transport::TransportError;

/// Top-level error that wraps the lower crates' errors and adds the
/// outcomes only the domain layer can name.
///
/// The variants keep the taxonomy callers need apart:
/// [`Transport`](Self::Transport) means the daemon was never reached or
/// hung up, [`Protocol`](Self::Protocol) means it answered with bytes that
/// are not XML-RPC, and [`Fault`](Self::Fault) means it understood the call
/// and refused it.
#[derive(Debug, thiserror::Error)]
pub enum VibetorrentError {
    /// Connecting, writing, reading, or a timeout.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response could not be decoded, or a call could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The daemon answered with a fault; the payload is kept verbatim.
    #[error("rpc {0}")]
    Fault(Fault),

    /// No torrent with this hash.
    #[error("torrent not found: {0}")]
    NotFound(String),

    /// A call that must return a value returned no params.
    #[error("empty response to {0}")]
    EmptyResponse(&'static str),

    /// An operation was attempted before a daemon endpoint was configured.
    #[error("rTorrent endpoint is not configured")]
    NotConfigured,

    /// An argument cannot be sent safely (e.g. a path with a newline).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<Fault> for VibetorrentError {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

impl VibetorrentError {
    /// Returns `true` when the call failed because of a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Returns the fault if the daemon rejected the call.
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}
