//! SCGI transport for talking to rTorrent.
//!
//! Provides the [`Transport`] trait the client is written against, and
//! [`ScgiTransport`], which carries XML-RPC bodies over a TCP or Unix
//! domain socket using SCGI framing.
//!
//! # Layers
//!
//! - [`Endpoint`]: which socket to dial, parsed from the config string
//! - [`scgi`]: request framing, read-until-complete, envelope stripping
//! - [`ScgiTransport`]: connect / write / read / close with timeouts

mod connector;
mod endpoint;
mod error;
pub mod scgi;

pub use connector::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, ScgiTransport};
pub use endpoint::{Endpoint, TCP_SCHEME, UNIX_SCHEME};
pub use error::TransportError;

use std::future::Future;

/// Sends one encoded request body and returns the response body.
///
/// Implementations own framing and connection handling. The returned bytes
/// start at the XML document; anything the wire put in front of it has
/// already been stripped.
pub trait Transport: Send + Sync + 'static {
    /// Performs one complete request/response exchange.
    ///
    /// Dropping the returned future abandons the exchange and closes the
    /// connection; that is how callers cancel.
    fn round_trip(
        &self,
        body: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}
