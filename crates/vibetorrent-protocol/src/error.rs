//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. When you see a
//! `ProtocolError`, the daemon was reached and answered, but the bytes could
//! not be turned into a [`Response`](crate::Response) (or a [`Call`](crate::Call)
//! could not be turned into bytes). Networking problems live in the
//! transport crate; daemon-side rejections are [`Fault`](crate::Fault)s, not
//! errors at this layer.

/// Errors that can occur while encoding calls or decoding responses.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value cannot be represented on the wire (e.g. a NaN double).
    #[error("encode failed: {0}")]
    Encode(String),

    /// The document is not well-formed XML-RPC: bad nesting, an unknown
    /// value tag, an unparsable integer, invalid base64, and so on.
    #[error("decode failed: {0}")]
    Decode(String),

    /// No `<methodResponse>` (or `<methodCall>`) element was found at all.
    ///
    /// Usually means the peer is not speaking XML-RPC, or the response was
    /// cut off before the envelope began.
    #[error("no XML-RPC envelope found in {0} bytes")]
    MissingEnvelope(usize),
}
