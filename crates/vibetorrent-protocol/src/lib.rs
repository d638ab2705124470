//! XML-RPC wire protocol for vibetorrent.
//!
//! This crate defines the "language" the dashboard and the rTorrent daemon
//! speak:
//!
//! - **Values** ([`Value`], [`Call`], [`Response`], [`Fault`]): the
//!   dynamically-typed data that travels on the wire.
//! - **Codec** ([`Codec`] trait, [`XmlRpcCodec`]): how calls and responses
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (framed bytes over a socket)
//! and the client (torrent records). It doesn't know about sockets or
//! torrents; it only knows how to serialize and deserialize XML-RPC.
//!
//! ```text
//! Transport (SCGI bytes) → Protocol (Response) → Client (Torrent, File, ...)
//! ```

mod codec;
mod error;
mod value;
mod xml;

pub use codec::{Codec, MAX_NESTING, XmlRpcCodec};
pub use error::ProtocolError;
pub use value::{Call, Fault, Response, Value};
