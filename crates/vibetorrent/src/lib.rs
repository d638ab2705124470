//! # vibetorrent
//!
//! The rTorrent side of a torrent dashboard: a typed client that talks
//! XML-RPC over SCGI to a running `rtorrent` and returns plain records.
//!
//! The layers live in their own crates and are re-exported here:
//!
//! - [`protocol`]: XML-RPC values and the wire codec
//! - [`transport`]: SCGI framing over TCP or Unix sockets
//! - this crate: the call catalogue ([`RtorrentClient`]), the records it
//!   returns, configuration, and the [`ClientState`] lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vibetorrent::prelude::*;
//!
//! # async fn run() -> Result<(), VibetorrentError> {
//! let mut state = ClientState::default();
//! state.configure(&ClientConfig::new("localhost:5000")).await?;
//!
//! let client = state.client()?;
//! for torrent in client.list_torrents().await? {
//!     println!("{:<12} {}", torrent.state, torrent.name);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod fields;
mod mutation;
mod state;
mod torrent;

pub use vibetorrent_protocol as protocol;
pub use vibetorrent_transport as transport;

pub use client::{MAX_FILE_PRIORITY, MAX_TORRENT_PRIORITY, RtorrentClient};
pub use config::{ClientConfig, SOCKET_ENV, SOCKET_ENV_FALLBACK, TIMEOUT_ENV};
pub use error::VibetorrentError;
pub use mutation::Mutation;
pub use state::ClientState;
pub use torrent::{File, Peer, SystemInfo, Torrent, TorrentState, Tracker, TrackerKind, progress};

/// Re-exports of the most commonly used types.
///
/// ```rust
/// use vibetorrent::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ClientConfig, ClientState, File, Mutation, Peer, RtorrentClient, SystemInfo, Torrent,
        TorrentState, Tracker, TrackerKind, VibetorrentError,
    };
    pub use vibetorrent_protocol::{Call, Fault, Value};
    pub use vibetorrent_transport::{ScgiTransport, Transport};
}
