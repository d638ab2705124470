//! Entity records handed to the presentation layer.
//!
//! Every record here is a snapshot built fresh from one daemon response.
//! Nothing is cached or updated in place; fetch again to refresh.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state reported for a torrent.
///
/// Derived on every fetch from three daemon fields; see
/// [`TorrentState::derive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorrentState {
    Paused,
    Downloading,
    Seeding,
}

impl TorrentState {
    /// Maps `d.state`, `d.size_bytes` and `d.completed_bytes` to a state.
    ///
    /// Inactive is always paused. An active torrent is downloading while
    /// `completed < size`, and seeding otherwise (including `size == 0`).
    pub fn derive(active: i64, size: i64, completed: i64) -> Self {
        if active == 0 {
            Self::Paused
        } else if completed < size {
            Self::Downloading
        } else {
            Self::Seeding
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::Downloading => "downloading",
            Self::Seeding => "seeding",
        }
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion percentage, `0.0` when the size is unknown.
pub fn progress(size: i64, completed: i64) -> f64 {
    if size > 0 {
        completed as f64 / size as f64 * 100.0
    } else {
        0.0
    }
}

/// One torrent as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    /// Info-hash, upper-case hex.
    pub hash: String,
    pub name: String,
    /// Total size in bytes.
    pub size: i64,
    /// Bytes downloaded and verified.
    pub completed: i64,
    /// Bytes per second.
    pub download_rate: i64,
    /// Bytes per second.
    pub upload_rate: i64,
    pub state: TorrentState,
    /// `completed / size * 100`, or 0 when the size is 0.
    pub progress: f64,
    /// User label (`d.custom1`).
    pub label: String,
    /// Unix timestamp from the metainfo `creation date`.
    pub date_added: i64,
    pub piece_count: i64,
    pub piece_size: i64,
    pub save_path: String,
    /// 0 off, 1 low, 2 normal, 3 high.
    pub priority: i64,
}

impl Torrent {
    pub fn is_complete(&self) -> bool {
        self.size > 0 && self.completed >= self.size
    }
}

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// Position in the torrent's file list; the `f<index>` in
    /// [`set_file_priority`](crate::RtorrentClient::set_file_priority).
    pub index: usize,
    /// Path relative to the torrent's base directory.
    pub name: String,
    pub size: i64,
    pub completed: i64,
    /// 0 skip, 1 normal, 2 high.
    pub priority: i64,
}

impl File {
    pub fn progress(&self) -> f64 {
        progress(self.size, self.completed)
    }
}

/// A connected peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub address: String,
    pub client: String,
    pub download_rate: i64,
    pub upload_rate: i64,
    /// How much of the torrent the peer has, 0 to 100.
    pub completed_percent: i64,
    pub encrypted: bool,
    pub incoming: bool,
}

/// Tracker kinds as numbered by `t.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    Http,
    Udp,
    Dht,
    Unknown,
}

impl From<i64> for TrackerKind {
    fn from(raw: i64) -> Self {
        match raw {
            1 => Self::Http,
            2 => Self::Udp,
            3 => Self::Dht,
            _ => Self::Unknown,
        }
    }
}

/// A tracker attached to a torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub url: String,
    pub kind: TrackerKind,
    pub enabled: bool,
    /// Seeders from the last scrape.
    pub seeders: i64,
    /// Leechers from the last scrape.
    pub leechers: i64,
}

/// Daemon-wide figures for a status bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub client_version: String,
    pub library_version: String,
    /// Bytes per second across all torrents.
    pub download_rate: i64,
    pub upload_rate: i64,
    /// Configured global caps in bytes per second, 0 for unlimited.
    pub download_limit: i64,
    pub upload_limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_derivation() {
        assert_eq!(TorrentState::derive(0, 100, 50), TorrentState::Paused);
        assert_eq!(TorrentState::derive(1, 100, 50), TorrentState::Downloading);
        assert_eq!(TorrentState::derive(1, 100, 100), TorrentState::Seeding);
        assert_eq!(TorrentState::derive(1, 0, 0), TorrentState::Seeding);
    }

    #[test]
    fn test_inactive_wins_over_completion() {
        assert_eq!(TorrentState::derive(0, 100, 100), TorrentState::Paused);
    }

    #[test]
    fn test_progress() {
        assert_eq!(progress(0, 0), 0.0);
        assert_eq!(progress(0, 10), 0.0);
        assert_eq!(progress(200, 50), 25.0);
        assert_eq!(progress(100, 100), 100.0);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&TorrentState::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
        assert_eq!(TorrentState::Seeding.to_string(), "seeding");
    }

    #[test]
    fn test_tracker_kind_from_raw() {
        assert_eq!(TrackerKind::from(1), TrackerKind::Http);
        assert_eq!(TrackerKind::from(2), TrackerKind::Udp);
        assert_eq!(TrackerKind::from(3), TrackerKind::Dht);
        assert_eq!(TrackerKind::from(9), TrackerKind::Unknown);
    }
}
