//! Single-call state changes on one torrent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A state change that takes only the torrent hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutation {
    Start,
    Stop,
    Pause,
    Resume,
    /// Hash-check the downloaded data.
    Recheck,
    /// Remove the torrent from the session. Data on disk is kept.
    Delete,
    /// Announce to the trackers now.
    Reannounce,
    Close,
}

impl Mutation {
    pub const ALL: [Mutation; 8] = [
        Self::Start,
        Self::Stop,
        Self::Pause,
        Self::Resume,
        Self::Recheck,
        Self::Delete,
        Self::Reannounce,
        Self::Close,
    ];

    /// The rTorrent command that performs this mutation.
    pub fn method(self) -> &'static str {
        match self {
            Self::Start => "d.start",
            Self::Stop => "d.stop",
            Self::Pause => "d.pause",
            Self::Resume => "d.resume",
            Self::Recheck => "d.check_hash",
            Self::Delete => "d.erase",
            Self::Reannounce => "d.tracker_announce",
            Self::Close => "d.close",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Recheck => "recheck",
            Self::Delete => "delete",
            Self::Reannounce => "reannounce",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mutation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown action {s:?}"))
    }
}
