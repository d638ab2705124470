//! Field catalogues for the batched queries and the positional mapping of
//! their rows into records.
//!
//! Each catalogue lists accessor commands in column order. The mappers
//! index rows by the same order, so the two must change together.

use vibetorrent_protocol::Value;

use crate::torrent::{File, Peer, Torrent, TorrentState, Tracker, progress};

/// Per-torrent accessors, in row order.
pub(crate) const TORRENT_FIELDS: [&str; 13] = [
    "d.hash",
    "d.name",
    "d.size_bytes",
    "d.completed_bytes",
    "d.down.rate",
    "d.up.rate",
    "d.state",
    "d.custom1",
    "d.creation_date",
    "d.size_chunks",
    "d.chunk_size",
    "d.directory",
    "d.priority",
];

/// Per-file accessors for `f.multicall`.
///
/// rTorrent has no `f.completed_bytes`; completion is reported in chunks
/// and scaled back to bytes in [`file_from_row`].
pub(crate) const FILE_FIELDS: [&str; 5] = [
    "f.path",
    "f.size_bytes",
    "f.size_chunks",
    "f.completed_chunks",
    "f.priority",
];

pub(crate) const PEER_FIELDS: [&str; 7] = [
    "p.address",
    "p.client_version",
    "p.down_rate",
    "p.up_rate",
    "p.completed_percent",
    "p.is_encrypted",
    "p.is_incoming",
];

pub(crate) const TRACKER_FIELDS: [&str; 5] = [
    "t.url",
    "t.type",
    "t.is_enabled",
    "t.scrape_complete",
    "t.scrape_incomplete",
];

/// Turns accessor names into multicall command arguments (`"d.hash="`).
pub(crate) fn commands(fields: &[&str]) -> impl Iterator<Item = Value> {
    fields.iter().map(|f| Value::String(format!("{f}=")))
}

/// Maps one `d.multicall2` row. Rows shorter than [`TORRENT_FIELDS`] are
/// rejected whole.
pub(crate) fn torrent_from_row(row: &[Value]) -> Option<Torrent> {
    row.first_chunk().map(torrent_from_fields)
}

/// Maps a full row of accessor values in [`TORRENT_FIELDS`] order.
pub(crate) fn torrent_from_fields(row: &[Value; TORRENT_FIELDS.len()]) -> Torrent {
    let size = row[2].as_i64();
    let completed = row[3].as_i64();
    Torrent {
        hash: row[0].as_str().to_owned(),
        name: row[1].as_str().to_owned(),
        size,
        completed,
        download_rate: row[4].as_i64(),
        upload_rate: row[5].as_i64(),
        state: TorrentState::derive(row[6].as_i64(), size, completed),
        progress: progress(size, completed),
        label: row[7].as_str().to_owned(),
        date_added: row[8].as_i64(),
        piece_count: row[9].as_i64(),
        piece_size: row[10].as_i64(),
        save_path: row[11].as_str().to_owned(),
        priority: row[12].as_i64(),
    }
}

/// Maps one `f.multicall` row; `index` is the row's position in the
/// response, which is also the file's index inside the torrent.
pub(crate) fn file_from_row(index: usize, row: &[Value]) -> Option<File> {
    if row.len() < FILE_FIELDS.len() {
        return None;
    }
    let size = row[1].as_i64();
    let chunks = row[2].as_i64();
    let done = row[3].as_i64();
    let completed = if chunks <= 0 || done >= chunks {
        if chunks > 0 { size } else { 0 }
    } else {
        // i128 so that multi-terabyte files cannot overflow the product.
        (i128::from(size) * i128::from(done) / i128::from(chunks)) as i64
    };
    Some(File {
        index,
        name: row[0].as_str().to_owned(),
        size,
        completed,
        priority: row[4].as_i64(),
    })
}

pub(crate) fn peer_from_row(row: &[Value]) -> Option<Peer> {
    if row.len() < PEER_FIELDS.len() {
        return None;
    }
    Some(Peer {
        address: row[0].as_str().to_owned(),
        client: row[1].as_str().to_owned(),
        download_rate: row[2].as_i64(),
        upload_rate: row[3].as_i64(),
        completed_percent: row[4].as_i64(),
        encrypted: row[5].as_bool(),
        incoming: row[6].as_bool(),
    })
}

pub(crate) fn tracker_from_row(row: &[Value]) -> Option<Tracker> {
    if row.len() < TRACKER_FIELDS.len() {
        return None;
    }
    Some(Tracker {
        url: row[0].as_str().to_owned(),
        kind: row[1].as_i64().into(),
        enabled: row[2].as_bool(),
        seeders: row[3].as_i64(),
        leechers: row[4].as_i64(),
    })
}

/// Applies `map` to every row of a multicall result, dropping rows it
/// rejects. A non-array result yields no rows.
pub(crate) fn map_rows<T>(result: &Value, map: impl Fn(&[Value]) -> Option<T>) -> Vec<T> {
    result
        .as_array()
        .iter()
        .filter_map(|row| map(row.as_array()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent::TrackerKind;

    fn torrent_row() -> Vec<Value> {
        vec![
            "0123ABCD".into(),
            "debian.iso".into(),
            Value::I8(200),
            Value::I8(50),
            Value::Int(2048),
            Value::I4(128),
            Value::I8(1),
            "linux".into(),
            Value::I8(1_700_000_000),
            Value::I8(100),
            Value::I8(2),
            "/srv/torrents/debian.iso".into(),
            Value::I8(2),
        ]
    }

    #[test]
    fn test_commands_append_equals() {
        let cmds: Vec<Value> = commands(&["d.hash", "d.name"]).collect();
        assert_eq!(cmds, vec![Value::from("d.hash="), Value::from("d.name=")]);
    }

    #[test]
    fn test_torrent_row_maps_positionally() {
        let t = torrent_from_row(&torrent_row()).unwrap();
        assert_eq!(t.hash, "0123ABCD");
        assert_eq!(t.name, "debian.iso");
        assert_eq!(t.size, 200);
        assert_eq!(t.completed, 50);
        assert_eq!(t.download_rate, 2048);
        assert_eq!(t.upload_rate, 128);
        assert_eq!(t.state, TorrentState::Downloading);
        assert_eq!(t.progress, 25.0);
        assert_eq!(t.label, "linux");
        assert_eq!(t.date_added, 1_700_000_000);
        assert_eq!(t.piece_count, 100);
        assert_eq!(t.piece_size, 2);
        assert_eq!(t.save_path, "/srv/torrents/debian.iso");
        assert_eq!(t.priority, 2);
    }

    #[test]
    fn test_short_torrent_row_is_skipped() {
        let mut row = torrent_row();
        row.pop();
        assert!(torrent_from_row(&row).is_none());
    }

    #[test]
    fn test_mistyped_fields_degrade_to_zero() {
        let mut row = torrent_row();
        row[2] = "not a number".into();
        row[1] = Value::I8(5);
        let t = torrent_from_row(&row).unwrap();
        assert_eq!(t.size, 0);
        assert_eq!(t.name, "");
        assert_eq!(t.progress, 0.0);
        assert_eq!(t.state, TorrentState::Seeding);
    }

    #[test]
    fn test_file_completion_scales_chunks() {
        let row = vec![
            "disc1/track01.flac".into(),
            Value::I8(1000),
            Value::I8(4),
            Value::I8(1),
            Value::I8(1),
        ];
        let f = file_from_row(3, &row).unwrap();
        assert_eq!(f.index, 3);
        assert_eq!(f.completed, 250);
        assert_eq!(f.progress(), 25.0);
    }

    #[test]
    fn test_file_completion_edges() {
        let done = vec!["a".into(), Value::I8(999), Value::I8(3), Value::I8(3), Value::I8(1)];
        assert_eq!(file_from_row(0, &done).unwrap().completed, 999);

        let empty = vec!["b".into(), Value::I8(0), Value::I8(0), Value::I8(0), Value::I8(1)];
        assert_eq!(file_from_row(0, &empty).unwrap().completed, 0);
    }

    #[test]
    fn test_peer_and_tracker_rows() {
        let peer = peer_from_row(&[
            "10.0.0.2".into(),
            "Transmission 4.0".into(),
            Value::I8(10),
            Value::I8(20),
            Value::I8(87),
            Value::I8(1),
            Value::I8(0),
        ])
        .unwrap();
        assert_eq!(peer.address, "10.0.0.2");
        assert!(peer.encrypted);
        assert!(!peer.incoming);

        let tracker = tracker_from_row(&[
            "udp://tracker.example:1337/announce".into(),
            Value::I8(2),
            Value::I8(1),
            Value::I8(40),
            Value::I8(3),
        ])
        .unwrap();
        assert_eq!(tracker.kind, TrackerKind::Udp);
        assert!(tracker.enabled);
        assert_eq!((tracker.seeders, tracker.leechers), (40, 3));
    }

    #[test]
    fn test_map_rows_skips_partial_and_non_array() {
        let result = Value::Array(vec![
            Value::Array(torrent_row()),
            Value::Array(vec!["short".into()]),
            "not a row".into(),
        ]);
        let rows = map_rows(&result, torrent_from_row);
        assert_eq!(rows.len(), 1);
        assert!(map_rows(&Value::from("nope"), torrent_from_row).is_empty());
    }
}
