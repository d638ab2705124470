//! The rTorrent client: the fixed catalogue of calls the dashboard needs.
//!
//! Every method builds one or more [`Call`]s, sends each over a fresh
//! connection, and maps the typed results into records. No state is
//! kept between calls, so one client can be shared by any number of
//! concurrent request handlers.

use vibetorrent_protocol::{Call, Codec, Response, Value, XmlRpcCodec};
use vibetorrent_transport::{ScgiTransport, Transport};

use crate::config::ClientConfig;
use crate::error::VibetorrentError;
use crate::fields::{
    self, FILE_FIELDS, PEER_FIELDS, TORRENT_FIELDS, TRACKER_FIELDS, commands, map_rows,
};
use crate::mutation::Mutation;
use crate::torrent::{File, Peer, SystemInfo, Torrent, Tracker};

/// The view rTorrent lists all loaded torrents under.
const MAIN_VIEW: &str = "main";

/// Fault code rTorrent answers a `d.*` call with when no loaded torrent
/// has the given hash ("Could not find info-hash.").
const UNKNOWN_HASH_FAULT: i64 = -501;

/// Highest value `d.priority.set` accepts (high).
pub const MAX_TORRENT_PRIORITY: i64 = 3;

/// Highest value `f.priority.set` accepts (high).
pub const MAX_FILE_PRIORITY: i64 = 2;

type Result<T> = std::result::Result<T, VibetorrentError>;

/// An rTorrent client over a [`Transport`] and a [`Codec`].
///
/// The defaults are what production uses: SCGI over TCP or a Unix socket,
/// and XML-RPC. Tests plug in other transports.
///
/// ```rust,no_run
/// use vibetorrent::prelude::*;
///
/// # async fn run() -> Result<(), VibetorrentError> {
/// let client = RtorrentClient::new(&ClientConfig::new("unix:///run/rtorrent/rpc.socket"));
/// for t in client.list_torrents().await? {
///     println!("{} {:>5.1}% {}", t.state, t.progress, t.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RtorrentClient<T = ScgiTransport, C = XmlRpcCodec> {
    transport: T,
    codec: C,
    default_download_path: String,
}

impl RtorrentClient {
    /// Creates a client for the endpoint and timeouts in `config`.
    ///
    /// Nothing is dialed here; the endpoint is parsed and connected on
    /// each call.
    pub fn new(config: &ClientConfig) -> Self {
        tracing::info!(endpoint = %config.endpoint, "creating rTorrent client");
        Self::with_transport(config.transport(), XmlRpcCodec)
            .with_default_download_path(config.default_download_path.clone())
    }
}

impl<T: Transport, C: Codec> RtorrentClient<T, C> {
    pub fn with_transport(transport: T, codec: C) -> Self {
        Self {
            transport,
            codec,
            default_download_path: String::new(),
        }
    }

    /// Sets the directory the add operations use when given an empty path.
    pub fn with_default_download_path(mut self, path: impl Into<String>) -> Self {
        self.default_download_path = path.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Raw calls
    // -----------------------------------------------------------------------

    /// Sends one call and returns its params.
    ///
    /// A fault becomes [`VibetorrentError::Fault`]; nothing is retried.
    pub async fn call(&self, call: &Call) -> Result<Vec<Value>> {
        let body = self.codec.encode_call(call)?;
        tracing::debug!(method = call.method(), bytes = body.len(), "rpc call");

        let raw = self.transport.round_trip(&body).await?;
        match self.codec.decode_response(&raw)? {
            Response::Success(values) => Ok(values),
            Response::Fault(fault) => {
                tracing::debug!(method = call.method(), %fault, "rpc fault");
                Err(fault.into())
            }
        }
    }

    /// Sends one call and returns its first param.
    async fn call_value(&self, call: &Call, what: &'static str) -> Result<Value> {
        self.call(call)
            .await?
            .into_iter()
            .next()
            .ok_or(VibetorrentError::EmptyResponse(what))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Checks that the daemon answers, returning its version string.
    pub async fn test_connection(&self) -> Result<String> {
        let version = self
            .call_value(&Call::new("system.client_version"), "system.client_version")
            .await?;
        tracing::info!(version = version.as_str(), "rTorrent reachable");
        Ok(version.as_str().to_owned())
    }

    /// Lists every torrent in the `main` view with one `d.multicall2`.
    ///
    /// Rows with fewer columns than requested are skipped.
    pub async fn list_torrents(&self) -> Result<Vec<Torrent>> {
        let call = Call::new("d.multicall2")
            .arg("")
            .arg(MAIN_VIEW)
            .args(commands(&TORRENT_FIELDS));
        let rows = self.call_value(&call, "d.multicall2").await?;
        let torrents = map_rows(&rows, fields::torrent_from_row);
        tracing::debug!(
            rows = rows.as_array().len(),
            torrents = torrents.len(),
            "listed torrents"
        );
        Ok(torrents)
    }

    /// Fetches one torrent.
    ///
    /// A `d.hash` probe decides existence: an unknown-hash fault (-501), no
    /// value, or an empty one is [`VibetorrentError::NotFound`]; other
    /// faults pass through. The fields then come from one
    /// `system.multicall`; if the daemon faults on the batch, each field is
    /// fetched on its own and any that fail are left zero or empty.
    pub async fn torrent(&self, hash: &str) -> Result<Torrent> {
        let probe = match self.call(&Call::new("d.hash").arg(hash)).await {
            Err(VibetorrentError::Fault(fault)) if fault.code() == UNKNOWN_HASH_FAULT => {
                return Err(VibetorrentError::NotFound(hash.to_owned()));
            }
            probe => probe?,
        };
        if probe.first().is_none_or(|v| v.as_str().is_empty()) {
            return Err(VibetorrentError::NotFound(hash.to_owned()));
        }

        let row = match self.call(&batch_call(hash, &TORRENT_FIELDS)).await {
            Ok(results) => batch_row(&results),
            Err(VibetorrentError::Fault(fault)) => {
                tracing::debug!(%hash, %fault, "batch refused, fetching fields one by one");
                self.fetch_fields(hash, &TORRENT_FIELDS).await
            }
            Err(e) => return Err(e),
        };

        let mut torrent = fields::torrent_from_fields(&row);
        if torrent.hash.is_empty() {
            torrent.hash = hash.to_owned();
        }
        Ok(torrent)
    }

    async fn fetch_fields<const N: usize>(&self, hash: &str, names: &[&str; N]) -> [Value; N] {
        let mut row: [Value; N] = std::array::from_fn(|_| empty());
        for (slot, &name) in row.iter_mut().zip(names) {
            match self.call(&Call::new(name).arg(hash)).await {
                Ok(values) => *slot = values.into_iter().next().unwrap_or_else(empty),
                Err(e) => tracing::debug!(%hash, field = name, error = %e, "field fetch failed"),
            }
        }
        row
    }

    /// Lists the files of one torrent, with their index.
    pub async fn files(&self, hash: &str) -> Result<Vec<File>> {
        let rows = self
            .call_value(&scoped_multicall("f.multicall", hash, &FILE_FIELDS), "f.multicall")
            .await?;
        Ok(rows
            .as_array()
            .iter()
            .enumerate()
            .filter_map(|(index, row)| fields::file_from_row(index, row.as_array()))
            .collect())
    }

    pub async fn peers(&self, hash: &str) -> Result<Vec<Peer>> {
        let rows = self
            .call_value(&scoped_multicall("p.multicall", hash, &PEER_FIELDS), "p.multicall")
            .await?;
        Ok(map_rows(&rows, fields::peer_from_row))
    }

    pub async fn trackers(&self, hash: &str) -> Result<Vec<Tracker>> {
        let rows = self
            .call_value(&scoped_multicall("t.multicall", hash, &TRACKER_FIELDS), "t.multicall")
            .await?;
        Ok(map_rows(&rows, fields::tracker_from_row))
    }

    /// Daemon versions, global rates and global limits in one round trip.
    pub async fn system_info(&self) -> Result<SystemInfo> {
        const GLOBAL_FIELDS: [&str; 6] = [
            "system.client_version",
            "system.library_version",
            "throttle.global_down.rate",
            "throttle.global_up.rate",
            "throttle.global_down.max_rate",
            "throttle.global_up.max_rate",
        ];
        let results = self.call(&batch_call("", &GLOBAL_FIELDS)).await?;
        let row: [Value; GLOBAL_FIELDS.len()] = batch_row(&results);
        Ok(SystemInfo {
            client_version: row[0].as_str().to_owned(),
            library_version: row[1].as_str().to_owned(),
            download_rate: row[2].as_i64(),
            upload_rate: row[3].as_i64(),
            download_limit: row[4].as_i64(),
            upload_limit: row[5].as_i64(),
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Applies a hash-only state change.
    pub async fn mutate(&self, mutation: Mutation, hash: &str) -> Result<()> {
        tracing::info!(%mutation, %hash, "mutating torrent");
        self.call(&Call::new(mutation.method()).arg(hash)).await?;
        Ok(())
    }

    /// Sets torrent priority (0 off, 1 low, 2 normal, 3 high).
    pub async fn set_priority(&self, hash: &str, priority: i64) -> Result<()> {
        check_range("priority", priority, MAX_TORRENT_PRIORITY)?;
        self.call(&Call::new("d.priority.set").arg(hash).arg(priority))
            .await?;
        self.update_priorities(hash).await
    }

    pub async fn set_label(&self, hash: &str, label: &str) -> Result<()> {
        self.call(&Call::new("d.custom1.set").arg(hash).arg(label))
            .await?;
        Ok(())
    }

    /// Sets one file's priority (0 skip, 1 normal, 2 high).
    pub async fn set_file_priority(&self, hash: &str, index: usize, priority: i64) -> Result<()> {
        check_range("file priority", priority, MAX_FILE_PRIORITY)?;
        let target = format!("{hash}:f{index}");
        self.call(&Call::new("f.priority.set").arg(target).arg(priority))
            .await?;
        self.update_priorities(hash).await
    }

    async fn update_priorities(&self, hash: &str) -> Result<()> {
        self.call(&Call::new("d.update_priorities").arg(hash))
            .await?;
        Ok(())
    }

    /// Caps the global download rate; `0` removes the cap.
    pub async fn set_download_limit(&self, kib_per_sec: u64) -> Result<()> {
        self.set_global_limit("throttle.global_down.max_rate.set", kib_per_sec)
            .await
    }

    /// Caps the global upload rate; `0` removes the cap.
    pub async fn set_upload_limit(&self, kib_per_sec: u64) -> Result<()> {
        self.set_global_limit("throttle.global_up.max_rate.set", kib_per_sec)
            .await
    }

    async fn set_global_limit(&self, method: &'static str, kib_per_sec: u64) -> Result<()> {
        let bytes = i64::try_from(kib_per_sec.saturating_mul(1024)).map_err(|_| {
            VibetorrentError::InvalidArgument(format!("rate limit {kib_per_sec} KiB/s is too large"))
        })?;
        self.call(&Call::new(method).arg("").arg(bytes)).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Adding torrents
    // -----------------------------------------------------------------------

    /// Loads a torrent from a URL or magnet link.
    ///
    /// `auto_start` picks `load.start` over `load.normal`. An empty
    /// `download_path` falls back to the configured default, and an empty
    /// default leaves rTorrent's own directory in place.
    pub async fn add_by_url(&self, url: &str, auto_start: bool, download_path: &str) -> Result<()> {
        let method = if auto_start { "load.start" } else { "load.normal" };
        let call = self.load_call(method, Value::from(url), download_path)?;
        tracing::info!(method, %url, "adding torrent");
        self.call(&call).await?;
        Ok(())
    }

    /// Loads a torrent from raw metainfo bytes (sent as base64).
    pub async fn add_by_data(&self, data: &[u8], auto_start: bool, download_path: &str) -> Result<()> {
        let method = if auto_start { "load.raw_start" } else { "load.raw" };
        let call = self.load_call(method, Value::base64(data), download_path)?;
        tracing::info!(method, bytes = data.len(), "adding torrent");
        self.call(&call).await?;
        Ok(())
    }

    fn load_call(&self, method: &str, source: Value, download_path: &str) -> Result<Call> {
        let path = if download_path.is_empty() {
            self.default_download_path.as_str()
        } else {
            download_path
        };
        let mut call = Call::new(method).arg("").arg(source);
        if !path.is_empty() {
            call = call.arg(directory_command(path)?);
        }
        Ok(call)
    }
}

/// The zero value used for fields that could not be fetched.
///
/// Reads back as `""` through `as_str` and `0` through `as_i64`.
fn empty() -> Value {
    Value::String(String::new())
}

/// `<method>(hash, "", "x.field=", ...)` for the per-torrent multicalls.
fn scoped_multicall(method: &str, hash: &str, names: &[&str]) -> Call {
    Call::new(method)
        .arg(hash)
        .arg("")
        .args(commands(names))
}

/// A `system.multicall` invoking each accessor with `target` as its only
/// argument.
fn batch_call(target: &str, names: &[&str]) -> Call {
    let calls = names
        .iter()
        .map(|name| {
            Value::structure([
                ("methodName", Value::from(*name)),
                ("params", Value::Array(vec![Value::from(target)])),
            ])
        })
        .collect::<Vec<_>>();
    Call::new("system.multicall").arg(Value::Array(calls))
}

/// Flattens a `system.multicall` result into one value per accessor.
///
/// Successful entries arrive as one-element arrays, failed ones as fault
/// structs; failed or missing entries become [`empty`].
fn batch_row<const N: usize>(results: &[Value]) -> [Value; N] {
    let entries = results.first().map(Value::as_array).unwrap_or_default();
    std::array::from_fn(|i| match entries.get(i) {
        Some(Value::Array(values)) => values.first().cloned().unwrap_or_else(empty),
        _ => empty(),
    })
}

fn check_range(what: &str, value: i64, max: i64) -> Result<()> {
    if (0..=max).contains(&value) {
        Ok(())
    } else {
        Err(VibetorrentError::InvalidArgument(format!(
            "{what} must be between 0 and {max}, got {value}"
        )))
    }
}

/// Builds the `d.directory_base.set="<path>"` command appended to a load
/// call.
///
/// Quotes and backslashes are backslash-escaped so the path stays one
/// argument. Control characters would end the command early and are
/// rejected.
pub(crate) fn directory_command(path: &str) -> Result<Value> {
    if let Some(c) = path.chars().find(|c| c.is_control()) {
        return Err(VibetorrentError::InvalidArgument(format!(
            "download path contains control character {c:?}"
        )));
    }
    let mut command = String::with_capacity(path.len() + 24);
    command.push_str("d.directory_base.set=\"");
    for c in path.chars() {
        if c == '"' || c == '\\' {
            command.push('\\');
        }
        command.push(c);
    }
    command.push('"');
    Ok(Value::String(command))
}
