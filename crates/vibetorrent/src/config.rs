//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use vibetorrent_transport::scgi::DEFAULT_MAX_RESPONSE_BYTES;
use vibetorrent_transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, ScgiTransport};

/// Environment variable naming the daemon endpoint.
pub const SOCKET_ENV: &str = "VIBETORRENT_RTORRENT_SOCKET";

/// Fallback endpoint variable, the name rTorrent tooling commonly uses.
pub const SOCKET_ENV_FALLBACK: &str = "RTORRENT_SOCKET";

/// Environment variable overriding the per-call timeout, in seconds.
/// Fractions are allowed (`0.5`).
pub const TIMEOUT_ENV: &str = "VIBETORRENT_RTORRENT_TIMEOUT";

/// How to reach rTorrent, and how long to wait for it.
///
/// Deserializable so the embedding application can load it from whatever
/// file format it already uses; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `unix:///path/to/rpc.socket`, `tcp://host:port` or `host:port`.
    /// Empty means not configured yet.
    pub endpoint: String,

    /// Bound on writing the request and reading the full response, in
    /// milliseconds. Default: 30000. Zero is rejected when deserializing.
    #[serde(deserialize_with = "nonzero_millis")]
    pub timeout_ms: u64,

    /// Bound on establishing the connection, in milliseconds. Default: 5000.
    #[serde(deserialize_with = "nonzero_millis")]
    pub connect_timeout_ms: u64,

    /// Largest response accepted before the call fails. Default: 64 MiB.
    pub max_response_bytes: usize,

    /// Directory used by the add operations when the caller passes none.
    /// Empty means rTorrent's own default.
    pub default_download_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_ms: millis(DEFAULT_IO_TIMEOUT),
            connect_timeout_ms: millis(DEFAULT_CONNECT_TIMEOUT),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            default_download_path: String::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a config for `endpoint` with default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Builds a config from the process environment over the defaults.
    ///
    /// Reads [`SOCKET_ENV`] (falling back to [`SOCKET_ENV_FALLBACK`]) and
    /// [`TIMEOUT_ENV`]. An unparsable timeout is ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(SOCKET_ENV).or_else(|| lookup(SOCKET_ENV_FALLBACK)) {
            config.endpoint = endpoint.trim().to_owned();
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<f64>().ok().and_then(|secs| Duration::try_from_secs_f64(secs).ok()) {
                Some(timeout) if !timeout.is_zero() => config.timeout_ms = millis(timeout),
                _ => tracing::warn!(var = TIMEOUT_ENV, value = %raw, "ignoring invalid timeout"),
            }
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the per-call I/O bound. Precision is one millisecond; anything
    /// shorter rounds up to 1 ms. A zero duration is ignored with a warning.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            tracing::warn!("ignoring zero I/O timeout");
        } else {
            self.timeout_ms = millis(timeout);
        }
        self
    }

    /// Sets the connect bound, with the same rules as [`with_timeout`](Self::with_timeout).
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            tracing::warn!("ignoring zero connect timeout");
        } else {
            self.connect_timeout_ms = millis(timeout);
        }
        self
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn with_default_download_path(mut self, path: impl Into<String>) -> Self {
        self.default_download_path = path.into();
        self
    }

    /// `true` once an endpoint has been set.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    /// The I/O bound. A zero field (set directly) reads as the default.
    pub fn timeout(&self) -> Duration {
        nonzero_or(self.timeout_ms, DEFAULT_IO_TIMEOUT)
    }

    pub fn connect_timeout(&self) -> Duration {
        nonzero_or(self.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Builds the SCGI transport these settings describe.
    pub fn transport(&self) -> ScgiTransport {
        ScgiTransport::new(self.endpoint.trim())
            .connect_timeout(self.connect_timeout())
            .io_timeout(self.timeout())
            .max_response_bytes(self.max_response_bytes)
    }
}

/// Whole milliseconds, rounding a non-zero sub-millisecond duration up to 1.
fn millis(d: Duration) -> u64 {
    let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
    if ms == 0 && !d.is_zero() { 1 } else { ms }
}

fn nonzero_or(ms: u64, default: Duration) -> Duration {
    if ms == 0 { default } else { Duration::from_millis(ms) }
}

fn nonzero_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let ms = u64::deserialize(deserializer)?;
    if ms == 0 {
        return Err(serde::de::Error::custom("timeout must be greater than zero"));
    }
    Ok(ms)
}
