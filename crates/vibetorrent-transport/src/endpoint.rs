//! Parsing of the configured daemon address.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::TransportError;

/// Scheme prefix selecting a Unix domain socket.
pub const UNIX_SCHEME: &str = "unix://";

/// Optional scheme prefix for TCP; a bare `host:port` means the same thing.
pub const TCP_SCHEME: &str = "tcp://";

/// Where the rTorrent SCGI listener lives.
///
/// Parsed from the configuration string on every connection attempt; an
/// `Endpoint` is a description, not an open handle.
///
/// ```rust
/// use vibetorrent_transport::Endpoint;
///
/// let unix: Endpoint = "unix:///run/rtorrent/rpc.socket".parse().unwrap();
/// assert!(matches!(unix, Endpoint::Unix(_)));
///
/// let tcp: Endpoint = "localhost:5000".parse().unwrap();
/// assert_eq!(tcp, Endpoint::Tcp("localhost:5000".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A filesystem path to a Unix domain socket.
    Unix(PathBuf),
    /// A `host:port` pair, resolved by the OS at connect time.
    Tcp(String),
}

impl Endpoint {
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::Unix(_))
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::InvalidEndpoint(
                "no endpoint configured".into(),
            ));
        }

        if let Some(path) = s.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(format!(
                    "{s:?} has no socket path"
                )));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        let addr = s.strip_prefix(TCP_SCHEME).unwrap_or(s);
        let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
            TransportError::InvalidEndpoint(format!("{s:?} is not host:port"))
        })?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(TransportError::InvalidEndpoint(format!(
                "{s:?} is not host:port"
            )));
        }
        Ok(Self::Tcp(addr.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
            Self::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
        }
    }
}
