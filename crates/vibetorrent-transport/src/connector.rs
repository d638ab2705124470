//! One-shot SCGI connections to the daemon.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::scgi::{self, DEFAULT_MAX_RESPONSE_BYTES};
use crate::{Endpoint, Transport, TransportError};

/// Numbers connections so their log lines can be told apart.
static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Default bound on establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on writing the request and reading the full response.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`Transport`] that opens a fresh SCGI connection for every call.
///
/// Each [`round_trip`](Transport::round_trip) is connect → write → read
/// until `</methodResponse>` → close. Nothing is pooled, so concurrent
/// calls from different request handlers never share a socket and no
/// locking is needed.
///
/// The endpoint is kept as the configured string and parsed on every
/// attempt.
#[derive(Debug, Clone)]
pub struct ScgiTransport {
    endpoint: String,
    connect_timeout: Duration,
    io_timeout: Duration,
    max_response_bytes: usize,
}

impl ScgiTransport {
    /// Creates a transport for `endpoint` (`unix:///path`, `tcp://host:port`
    /// or `host:port`) with default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the timeout covering the write and the whole read loop.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the response size ceiling.
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect<S, F>(&self, endpoint: &Endpoint, connecting: F) -> Result<S, TransportError>
    where
        F: Future<Output = std::io::Result<S>>,
    {
        match tokio::time::timeout(self.connect_timeout, connecting).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                source,
            }),
            Err(_) => {
                tracing::warn!(%endpoint, timeout = ?self.connect_timeout, "connect timed out");
                Err(TransportError::ConnectTimeout {
                    endpoint: endpoint.to_string(),
                    timeout: self.connect_timeout,
                })
            }
        }
    }

    /// Writes the framed request and reads the response on an open stream.
    ///
    /// The stream is dropped (closed) on every path out of this function.
    async fn exchange<S>(&self, conn: u64, mut stream: S, request: &[u8]) -> Result<Vec<u8>, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(request).await?;
            stream.flush().await
        };
        match tokio::time::timeout(self.io_timeout, write).await {
            Ok(result) => result.map_err(TransportError::SendFailed)?,
            Err(_) => {
                return Err(TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("write did not finish within {:?}", self.io_timeout),
                )));
            }
        }

        let raw = match tokio::time::timeout(
            self.io_timeout,
            scgi::read_response(&mut stream, self.max_response_bytes),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(conn, timeout = ?self.io_timeout, "read timed out");
                return Err(TransportError::ReadTimeout {
                    timeout: self.io_timeout,
                });
            }
        };

        if let Err(e) = stream.shutdown().await {
            tracing::trace!(conn, error = %e, "shutdown after response failed");
        }

        let envelope = scgi::strip_to_envelope(&raw)?;
        tracing::debug!(conn, bytes = envelope.len(), "received response");
        Ok(envelope.to_vec())
    }
}

impl Transport for ScgiTransport {
    async fn round_trip(&self, body: &[u8]) -> Result<Vec<u8>, TransportError> {
        let endpoint: Endpoint = self.endpoint.parse()?;
        let conn = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
        let request = scgi::frame_request(body);
        tracing::debug!(conn, %endpoint, bytes = request.len(), "sending request");

        match &endpoint {
            Endpoint::Tcp(addr) => {
                let stream = self.connect(&endpoint, TcpStream::connect(addr.as_str())).await?;
                self.exchange(conn, stream, &request).await
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = self
                    .connect(&endpoint, tokio::net::UnixStream::connect(path))
                    .await?;
                self.exchange(conn, stream, &request).await
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported(format!(
                "{endpoint}: Unix domain sockets are not available on this platform"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let t = ScgiTransport::new("localhost:5000")
            .connect_timeout(Duration::from_millis(250))
            .io_timeout(Duration::from_secs(2))
            .max_response_bytes(1024);
        assert_eq!(t.endpoint(), "localhost:5000");
        assert_eq!(t.connect_timeout, Duration::from_millis(250));
        assert_eq!(t.io_timeout, Duration::from_secs(2));
        assert_eq!(t.max_response_bytes, 1024);
    }

    #[tokio::test]
    async fn test_connect_times_out_on_pending_dial() {
        let t = ScgiTransport::new("10.255.255.1:5000").connect_timeout(Duration::from_millis(50));
        let endpoint: Endpoint = t.endpoint().parse().unwrap();
        let err = t
            .connect::<TcpStream, _>(&endpoint, std::future::pending())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, TransportError::ConnectTimeout { .. }));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_before_dialing() {
        let err = ScgiTransport::new("").round_trip(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn test_exchange_times_out_on_silent_peer() {
        let (client, _server) = tokio::io::duplex(4096);
        let t = ScgiTransport::new("localhost:5000").io_timeout(Duration::from_millis(50));
        let err = t
            .exchange(0, client, b"request")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ReadTimeout { .. }));
    }
}
