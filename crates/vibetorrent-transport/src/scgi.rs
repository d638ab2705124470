//! SCGI framing for XML-RPC over raw stream sockets.
//!
//! rTorrent exposes XML-RPC through SCGI rather than HTTP. A request is a
//! netstring of NUL-separated headers followed by the body:
//!
//! ```text
//! 24:CONTENT_LENGTH\0<n>\0SCGI\01\0,<body: n bytes>
//! ^^ byte length of the header block
//! ```
//!
//! The response side is not framed symmetrically: the daemon writes a few
//! CGI-style header lines and then the XML document, and there is no length
//! we can rely on. [`read_response`] therefore reads until the closing
//! `</methodResponse>` tag shows up, and [`strip_to_envelope`] drops
//! whatever precedes the document.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::TransportError;

/// The tag that ends every XML-RPC response, fault or not.
pub const RESPONSE_END: &[u8] = b"</methodResponse>";

/// Marks the start of the XML document inside a response.
pub const ENVELOPE_START: &[u8] = b"<?xml";

/// Used when the daemon omits the XML declaration.
const ENVELOPE_FALLBACK_START: &[u8] = b"<methodResponse";

/// Default ceiling on an accumulated response (64 MiB).
///
/// A `d.multicall2` over a few thousand torrents is a few megabytes; the
/// ceiling only exists so a misbehaving peer cannot grow the buffer forever.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Largest header block accepted by [`read_request`].
const MAX_HEADER_BLOCK: usize = 64 * 1024;

/// Wraps an encoded call in SCGI framing.
///
/// The output is byte-exact: `"<hlen>:CONTENT_LENGTH\0<n>\0SCGI\01\0," + body`.
pub fn frame_request(body: &[u8]) -> Vec<u8> {
    let headers = format!("CONTENT_LENGTH\0{}\0SCGI\01\0", body.len());
    let prefix = format!("{}:", headers.len());

    let mut out = Vec::with_capacity(prefix.len() + headers.len() + 1 + body.len());
    out.extend_from_slice(prefix.as_bytes());
    out.extend_from_slice(headers.as_bytes());
    out.push(b',');
    out.extend_from_slice(body);
    out
}

// ---------------------------------------------------------------------------
// Response side (client)
// ---------------------------------------------------------------------------

/// Reads from `reader` until the accumulated bytes contain
/// [`RESPONSE_END`].
///
/// The marker may straddle two reads; only the tail that could hold a
/// partial marker is rescanned after each read.
///
/// # Errors
/// - `ConnectionClosed`: EOF before any byte arrived
/// - `IncompleteResponse`: EOF after some bytes but before the marker
/// - `ResponseTooLarge`: more than `max_bytes` accumulated
/// - `ReceiveFailed`: the underlying read failed
///
/// This function has no timeout of its own; wrap it in
/// `tokio::time::timeout`.
pub async fn read_response<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut scan_from = 0;

    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(TransportError::ReceiveFailed)?;

        if n == 0 {
            if buf.is_empty() {
                return Err(TransportError::ConnectionClosed(
                    "daemon closed the connection without responding".into(),
                ));
            }
            return Err(TransportError::IncompleteResponse { received: buf.len() });
        }

        if buf.len() + n > max_bytes {
            tracing::warn!(limit = max_bytes, "response exceeded size ceiling");
            return Err(TransportError::ResponseTooLarge { limit: max_bytes });
        }
        buf.extend_from_slice(&chunk[..n]);

        if find(&buf[scan_from..], RESPONSE_END).is_some() {
            tracing::trace!(bytes = buf.len(), "response complete");
            return Ok(buf);
        }
        scan_from = buf.len().saturating_sub(RESPONSE_END.len() - 1);
    }
}

/// Returns the slice of `response` starting at the XML document.
///
/// Looks for the `<?xml` declaration first and falls back to the
/// `<methodResponse` element for daemons that skip the declaration.
pub fn strip_to_envelope(response: &[u8]) -> Result<&[u8], TransportError> {
    find(response, ENVELOPE_START)
        .or_else(|| find(response, ENVELOPE_FALLBACK_START))
        .map(|start| &response[start..])
        .ok_or(TransportError::MissingEnvelope {
            received: response.len(),
        })
}

// ---------------------------------------------------------------------------
// Request side (server)
// ---------------------------------------------------------------------------

/// A parsed SCGI request: the header pairs in order plus the body.
///
/// The client never needs this; it exists for daemon stand-ins and for
/// checking that [`frame_request`] output parses back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScgiRequest {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ScgiRequest {
    /// Parses one complete framed request.
    pub fn parse(data: &[u8]) -> Result<Self, TransportError> {
        let colon = data
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| TransportError::InvalidFrame("missing length prefix".into()))?;
        let header_len = parse_len(&data[..colon])?;

        let block_start = colon + 1;
        let block_end = block_start.saturating_add(header_len);
        if data.len() <= block_end {
            return Err(TransportError::InvalidFrame("truncated header block".into()));
        }
        if data[block_end] != b',' {
            return Err(TransportError::InvalidFrame(
                "header block not followed by ','".into(),
            ));
        }
        let headers = parse_headers(&data[block_start..block_end])?;

        let mut request = Self {
            headers,
            body: Vec::new(),
        };
        let content_length = request.content_length()?;
        let body = &data[block_end + 1..];
        if body.len() < content_length {
            return Err(TransportError::InvalidFrame(format!(
                "body has {} of {content_length} bytes",
                body.len()
            )));
        }
        request.body = body[..content_length].to_vec();
        Ok(request)
    }

    /// Looks up a header by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn content_length(&self) -> Result<usize, TransportError> {
        let raw = self
            .header("CONTENT_LENGTH")
            .ok_or_else(|| TransportError::InvalidFrame("missing CONTENT_LENGTH".into()))?;
        parse_len(raw.as_bytes())
    }
}

/// Reads exactly one framed request from `reader`.
pub async fn read_request<R>(reader: &mut R) -> Result<ScgiRequest, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = Vec::new();
    loop {
        let byte = reader.read_u8().await.map_err(TransportError::ReceiveFailed)?;
        if byte == b':' {
            break;
        }
        prefix.push(byte);
        if prefix.len() > 10 {
            return Err(TransportError::InvalidFrame("length prefix too long".into()));
        }
    }
    let header_len = parse_len(&prefix)?;
    if header_len > MAX_HEADER_BLOCK {
        return Err(TransportError::InvalidFrame(format!(
            "header block of {header_len} bytes"
        )));
    }

    let mut block = vec![0u8; header_len + 1];
    reader
        .read_exact(&mut block)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    if block.pop() != Some(b',') {
        return Err(TransportError::InvalidFrame(
            "header block not followed by ','".into(),
        ));
    }

    let mut request = ScgiRequest {
        headers: parse_headers(&block)?,
        body: Vec::new(),
    };
    let mut body = vec![0u8; request.content_length()?];
    reader
        .read_exact(&mut body)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    request.body = body;
    Ok(request)
}

fn parse_len(digits: &[u8]) -> Result<usize, TransportError> {
    std::str::from_utf8(digits)
        .ok()
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            TransportError::InvalidFrame(format!(
                "bad length {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}

fn parse_headers(block: &[u8]) -> Result<Vec<(String, String)>, TransportError> {
    let block = block
        .strip_suffix(b"\0")
        .ok_or_else(|| TransportError::InvalidFrame("header block not NUL-terminated".into()))?;
    let fields: Vec<&[u8]> = block.split(|&b| b == 0).collect();
    if fields.len() % 2 != 0 {
        return Err(TransportError::InvalidFrame("odd number of header fields".into()));
    }
    Ok(fields
        .chunks(2)
        .map(|pair| {
            (
                String::from_utf8_lossy(pair[0]).into_owned(),
                String::from_utf8_lossy(pair[1]).into_owned(),
            )
        })
        .collect())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
