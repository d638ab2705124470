//! Codec trait and the XML-RPC implementation.
//!
//! A "codec" (coder/decoder) converts between [`Call`]/[`Response`] and raw
//! bytes. The client doesn't care HOW calls are serialized; it only needs
//! something that implements [`Codec`]. Today that is [`XmlRpcCodec`], the
//! dialect rTorrent speaks.
//!
//! ## Wire format
//!
//! ```text
//! <?xml version="1.0"?>
//! <methodCall>
//!   <methodName>d.name</methodName>
//!   <params><param><value><string>HASH</string></value></param></params>
//! </methodCall>
//! ```
//!
//! Responses carry either `<params>` or a `<fault>`. When a (misbehaving)
//! server sends both, the fault wins.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::xml::{Event, XmlReader, decode_err, escape_into, unexpected};
use crate::{Call, Fault, ProtocolError, Response, Value};

/// Deepest array/struct nesting accepted when decoding.
///
/// rTorrent never nests deeper than three levels (multicall rows inside a
/// `system.multicall` result); the cap keeps a hostile document from
/// exhausting the stack.
pub const MAX_NESTING: usize = 64;

/// Encodes calls and decodes responses.
///
/// ## Trait bounds
///
/// `Send + Sync + 'static` so a single codec can live inside a client that
/// is shared across request handlers.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a call into a request body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if a parameter cannot be represented.
    fn encode_call(&self, call: &Call) -> Result<Vec<u8>, ProtocolError>;

    /// Parses a response body.
    ///
    /// Leading bytes before the envelope (transport headers that were not
    /// stripped, an XML declaration) are skipped.
    ///
    /// # Errors
    /// `ProtocolError::MissingEnvelope` if there is no envelope at all,
    /// `ProtocolError::Decode` if the envelope is malformed. A fault is NOT
    /// an error here: it is returned as [`Response::Fault`].
    fn decode_response(&self, data: &[u8]) -> Result<Response, ProtocolError>;
}

// ---------------------------------------------------------------------------
// XmlRpcCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for XML-RPC with a hand-written reader and writer.
///
/// Besides the client direction it can also decode calls and encode
/// responses, which is what a server (or a fake daemon in tests) needs.
///
/// Decoding is lossy on purpose: rTorrent passes torrent names and paths
/// through as raw bytes from the metainfo, so invalid UTF-8 sequences
/// become U+FFFD instead of failing the whole response.
///
/// ## Example
///
/// ```rust
/// use vibetorrent_protocol::{Call, Codec, Response, Value, XmlRpcCodec};
///
/// let codec = XmlRpcCodec;
/// let body = codec.encode_call(&Call::new("d.name").arg("ABCDEF")).unwrap();
/// assert!(String::from_utf8(body).unwrap().contains("<methodName>d.name</methodName>"));
///
/// let reply = codec
///     .encode_response(&Response::Success(vec![Value::from("ubuntu.iso")]))
///     .unwrap();
/// let decoded = codec.decode_response(&reply).unwrap();
/// assert_eq!(decoded, Response::Success(vec![Value::from("ubuntu.iso")]));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlRpcCodec;

impl Codec for XmlRpcCodec {
    fn encode_call(&self, call: &Call) -> Result<Vec<u8>, ProtocolError> {
        let mut out = String::with_capacity(128);
        out.push_str("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
        escape_into(&mut out, call.method());
        out.push_str("</methodName><params>");
        for param in call.params() {
            out.push_str("<param>");
            write_value(&mut out, param)?;
            out.push_str("</param>");
        }
        out.push_str("</params></methodCall>\n");
        Ok(out.into_bytes())
    }

    /// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
    fn decode_response(&self, data: &[u8]) -> Result<Response, ProtocolError> {
        let text = String::from_utf8_lossy(data);
        let start = text
            .find("<methodResponse")
            .ok_or(ProtocolError::MissingEnvelope(data.len()))?;
        let mut reader = XmlReader::new(&text[start..]);
        reader.expect_start("methodResponse")?;

        let mut params = Vec::new();
        let mut fault = None;
        loop {
            match reader.next_significant()? {
                Event::Start("params") => params.extend(read_params(&mut reader)?),
                Event::Empty("params") => {}
                Event::Start("fault") => {
                    fault = Some(read_value(&mut reader, 0)?);
                    reader.expect_end("fault")?;
                }
                Event::End("methodResponse") => break,
                other => return Err(unexpected(&other, "<params> or <fault>")),
            }
        }

        Ok(match fault {
            Some(value) => Response::Fault(Fault(value)),
            None => Response::Success(params),
        })
    }
}

impl XmlRpcCodec {
    /// Serializes a response (success or fault) into a document.
    pub fn encode_response(&self, response: &Response) -> Result<Vec<u8>, ProtocolError> {
        let mut out = String::with_capacity(128);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<methodResponse>");
        match response {
            Response::Success(values) => {
                out.push_str("<params>");
                for value in values {
                    out.push_str("<param>");
                    write_value(&mut out, value)?;
                    out.push_str("</param>");
                }
                out.push_str("</params>");
            }
            Response::Fault(fault) => {
                out.push_str("<fault>");
                write_value(&mut out, fault.value())?;
                out.push_str("</fault>");
            }
        }
        out.push_str("</methodResponse>\n");
        Ok(out.into_bytes())
    }

    /// Parses a `<methodCall>` document.
    pub fn decode_call(&self, data: &[u8]) -> Result<Call, ProtocolError> {
        let text = String::from_utf8_lossy(data);
        let start = text
            .find("<methodCall")
            .ok_or(ProtocolError::MissingEnvelope(data.len()))?;
        let mut reader = XmlReader::new(&text[start..]);
        reader.expect_start("methodCall")?;
        reader.expect_start("methodName")?;
        let method = reader.read_text("methodName")?;

        let mut params = Vec::new();
        loop {
            match reader.next_significant()? {
                Event::Start("params") => params.extend(read_params(&mut reader)?),
                Event::Empty("params") => {}
                Event::End("methodCall") => break,
                other => return Err(unexpected(&other, "<params>")),
            }
        }
        Ok(Call::with_params(method.trim(), params))
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Writes `<value>` with exactly one type tag inside.
fn write_value(out: &mut String, value: &Value) -> Result<(), ProtocolError> {
    out.push_str("<value>");
    match value {
        Value::String(s) => {
            out.push_str("<string>");
            escape_into(out, s);
            out.push_str("</string>");
        }
        Value::Int(n) => out.push_str(&format!("<int>{n}</int>")),
        Value::I4(n) => out.push_str(&format!("<i4>{n}</i4>")),
        Value::I8(n) => out.push_str(&format!("<i8>{n}</i8>")),
        Value::Double(d) => {
            if !d.is_finite() {
                return Err(ProtocolError::Encode(format!(
                    "double {d} has no XML-RPC representation"
                )));
            }
            // `Display` for f64 never uses exponent notation, which XML-RPC
            // forbids, and prints the shortest string that parses back.
            out.push_str(&format!("<double>{d}</double>"));
        }
        Value::Boolean(b) => {
            out.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" })
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item)?;
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                escape_into(out, name);
                out.push_str("</name>");
                write_value(out, member)?;
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Reads `<param><value>..</value></param>` entries up to `</params>`.
fn read_params(reader: &mut XmlReader<'_>) -> Result<Vec<Value>, ProtocolError> {
    let mut params = Vec::new();
    loop {
        match reader.next_significant()? {
            Event::Start("param") => {
                params.push(read_value(reader, 0)?);
                reader.expect_end("param")?;
            }
            Event::End("params") => return Ok(params),
            other => return Err(unexpected(&other, "<param>")),
        }
    }
}

/// Reads one complete `<value>` element, including its opening tag.
fn read_value(reader: &mut XmlReader<'_>, depth: usize) -> Result<Value, ProtocolError> {
    match reader.next_significant()? {
        Event::Start("value") => read_value_body(reader, depth),
        Event::Empty("value") => Ok(Value::String(String::new())),
        other => Err(unexpected(&other, "<value>")),
    }
}

/// Reads what follows `<value>`, through `</value>`.
///
/// A body without a type tag is a string, per the XML-RPC rules.
fn read_value_body(reader: &mut XmlReader<'_>, depth: usize) -> Result<Value, ProtocolError> {
    if depth > MAX_NESTING {
        return Err(decode_err(format!("values nested deeper than {MAX_NESTING}")));
    }

    let mut untyped = String::new();
    loop {
        match reader.next_event()? {
            Event::Text(t) => untyped.push_str(&t),
            Event::End("value") => return Ok(Value::String(untyped)),
            Event::Start(tag) => {
                if !untyped.trim().is_empty() {
                    return Err(decode_err("mixed text and typed content in <value>"));
                }
                let value = read_typed(reader, tag, depth)?;
                reader.expect_end("value")?;
                return Ok(value);
            }
            Event::Empty(tag) => {
                let value = empty_typed(tag)?;
                reader.expect_end("value")?;
                return Ok(value);
            }
            other => return Err(unexpected(&other, "value content")),
        }
    }
}

fn read_typed(reader: &mut XmlReader<'_>, tag: &str, depth: usize) -> Result<Value, ProtocolError> {
    match tag {
        "string" => Ok(Value::String(reader.read_text(tag)?)),
        "int" => Ok(Value::Int(parse_int(&reader.read_text(tag)?)?)),
        "i8" => Ok(Value::I8(parse_int(&reader.read_text(tag)?)?)),
        "i4" => {
            let text = reader.read_text(tag)?;
            let n = parse_int(&text)?;
            let n = i32::try_from(n)
                .map_err(|_| decode_err(format!("<i4> out of range: {}", text.trim())))?;
            Ok(Value::I4(n))
        }
        "double" => {
            let text = reader.read_text(tag)?;
            text.trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| decode_err(format!("invalid <double>: {:?}", text.trim())))
        }
        "boolean" => {
            let text = reader.read_text(tag)?;
            match text.trim() {
                "1" | "true" => Ok(Value::Boolean(true)),
                "0" | "false" => Ok(Value::Boolean(false)),
                other => Err(decode_err(format!("invalid <boolean>: {other:?}"))),
            }
        }
        "base64" => {
            let text = reader.read_text(tag)?;
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Base64)
                .map_err(|e| decode_err(format!("invalid <base64>: {e}")))
        }
        "array" => {
            let mut items = Vec::new();
            match reader.next_significant()? {
                Event::Start("data") => loop {
                    match reader.next_significant()? {
                        Event::Start("value") => items.push(read_value_body(reader, depth + 1)?),
                        Event::Empty("value") => items.push(Value::String(String::new())),
                        Event::End("data") => break,
                        other => return Err(unexpected(&other, "<value> in <data>")),
                    }
                },
                Event::Empty("data") => {}
                other => return Err(unexpected(&other, "<data>")),
            }
            reader.expect_end("array")?;
            Ok(Value::Array(items))
        }
        "struct" => {
            let mut members = Vec::new();
            loop {
                match reader.next_significant()? {
                    Event::Start("member") => {
                        reader.expect_start("name")?;
                        let name = reader.read_text("name")?;
                        let value = read_value(reader, depth + 1)?;
                        reader.expect_end("member")?;
                        members.push((name, value));
                    }
                    Event::End("struct") => return Ok(Value::Struct(members)),
                    other => return Err(unexpected(&other, "<member>")),
                }
            }
        }
        other => Err(decode_err(format!("unknown value type <{other}>"))),
    }
}

fn empty_typed(tag: &str) -> Result<Value, ProtocolError> {
    match tag {
        "string" => Ok(Value::String(String::new())),
        "base64" => Ok(Value::Base64(Vec::new())),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(Vec::new())),
        other => Err(decode_err(format!("empty <{other}/> has no value"))),
    }
}

fn parse_int(text: &str) -> Result<i64, ProtocolError> {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .parse::<i64>()
        .map_err(|_| decode_err(format!("invalid integer: {trimmed:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(xml: &str) -> Result<Response, ProtocolError> {
        XmlRpcCodec.decode_response(xml.as_bytes())
    }

    fn encoded(call: &Call) -> String {
        String::from_utf8(XmlRpcCodec.encode_call(call).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_call_emits_one_tag_per_value() {
        let call = Call::new("d.priority.set").arg("ABC").arg(Value::I4(2));
        assert_eq!(
            encoded(&call),
            "<?xml version=\"1.0\"?>\n<methodCall><methodName>d.priority.set</methodName>\
             <params><param><value><string>ABC</string></value></param>\
             <param><value><i4>2</i4></value></param></params></methodCall>\n"
        );
    }

    #[test]
    fn test_encode_call_escapes_strings() {
        let xml = encoded(&Call::new("d.custom1.set").arg("a<b & \"c\""));
        assert!(xml.contains("<string>a&lt;b &amp; &quot;c&quot;</string>"));
    }

    #[test]
    fn test_encode_base64_and_boolean() {
        let xml = encoded(&Call::new("load.raw").arg(Value::base64(b"d8:announce".to_vec())).arg(true));
        assert!(xml.contains("<base64>ZDg6YW5ub3VuY2U=</base64>"));
        assert!(xml.contains("<boolean>1</boolean>"));
    }

    #[test]
    fn test_encode_rejects_non_finite_double() {
        let err = XmlRpcCodec
            .encode_call(&Call::new("x").arg(f64::NAN))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Encode(_)));
    }

    #[test]
    fn test_decode_success_with_all_integer_tags() {
        let resp = decode(
            "<?xml version=\"1.0\"?><methodResponse><params>\
             <param><value><int>1</int></value></param>\
             <param><value><i4>2</i4></value></param>\
             <param><value><i8>3</i8></value></param>\
             </params></methodResponse>",
        )
        .unwrap();
        let values = resp.into_result().unwrap();
        let ints: Vec<i64> = values.iter().map(Value::as_i64).collect();
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_skips_leading_transport_bytes() {
        let resp = decode(
            "Status: 200 OK\r\nContent-Type: text/xml\r\n\r\n\
             <?xml version=\"1.0\"?>\n<methodResponse>\n<params>\n<param><value><string>0.9.8</string></value></param>\n</params>\n</methodResponse>",
        )
        .unwrap();
        assert_eq!(resp, Response::Success(vec![Value::from("0.9.8")]));
    }

    #[test]
    fn test_decode_fault_struct() {
        let resp = decode(
            "<methodResponse><fault><value><struct>\
             <member><name>faultCode</name><value><i4>-501</i4></value></member>\
             <member><name>faultString</name><value><string>Could not find info-hash.</string></value></member>\
             </struct></value></fault></methodResponse>",
        )
        .unwrap();
        match resp {
            Response::Fault(fault) => {
                assert_eq!(fault.code(), -501);
                assert_eq!(fault.message(), "Could not find info-hash.");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_fault_wins_over_params() {
        let resp = decode(
            "<methodResponse>\
             <params><param><value><string>ok</string></value></param></params>\
             <fault><value><string>nope</string></value></fault>\
             </methodResponse>",
        )
        .unwrap();
        assert!(resp.is_fault());
    }

    #[test]
    fn test_decode_untyped_and_empty_values() {
        let resp = decode(
            "<methodResponse><params>\
             <param><value>plain</value></param>\
             <param><value></value></param>\
             <param><value><string/></value></param>\
             <param><value/></param>\
             </params></methodResponse>",
        )
        .unwrap();
        assert_eq!(
            resp.into_result().unwrap(),
            vec![
                Value::from("plain"),
                Value::from(""),
                Value::from(""),
                Value::from(""),
            ]
        );
    }

    #[test]
    fn test_decode_nested_heterogeneous_arrays() {
        let resp = decode(
            "<methodResponse><params><param><value><array><data>\
             <value><array><data>\
               <value><string>HASH1</string></value>\
               <value><i8>4500000000</i8></value>\
               <value><boolean>1</boolean></value>\
             </data></array></value>\
             <value><array><data/></array></value>\
             </data></array></value></param></params></methodResponse>",
        )
        .unwrap();
        let values = resp.into_result().unwrap();
        let rows = values[0].as_array();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_array()[0].as_str(), "HASH1");
        assert_eq!(rows[0].as_array()[1].as_i64(), 4_500_000_000);
        assert!(rows[0].as_array()[2].as_bool());
        assert!(rows[1].as_array().is_empty());
    }

    #[test]
    fn test_decode_replaces_invalid_utf8() {
        let mut xml = b"<?xml version=\"1.0\"?><methodResponse><params><param><value><string>caf".to_vec();
        xml.extend([0xE9, 0xFF]);
        xml.extend(b".mkv</string></value></param></params></methodResponse>");
        let decoded = XmlRpcCodec.decode_response(&xml).unwrap();
        assert_eq!(decoded, Response::Success(vec![Value::from("caf\u{FFFD}\u{FFFD}.mkv")]));
    }

    #[test]
    fn test_decode_missing_envelope() {
        let err = decode("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ProtocolError::MissingEnvelope(_)));
    }

    #[test]
    fn test_decode_malformed_documents() {
        for bad in [
            "<methodResponse><params><param><value><i4>abc</i4></value></param></params></methodResponse>",
            "<methodResponse><params><param><value><i4>9999999999</i4></value></param></params></methodResponse>",
            "<methodResponse><params><param><value><struct2/></value></param></params></methodResponse>",
            "<methodResponse><params><param><value><string>cut",
            "<methodResponse><params><param><value><base64>!!!</base64></value></param></params></methodResponse>",
        ] {
            let err = decode(bad).unwrap_err();
            assert!(matches!(err, ProtocolError::Decode(_)), "{bad}: {err:?}");
        }
    }

    #[test]
    fn test_decode_rejects_excessive_nesting() {
        let depth = MAX_NESTING + 2;
        let mut xml = String::from("<methodResponse><params><param><value>");
        for _ in 0..depth {
            xml.push_str("<array><data><value>");
        }
        xml.push_str("<int>1</int>");
        for _ in 0..depth {
            xml.push_str("</value></data></array>");
        }
        xml.push_str("</value></param></params></methodResponse>");
        assert!(matches!(decode(&xml), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_round_trip_every_variant() {
        let values = vec![
            Value::from("Tom & Jerry <1080p>"),
            Value::Int(-12),
            Value::I4(i32::MAX),
            Value::I8(i64::MIN),
            Value::Double(0.1),
            Value::Double(-2.5e10),
            Value::Boolean(false),
            Value::base64(vec![0u8, 159, 146, 150, 255]),
            Value::Array(vec![
                Value::from("row"),
                Value::Array(vec![Value::I8(1), Value::Boolean(true)]),
                Value::Array(vec![]),
            ]),
            Value::structure([("methodName", Value::from("d.name")), ("params", Value::Array(vec![]))]),
        ];
        let codec = XmlRpcCodec;

        let body = codec.encode_call(&Call::with_params("echo", values.clone())).unwrap();
        let call = codec.decode_call(&body).unwrap();
        assert_eq!(call.method(), "echo");
        assert_eq!(call.params(), values.as_slice());

        let reply = codec.encode_response(&Response::Success(values.clone())).unwrap();
        assert_eq!(codec.decode_response(&reply).unwrap(), Response::Success(values));
    }

    #[test]
    fn test_round_trip_fault() {
        let fault = Fault(Value::structure([
            ("faultCode", Value::I4(-506)),
            ("faultString", Value::from("Method 'foo' not defined")),
        ]));
        let codec = XmlRpcCodec;
        let reply = codec.encode_response(&Response::Fault(fault.clone())).unwrap();
        assert_eq!(codec.decode_response(&reply).unwrap(), Response::Fault(fault));
    }
}
