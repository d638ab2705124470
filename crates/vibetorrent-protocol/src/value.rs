//! Core value types for the XML-RPC wire format.
//!
//! This module defines every type that travels "on the wire" between the
//! dashboard and the rTorrent daemon: the dynamically-typed [`Value`], the
//! outgoing [`Call`], and the incoming [`Response`].
//!
//! XML-RPC is loosely typed. The daemon may answer a size query with `<i8>`
//! on one build and `<i4>` on another, and a partial answer may hold a
//! string where an integer was expected. The accessors on [`Value`] therefore
//! never fail: asking for the wrong kind returns that kind's zero value.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single XML-RPC value.
///
/// Exactly one variant is populated. The three integer variants exist because
/// the protocol has three historical integer tags (`<int>`, `<i4>`, `<i8>`);
/// they encode to their own tag but read back identically through
/// [`Value::as_i64`].
///
/// Arrays are not homogeneous: a multicall row typically mixes strings and
/// integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// `<string>`, or an untyped `<value>` body.
    String(String),
    /// `<int>`.
    Int(i64),
    /// `<i4>`.
    I4(i32),
    /// `<i8>`.
    I8(i64),
    /// `<double>`.
    Double(f64),
    /// `<boolean>` (`1` / `0` on the wire).
    Boolean(bool),
    /// `<base64>`; held decoded.
    Base64(Vec<u8>),
    /// `<array><data>...</data></array>`.
    Array(Vec<Value>),
    /// `<struct>` with members in wire order.
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Builds a `<base64>` value from raw bytes.
    pub fn base64(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Base64(bytes.into())
    }

    /// Builds a `<struct>` from `(name, value)` pairs, keeping their order.
    pub fn structure<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns the integer regardless of which integer tag carried it.
    ///
    /// Any non-integer variant yields `0`.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Int(n) | Self::I8(n) => *n,
            Self::I4(n) => i64::from(*n),
            _ => 0,
        }
    }

    /// Returns the string payload, or `""` for any other variant.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String(s) => s,
            _ => "",
        }
    }

    /// Returns the double payload. Integers widen; anything else is `0.0`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Double(d) => *d,
            Self::Int(_) | Self::I4(_) | Self::I8(_) => self.as_i64() as f64,
            _ => 0.0,
        }
    }

    /// Returns the boolean payload. Integers are truthy when non-zero
    /// (rTorrent reports most flags as `0`/`1` integers).
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Int(_) | Self::I4(_) | Self::I8(_) => self.as_i64() != 0,
            _ => false,
        }
    }

    /// Returns the decoded bytes of a `<base64>` value, or an empty slice.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Base64(b) => b,
            _ => &[],
        }
    }

    /// Returns the array elements, or an empty slice for a non-array.
    pub fn as_array(&self) -> &[Value] {
        match self {
            Self::Array(items) => items,
            _ => &[],
        }
    }

    /// Returns the struct members, or an empty slice for a non-struct.
    pub fn as_struct(&self) -> &[(String, Value)] {
        match self {
            Self::Struct(members) => members,
            _ => &[],
        }
    }

    /// Looks up a struct member by name.
    pub fn member(&self, name: &str) -> Option<&Value> {
        self.as_struct()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// The XML tag this value is written with.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::I4(_) => "i4",
            Self::I8(_) => "i8",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Base64(_) => "base64",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::I4(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

/// Compact human-readable rendering, used in fault and log messages.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Int(_) | Self::I4(_) | Self::I8(_) => {
                write!(f, "{}", self.as_i64())
            }
            Self::Double(d) => write!(f, "{d}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Base64(b) => write!(f, "<{} bytes>", b.len()),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Struct(members) => {
                f.write_str("{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// An outgoing method call: a method name plus ordered parameters.
///
/// Built once, encoded once, dropped. There is no request id; each call
/// travels on its own connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    method: String,
    params: Vec<Value>,
}

impl Call {
    /// Creates a call with no parameters.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    /// Creates a call with the given parameters.
    pub fn with_params(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Appends one parameter.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Appends several parameters in order.
    pub fn args<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

// ---------------------------------------------------------------------------
// Fault / Response
// ---------------------------------------------------------------------------

/// A daemon-side rejection, carrying the fault value verbatim.
///
/// rTorrent sends `{faultCode: i4, faultString: string}`; other servers may
/// send a bare string. [`Fault::code`] and [`Fault::message`] cope with both.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault(pub Value);

impl Fault {
    /// The `faultCode` member, or `0` if there isn't one.
    pub fn code(&self) -> i64 {
        self.0.member("faultCode").map(Value::as_i64).unwrap_or(0)
    }

    /// The `faultString` member, or the value itself when it is a string.
    pub fn message(&self) -> &str {
        match self.0.member("faultString") {
            Some(v) => v.as_str(),
            None => self.0.as_str(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.member("faultString").is_some() || matches!(self.0, Value::String(_)) {
            write!(f, "fault {}: {}", self.code(), self.message())
        } else {
            write!(f, "fault: {}", self.0)
        }
    }
}

/// A decoded `<methodResponse>`.
///
/// Never both: when the document holds a `<fault>` it is a
/// [`Response::Fault`] even if `<params>` are present too.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Vec<Value>),
    Fault(Fault),
}

impl Response {
    /// Converts into a `Result`, moving the fault into the error side.
    pub fn into_result(self) -> Result<Vec<Value>, Fault> {
        match self {
            Self::Success(values) => Ok(values),
            Self::Fault(fault) => Err(fault),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}
