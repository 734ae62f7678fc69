//! Packets exchanged between peers.
//!
//! A [`Packet`] is an opcode, a flat parameter map and the sender that
//! built it. Parameter values are either plain text or a structured JSON
//! object/array; see [`ParamValue`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    PARAM_CODE, PARAM_COMPRESSION_METHOD, PARAM_CONTENT, PARAM_MESSAGE, PARAM_RESPONDER,
    PARAM_STATUS, PARAM_TYPE, PARAM_VALUE,
};
use crate::error::ErrorCode;

/// Packet kinds. Declaration order breaks ties during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpCode {
    /// Identity announcement (handshake)
    Identity,
    /// Request carrying a conveyed message
    Request,
    /// Data carrying a conveyed message
    Data,
    /// Positive acknowledgement
    Ack,
    /// Failure report
    Error,
}

impl OpCode {
    /// All opcodes in tie-break order
    pub const ALL: [OpCode; 5] = [
        OpCode::Identity,
        OpCode::Request,
        OpCode::Data,
        OpCode::Ack,
        OpCode::Error,
    ];

    /// Name written after the prefix character
    pub fn wire_name(&self) -> &'static str {
        match self {
            OpCode::Identity => "DID",
            OpCode::Request => "REQ",
            OpCode::Data => "DATA",
            OpCode::Ack => "ACK",
            OpCode::Error => "ERROR",
        }
    }

    /// One-character wire prefix
    pub fn prefix(&self) -> char {
        match self {
            OpCode::Identity => '@',
            OpCode::Request | OpCode::Data => '#',
            OpCode::Ack | OpCode::Error => '!',
        }
    }

    /// Candidate opcodes for a prefix character. Unknown prefixes yield
    /// `[Data]` so free text still routes as a best-effort payload.
    pub fn candidates(prefix: char) -> &'static [OpCode] {
        match prefix {
            '@' => &[OpCode::Identity],
            '#' => &[OpCode::Request, OpCode::Data],
            '!' => &[OpCode::Ack, OpCode::Error],
            _ => &[OpCode::Data],
        }
    }

    /// REQUEST and DATA convey messages; the rest are control packets
    pub fn conveys_message(&self) -> bool {
        matches!(self, OpCode::Request | OpCode::Data)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A parameter value: plain text or a structured JSON object/array.
///
/// Only objects and arrays survive the wire as `Structured`; a scalar
/// decodes as text. [`Packet::with_param`] and `From<Value>` normalize
/// scalars to `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// UTF-8 text
    Text(String),
    /// JSON object or array. Build through `From<Value>` rather than
    /// wrapping a scalar directly.
    Structured(Value),
}

impl ParamValue {
    /// Move a scalar held as `Structured` over to `Text`
    pub fn normalized(self) -> Self {
        match self {
            ParamValue::Structured(v) => ParamValue::from(v),
            text => text,
        }
    }

    /// Borrow as text if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Structured(_) => None,
        }
    }

    /// Check for a structured value
    pub fn is_structured(&self) -> bool {
        matches!(self, ParamValue::Structured(_))
    }

    /// Text form; structured values are rendered as compact JSON
    pub fn to_text(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Structured(v) => v.to_string(),
        }
    }

    /// JSON form for records (text becomes a JSON string)
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Structured(v) => v.clone(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<Value> for ParamValue {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => ParamValue::Text(s),
            v @ (Value::Object(_) | Value::Array(_)) => ParamValue::Structured(v),
            other => ParamValue::Text(other.to_string()),
        }
    }
}

/// One unit of exchange in the Efficode wire format.
///
/// Equality compares opcode, parameters and sender; the construction
/// timestamp is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    /// Packet kind
    pub op_code: OpCode,
    /// Parameters (sorted, so encoding is deterministic)
    pub parameters: BTreeMap<String, ParamValue>,
    /// Identifier of the originating peer
    pub sender: String,
    /// Construction time (Unix millis, non-decreasing within the process)
    pub timestamp: u64,
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.op_code == other.op_code
            && self.parameters == other.parameters
            && self.sender == other.sender
    }
}

impl Packet {
    /// Create a packet with no parameters
    pub fn new(op_code: OpCode, sender: &str) -> Self {
        Self {
            op_code,
            parameters: BTreeMap::new(),
            sender: sender.to_string(),
            timestamp: current_timestamp(),
        }
    }

    /// Add or replace a parameter
    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters
            .insert(key.to_string(), value.into().normalized());
        self
    }

    /// Create an IDENTITY packet announcing `identity`
    pub fn identity(sender: &str, identity: &str) -> Self {
        Self::new(OpCode::Identity, sender).with_param(PARAM_VALUE, identity)
    }

    /// Create a REQUEST packet
    pub fn request(sender: &str, content: impl Into<ParamValue>, req_type: &str) -> Self {
        Self::new(OpCode::Request, sender)
            .with_param(PARAM_CONTENT, content)
            .with_param(PARAM_TYPE, req_type)
    }

    /// Create a DATA packet
    pub fn data(sender: &str, content: impl Into<ParamValue>, data_type: &str) -> Self {
        Self::new(OpCode::Data, sender)
            .with_param(PARAM_CONTENT, content)
            .with_param(PARAM_TYPE, data_type)
    }

    /// Create an ACK packet naming the responder
    pub fn ack(sender: &str, status: &str, message: &str) -> Self {
        Self::new(OpCode::Ack, sender)
            .with_param(PARAM_STATUS, status)
            .with_param(PARAM_MESSAGE, message)
            .with_param(PARAM_RESPONDER, sender)
    }

    /// Create an ERROR packet
    pub fn error(sender: &str, code: ErrorCode, message: &str) -> Self {
        Self::new(OpCode::Error, sender)
            .with_param(PARAM_CODE, code.as_str())
            .with_param(PARAM_MESSAGE, message)
    }

    /// Get a parameter
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    /// Get a text parameter
    pub fn text_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(ParamValue::as_text)
    }

    /// Get the `content` parameter
    pub fn content(&self) -> Option<&ParamValue> {
        self.param(PARAM_CONTENT)
    }

    /// Tag of the compression method, if the content is compressed
    pub fn compression_method(&self) -> Option<&str> {
        self.text_param(PARAM_COMPRESSION_METHOD)
    }

    /// Check whether content is in compressed representation
    pub fn is_compressed(&self) -> bool {
        self.parameters.contains_key(PARAM_COMPRESSION_METHOD)
    }

    /// Check for ERROR packet
    pub fn is_error(&self) -> bool {
        self.op_code == OpCode::Error
    }

    /// Check for ACK packet
    pub fn is_ack(&self) -> bool {
        self.op_code == OpCode::Ack
    }

    /// Error code of an ERROR packet
    pub fn error_code(&self) -> Option<ErrorCode> {
        if !self.is_error() {
            return None;
        }
        self.text_param(PARAM_CODE).and_then(ErrorCode::parse)
    }

    /// Encode to the wire string
    pub fn to_wire(&self) -> String {
        super::wire::encode(self)
    }

    /// Logical content for display and transcripts.
    ///
    /// Message packets with a `content` entry yield that content; anything
    /// else (control packets, malformed messages) yields the wire form.
    pub fn display_content(&self) -> String {
        match self.content() {
            Some(content) if self.op_code.conveys_message() => content.to_text(),
            _ => self.to_wire(),
        }
    }
}

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Current time in Unix millis, never lower than a previously returned value
fn current_timestamp() -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let prev = LAST_TIMESTAMP.fetch_max(now, Ordering::Relaxed);
    prev.max(now)
}
