//! Efficode wire format.
//!
//! ```text
//! packet := prefix opcode ["?" params]
//! prefix := "@" | "#" | "!"
//! params := pair *("&" pair)
//! pair   := key "=" value
//! ```
//!
//! Values are bare text or inline JSON objects/arrays. `%` and `&` inside
//! values are percent-escaped (keys additionally escape `=`), and a text
//! value that starts with `{` or `[` has that character escaped so it is
//! not read back as JSON. Decoding only understands those escapes and
//! leaves any other `%` alone, because upstream producers emit raw text.

use super::packet::{OpCode, Packet, ParamValue};
use crate::codec::CompressionSelector;
use crate::error::{EfficodeError, Result};

/// Encode a packet to its wire string
pub fn encode(packet: &Packet) -> String {
    let mut out = String::new();
    out.push(packet.op_code.prefix());
    out.push_str(packet.op_code.wire_name());

    if packet.parameters.is_empty() {
        return out;
    }

    let pairs: Vec<String> = packet
        .parameters
        .iter()
        .map(|(k, v)| format!("{}={}", escape_key(k), escape_value(v)))
        .collect();
    out.push('?');
    out.push_str(&pairs.join("&"));
    out
}

/// Parse a wire string without touching compressed content.
///
/// Only an empty input fails. Unknown prefixes and unmatched opcodes fall
/// back to DATA; parameter values that look like JSON but do not parse are
/// kept as text.
pub fn parse(input: &str, sender: &str) -> Result<Packet> {
    let mut chars = input.chars();
    let prefix = chars.next().ok_or(EfficodeError::EmptyMessage)?;
    let rest = chars.as_str();

    let (head, params) = match rest.split_once('?') {
        Some((head, params)) => (head, params),
        None => (rest, ""),
    };

    let candidates = OpCode::candidates(prefix);
    let op_code = candidates
        .iter()
        .copied()
        .find(|op| head.starts_with(op.wire_name()))
        .unwrap_or_else(|| {
            tracing::debug!(
                "No opcode matches {:?} for prefix {:?}, treating as DATA",
                head,
                prefix
            );
            OpCode::Data
        });

    let mut packet = Packet::new(op_code, sender);
    if !params.is_empty() {
        for pair in params.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                packet
                    .parameters
                    .insert(unescape(key), decode_value(value));
            }
        }
    }
    Ok(packet)
}

/// Bidirectional mapping between packets and wire strings.
///
/// Decoding always hands back logical content: compressed packets are
/// decompressed through the selector before being returned.
#[derive(Debug, Clone, Default)]
pub struct PacketCodec {
    selector: CompressionSelector,
}

impl PacketCodec {
    /// Create a codec over the given selector
    pub fn new(selector: CompressionSelector) -> Self {
        Self { selector }
    }

    /// Selector used for compression
    pub fn selector(&self) -> &CompressionSelector {
        &self.selector
    }

    /// Encode a packet to its wire string
    pub fn encode(&self, packet: &Packet) -> String {
        encode(packet)
    }

    /// Prepare a packet for transmission: describe its content, add
    /// semantic hints, then compress when worthwhile
    pub fn optimize(&self, packet: Packet) -> Packet {
        self.selector
            .compress(packet.with_metadata().with_semantic_info())
    }

    /// Compress (when worthwhile) and encode
    pub fn encode_compressed(&self, packet: Packet) -> String {
        encode(&self.selector.compress(packet))
    }

    /// Decode a wire string, decompressing content when tagged.
    ///
    /// A decompression failure is logged and the packet is returned with
    /// its content still encoded; callers see the tag and can report it.
    pub fn decode(&self, input: &str, sender: &str) -> Result<Packet> {
        let packet = parse(input, sender)?;
        if !packet.is_compressed() {
            return Ok(packet);
        }
        match self.selector.decompress(&packet) {
            Ok(decompressed) => Ok(decompressed),
            Err(e) => {
                tracing::error!("Failed to decompress packet from {}: {}", sender, e);
                Ok(packet)
            },
        }
    }
}

fn escape_key(key: &str) -> String {
    key.replace('%', "%25")
        .replace('&', "%26")
        .replace('=', "%3D")
}

fn escape_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Structured(v) => escape_text(&v.to_string()),
        ParamValue::Text(s) => {
            let mut escaped = escape_text(s);
            if escaped.starts_with('{') {
                escaped.replace_range(..1, "%7B");
            } else if escaped.starts_with('[') {
                escaped.replace_range(..1, "%5B");
            }
            escaped
        },
    }
}

fn escape_text(s: &str) -> String {
    s.replace('%', "%25").replace('&', "%26")
}

fn decode_value(raw: &str) -> ParamValue {
    let looks_like_json = (raw.starts_with('{') && raw.ends_with('}'))
        || (raw.starts_with('[') && raw.ends_with(']'));
    let text = unescape(raw);
    if looks_like_json {
        match serde_json::from_str(&text) {
            Ok(value) => return ParamValue::Structured(value),
            Err(e) => tracing::debug!("Keeping JSON-like value as text: {}", e),
        }
    }
    ParamValue::Text(text)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match after.get(..2).and_then(escaped_char) {
            Some(c) => {
                out.push(c);
                rest = &after[2..];
            },
            None => {
                out.push('%');
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

fn escaped_char(hex: &str) -> Option<char> {
    match hex.to_ascii_uppercase().as_str() {
        "25" => Some('%'),
        "26" => Some('&'),
        "3D" => Some('='),
        "7B" => Some('{'),
        "5B" => Some('['),
        _ => None,
    }
}
