//! Adaptive compression of packet content.
//!
//! Every registered codec is tried on the `content` value; the smallest
//! base64 result wins, and only if it is strictly smaller than the raw
//! content. Compressed packets carry `compression-method` and
//! `original-type` so [`CompressionSelector::decompress`] can restore the
//! exact value and strip both tags again.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::{Algorithm, CodecRegistry, CompressionResult};
use crate::error::{EfficodeError, Result};
use crate::protocol::{
    Packet, ParamValue, PARAM_COMPRESSION_METHOD, PARAM_CONTENT, PARAM_ORIGINAL_TYPE,
};

/// Content below this many bytes is never compressed
pub const COMPRESSION_THRESHOLD: usize = 500;

/// `original-type` value for text content
pub const ORIGINAL_TYPE_TEXT: &str = "text";

/// `original-type` value for structured content
pub const ORIGINAL_TYPE_JSON: &str = "json";

/// Picks the best registered codec for each packet
#[derive(Debug, Clone)]
pub struct CompressionSelector {
    registry: CodecRegistry,
    /// Minimum content size in bytes before compression is attempted
    pub threshold: usize,
}

impl Default for CompressionSelector {
    fn default() -> Self {
        Self {
            registry: CodecRegistry::linked(),
            threshold: COMPRESSION_THRESHOLD,
        }
    }
}

impl CompressionSelector {
    /// Selector over every linked codec with the default threshold
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector over a specific registry
    pub fn with_registry(registry: CodecRegistry) -> Self {
        Self {
            registry,
            threshold: COMPRESSION_THRESHOLD,
        }
    }

    /// Set the size threshold
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Registered codecs
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Compress the packet's content if that makes it smaller.
    ///
    /// No-op for control packets, packets without content, packets that
    /// are already compressed, and content below the threshold.
    pub fn compress(&self, mut packet: Packet) -> Packet {
        if !packet.op_code.conveys_message() || packet.is_compressed() {
            return packet;
        }
        let Some(content) = packet.content() else {
            return packet;
        };

        let (raw, original_type) = match content {
            ParamValue::Text(s) => (s.clone(), ORIGINAL_TYPE_TEXT),
            ParamValue::Structured(v) => (v.to_string(), ORIGINAL_TYPE_JSON),
        };

        if raw.len() < self.threshold {
            tracing::debug!(
                "Content size ({} bytes) below threshold ({} bytes), skipping compression",
                raw.len(),
                self.threshold
            );
            return packet;
        }

        let Some(best) = self.best_compression(&raw) else {
            tracing::info!(
                "No codec shrinks content ({} bytes), leaving it uncompressed",
                raw.len()
            );
            return packet;
        };

        tracing::info!(
            "Content compressed with {}: {} -> {} bytes ({:.2})",
            best.algorithm,
            best.original_bytes,
            best.encoded_bytes,
            best.ratio()
        );
        packet
            .parameters
            .insert(PARAM_CONTENT.to_string(), ParamValue::Text(best.encoded));
        packet.parameters.insert(
            PARAM_COMPRESSION_METHOD.to_string(),
            ParamValue::Text(best.algorithm.tag().to_string()),
        );
        packet.parameters.insert(
            PARAM_ORIGINAL_TYPE.to_string(),
            ParamValue::Text(original_type.to_string()),
        );
        packet
    }

    /// Try every registered codec and return the smallest beneficial result
    pub fn best_compression(&self, raw: &str) -> Option<CompressionResult> {
        let mut best: Option<CompressionResult> = None;
        for codec in self.registry.iter() {
            let algorithm = codec.algorithm();
            let bytes = match codec.compress_bytes(raw.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("{} compression failed: {}", algorithm, e);
                    continue;
                },
            };
            let candidate = CompressionResult::new(BASE64.encode(bytes), algorithm, raw.len());
            tracing::debug!("{} candidate: {} bytes", algorithm, candidate.encoded_bytes);
            let better = best
                .as_ref()
                .map_or(true, |b| candidate.encoded_bytes < b.encoded_bytes);
            if better {
                best = Some(candidate);
            }
        }
        best.filter(CompressionResult::is_beneficial)
    }

    /// Restore compressed content.
    ///
    /// No-op unless the packet carries a `compression-method` tag. A tag
    /// naming an unregistered or unknown algorithm is an
    /// [`EfficodeError::UnsupportedCompression`]: the content cannot be
    /// recovered, so it is never passed through silently.
    pub fn decompress(&self, packet: &Packet) -> Result<Packet> {
        let Some(method) = packet.param(PARAM_COMPRESSION_METHOD) else {
            return Ok(packet.clone());
        };
        let tag = method.to_text();

        let codec = Algorithm::from_tag(&tag)
            .and_then(|algo| self.registry.get(algo))
            .ok_or_else(|| EfficodeError::UnsupportedCompression(tag.clone()))?;

        let encoded = packet
            .text_param(PARAM_CONTENT)
            .ok_or_else(|| EfficodeError::Decompression("missing encoded content".to_string()))?;
        let bytes = codec.decompress_bytes(&BASE64.decode(encoded.trim())?)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| EfficodeError::Decompression(format!("Invalid UTF-8: {e}")))?;

        let restored = match packet.text_param(PARAM_ORIGINAL_TYPE) {
            Some(ORIGINAL_TYPE_JSON) => ParamValue::Structured(serde_json::from_str(&text)?),
            _ => ParamValue::Text(text),
        };

        let mut out = packet.clone();
        out.parameters.remove(PARAM_COMPRESSION_METHOD);
        out.parameters.remove(PARAM_ORIGINAL_TYPE);
        out.parameters.insert(PARAM_CONTENT.to_string(), restored);
        tracing::debug!("Content decompressed with {}", tag);
        Ok(out)
    }
}
