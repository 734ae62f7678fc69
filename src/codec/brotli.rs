//! Brotli compression codec (Algorithm::Brotli).
//!
//! Highest ratio of the set on long conversational text; slowest too.

use brotli::{CompressorWriter, Decompressor};
use std::io::{Read, Write};

use super::{Algorithm, ByteCodec};
use crate::error::{EfficodeError, Result};

/// Brotli compression quality (0-11, higher = better compression, slower)
const DEFAULT_QUALITY: u32 = 11;

/// Window size for Brotli (larger = better compression for large files)
const DEFAULT_WINDOW_SIZE: u32 = 22;

/// Brotli codec
#[derive(Debug, Clone)]
pub struct BrotliCodec {
    /// Compression quality (0-11)
    pub quality: u32,
    /// Window size (10-24)
    pub window_size: u32,
}

impl Default for BrotliCodec {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl BrotliCodec {
    /// Create new Brotli codec with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create codec with custom quality
    pub fn with_quality(quality: u32) -> Self {
        Self {
            quality: quality.min(11),
            ..Default::default()
        }
    }
}

impl ByteCodec for BrotliCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Brotli
    }

    fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut compressed = Vec::new();
        {
            let mut writer =
                CompressorWriter::new(&mut compressed, 4096, self.quality, self.window_size);
            writer
                .write_all(data)
                .map_err(|e| EfficodeError::Compression(e.to_string()))?;
        }
        Ok(compressed)
    }

    fn decompress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decompressor = Decompressor::new(data, 4096);
        let mut decompressed = Vec::new();
        decompressor
            .read_to_end(&mut decompressed)
            .map_err(|e| EfficodeError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_roundtrip() {
        let codec = BrotliCodec::new();
        let original = b"Hello, Brotli! This is a test of byte compression.";

        let compressed = codec.compress_bytes(original).unwrap();
        let decompressed = codec.decompress_bytes(&compressed).unwrap();

        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_repetitive_text_shrinks() {
        let codec = BrotliCodec::with_quality(9);
        let original = "what lies beyond the edge of the map? ".repeat(40);

        let compressed = codec.compress_bytes(original.as_bytes()).unwrap();
        assert!(compressed.len() < original.len() / 4);
    }

    #[test]
    fn test_garbage_input_fails() {
        let codec = BrotliCodec::new();
        assert!(codec.decompress_bytes(b"\xff\xff\xff\xff not brotli").is_err());
    }
}
