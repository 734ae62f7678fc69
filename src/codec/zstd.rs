//! Zstandard codec (Algorithm::Zstd), linked with the `zstd` feature.

use super::{Algorithm, ByteCodec};
use crate::error::{EfficodeError, Result};

/// Default level; 19 is the highest non-ultra level
const DEFAULT_LEVEL: i32 = 19;

/// Zstandard codec
#[derive(Debug, Clone)]
pub struct ZstdCodec {
    /// Compression level (1-22)
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl ZstdCodec {
    /// Create new zstd codec
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteCodec for ZstdCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zstd
    }

    fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        ::zstd::stream::encode_all(data, self.level)
            .map_err(|e| EfficodeError::Compression(e.to_string()))
    }

    fn decompress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        ::zstd::stream::decode_all(data).map_err(|e| EfficodeError::Decompression(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let codec = ZstdCodec::new();
        let original = "zstd handles long dialogue well. ".repeat(30);
        let compressed = codec.compress_bytes(original.as_bytes()).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(codec.decompress_bytes(&compressed).unwrap(), original.as_bytes());
    }
}
