//! Deflate-family codecs (Algorithm::Zlib, Algorithm::Gzip) over `flate2`.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use super::{Algorithm, ByteCodec};
use crate::error::{EfficodeError, Result};

/// Maximum deflate level
const DEFAULT_LEVEL: u32 = 9;

/// Zlib codec
#[derive(Debug, Clone)]
pub struct ZlibCodec {
    /// Compression level (0-9)
    pub level: u32,
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl ZlibCodec {
    /// Create new zlib codec at maximum level
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteCodec for ZlibCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zlib
    }

    fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level.min(9)));
        encoder
            .write_all(data)
            .map_err(|e| EfficodeError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| EfficodeError::Compression(e.to_string()))
    }

    fn decompress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| EfficodeError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

/// Gzip codec
#[derive(Debug, Clone)]
pub struct GzipCodec {
    /// Compression level (0-9)
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl GzipCodec {
    /// Create new gzip codec at maximum level
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteCodec for GzipCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Gzip
    }

    fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level.min(9)));
        encoder
            .write_all(data)
            .map_err(|e| EfficodeError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| EfficodeError::Compression(e.to_string()))
    }

    fn decompress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| EfficodeError::Decompression(e.to_string()))?;
        Ok(out)
    }
}
