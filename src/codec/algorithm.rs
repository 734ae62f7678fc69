//! Compression algorithm types and results.

use serde::{Deserialize, Serialize};

/// Compression algorithms the selector may try.
///
/// The declaration order is the trial order used by
/// [`CodecRegistry::linked`](super::CodecRegistry::linked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Zlib/deflate (level 9)
    Zlib,
    /// Gzip container around deflate (level 9)
    Gzip,
    /// Zstandard (level 19)
    Zstd,
    /// Brotli (quality 11)
    Brotli,
}

impl Algorithm {
    /// Tag written to the `compression-method` parameter
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::Zlib => "zlib",
            Algorithm::Gzip => "gzip",
            Algorithm::Zstd => "zstd",
            Algorithm::Brotli => "brotli",
        }
    }

    /// Parse algorithm from a `compression-method` tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "zlib" => Some(Algorithm::Zlib),
            "gzip" => Some(Algorithm::Gzip),
            "zstd" => Some(Algorithm::Zstd),
            "brotli" => Some(Algorithm::Brotli),
            _ => None,
        }
    }

    /// All algorithms in trial order
    pub fn all() -> &'static [Algorithm] {
        &[
            Algorithm::Zlib,
            Algorithm::Gzip,
            Algorithm::Zstd,
            Algorithm::Brotli,
        ]
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = crate::error::EfficodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::from_tag(s)
            .ok_or_else(|| crate::error::EfficodeError::UnsupportedCompression(s.to_string()))
    }
}

/// Outcome of compressing one payload with one algorithm
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// Base64 of the compressed bytes
    pub encoded: String,
    /// Algorithm used
    pub algorithm: Algorithm,
    /// Original size in bytes
    pub original_bytes: usize,
    /// Encoded (base64) size in bytes
    pub encoded_bytes: usize,
}

impl CompressionResult {
    /// Create new compression result
    pub fn new(encoded: String, algorithm: Algorithm, original_bytes: usize) -> Self {
        let encoded_bytes = encoded.len();
        Self {
            encoded,
            algorithm,
            original_bytes,
            encoded_bytes,
        }
    }

    /// Encoded size over original size
    pub fn ratio(&self) -> f64 {
        if self.original_bytes == 0 {
            0.0
        } else {
            self.encoded_bytes as f64 / self.original_bytes as f64
        }
    }

    /// Check if compression actually shrank the payload
    pub fn is_beneficial(&self) -> bool {
        self.encoded_bytes < self.original_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for algo in Algorithm::all() {
            assert_eq!(Algorithm::from_tag(algo.tag()), Some(*algo));
        }
        assert_eq!(Algorithm::from_tag("GZIP"), Some(Algorithm::Gzip));
        assert_eq!(Algorithm::from_tag("lzma"), None);
    }

    #[test]
    fn test_result_ratio() {
        let result = CompressionResult::new("abcd".to_string(), Algorithm::Zlib, 8);
        assert_eq!(result.encoded_bytes, 4);
        assert!((result.ratio() - 0.5).abs() < f64::EPSILON);
        assert!(result.is_beneficial());

        let result = CompressionResult::new("abcd".to_string(), Algorithm::Zlib, 4);
        assert!(!result.is_beneficial());
    }
}
