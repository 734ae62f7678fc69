//! Registry of byte codecs available at runtime.
//!
//! Which algorithms exist depends on what was linked (the `zstd` feature)
//! and on configuration. The selector only ever iterates the registered
//! set, so an absent algorithm is skipped on compress and reported as
//! unsupported on decompress.

use std::fmt;
use std::sync::Arc;

use super::brotli::BrotliCodec;
use super::flate::{GzipCodec, ZlibCodec};
use super::Algorithm;
use crate::error::Result;

/// A reversible byte-level compressor.
pub trait ByteCodec: Send + Sync {
    /// Algorithm implemented by this codec
    fn algorithm(&self) -> Algorithm;

    /// Compress raw bytes
    fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Invert [`ByteCodec::compress_bytes`]
    fn decompress_bytes(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Ordered set of registered codecs, at most one per algorithm.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn ByteCodec>>,
}

impl CodecRegistry {
    /// Registry with nothing registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every codec linked into this build, in trial order
    pub fn linked() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ZlibCodec::new()));
        registry.register(Arc::new(GzipCodec::new()));
        #[cfg(feature = "zstd")]
        registry.register(Arc::new(super::zstd::ZstdCodec::new()));
        registry.register(Arc::new(BrotliCodec::new()));
        registry
    }

    /// Linked codecs restricted to `algorithms`, in the order given
    pub fn with_algorithms(algorithms: &[Algorithm]) -> Self {
        let linked = Self::linked();
        let mut registry = Self::empty();
        for algo in algorithms {
            match linked.get(*algo) {
                Some(codec) => registry.register(codec),
                None => tracing::debug!("{} not linked, skipping registration", algo),
            }
        }
        registry
    }

    /// Register a codec. A codec for an already registered algorithm
    /// replaces the previous one in place.
    pub fn register(&mut self, codec: Arc<dyn ByteCodec>) {
        let algorithm = codec.algorithm();
        match self.codecs.iter().position(|c| c.algorithm() == algorithm) {
            Some(idx) => self.codecs[idx] = codec,
            None => self.codecs.push(codec),
        }
    }

    /// Look up the codec for an algorithm
    pub fn get(&self, algorithm: Algorithm) -> Option<Arc<dyn ByteCodec>> {
        self.codecs
            .iter()
            .find(|c| c.algorithm() == algorithm)
            .cloned()
    }

    /// Check if an algorithm is registered
    pub fn supports(&self, algorithm: Algorithm) -> bool {
        self.codecs.iter().any(|c| c.algorithm() == algorithm)
    }

    /// Registered algorithms in trial order
    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.codecs.iter().map(|c| c.algorithm()).collect()
    }

    /// Iterate codecs in trial order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ByteCodec>> {
        self.codecs.iter()
    }

    /// Number of registered codecs
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.algorithms()).finish()
    }
}
