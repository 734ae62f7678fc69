//! Multi-codec compression for packet content.
//!
//! Large `content` values are shrunk transparently before they go on the
//! wire. Four general-purpose algorithms can take part:
//!
//! | Algorithm | Tag      | Crate    | Availability              |
//! |-----------|----------|----------|---------------------------|
//! | Zlib      | `zlib`   | flate2   | always                    |
//! | Gzip      | `gzip`   | flate2   | always                    |
//! | Zstd      | `zstd`   | zstd     | `zstd` feature (default)  |
//! | Brotli    | `brotli` | brotli   | always                    |
//!
//! The compressed bytes are base64-encoded so they stay representable as
//! a wire-safe parameter value.
//!
//! # Compressed representation
//!
//! ```text
//! #DATA?compression-method=brotli&content=<base64>&original-type=text&type=answer
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use efficode::codec::CompressionSelector;
//! use efficode::protocol::Packet;
//!
//! let selector = CompressionSelector::new();
//! let packet = selector.compress(Packet::data("A", long_text, "answer"));
//! let original = selector.decompress(&packet)?;
//! ```

mod algorithm;
mod brotli;
mod flate;
mod registry;
mod selector;
#[cfg(feature = "zstd")]
mod zstd;

pub use algorithm::{Algorithm, CompressionResult};
pub use self::brotli::BrotliCodec;
pub use flate::{GzipCodec, ZlibCodec};
pub use registry::{ByteCodec, CodecRegistry};
pub use selector::{
    CompressionSelector, COMPRESSION_THRESHOLD, ORIGINAL_TYPE_JSON, ORIGINAL_TYPE_TEXT,
};
#[cfg(feature = "zstd")]
pub use self::zstd::ZstdCodec;
