//! # Efficode - Text-Framed Packets for Conversing LLM Agents
//!
//! Two conversational peers exchange typed, optionally compressed packets
//! over a compact text wire format, after proving their identity to each
//! other. An orchestrator drives a bounded question/answer exchange between
//! them and persists the transcript.
//!
//! ## Features
//!
//! - **Text wire format**: `#REQ?content=...&type=question`, deterministic
//!   encoding, lenient decoding
//! - **Adaptive compression**: zlib, gzip, zstd and brotli are tried on
//!   content of 500 bytes or more; the smallest strictly-smaller result wins
//! - **Identity handshake**: per-direction verification before any message
//!   reaches a completion backend
//! - **Turn-taking orchestration**: questioner/answerer alternation with a
//!   round budget, cooperative cancellation and partial transcripts on abort
//! - **Transcripts**: structured JSON plus a flat `sender: content` rendering
//!
//! ## Architecture
//!
//! ```text
//!  operator        Conversation                  Peer (questioner)   Peer (answerer)
//!     |                 |                              |                   |
//!     |-- topic ------->|-- @DID / !ACK (both ways) -->|<----------------->|
//!     |                 |-- #REQ seed ---------------->|                   |
//!     |                 |<-- #REQ question -------------|                   |
//!     |                 |-- #REQ question ------------------------------->|
//!     |                 |<-- #DATA answer ---------------------------------|
//!     |                 |            ... max_rounds ...                    |
//!     |                 |-- TranscriptRecord --> TranscriptSink            |
//! ```
//!
//! ## Quick Start
//!
//! ### Wire Format
//!
//! ```rust
//! use efficode::{OpCode, Packet, PacketCodec};
//!
//! let codec = PacketCodec::default();
//! let packet = Packet::new(OpCode::Data, "A").with_param("content", "hi");
//! assert_eq!(codec.encode(&packet), "#DATA?content=hi");
//!
//! let decoded = codec.decode("#REQ?type=weather&location=Paris", "B").unwrap();
//! assert_eq!(decoded.op_code, OpCode::Request);
//! assert_eq!(decoded.text_param("location"), Some("Paris"));
//! ```
//!
//! ### Compression
//!
//! ```rust
//! use efficode::{CompressionSelector, Packet};
//!
//! let selector = CompressionSelector::default();
//! let text = "the tide comes in, the tide goes out. ".repeat(20);
//! let packet = Packet::data("A", text.as_str(), "answer");
//!
//! let compressed = selector.compress(packet.clone());
//! assert!(compressed.is_compressed());
//! assert_eq!(selector.decompress(&compressed).unwrap(), packet);
//! ```
//!
//! ### Conversation
//!
//! ```rust,ignore
//! use efficode::{Config, Conversation, FileSink, HttpCompletion, Peer, PeerRole, Persona};
//!
//! let config = Config::from_env();
//! let backend = std::sync::Arc::new(HttpCompletion::from_config(&config.completion)?);
//! let sage = Peer::new(Persona::new("Sage", PeerRole::Questioner), backend.clone());
//! let lens = Peer::new(Persona::new("Lens", PeerRole::Answerer), backend);
//!
//! let outcome = Conversation::new(sage, lens, FileSink::new(&config.transcript.logs_dir))
//!     .with_config(&config.conversation)
//!     .run(Some("tides"));
//! println!("{} after {} turns", outcome.state, outcome.transcript.len());
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: packets, wire format and identity handshake
//! - [`codec`]: compression algorithms and the selector
//! - [`peer`]: personas, memory and reply generation
//! - [`completion`]: completion backend trait and HTTP client
//! - [`conversation`]: the orchestrator state machine
//! - [`transcript`]: turns, records and sinks
//! - [`config`]: configuration management
//! - [`error`]: error types and wire error codes

pub mod codec;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod transcript;

// Re-exports for convenience
pub use codec::{Algorithm, CodecRegistry, CompressionResult, CompressionSelector};
pub use completion::{ChatMessage, CompletionBackend, CompletionError, HttpCompletion, Role};
pub use config::Config;
pub use conversation::{
    AbortReason, CancelFlag, Conversation, ConversationState, SessionMode, SessionOutcome,
};
pub use error::{EfficodeError, ErrorCode, Result};
pub use peer::{Peer, PeerRole, Persona};
pub use protocol::{AuthState, AuthTable, OpCode, Packet, PacketCodec, ParamValue};
pub use transcript::{
    ConversationTurn, FileSink, MemorySink, Transcript, TranscriptRecord, TranscriptSink,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
