//! Efficode packets, wire format and identity handshake.
//!
//! # Wire Format
//!
//! ```text
//! <prefix><opcode>[?<key>=<value>&<key>=<value>...]
//! ```
//!
//! | OpCode   | Prefix | Wire name | Purpose                          |
//! |----------|--------|-----------|----------------------------------|
//! | IDENTITY | `@`    | `DID`     | Announce identity (handshake)    |
//! | REQUEST  | `#`    | `REQ`     | Conveyed message (question)      |
//! | DATA     | `#`    | `DATA`    | Conveyed message (answer)        |
//! | ACK      | `!`    | `ACK`     | Positive acknowledgement         |
//! | ERROR    | `!`    | `ERROR`   | Failure with `code` and `message`|
//!
//! ## Examples
//!
//! ```text
//! @DID?value=did:efficode:Sage
//! #REQ?content=What is time?&type=question
//! #DATA?content=hi
//! !ACK?message=verified by Lens&responder=Lens&status=success
//! !ERROR?code=AUTH_REQUIRED&message=identify first
//! ```
//!
//! Decoding is lenient: unknown prefixes and unmatched opcodes become
//! DATA, and JSON-looking values that fail to parse stay as text.
//!
//! ## Handshake
//!
//! ```text
//! Peer A                          Peer B
//!    |---- @DID?value=did:... ---->|  B marks A verified
//!    |<--- !ACK?responder=B -------|
//!    |                             |
//!    |<--- @DID?value=did:... -----|  A marks B verified
//!    |---- !ACK?responder=A ------>|
//! ```

mod describe;
mod handshake;
mod packet;
pub mod wire;

pub use handshake::{
    claimed_name, identity_for, is_well_formed, verify_identity, AuthState, AuthTable,
    IDENTITY_SCHEME, OPERATOR_SENDER,
};
pub use describe::{extract_keywords, ContentKind, KEYWORD_LIMIT};
pub use packet::{OpCode, Packet, ParamValue};
pub use wire::PacketCodec;

/// Conveyed message payload
pub const PARAM_CONTENT: &str = "content";
/// Message subtype (question, answer, exploration, ...)
pub const PARAM_TYPE: &str = "type";
/// Identity value of an IDENTITY packet
pub const PARAM_VALUE: &str = "value";
/// Compression algorithm tag of compressed content
pub const PARAM_COMPRESSION_METHOD: &str = "compression-method";
/// `text` or `json`, restores the content type after decompression
pub const PARAM_ORIGINAL_TYPE: &str = "original-type";
/// Error code of an ERROR packet
pub const PARAM_CODE: &str = "code";
/// Human-readable message of ACK/ERROR packets
pub const PARAM_MESSAGE: &str = "message";
/// Status of an ACK packet
pub const PARAM_STATUS: &str = "status";
/// Peer that produced an ACK
pub const PARAM_RESPONDER: &str = "responder";
/// Content description attached to DATA packets
pub const PARAM_METADATA: &str = "_metadata";
/// Intent and keyword hints
pub const PARAM_SEMANTIC: &str = "_semantic";
