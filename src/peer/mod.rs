//! Conversational peers.
//!
//! A [`Peer`] wraps a persona around a completion backend. It owns its own
//! verification table and memory window; nothing is shared with the other
//! peer. Incoming packets are answered with exactly one reply packet:
//!
//! | Incoming      | Reply                                               |
//! |---------------|-----------------------------------------------------|
//! | IDENTITY      | ACK, or ERROR `AUTH_FAILED`                         |
//! | REQUEST/DATA  | REQUEST (questioner) / DATA (answerer), or ERROR    |
//! | ACK/ERROR     | ERROR `UNEXPECTED_OPCODE`                           |
//!
//! Message traffic from an unverified sender (other than the operator) is
//! refused with ERROR `AUTH_REQUIRED` without calling the backend.

mod memory;
mod persona;

pub use memory::{MemoryWindow, MEMORY_WINDOW};
pub use persona::{PeerRole, Persona};

use crate::completion::{ChatMessage, CompletionBackend};
use crate::error::{EfficodeError, ErrorCode, Result};
use crate::protocol::{
    identity_for, AuthTable, OpCode, Packet, PacketCodec, OPERATOR_SENDER,
};

/// One endpoint of a conversation
pub struct Peer {
    persona: Persona,
    backend: Box<dyn CompletionBackend>,
    auth: AuthTable,
    memory: MemoryWindow,
    codec: PacketCodec,
    operator: String,
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("persona", &self.persona)
            .field("auth", &self.auth)
            .field("memory", &self.memory.len())
            .finish_non_exhaustive()
    }
}

impl Peer {
    /// Create a peer
    pub fn new(persona: Persona, backend: impl CompletionBackend + 'static) -> Self {
        Self {
            persona,
            backend: Box::new(backend),
            auth: AuthTable::new(),
            memory: MemoryWindow::new(),
            codec: PacketCodec::default(),
            operator: OPERATOR_SENDER.to_string(),
        }
    }

    /// Use a specific codec (and therefore compression selector)
    pub fn with_codec(mut self, codec: PacketCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Sender id treated as the human operator
    pub fn with_operator(mut self, operator: &str) -> Self {
        self.operator = operator.to_string();
        self
    }

    /// Resize the memory window (clears it)
    pub fn with_memory_window(mut self, capacity: usize) -> Self {
        self.memory = MemoryWindow::with_capacity(capacity);
        self
    }

    /// Peer name
    pub fn name(&self) -> &str {
        &self.persona.name
    }

    /// Persona
    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Verification table
    pub fn auth(&self) -> &AuthTable {
        &self.auth
    }

    /// Memory window
    pub fn memory(&self) -> &MemoryWindow {
        &self.memory
    }

    /// `did:efficode:<name>`
    pub fn identity(&self) -> String {
        identity_for(self.name())
    }

    /// IDENTITY packet announcing this peer
    pub fn identity_packet(&self) -> Packet {
        Packet::identity(self.name(), &self.identity())
    }

    /// Handle a packet and return the reply in wire form
    pub fn respond(&mut self, packet: Packet) -> String {
        let reply = self.handle(packet);
        self.codec.encode(&reply)
    }

    /// Handle a packet and return the reply packet
    pub fn handle(&mut self, packet: Packet) -> Packet {
        match packet.op_code {
            OpCode::Identity => {
                let name = self.persona.name.clone();
                self.auth.process_identity(&packet, &name)
            },
            OpCode::Request | OpCode::Data => match self.converse(&packet) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(
                        "{} could not answer {}: {}",
                        self.name(),
                        packet.sender,
                        e
                    );
                    Packet::error(self.name(), e.code(), &e.to_string())
                },
            },
            OpCode::Ack | OpCode::Error => Packet::error(
                self.name(),
                ErrorCode::UnexpectedOpcode,
                &format!("cannot answer {} packet", packet.op_code),
            ),
        }
    }

    fn converse(&mut self, packet: &Packet) -> Result<Packet> {
        self.auth.authorize(&packet.sender, &self.operator)?;

        let packet = self.codec.selector().decompress(packet)?;
        let content = packet.display_content();

        let mut history = Vec::with_capacity(self.memory.len() + 2);
        history.push(ChatMessage::system(self.persona.system_prompt.clone()));
        history.extend(self.memory.iter().cloned());
        history.push(ChatMessage::user(content.clone()));

        let text = self.backend.complete(&history)?;
        if text.trim().is_empty() {
            return Err(EfficodeError::PeerUnresponsive(format!(
                "{} produced an empty reply",
                self.name()
            )));
        }

        self.memory
            .record_exchange(ChatMessage::user(content), ChatMessage::assistant(text.clone()));

        let reply_type = self.persona.role.reply_type();
        let reply = if self.persona.asks_questions() {
            Packet::request(self.name(), text, reply_type)
        } else {
            Packet::data(self.name(), text, reply_type)
        };
        Ok(self.codec.optimize(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use crate::protocol::{PARAM_METADATA, PARAM_SEMANTIC};
    use std::sync::{Arc, Mutex};

    /// Echoes the last user turn and records every history it sees
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    impl CompletionBackend for Recorder {
        fn complete(&self, history: &[ChatMessage]) -> std::result::Result<String, CompletionError> {
            self.seen.lock().unwrap().push(history.to_vec());
            let last = history.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("re: {last}"))
        }
    }

    struct Failing(CompletionError);

    impl CompletionBackend for Failing {
        fn complete(&self, _: &[ChatMessage]) -> std::result::Result<String, CompletionError> {
            Err(self.0.clone())
        }
    }

    fn verified_pair() -> (Peer, Recorder) {
        let recorder = Recorder::default();
        let mut peer = Peer::new(Persona::new("Lens", PeerRole::Answerer), recorder.clone());
        let ack = peer.handle(Packet::identity("Sage", "did:efficode:Sage"));
        assert!(ack.is_ack());
        (peer, recorder)
    }

    #[test]
    fn test_unverified_sender_refused() {
        let recorder = Recorder::default();
        let mut peer = Peer::new(Persona::new("Lens", PeerRole::Answerer), recorder.clone());

        let reply = peer.handle(Packet::request("Sage", "hello?", "question"));
        assert_eq!(reply.error_code(), Some(ErrorCode::AuthRequired));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_operator_bypasses_gate() {
        let recorder = Recorder::default();
        let mut peer = Peer::new(Persona::new("Sage", PeerRole::Questioner), recorder);

        let reply = peer.handle(Packet::request(OPERATOR_SENDER, "topic", "exploration"));
        assert_eq!(reply.op_code, OpCode::Request);
        assert_eq!(reply.text_param("type"), Some("question"));
        assert_eq!(reply.text_param("content"), Some("re: topic"));
    }

    #[test]
    fn test_answer_after_verification() {
        let (mut peer, recorder) = verified_pair();

        let reply = peer.handle(Packet::request("Sage", "why?", "question"));
        assert_eq!(reply.op_code, OpCode::Data);
        assert_eq!(reply.text_param("type"), Some("answer"));
        assert_eq!(reply.sender, "Lens");

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].role, crate::completion::Role::System);
    }

    #[test]
    fn test_memory_feeds_history() {
        let (mut peer, recorder) = verified_pair();
        peer.handle(Packet::request("Sage", "one", "question"));
        peer.handle(Packet::request("Sage", "two", "question"));

        assert_eq!(peer.memory().len(), 4);
        let seen = recorder.seen.lock().unwrap();
        // system + (user, assistant) + user
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][1].content, "one");
        assert_eq!(seen[1][2].content, "re: one");
    }

    #[test]
    fn test_completion_failure_becomes_error_packet() {
        let mut peer = Peer::new(
            Persona::new("Lens", PeerRole::Answerer),
            Failing(CompletionError::Timeout),
        );
        peer.handle(Packet::identity("Sage", "did:efficode:Sage"));

        let reply = peer.handle(Packet::request("Sage", "why?", "question"));
        assert_eq!(reply.error_code(), Some(ErrorCode::Timeout));
        assert!(peer.memory().is_empty());
    }

    #[test]
    fn test_control_packets_rejected() {
        let (mut peer, _) = verified_pair();
        let reply = peer.handle(Packet::ack("Sage", "success", "ok"));
        assert_eq!(reply.error_code(), Some(ErrorCode::UnexpectedOpcode));
    }

    #[test]
    fn test_unsupported_compression_reported() {
        let (mut peer, recorder) = verified_pair();
        let packet = Packet::data("Sage", "AAAA", "answer")
            .with_param("compression-method", "lzma")
            .with_param("original-type", "text");

        let reply = peer.handle(packet);
        assert_eq!(reply.error_code(), Some(ErrorCode::UnsupportedCompression));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_replies_are_self_describing() {
        let (mut peer, _) = verified_pair();
        let answer = peer.handle(Packet::request("Sage", "moon tides moon", "question"));
        let metadata = answer.param(PARAM_METADATA).unwrap().to_json();
        assert_eq!(metadata["type"], "text");
        assert_eq!(metadata["length"], "re: moon tides moon".len());
        let semantic = answer.param(PARAM_SEMANTIC).unwrap().to_json();
        assert_eq!(semantic["keywords"][0], "moon");

        let mut sage = Peer::new(Persona::new("Sage", PeerRole::Questioner), Recorder::default());
        let question = sage.handle(Packet::request(OPERATOR_SENDER, "tides", "exploration"));
        let semantic = question.param(PARAM_SEMANTIC).unwrap().to_json();
        assert_eq!(semantic["intent"], "request_question");
        assert!(question.param(PARAM_METADATA).is_none());
    }

    #[test]
    fn test_long_reply_is_compressed_on_wire() {
        let (mut peer, _) = verified_pair();
        let question = "tell me about tides ".repeat(40);
        let wire = peer.respond(Packet::request("Sage", question.as_str(), "question"));
        assert!(wire.starts_with("#DATA?"));
        assert!(wire.contains("compression-method="));
    }
}
