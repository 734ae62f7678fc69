//! Turn-taking conversation between two peers.
//!
//! A [`Conversation`] owns both peers and the transcript. Every packet it
//! routes travels as a wire string: the orchestrator encodes, the receiving
//! peer gets the parsed packet, and the reply comes back as a string that
//! is parsed (and decompressed for display) before it is recorded.
//!
//! # Exploration
//!
//! ```text
//! operator --seed--> questioner --Q1--> answerer --A1--> questioner --Q2--> ...
//! ```
//!
//! One round is the answerer's reply plus the questioner's follow-up; the
//! last round has no follow-up. With `max_rounds = N` a complete run
//! records `2N + 1` turns.
//!
//! # Interactive
//!
//! Each [`Conversation::relay`] routes an operator message to the
//! questioner and its reply on to the answerer. [`Conversation::finish`]
//! ends the session.
//!
//! Both modes hand the transcript to the [`TranscriptSink`] exactly once,
//! including after an abort.

mod state;

pub use state::{AbortReason, CancelFlag, ConversationState};

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::{ConversationConfig, TranscriptConfig};
use crate::error::{EfficodeError, ErrorCode, Result};
use crate::peer::Peer;
use crate::protocol::{wire, Packet, PacketCodec, PARAM_MESSAGE};
use crate::transcript::{
    persist_within, AgentInfo, ConversationTurn, Transcript, TranscriptRecord, TranscriptSink,
};

/// `type` of the seed packet in exploration mode
const SEED_TYPE: &str = "exploration";
/// `type` of operator messages in interactive mode
const CHAT_TYPE: &str = "chat";

/// Conversation mode, recorded in transcripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Bounded autonomous exchange
    Exploration,
    /// Operator-driven relay
    Interactive,
}

impl SessionMode {
    /// Name used in transcript records and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Exploration => "exploration",
            SessionMode::Interactive => "interactive",
        }
    }
}

/// Result of a finished conversation
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Session identifier
    pub session_id: String,
    /// `Done` or `Aborted`
    pub state: ConversationState,
    /// Set when `state` is `Aborted`
    pub abort_reason: Option<AbortReason>,
    /// Every recorded turn, partial on abort
    pub transcript: Transcript,
    /// Whether the sink accepted the transcript
    pub persisted: bool,
}

impl SessionOutcome {
    /// Check whether the conversation ran to completion
    pub fn is_done(&self) -> bool {
        self.state == ConversationState::Done
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Questioner,
    Answerer,
}

/// Two-peer conversation orchestrator
pub struct Conversation {
    id: String,
    questioner: Peer,
    answerer: Peer,
    codec: PacketCodec,
    sink: Box<dyn TranscriptSink>,
    write_timeout: Duration,
    cancel: CancelFlag,
    config: ConversationConfig,
    mode: SessionMode,
    state: ConversationState,
    abort_reason: Option<AbortReason>,
    transcript: Transcript,
    started_at: DateTime<Local>,
}

impl Conversation {
    /// Create a conversation between two peers.
    ///
    /// The peer that asks questions becomes the questioner. When the
    /// assignment is ambiguous (both or neither ask) the given order is
    /// kept and `first` leads.
    pub fn new(first: Peer, second: Peer, sink: impl TranscriptSink + 'static) -> Self {
        let (questioner, answerer) =
            if !first.persona().asks_questions() && second.persona().asks_questions() {
                (second, first)
            } else {
                (first, second)
            };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            questioner,
            answerer,
            codec: PacketCodec::default(),
            sink: Box::new(sink),
            write_timeout: TranscriptConfig::default().write_timeout(),
            cancel: CancelFlag::new(),
            config: ConversationConfig::default(),
            mode: SessionMode::Exploration,
            state: ConversationState::Init,
            abort_reason: None,
            transcript: Transcript::new(),
            started_at: Local::now(),
        }
    }

    /// Apply conversation settings; the operator id is passed on to both peers
    pub fn with_config(mut self, config: &ConversationConfig) -> Self {
        self.questioner = self.questioner.with_operator(&config.operator);
        self.answerer = self.answerer.with_operator(&config.operator);
        self.config = config.clone();
        self
    }

    /// Override the round budget
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.config.max_rounds = max_rounds;
        self
    }

    /// Bound the time spent handing the transcript to the sink
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Use a specific codec for routing
    pub fn with_codec(mut self, codec: PacketCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state
    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Abort reason, once aborted
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    /// Turns recorded so far
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Peer asking the questions
    pub fn questioner(&self) -> &Peer {
        &self.questioner
    }

    /// Peer answering them
    pub fn answerer(&self) -> &Peer {
        &self.answerer
    }

    /// Handle to this conversation's cancellation flag
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run an exploration on `topic` (or the configured default topic)
    pub fn run(mut self, topic: Option<&str>) -> SessionOutcome {
        self.mode = SessionMode::Exploration;
        tracing::info!(
            "Session {}: exploring with {} (questioner) and {} (answerer), {} rounds",
            self.id,
            self.questioner.name(),
            self.answerer.name(),
            self.config.max_rounds
        );

        if let Err((reason, err)) = self.explore(topic) {
            self.abort(reason, &err);
        }
        self.conclude()
    }

    fn explore(&mut self, topic: Option<&str>) -> std::result::Result<(), (AbortReason, EfficodeError)> {
        self.handshake()
            .map_err(|e| (AbortReason::AuthFailed, e))?;

        self.transition(ConversationState::Seeding);
        let seed_text = self.config.seed_message(topic);
        let seed = Packet::request(&self.config.operator, seed_text, SEED_TYPE);
        let seed_wire = self.codec.encode(&seed);
        self.transcript
            .push(ConversationTurn::from_packet(&seed, seed_wire));

        let max_rounds = self.config.max_rounds;
        if max_rounds == 0 {
            self.transition(ConversationState::Done);
            return Ok(());
        }

        self.checkpoint()?;
        let mut current = self.exchange(Side::Questioner, &seed)?;
        self.transition(ConversationState::Exchanging);

        for round in 1..=max_rounds {
            tracing::debug!("Round {}/{}", round, max_rounds);
            self.checkpoint()?;
            let answer = self.exchange(Side::Answerer, &current)?;
            if round == max_rounds {
                break;
            }
            self.checkpoint()?;
            current = self.exchange(Side::Questioner, &answer)?;
        }

        self.transition(ConversationState::Done);
        Ok(())
    }

    /// Relay one operator message through both peers.
    ///
    /// The handshake runs on the first call. Returns the turns recorded by
    /// this call: the operator message, the questioner's reply and the
    /// answerer's reply. A failure aborts the session; later calls fail
    /// with [`EfficodeError::Closed`].
    pub fn relay(&mut self, message: &str) -> Result<&[ConversationTurn]> {
        self.mode = SessionMode::Interactive;

        if self.state.is_terminal() {
            return Err(EfficodeError::Closed(format!(
                "conversation is {}",
                self.state
            )));
        }
        if self.state == ConversationState::Init {
            if let Err(e) = self.handshake() {
                self.abort(AbortReason::AuthFailed, &e);
                return Err(e);
            }
            self.transition(ConversationState::Exchanging);
        }

        let start = self.transcript.len();
        if let Err((reason, err)) = self.relay_once(message) {
            self.abort(reason, &err);
            return Err(err);
        }
        Ok(&self.transcript.turns()[start..])
    }

    fn relay_once(&mut self, message: &str) -> std::result::Result<(), (AbortReason, EfficodeError)> {
        self.checkpoint()?;
        let packet = Packet::request(&self.config.operator, message, CHAT_TYPE);
        let wire = self.codec.encode(&packet);
        self.transcript
            .push(ConversationTurn::from_packet(&packet, wire));

        let reply = self.exchange(Side::Questioner, &packet)?;
        self.checkpoint()?;
        self.exchange(Side::Answerer, &reply)?;
        Ok(())
    }

    /// End an interactive session and persist its transcript
    pub fn finish(mut self) -> SessionOutcome {
        if !self.state.is_terminal() {
            self.transition(ConversationState::Done);
        }
        self.conclude()
    }

    /// Run the identity exchange in both directions
    fn handshake(&mut self) -> Result<()> {
        self.transition(ConversationState::Handshaking);
        self.verify(Side::Questioner, Side::Answerer)?;
        self.verify(Side::Answerer, Side::Questioner)?;
        Ok(())
    }

    fn verify(&mut self, from: Side, to: Side) -> Result<()> {
        let identity = self.peer(from).identity_packet();
        let wire = self.codec.encode(&identity);
        let incoming = wire::parse(&wire, &identity.sender)?;

        let verifier = self.peer_mut(to);
        let verifier_name = verifier.name().to_string();
        let reply_wire = verifier.respond(incoming);
        let reply = wire::parse(&reply_wire, &verifier_name)
            .map_err(|e| EfficodeError::AuthFailed(format!("{verifier_name}: {e}")))?;

        if reply.is_ack() {
            tracing::info!("{} verified {}", verifier_name, identity.sender);
            Ok(())
        } else {
            let detail = reply.text_param(PARAM_MESSAGE).unwrap_or("no acknowledgement");
            Err(EfficodeError::AuthFailed(format!(
                "{verifier_name} rejected {}: {detail}",
                identity.sender
            )))
        }
    }

    /// Route `packet` to one side and record its reply.
    ///
    /// Returns the reply as received (still compressed, if it was), ready
    /// to be forwarded to the other side.
    fn exchange(
        &mut self,
        to: Side,
        packet: &Packet,
    ) -> std::result::Result<Packet, (AbortReason, EfficodeError)> {
        self.route(to, packet)
            .map_err(|e| (AbortReason::PeerUnresponsive, e))
    }

    fn route(&mut self, to: Side, packet: &Packet) -> Result<Packet> {
        let wire = self.codec.encode(packet);
        let incoming = wire::parse(&wire, &packet.sender)?;

        let receiver = self.peer_mut(to);
        let receiver_name = receiver.name().to_string();
        let reply_wire = receiver.respond(incoming);

        if reply_wire.trim().is_empty() {
            return Err(EfficodeError::PeerUnresponsive(format!(
                "{receiver_name} returned nothing"
            )));
        }
        let reply = wire::parse(&reply_wire, &receiver_name)?;
        if reply.is_error() {
            let code = reply
                .error_code()
                .map_or_else(|| "UNKNOWN".to_string(), |c| c.to_string());
            let detail = reply.text_param(PARAM_MESSAGE).unwrap_or_default();
            return Err(EfficodeError::PeerUnresponsive(format!(
                "{receiver_name} replied {code}: {detail}"
            )));
        }

        let logical = match self.codec.selector().decompress(&reply) {
            Ok(logical) => logical,
            Err(e) => {
                tracing::warn!("Recording compressed reply from {}: {}", receiver_name, e);
                reply.clone()
            },
        };
        self.transcript
            .push(ConversationTurn::from_packet(&logical, reply_wire));
        Ok(reply)
    }

    fn checkpoint(&self) -> std::result::Result<(), (AbortReason, EfficodeError)> {
        if self.cancel.is_cancelled() {
            Err((
                AbortReason::Cancelled,
                EfficodeError::Closed("cancelled by operator".to_string()),
            ))
        } else {
            Ok(())
        }
    }

    fn peer(&self, side: Side) -> &Peer {
        match side {
            Side::Questioner => &self.questioner,
            Side::Answerer => &self.answerer,
        }
    }

    fn peer_mut(&mut self, side: Side) -> &mut Peer {
        match side {
            Side::Questioner => &mut self.questioner,
            Side::Answerer => &mut self.answerer,
        }
    }

    fn transition(&mut self, next: ConversationState) {
        tracing::debug!("Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    fn abort(&mut self, reason: AbortReason, err: &EfficodeError) {
        tracing::warn!(
            "Session {} aborted in {} ({}): {}",
            self.id,
            self.state,
            reason,
            err
        );
        self.abort_reason = Some(reason);
        self.transition(ConversationState::Aborted);
    }

    /// Hand the transcript to the sink and build the outcome
    fn conclude(self) -> SessionOutcome {
        let record = TranscriptRecord::new(
            self.mode.as_str(),
            AgentInfo::from(self.questioner.persona()),
            AgentInfo::from(self.answerer.persona()),
            self.started_at,
            &self.transcript,
        )
        .with_session_id(&self.id);

        let persisted = match persist_within(self.sink, record, self.write_timeout) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "{}: transcript of session {} not saved: {}",
                    ErrorCode::StorageWriteFailed,
                    self.id,
                    e
                );
                false
            },
        };

        tracing::info!(
            "Session {} finished {} with {} turns",
            self.id,
            self.state,
            self.transcript.len()
        );

        SessionOutcome {
            session_id: self.id,
            state: self.state,
            abort_reason: self.abort_reason,
            transcript: self.transcript,
            persisted,
        }
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("questioner", &self.questioner.name())
            .field("answerer", &self.answerer.name())
            .field("turns", &self.transcript.len())
            .finish_non_exhaustive()
    }
}
