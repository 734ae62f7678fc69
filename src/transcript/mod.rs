//! Conversation transcripts.
//!
//! The orchestrator appends [`ConversationTurn`]s to a [`Transcript`] as the
//! exchange progresses. At session end the transcript is rendered into a
//! [`TranscriptRecord`] and handed to a [`TranscriptSink`] once.
//!
//! Two renderings exist for every record:
//!
//! ```text
//! dialogue_exploration_20240101_120000.json   structured record
//! dialogue_exploration_20240101_120000.spl    "sender: content" pairs
//! ```

mod record;
mod sink;

pub use record::{AgentInfo, MessageRecord, TranscriptRecord, TURN_TIME_FORMAT};
pub use sink::{persist_within, FileSink, MemorySink, TranscriptSink};

use chrono::{DateTime, Local};

use crate::protocol::{Packet, ParamValue};

/// One recorded step of a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    /// Originating peer (or operator)
    pub sender: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Local>,
    /// Wire form as it travelled
    pub rendered_message: String,
    /// Logical (decompressed) payload, if the packet conveyed one
    pub content: Option<ParamValue>,
}

impl ConversationTurn {
    /// Record a packet together with the wire string it travelled as.
    ///
    /// `packet` must already be decompressed; its `content` becomes the
    /// logical payload of the turn.
    pub fn from_packet(packet: &Packet, rendered_message: String) -> Self {
        let content = if packet.op_code.conveys_message() && !packet.is_compressed() {
            packet.content().cloned()
        } else {
            None
        };
        Self {
            sender: packet.sender.clone(),
            timestamp: Local::now(),
            rendered_message,
            content,
        }
    }

    /// Text shown for this turn: the logical content, or the wire form
    pub fn display_content(&self) -> String {
        match &self.content {
            Some(content) => content.to_text(),
            None => self.rendered_message.clone(),
        }
    }
}

/// Append-only, ordered list of turns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, turn: ConversationTurn) {
        tracing::debug!(
            "Recorded turn {} from {}: {:.50}",
            self.turns.len() + 1,
            turn.sender,
            turn.display_content()
        );
        self.turns.push(turn);
    }

    /// Turns in recording order
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Iterate turns in recording order
    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}
