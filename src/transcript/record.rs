//! Serializable transcript record.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::Transcript;
use crate::error::Result;
use crate::peer::Persona;

/// Format of per-turn timestamps
pub const TURN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the timestamp embedded in transcript file names
const FILE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Characters of the session id appended to file names
const FILE_SESSION_CHARS: usize = 8;

/// Name and role description of a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Peer name
    pub name: String,
    /// Role description
    pub role: String,
}

impl From<&Persona> for AgentInfo {
    fn from(persona: &Persona) -> Self {
        Self {
            name: persona.name.clone(),
            role: persona.description.clone(),
        }
    }
}

/// One message of a persisted transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Originating peer
    pub sender: String,
    /// Logical content as text
    pub content: String,
    /// `YYYY-mm-dd HH:MM:SS`
    pub timestamp: String,
}

/// Structured form of a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    /// Session identifier; empty for records built outside a conversation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    /// `exploration` or `interactive`
    pub mode: String,
    /// Questioner
    pub agent1: AgentInfo,
    /// Answerer
    pub agent2: AgentInfo,
    /// Session start, RFC 3339
    pub timestamp: String,
    /// Turns in order
    pub messages: Vec<MessageRecord>,
}

impl TranscriptRecord {
    /// Render a transcript
    pub fn new(
        mode: &str,
        agent1: AgentInfo,
        agent2: AgentInfo,
        started_at: DateTime<Local>,
        transcript: &Transcript,
    ) -> Self {
        let messages = transcript
            .iter()
            .map(|turn| MessageRecord {
                sender: turn.sender.clone(),
                content: turn.display_content(),
                timestamp: turn.timestamp.format(TURN_TIME_FORMAT).to_string(),
            })
            .collect();

        Self {
            session_id: String::new(),
            mode: mode.to_string(),
            agent1,
            agent2,
            timestamp: started_at.to_rfc3339(),
            messages,
        }
    }

    /// Tag the record with the session it came from
    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = session_id.to_string();
        self
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Flat `sender: content` rendering, one blank line between turns
    pub fn to_flat_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}\n\n", m.sender, m.content))
            .collect()
    }

    /// `dialogue_<mode>_<YYYYmmdd_HHMMSS>`, followed by `_<session prefix>`
    /// when the record carries a session id
    pub fn file_stem(&self) -> String {
        let stamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.format(FILE_TIME_FORMAT).to_string())
            .unwrap_or_else(|_| Local::now().format(FILE_TIME_FORMAT).to_string());
        let session: String = self.session_id.chars().take(FILE_SESSION_CHARS).collect();
        if session.is_empty() {
            format!("dialogue_{}_{}", self.mode, stamp)
        } else {
            format!("dialogue_{}_{}_{}", self.mode, stamp, session)
        }
    }
}
