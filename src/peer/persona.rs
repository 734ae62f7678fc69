//! Persona descriptions.
//!
//! Persona text is opaque to the core; only the declared role matters,
//! because it decides who asks and who answers.

use serde::{Deserialize, Serialize};

/// Conversational capability a persona declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Asks questions
    Questioner,
    /// Answers questions
    Answerer,
}

impl PeerRole {
    /// `type` parameter attached to replies
    pub fn reply_type(&self) -> &'static str {
        match self {
            PeerRole::Questioner => "question",
            PeerRole::Answerer => "answer",
        }
    }
}

/// Name, role and prompt text of a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Peer identifier, also used as packet sender
    pub name: String,
    /// Declared capability
    pub role: PeerRole,
    /// Short description recorded in transcripts
    pub description: String,
    /// System prompt handed to the completion backend
    pub system_prompt: String,
}

impl Persona {
    /// Create a persona with a generated description and prompt
    pub fn new(name: &str, role: PeerRole) -> Self {
        let (description, prompt) = match role {
            PeerRole::Questioner => (
                "A curious agent that asks deep, novel questions".to_string(),
                format!(
                    "You are {name}, a curious and playful thinker. Ask exactly one \
                     high-quality, unconventional question at a time, building on the \
                     previous answer and never repeating yourself."
                ),
            ),
            PeerRole::Answerer => (
                "An insightful agent that gives original, thoughtful answers".to_string(),
                format!(
                    "You are {name}, an insightful and imaginative thinker. Answer the \
                     question with original, multi-perspective insight, then offer one \
                     point for further reflection."
                ),
            ),
        };
        Self {
            name: name.to_string(),
            role,
            description,
            system_prompt: prompt,
        }
    }

    /// Replace the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Replace the system prompt
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Check if this persona asks questions
    pub fn asks_questions(&self) -> bool {
        self.role == PeerRole::Questioner
    }
}
