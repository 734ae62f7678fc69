//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (for the `efficode` binary)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{Algorithm, CodecRegistry, CompressionSelector, COMPRESSION_THRESHOLD};
use crate::error::{EfficodeError, Result};
use crate::protocol::OPERATOR_SENDER;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion service configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Conversation configuration
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Compression configuration
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Transcript configuration
    #[serde(default)]
    pub transcript: TranscriptConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| EfficodeError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| EfficodeError::Config(format!("Failed to parse config: {e}")))
    }

    /// Default config file location (`<config dir>/efficode/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("efficode").join("config.toml"))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Override fields from environment variables
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable source
    pub fn apply_env_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = var("EFFICODE_API_KEY").or_else(|| var("SILICONFLOW_API_KEY")) {
            self.completion.api_key = Some(key);
        }
        if let Some(base) = var("EFFICODE_API_BASE") {
            self.completion.api_base = base;
        }
        if let Some(model) = var("EFFICODE_MODEL") {
            self.completion.model = model;
        }
        if let Some(rounds) = var("EFFICODE_MAX_ROUNDS") {
            if let Ok(rounds) = rounds.parse() {
                self.conversation.max_rounds = rounds;
            }
        }
        if let Some(dir) = var("EFFICODE_LOGS_DIR") {
            self.transcript.logs_dir = PathBuf::from(dir);
        }
        self
    }
}

/// Completion service configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    /// Model identifier
    pub model: String,

    /// Bearer token
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Reply length cap
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.siliconflow.cn/v1".to_string(),
            model: "deepseek-ai/DeepSeek-R1-Distill-Qwen-7B".to_string(),
            api_key: None,
            timeout_secs: 60,
            temperature: 0.8,
            max_tokens: 2000,
        }
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Exchange rounds in exploration mode
    pub max_rounds: usize,

    /// Topic used when the operator supplies none
    pub default_topic: String,

    /// Sender id of the human operator
    pub operator: String,

    /// Per-peer memory window (entries)
    pub memory_window: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            default_topic: "the future of AI and humanity".to_string(),
            operator: OPERATOR_SENDER.to_string(),
            memory_window: crate::peer::MEMORY_WINDOW,
        }
    }
}

impl ConversationConfig {
    /// Seed text for a topic
    pub fn seed_message(&self, topic: Option<&str>) -> String {
        let topic = topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.default_topic);
        format!("Let's explore and think about '{topic}'")
    }
}

/// Compression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Enable compression (false = content always sent raw)
    pub enabled: bool,

    /// Minimum content size in bytes
    pub threshold_bytes: usize,

    /// Algorithms to try, in trial order
    pub algorithms: Vec<Algorithm>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_bytes: COMPRESSION_THRESHOLD,
            algorithms: Algorithm::all().to_vec(),
        }
    }
}

impl CompressionConfig {
    /// Build a selector over the configured algorithms that are linked.
    ///
    /// Disabled compression still decompresses with every linked codec,
    /// since peers may send compressed content regardless.
    pub fn selector(&self) -> CompressionSelector {
        if self.enabled {
            CompressionSelector::with_registry(CodecRegistry::with_algorithms(&self.algorithms))
                .with_threshold(self.threshold_bytes)
        } else {
            CompressionSelector::new().with_threshold(usize::MAX)
        }
    }
}

/// Transcript configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Directory for transcript files
    pub logs_dir: PathBuf,

    /// Upper bound on writing one transcript, in seconds
    pub write_timeout_secs: u64,
}

impl TranscriptConfig {
    /// Write bound as a duration
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            write_timeout_secs: 10,
        }
    }
}
