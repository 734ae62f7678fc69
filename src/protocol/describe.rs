//! Self-describing packets.
//!
//! Before a reply is compressed, a peer annotates it so the receiver can
//! tell what it carries without reading the content:
//!
//! - `_metadata` on DATA packets: for structured content the JSON type of
//!   each top-level field and the key list, for text a coarse content kind
//!   and the length in characters.
//! - `_semantic`: on REQUEST packets the intent derived from `type`, on
//!   DATA packets with text content the five most frequent keywords.
//!
//! Both annotations are plain JSON objects, so they travel as structured
//! parameters and survive compression of `content` untouched.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::packet::{OpCode, Packet, ParamValue};
use super::{PARAM_CONTENT, PARAM_METADATA, PARAM_SEMANTIC, PARAM_TYPE};

/// Keywords kept per packet
pub const KEYWORD_LIMIT: usize = 5;

/// Texts at least this long (in characters) are never classed as questions
const QUESTION_MAX_CHARS: usize = 200;

const STOPWORDS: &[&str] = &["the", "and", "is", "in", "to", "of", "for", "with", "on", "at"];

const CODE_PATTERNS: &[&str] = &[
    r"def\s+\w+\s*\(.*\):",
    r"function\s+\w+\s*\(.*\)",
    r"class\s+\w+",
    r"import\s+\w+",
    r"<\w+>.*</\w+>",
];

lazy_static! {
    /// Words of three or more word characters
    static ref WORD_REGEX: Option<Regex> = Regex::new(r"\b\w{3,}\b").ok();

    /// Source code markers
    static ref CODE_REGEX: Vec<Regex> = CODE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();
}

/// Coarse classification of text content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A JSON object written as text
    Json,
    /// An http(s) URL
    Url,
    /// Looks like source code or markup
    Code,
    /// A short text containing a question mark
    Question,
    /// Anything else
    PlainText,
}

impl ContentKind {
    /// Detect the kind of a text. Checks run in the order of the variants.
    pub fn detect(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with('{')
            && trimmed.ends_with('}')
            && serde_json::from_str::<Value>(trimmed).is_ok()
        {
            return ContentKind::Json;
        }
        if text.starts_with("http://") || text.starts_with("https://") {
            return ContentKind::Url;
        }
        if CODE_REGEX.iter().any(|re| re.is_match(text)) {
            return ContentKind::Code;
        }
        if text.contains('?') && text.chars().count() < QUESTION_MAX_CHARS {
            return ContentKind::Question;
        }
        ContentKind::PlainText
    }

    /// Name used in `_metadata.content_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Json => "json",
            ContentKind::Url => "url",
            ContentKind::Code => "code",
            ContentKind::Question => "question",
            ContentKind::PlainText => "plain_text",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type name of a value, as used in `_metadata.schema`
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Most frequent non-stopword words of `text`, lowercased.
///
/// Ties keep the order of first occurrence.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let Some(words) = WORD_REGEX.as_ref() else {
        return Vec::new();
    };
    let lowered = text.to_lowercase();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for word in words.find_iter(&lowered).map(|m| m.as_str()) {
        if STOPWORDS.contains(&word) {
            continue;
        }
        match index.get(word) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(word, counts.len());
                counts.push((word, 1));
            },
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(word, _)| word.to_string())
        .collect()
}

impl Packet {
    /// Attach `_metadata` describing the content of a DATA packet.
    ///
    /// Other packets, packets without content and compressed packets are
    /// returned unchanged. Structured arrays carry no field schema and get
    /// no metadata.
    pub fn with_metadata(self) -> Self {
        if self.op_code != OpCode::Data || self.is_compressed() {
            return self;
        }
        let metadata = match self.param(PARAM_CONTENT) {
            Some(ParamValue::Structured(Value::Object(fields))) => {
                let schema: Map<String, Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(json_type(v))))
                    .collect();
                json!({
                    "type": "json",
                    "schema": schema,
                    "keys": fields.keys().collect::<Vec<_>>(),
                })
            },
            Some(ParamValue::Text(text)) => json!({
                "type": "text",
                "content_type": ContentKind::detect(text).as_str(),
                "length": text.chars().count(),
            }),
            _ => return self,
        };
        self.with_param(PARAM_METADATA, metadata)
    }

    /// Attach `_semantic` hints.
    ///
    /// A REQUEST with a `type` gets `intent = request_<type>`; a DATA
    /// packet with text content gets its top keywords. Compressed packets
    /// are returned unchanged.
    pub fn with_semantic_info(self) -> Self {
        if self.is_compressed() {
            return self;
        }
        let semantic = match self.op_code {
            OpCode::Request => match self.text_param(PARAM_TYPE) {
                Some(req_type) if !req_type.is_empty() => json!({
                    "intent": format!("request_{req_type}"),
                    "expected_response": "data",
                }),
                _ => return self,
            },
            OpCode::Data => {
                let Some(text) = self.content().and_then(ParamValue::as_text) else {
                    return self;
                };
                let keywords = extract_keywords(text, KEYWORD_LIMIT);
                if keywords.is_empty() {
                    return self;
                }
                json!({ "keywords": keywords })
            },
            _ => return self,
        };
        self.with_param(PARAM_SEMANTIC, semantic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire;

    #[test]
    fn test_detect_content_kind() {
        assert_eq!(ContentKind::detect(r#" {"a": 1} "#), ContentKind::Json);
        assert_eq!(ContentKind::detect("{not json}"), ContentKind::PlainText);
        assert_eq!(ContentKind::detect("https://example.org/tides"), ContentKind::Url);
        assert_eq!(ContentKind::detect("def tide(moon):\n    pass"), ContentKind::Code);
        assert_eq!(ContentKind::detect("import numpy as np"), ContentKind::Code);
        assert_eq!(ContentKind::detect("<b>bold</b>"), ContentKind::Code);
        assert_eq!(ContentKind::detect("Why do tides turn?"), ContentKind::Question);
        assert_eq!(
            ContentKind::detect(&format!("{}?", "long ".repeat(50))),
            ContentKind::PlainText
        );
        assert_eq!(ContentKind::detect("The sea is salty."), ContentKind::PlainText);
    }

    #[test]
    fn test_keywords_by_frequency_then_first_seen() {
        let text = "Tides follow the moon. The moon pulls water; water rises and tides turn, \
                    and gravity wins";
        assert_eq!(
            extract_keywords(text, KEYWORD_LIMIT),
            vec!["tides", "moon", "water", "follow", "pulls"]
        );
        assert!(extract_keywords("to be or at", KEYWORD_LIMIT).is_empty());
    }

    #[test]
    fn test_text_metadata() {
        let packet = Packet::data("Lens", "Why is the sea salty?", "answer").with_metadata();
        let metadata = packet.param(PARAM_METADATA).unwrap().to_json();
        assert_eq!(metadata["type"], "text");
        assert_eq!(metadata["content_type"], "question");
        assert_eq!(metadata["length"], 21);
    }

    #[test]
    fn test_structured_metadata_schema() {
        let content = json!({"tide": "high", "height": 2, "ratio": 0.5, "tags": ["moon"]});
        let packet = Packet::data("Lens", content, "answer").with_metadata();
        let metadata = packet.param(PARAM_METADATA).unwrap().to_json();
        assert_eq!(metadata["type"], "json");
        assert_eq!(metadata["schema"]["tide"], "string");
        assert_eq!(metadata["schema"]["height"], "integer");
        assert_eq!(metadata["schema"]["ratio"], "number");
        assert_eq!(metadata["schema"]["tags"], "array");
        let mut keys: Vec<&str> = metadata["keys"]
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k.as_str().unwrap())
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, ["height", "ratio", "tags", "tide"]);
    }

    #[test]
    fn test_metadata_only_on_data() {
        let request = Packet::request("Sage", "why?", "question").with_metadata();
        assert!(request.param(PARAM_METADATA).is_none());

        let array = Packet::data("Lens", json!([1, 2]), "answer").with_metadata();
        assert!(array.param(PARAM_METADATA).is_none());
    }

    #[test]
    fn test_request_intent() {
        let packet = Packet::request("Sage", "why?", "question").with_semantic_info();
        let semantic = packet.param(PARAM_SEMANTIC).unwrap().to_json();
        assert_eq!(semantic["intent"], "request_question");
        assert_eq!(semantic["expected_response"], "data");
    }

    #[test]
    fn test_data_keywords() {
        let packet =
            Packet::data("Lens", "salt salt rivers carry salt", "answer").with_semantic_info();
        let semantic = packet.param(PARAM_SEMANTIC).unwrap().to_json();
        assert_eq!(semantic["keywords"], json!(["salt", "rivers", "carry"]));
    }

    #[test]
    fn test_annotations_survive_the_wire() {
        let content = "Rivers carry dissolved salt & minerals = brine?";
        let packet = Packet::data("Lens", content, "answer")
            .with_metadata()
            .with_semantic_info();
        assert_eq!(wire::parse(&packet.to_wire(), "Lens").unwrap(), packet);
    }
}
