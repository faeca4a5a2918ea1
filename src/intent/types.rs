use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Normalized actionable command extracted from raw input.
/// Immutable once produced by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    pub parameters: Map<String, Value>,
    /// Opaque ordering signal in [0, 1]. Compared for tier short-circuiting
    /// and the route guard, never used for arithmetic.
    pub confidence: f32,
}

impl Intent {
    pub fn new(action: impl Into<String>, confidence: f32) -> Self {
        Self {
            action: action.into(),
            parameters: Map::new(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorCode {
    MissingInput,
    UnrecognizedCommand,
    InvalidParameter,
    RemoteUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Rephrase,
    Clarify,
    Example,
    Alternative,
}

/// Hint attached to a parse failure, surfaced to the user verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl Suggestion {
    pub fn new(kind: SuggestionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            example: None,
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// Typed failure produced when a resolution tier cannot yield an
/// actionable intent. `details` enumerates missing/invalid fields.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ParseFailure {
    pub code: ParseErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl ParseFailure {
    pub fn new(code: ParseErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    /// Hard failures terminate the resolver chain instead of falling
    /// through to the next tier.
    pub fn is_hard(&self) -> bool {
        self.code == ParseErrorCode::InvalidParameter
    }
}
