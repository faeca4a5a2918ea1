use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{Intent, ParseErrorCode, ParseFailure, Suggestion};

const PARSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Tier-2 resolver: the external language-model parser, consumed through a
/// narrow request/response interface. Transport faults are mapped to a
/// `RemoteUnavailable` failure so the pipeline can fall through to tier 3.
#[derive(Debug, Clone)]
pub struct RemoteParser {
    http: reqwest::Client,
    url: String,
    session_id: Uuid,
}

// The parser wire format is camelCase.
#[derive(Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParserResponse {
    Parsed(ParsedIntentWire),
    Failed(ParseErrorWire),
}

// The response `context` echo carries nothing the pipeline consumes;
// serde drops it with the other unknown fields.
#[derive(Deserialize)]
struct ParsedIntentWire {
    intent: String,
    confidence: f32,
    #[serde(default)]
    parameters: Map<String, Value>,
}

#[derive(Deserialize)]
struct ParseErrorWire {
    error: ParseErrorBody,
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Deserialize)]
struct ParseErrorBody {
    code: ParseErrorCode,
    message: String,
    #[serde(default)]
    details: Vec<String>,
}

impl RemoteParser {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(PARSE_TIMEOUT)
                .build()
                .unwrap_or_default(),
            url: url.into(),
            session_id: Uuid::new_v4(),
        }
    }

    pub async fn parse(&self, text: &str, api_key: Option<&str>) -> Result<Intent, ParseFailure> {
        debug!(session = %self.session_id, "remote intent parse requested");

        let response = self
            .http
            .post(&self.url)
            .json(&ParseRequest { text, api_key })
            .send()
            .await
            .map_err(|e| {
                warn!("remote parser unreachable: {e}");
                ParseFailure::new(ParseErrorCode::RemoteUnavailable, e.to_string())
            })?;

        let body: ParserResponse = response.json().await.map_err(|e| {
            ParseFailure::new(
                ParseErrorCode::RemoteUnavailable,
                format!("malformed parser response: {e}"),
            )
        })?;

        match body {
            ParserResponse::Parsed(wire) => {
                let mut intent = Intent::new(wire.intent, wire.confidence);
                intent.parameters = wire.parameters;
                Ok(intent)
            }
            ParserResponse::Failed(wire) => {
                let mut failure =
                    ParseFailure::new(wire.error.code, wire.error.message);
                failure.details = wire.error.details;
                failure.suggestions = wire.suggestions;
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_the_credential_as_camel_case() {
        let body = serde_json::to_value(ParseRequest {
            text: "create notes.txt",
            api_key: Some("secret-key"),
        })
        .expect("request serializes");
        assert_eq!(body["apiKey"], "secret-key");
        assert!(body.get("api_key").is_none(), "wire field is camelCase");
    }

    #[test]
    fn absent_credential_is_omitted_from_the_request() {
        let body = serde_json::to_value(ParseRequest {
            text: "hello",
            api_key: None,
        })
        .expect("request serializes");
        assert!(body.get("apiKey").is_none());
    }

    #[test]
    fn response_context_echo_is_tolerated() {
        let wire: ParserResponse = serde_json::from_str(
            r#"{"intent":"create_file","confidence":0.8,"parameters":{},
                "context":{"sessionId":"s","timestamp":"t","userInput":"u"}}"#,
        )
        .expect("parsed response with context");
        assert!(matches!(wire, ParserResponse::Parsed(_)));
    }
}
