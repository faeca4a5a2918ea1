use serde::{Deserialize, Serialize};

use crate::capability::ProviderConfig;

/// Session settings, supplied externally. The core only consumes this value
/// and never persists it. A change applies atomically between transitions;
/// capability handles re-resolve lazily on next use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub stt_provider: String,
    pub tts_provider: String,
    pub allow_remote_intent_resolution: bool,
    /// Backend command executor base URL.
    pub backend_url: String,
    /// Remote intent parser endpoint.
    pub parser_url: String,
    /// Shared credential for cloud-backed providers and the remote parser.
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stt_provider: "none".to_string(),
            tts_provider: "system".to_string(),
            allow_remote_intent_resolution: true,
            backend_url: "http://127.0.0.1:8000".to_string(),
            parser_url: "http://127.0.0.1:8000/api/parse-intent".to_string(),
            api_key: None,
        }
    }
}

impl Settings {
    pub fn stt_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.stt_provider.clone(),
            endpoint: Some(format!("{}/api/transcribe", self.backend_url)),
            api_key: self.api_key.clone(),
        }
    }

    pub fn tts_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.tts_provider.clone(),
            endpoint: Some(format!("{}/api/synthesize", self.backend_url)),
            api_key: self.api_key.clone(),
        }
    }
}
