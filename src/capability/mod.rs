pub mod capture;
pub mod playback;
pub mod registry;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::CapabilityError;

pub use registry::CapabilityRegistry;

/// Logical provider name plus the config needed to bring it up. The
/// serialized form is the registry cache key, so two configs that
/// serialize identically share one live handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn named(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            endpoint: None,
            api_key: None,
        }
    }

    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn is_none(&self) -> bool {
        self.provider == "none"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Non-final partial transcript.
    Partial(String),
    /// Exactly one per recording; possibly empty when forced.
    Final(String),
    Error(String),
}

/// Live capture resource. Result streams are single-subscriber: starting a
/// new recording replaces any prior stream, last subscriber wins.
pub trait CaptureHandle: Send {
    /// Begins recording; the stream yields zero or more partials followed
    /// by exactly one final result.
    fn start_recording(&mut self) -> mpsc::UnboundedReceiver<CaptureEvent>;

    /// May be called anytime; forces the final result (possibly empty)
    /// and releases the native resource.
    fn stop_recording(&mut self);
}

#[derive(Debug, Clone, Default)]
pub struct SpeakOptions {
    pub voice: Option<String>,
    pub rate: Option<f32>,
}

/// Live playback resource.
pub trait PlaybackHandle: Send {
    /// Begins playback; the returned channel resolves on end or carries
    /// the playback error.
    fn speak(
        &mut self,
        text: &str,
        opts: &SpeakOptions,
    ) -> oneshot::Receiver<Result<(), CapabilityError>>;

    /// Idempotent and always safe.
    fn stop(&mut self);

    fn pause(&mut self) {}

    fn resume(&mut self) {}
}
