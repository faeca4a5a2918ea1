use std::collections::HashMap;

use tracing::{debug, info};

use super::capture::{probe_microphone, MicCapture};
use super::playback::{CloudPlayback, ProcessPlayback};
use super::{CaptureHandle, PlaybackHandle, ProviderConfig};
use crate::error::CapabilityError;

pub type CaptureFactory =
    Box<dyn Fn(&ProviderConfig) -> Result<Box<dyn CaptureHandle>, CapabilityError> + Send>;
pub type PlaybackFactory =
    Box<dyn Fn(&ProviderConfig) -> Result<Box<dyn PlaybackHandle>, CapabilityError> + Send>;

/// Owns the map from serialized provider config to live handle. At most
/// one handle exists per distinct fingerprint; handles are constructed and
/// probed lazily on first resolution and released by `clear_cache`.
pub struct CapabilityRegistry {
    capture_factory: CaptureFactory,
    playback_factory: PlaybackFactory,
    captures: HashMap<String, Box<dyn CaptureHandle>>,
    playbacks: HashMap<String, Box<dyn PlaybackHandle>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::with_factories(
            Box::new(default_capture_factory),
            Box::new(default_playback_factory),
        )
    }

    /// Factory injection point, used by tests and embedders with their own
    /// providers.
    pub fn with_factories(capture: CaptureFactory, playback: PlaybackFactory) -> Self {
        Self {
            capture_factory: capture,
            playback_factory: playback,
            captures: HashMap::new(),
            playbacks: HashMap::new(),
        }
    }

    /// Resolves a capture handle: `None` for the "none" provider, a typed
    /// error when the probe fails or a credential is missing, otherwise the
    /// cached handle for this config fingerprint.
    pub fn get_capture(
        &mut self,
        config: &ProviderConfig,
    ) -> Result<Option<&mut (dyn CaptureHandle + '_)>, CapabilityError> {
        if config.is_none() {
            return Ok(None);
        }
        let key = config.fingerprint();
        if !self.captures.contains_key(&key) {
            debug!(provider = %config.provider, "constructing capture handle");
            let handle = (self.capture_factory)(config)?;
            self.captures.insert(key.clone(), handle);
        }
        match self.captures.get_mut(&key) {
            Some(handle) => Ok(Some(handle.as_mut())),
            None => Ok(None),
        }
    }

    pub fn get_playback(
        &mut self,
        config: &ProviderConfig,
    ) -> Result<Option<&mut (dyn PlaybackHandle + '_)>, CapabilityError> {
        if config.is_none() {
            return Ok(None);
        }
        let key = config.fingerprint();
        if !self.playbacks.contains_key(&key) {
            debug!(provider = %config.provider, "constructing playback handle");
            let handle = (self.playback_factory)(config)?;
            self.playbacks.insert(key.clone(), handle);
        }
        match self.playbacks.get_mut(&key) {
            Some(handle) => Ok(Some(handle.as_mut())),
            None => Ok(None),
        }
    }

    /// Cached-only lookup. Never constructs or probes; for exit actions
    /// that must not bring a handle up just to tear it down.
    pub fn cached_capture(
        &mut self,
        config: &ProviderConfig,
    ) -> Option<&mut (dyn CaptureHandle + '_)> {
        match self.captures.get_mut(&config.fingerprint()) {
            Some(handle) => Some(handle.as_mut()),
            None => None,
        }
    }

    pub fn cached_playback(
        &mut self,
        config: &ProviderConfig,
    ) -> Option<&mut (dyn PlaybackHandle + '_)> {
        match self.playbacks.get_mut(&config.fingerprint()) {
            Some(handle) => Some(handle.as_mut()),
            None => None,
        }
    }

    /// Releases and removes every handle. Callers must invoke this on
    /// credential rotation or shutdown.
    pub fn clear_cache(&mut self) {
        info!(
            captures = self.captures.len(),
            playbacks = self.playbacks.len(),
            "releasing capability handles"
        );
        for handle in self.captures.values_mut() {
            handle.stop_recording();
        }
        for handle in self.playbacks.values_mut() {
            handle.stop();
        }
        self.captures.clear();
        self.playbacks.clear();
    }

    pub fn cached_captures(&self) -> usize {
        self.captures.len()
    }

    pub fn cached_playbacks(&self) -> usize {
        self.playbacks.len()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn default_capture_factory(
    config: &ProviderConfig,
) -> Result<Box<dyn CaptureHandle>, CapabilityError> {
    match config.provider.as_str() {
        "cloud" => {
            if config.api_key.is_none() {
                return Err(CapabilityError::MissingCredential(config.provider.clone()));
            }
            probe_microphone()?;
            Ok(Box::new(MicCapture::new(config.clone())))
        }
        "system" => {
            probe_microphone()?;
            Ok(Box::new(MicCapture::new(config.clone())))
        }
        other => Err(CapabilityError::ProbeFailed(format!(
            "unknown capture provider '{other}'"
        ))),
    }
}

fn default_playback_factory(
    config: &ProviderConfig,
) -> Result<Box<dyn PlaybackHandle>, CapabilityError> {
    match config.provider.as_str() {
        "system" => Ok(Box::new(ProcessPlayback::new())),
        "cloud" => {
            if config.api_key.is_none() {
                return Err(CapabilityError::MissingCredential(config.provider.clone()));
            }
            Ok(Box::new(CloudPlayback::new(config.clone())))
        }
        other => Err(CapabilityError::ProbeFailed(format!(
            "unknown playback provider '{other}'"
        ))),
    }
}
