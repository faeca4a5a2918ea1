use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

use super::{PlaybackHandle, ProviderConfig, SpeakOptions};
use crate::error::CapabilityError;

#[cfg(target_os = "macos")]
const SPEECH_PROGRAM: &str = "say";
#[cfg(not(target_os = "macos"))]
const SPEECH_PROGRAM: &str = "espeak";

#[cfg(target_os = "macos")]
const AUDIO_PLAYER: &str = "afplay";
#[cfg(not(target_os = "macos"))]
const AUDIO_PLAYER: &str = "aplay";

/// OS speech-synthesis playback. Each utterance is a child process with a
/// kill-on-drop stop channel; stopping an idle handle is a no-op.
pub struct ProcessPlayback {
    program: String,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ProcessPlayback {
    pub fn new() -> Self {
        Self::with_program(SPEECH_PROGRAM)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stop_tx: None,
        }
    }
}

impl Default for ProcessPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackHandle for ProcessPlayback {
    fn speak(
        &mut self,
        text: &str,
        opts: &SpeakOptions,
    ) -> oneshot::Receiver<Result<(), CapabilityError>> {
        // Playback is exclusive per session.
        self.stop();

        let (done_tx, done_rx) = oneshot::channel();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let program = self.program.clone();
        let text = text.to_string();
        let voice = opts.voice.clone();
        tokio::spawn(async move {
            let mut command = tokio::process::Command::new(&program);
            if let Some(voice) = &voice {
                command.arg("-v").arg(voice);
            }
            match command.arg(&text).kill_on_drop(true).spawn() {
                Ok(mut child) => {
                    tokio::select! {
                        status = child.wait() => {
                            let _ = done_tx.send(
                                status
                                    .map(|_| ())
                                    .map_err(|e| CapabilityError::Playback(e.to_string())),
                            );
                        }
                        _ = &mut stop_rx => {
                            let _ = child.kill().await;
                            let _ = done_tx.send(Ok(()));
                        }
                    }
                }
                Err(e) => {
                    warn!("failed to spawn '{program}': {e}");
                    let _ = done_tx.send(Err(CapabilityError::Playback(e.to_string())));
                }
            }
        });

        done_rx
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Cloud TTS playback: fetches synthesized audio bytes from the configured
/// endpoint, then plays them through an OS audio player process.
pub struct CloudPlayback {
    config: ProviderConfig,
    http: reqwest::Client,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl CloudPlayback {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            stop_tx: None,
        }
    }
}

impl PlaybackHandle for CloudPlayback {
    fn speak(
        &mut self,
        text: &str,
        _opts: &SpeakOptions,
    ) -> oneshot::Receiver<Result<(), CapabilityError>> {
        self.stop();

        let (done_tx, done_rx) = oneshot::channel();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let http = self.http.clone();
        let endpoint = self.config.endpoint.clone();
        let api_key = self.config.api_key.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let fetched = async {
                let endpoint = endpoint.ok_or_else(|| {
                    CapabilityError::Playback("no synthesis endpoint configured".to_string())
                })?;
                let mut request = http.post(&endpoint).json(&serde_json::json!({ "text": text }));
                if let Some(key) = &api_key {
                    request = request.bearer_auth(key);
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| CapabilityError::Playback(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(CapabilityError::Playback(format!(
                        "synthesis endpoint returned {}",
                        response.status()
                    )));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| CapabilityError::Playback(e.to_string()))?;
                let path = std::env::temp_dir().join(format!("aura-tts-{}.wav", Uuid::new_v4()));
                tokio::fs::write(&path, &bytes)
                    .await
                    .map_err(|e| CapabilityError::Playback(e.to_string()))?;
                Ok(path)
            }
            .await;

            match fetched {
                Err(e) => {
                    let _ = done_tx.send(Err(e));
                }
                Ok(path) => {
                    match tokio::process::Command::new(AUDIO_PLAYER)
                        .arg(&path)
                        .kill_on_drop(true)
                        .spawn()
                    {
                        Ok(mut child) => {
                            tokio::select! {
                                status = child.wait() => {
                                    let _ = done_tx.send(
                                        status
                                            .map(|_| ())
                                            .map_err(|e| CapabilityError::Playback(e.to_string())),
                                    );
                                }
                                _ = &mut stop_rx => {
                                    let _ = child.kill().await;
                                    let _ = done_tx.send(Ok(()));
                                }
                            }
                        }
                        Err(e) => {
                            let _ = done_tx.send(Err(CapabilityError::Playback(e.to_string())));
                        }
                    }
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        });

        done_rx
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}
