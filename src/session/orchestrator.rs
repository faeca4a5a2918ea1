use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::SessionEvent;
use super::state::{AssistantContext, AssistantState, ContextDelta, InputMode};
use crate::capability::{CapabilityRegistry, CaptureEvent, ProviderConfig, SpeakOptions};
use crate::error::{AuraError, CapabilityError};
use crate::intent::{Intent, IntentPipeline};
use crate::progress::ProgressTracker;
use crate::remote::{ExecuteOptions, RemoteClient, RemoteErrorCode};
use crate::settings::Settings;

/// Dwell before Respond auto-returns to Idle.
pub const RESPOND_DWELL: Duration = Duration::from_secs(5);
/// Dwell before Recover auto-returns to Idle.
pub const RECOVER_DWELL: Duration = Duration::from_secs(3);

/// The state machine composing capture, intent resolution, execution,
/// verification and response into one command lifecycle.
///
/// Events are serialized through a single queue; all long-running work is
/// spawned actors that resume the machine by delivering epoch-tagged
/// events. At most one actor is in flight per state: every transition
/// cancels the previous actor's token and bumps the epoch, so completions
/// from an abnormal exit are discarded as stale.
pub struct Orchestrator {
    state: AssistantState,
    context: AssistantContext,
    registry: CapabilityRegistry,
    pipeline: Arc<IntentPipeline>,
    client: Arc<RemoteClient>,
    tracker: ProgressTracker,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    epoch: u64,
    actor: Option<CancellationToken>,
    capture_config: Option<ProviderConfig>,
    respond_dwell: Duration,
    recover_dwell: Duration,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        registry: CapabilityRegistry,
        pipeline: Arc<IntentPipeline>,
        client: Arc<RemoteClient>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: AssistantState::Idle,
            context: AssistantContext::with_settings(settings),
            registry,
            pipeline,
            client,
            tracker: ProgressTracker::new(),
            rx,
            tx,
            epoch: 0,
            actor: None,
            capture_config: None,
            respond_dwell: RESPOND_DWELL,
            recover_dwell: RECOVER_DWELL,
        }
    }

    /// Shortened dwell periods for embedders that manage their own pacing.
    pub fn set_dwell_periods(&mut self, respond: Duration, recover: Duration) {
        self.respond_dwell = respond;
        self.recover_dwell = recover;
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.tx.clone()
    }

    pub fn state(&self) -> AssistantState {
        self.state
    }

    pub fn context(&self) -> &AssistantContext {
        &self.context
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn can_start_voice(&self) -> bool {
        self.context.settings.stt_provider != "none"
    }

    /// Async driver loop. The session task is the queue's only consumer,
    /// so the machine is never invoked concurrently by two events.
    pub async fn run(mut self) {
        info!("session loop started");
        while let Some(event) = self.rx.recv().await {
            self.dispatch(event);
        }
        info!("session loop stopped");
    }

    /// Explicit dispatcher over `(state, event)` pairs. Events not matching
    /// the current state's transitions are silently ignored, never thrown.
    pub fn dispatch(&mut self, event: SessionEvent) {
        // Settings and mode updates apply atomically between transitions,
        // whatever state the machine is in. Handles re-resolve lazily.
        let event = match event {
            SessionEvent::SettingsChanged(settings) => {
                self.context.reduce(ContextDelta::SettingsApplied(settings));
                return;
            }
            SessionEvent::SetInputMode(mode) => {
                self.context.reduce(ContextDelta::InputModeSet(mode));
                return;
            }
            other => other,
        };

        match (self.state, event) {
            (AssistantState::Idle, SessionEvent::ToggleVisibility) => {
                self.context.reduce(ContextDelta::VisibilityToggled);
            }
            (AssistantState::Idle, SessionEvent::TextSubmit(text))
                if self.context.input_mode == InputMode::Text =>
            {
                self.context.reduce(ContextDelta::InputStored(text.clone()));
                self.enter_parse_intent(text);
            }
            (AssistantState::Idle, SessionEvent::StartCapture) if self.can_start_voice() => {
                self.enter_capture();
            }

            (AssistantState::Capture, SessionEvent::StopCapture) => {
                self.request_capture_stop();
            }
            (AssistantState::Capture, SessionEvent::SttResult { epoch, transcript })
                if epoch == self.epoch =>
            {
                self.stop_capture();
                if transcript.trim().is_empty() {
                    self.fail("no speech detected");
                } else {
                    self.context
                        .reduce(ContextDelta::InputStored(transcript.clone()));
                    self.enter_parse_intent(transcript);
                }
            }
            (AssistantState::Capture, SessionEvent::CaptureFailed { epoch, message })
                if epoch == self.epoch =>
            {
                self.stop_capture();
                self.fail(message);
            }
            (AssistantState::Capture, SessionEvent::Cancel)
            | (AssistantState::Capture, SessionEvent::ToggleVisibility) => {
                self.stop_capture();
                self.to_idle();
            }

            (AssistantState::ParseIntent, SessionEvent::IntentResolved { epoch, result })
                if epoch == self.epoch =>
            {
                match result {
                    Ok(intent) => {
                        self.context
                            .reduce(ContextDelta::IntentStored(intent.clone()));
                        self.enter_route(intent);
                    }
                    Err(failure) => self.fail(AuraError::Parse(failure).to_string()),
                }
            }

            (AssistantState::Execute, SessionEvent::Executed { epoch, result })
                if epoch == self.epoch =>
            {
                match result {
                    Ok(result) => {
                        self.context
                            .reduce(ContextDelta::ResultStored(result.clone()));
                        if result.requires_verification {
                            self.enter_verify(result.message);
                        } else {
                            self.enter_respond(result.message);
                        }
                    }
                    Err(err) if err.code == RemoteErrorCode::Aborted => {
                        self.fail(AuraError::Aborted.to_string());
                    }
                    Err(err) => self.fail(AuraError::Execution(err).to_string()),
                }
            }
            (AssistantState::Execute, SessionEvent::Cancel) => {
                self.tracker.cancel();
                self.fail(AuraError::Aborted.to_string());
            }

            (AssistantState::Verify, SessionEvent::VerifyOk) => {
                let message = self
                    .context
                    .last_result
                    .as_ref()
                    .map(|r| r.message.clone())
                    .unwrap_or_default();
                self.enter_respond(message);
            }
            (AssistantState::Verify, SessionEvent::VerifyErr) => {
                self.fail(AuraError::VerificationDeclined.to_string());
            }
            (AssistantState::Verify, SessionEvent::Cancel) => {
                self.to_idle();
            }

            (AssistantState::Respond, SessionEvent::Responded { epoch })
                if epoch == self.epoch =>
            {
                self.spawn_dwell(self.respond_dwell);
            }
            (AssistantState::Respond, SessionEvent::DwellElapsed { epoch })
                if epoch == self.epoch =>
            {
                self.to_idle();
            }
            (AssistantState::Respond, SessionEvent::ToggleVisibility)
            | (AssistantState::Respond, SessionEvent::Cancel) => {
                self.stop_playback();
                self.to_idle();
            }

            (AssistantState::Recover, SessionEvent::DwellElapsed { epoch })
                if epoch == self.epoch =>
            {
                self.context.reduce(ContextDelta::ErrorCleared);
                self.to_idle();
            }
            (AssistantState::Recover, SessionEvent::TextSubmit(text)) => {
                self.context.reduce(ContextDelta::ErrorCleared);
                self.context.reduce(ContextDelta::InputStored(text.clone()));
                self.enter_parse_intent(text);
            }

            (_, SessionEvent::Progress { epoch, event }) if epoch == self.epoch => {
                self.tracker.observe(event);
            }

            // Everything else is not a transition of the current state.
            (state, event) => {
                debug!(?state, ?event, "event ignored");
            }
        }
    }

    /// Leaves the current state: cancels any actor left over from an
    /// abnormal exit and bumps the epoch so its completions go stale.
    fn begin_state(&mut self, next: AssistantState) {
        if let Some(token) = self.actor.take() {
            token.cancel();
        }
        self.epoch += 1;
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "transition");
        }
        self.state = next;
    }

    fn to_idle(&mut self) {
        self.begin_state(AssistantState::Idle);
    }

    /// Sets `error` exactly once, then enters Recover: speak the error and
    /// arm the auto-dismiss dwell.
    fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("entering recover: {message}");
        self.context.reduce(ContextDelta::ErrorSet(message.clone()));
        self.begin_state(AssistantState::Recover);
        let _ = self.speak_best_effort(&message);
        self.spawn_dwell(self.recover_dwell);
    }

    fn enter_parse_intent(&mut self, input: String) {
        self.begin_state(AssistantState::ParseIntent);
        let token = CancellationToken::new();
        self.actor = Some(token.clone());

        let pipeline = self.pipeline.clone();
        let settings = self.context.settings.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = pipeline.resolve(&input, &settings) => {
                    let _ = tx.send(SessionEvent::IntentResolved { epoch, result });
                }
            }
        });
    }

    /// Pure guard, no async work. The literal string comparison is
    /// deliberate: case or locale variants of "unknown" stay routable.
    fn enter_route(&mut self, intent: Intent) {
        self.begin_state(AssistantState::Route);
        if intent.action != "unknown" {
            self.enter_execute(intent);
        } else {
            self.fail("could not understand the command");
        }
    }

    fn enter_execute(&mut self, intent: Intent) {
        self.begin_state(AssistantState::Execute);
        let token = CancellationToken::new();
        self.actor = Some(token.clone());
        self.tracker.clear_history();
        self.tracker.set_cancel_hook({
            let token = token.clone();
            move || token.cancel()
        });

        // Progress flows back through the session queue, epoch-tagged, so
        // the tracker only ever sees the live execution.
        let (ptx, mut prx) = mpsc::unbounded_channel();
        {
            let tx = self.tx.clone();
            let epoch = self.epoch;
            tokio::spawn(async move {
                while let Some(event) = prx.recv().await {
                    let _ = tx.send(SessionEvent::Progress { epoch, event });
                }
            });
        }

        let client = self.client.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let action = intent.action.clone();
        let payload = serde_json::Value::Object(intent.parameters.clone());
        let opts = ExecuteOptions {
            cancel: token,
            ..Default::default()
        };
        tokio::spawn(async move {
            let result = client.execute(&action, payload, &opts, Some(&ptx)).await;
            let _ = tx.send(SessionEvent::Executed { epoch, result });
        });
    }

    fn enter_capture(&mut self) {
        self.begin_state(AssistantState::Capture);
        let config = self.context.settings.stt_config();
        match self.registry.get_capture(&config) {
            Ok(Some(handle)) => {
                let mut stream = handle.start_recording();
                self.capture_config = Some(config);
                let tx = self.tx.clone();
                let epoch = self.epoch;
                tokio::spawn(async move {
                    while let Some(event) = stream.recv().await {
                        match event {
                            CaptureEvent::Partial(text) => {
                                debug!("partial transcript: {text}");
                            }
                            CaptureEvent::Final(transcript) => {
                                let _ = tx.send(SessionEvent::SttResult { epoch, transcript });
                                break;
                            }
                            CaptureEvent::Error(message) => {
                                let _ =
                                    tx.send(SessionEvent::CaptureFailed { epoch, message });
                                break;
                            }
                        }
                    }
                });
            }
            Ok(None) => self.fail("voice capture is disabled"),
            Err(e) => self.fail(AuraError::CaptureUnavailable(e).to_string()),
        }
    }

    /// Asks the live capture for its final result without releasing it;
    /// the machine stays in Capture until that result arrives.
    fn request_capture_stop(&mut self) {
        if let Some(config) = self.capture_config.clone() {
            if let Some(handle) = self.registry.cached_capture(&config) {
                handle.stop_recording();
            }
        }
    }

    /// Capture exit action: stop recording and release the handle binding.
    /// Cached-only lookup so a cache cleared mid-capture never constructs
    /// a fresh handle just to stop it.
    fn stop_capture(&mut self) {
        if let Some(config) = self.capture_config.take() {
            if let Some(handle) = self.registry.cached_capture(&config) {
                handle.stop_recording();
            }
        }
    }

    fn enter_verify(&mut self, message: String) {
        self.begin_state(AssistantState::Verify);
        let prompt = format!("{message}. Should I proceed?");
        let _ = self.speak_best_effort(&prompt);
    }

    fn enter_respond(&mut self, message: String) {
        self.begin_state(AssistantState::Respond);
        let done = self.speak_best_effort(&message);
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            if let Some(receiver) = done {
                if let Ok(Err(e)) = receiver.await {
                    // A response that fails to play is not a command
                    // failure; the dwell still runs.
                    warn!("response playback failed: {e}");
                }
            }
            let _ = tx.send(SessionEvent::Responded { epoch });
        });
    }

    fn spawn_dwell(&self, dwell: Duration) {
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            let _ = tx.send(SessionEvent::DwellElapsed { epoch });
        });
    }

    fn speak_best_effort(
        &mut self,
        text: &str,
    ) -> Option<oneshot::Receiver<Result<(), CapabilityError>>> {
        let config = self.context.settings.tts_config();
        match self.registry.get_playback(&config) {
            Ok(Some(handle)) => Some(handle.speak(text, &SpeakOptions::default())),
            Ok(None) => None,
            Err(e) => {
                warn!("playback unavailable: {e}");
                None
            }
        }
    }

    fn stop_playback(&mut self) {
        let config = self.context.settings.tts_config();
        if let Some(handle) = self.registry.cached_playback(&config) {
            handle.stop();
        }
    }
}
