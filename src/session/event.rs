use super::state::InputMode;
use crate::intent::{Intent, ParseFailure};
use crate::progress::ProgressEvent;
use crate::remote::{ExecutionResult, RemoteError};
use crate::settings::Settings;

/// Everything the session loop reacts to: external signals from the
/// surface, and epoch-tagged completions delivered by async actors.
/// Stale completions (epoch mismatch) are silently discarded.
#[derive(Debug)]
pub enum SessionEvent {
    // External signals.
    ToggleVisibility,
    TextSubmit(String),
    StartCapture,
    StopCapture,
    Cancel,
    VerifyOk,
    VerifyErr,
    SettingsChanged(Settings),
    SetInputMode(InputMode),

    // Actor completions.
    SttResult { epoch: u64, transcript: String },
    CaptureFailed { epoch: u64, message: String },
    IntentResolved { epoch: u64, result: Result<Intent, ParseFailure> },
    Executed { epoch: u64, result: Result<ExecutionResult, RemoteError> },
    Responded { epoch: u64 },
    DwellElapsed { epoch: u64 },
    Progress { epoch: u64, event: ProgressEvent },
}
