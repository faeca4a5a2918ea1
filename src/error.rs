use thiserror::Error;

use crate::intent::types::ParseFailure;
use crate::remote::RemoteError;

/// Session-level failure taxonomy. Every async actor failure is converted
/// into one of these at its invocation site before the Recover transition
/// consumes it; none escape the session loop.
#[derive(Debug, Error)]
pub enum AuraError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(#[from] CapabilityError),

    #[error("intent resolution failed: {0}")]
    Parse(#[from] ParseFailure),

    #[error("execution failed: {0}")]
    Execution(#[from] RemoteError),

    #[error("operation aborted")]
    Aborted,

    #[error("operation cancelled by user")]
    VerificationDeclined,
}

/// Provider-layer errors. Probe failures and missing credentials surface as
/// `AuraError::CaptureUnavailable`; stream/playback faults are reported
/// through the handle's result channel.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("provider probe failed: {0}")]
    ProbeFailed(String),

    #[error("missing credential for provider '{0}'")]
    MissingCredential(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("playback error: {0}")]
    Playback(String),
}
