//! State machine coverage driven through `dispatch` directly. Actors are
//! still spawned but their completions are ignored; tests feed the
//! epoch-tagged events by hand.

use std::sync::Arc;
use std::time::Duration;

use aura_core::capability::CapabilityRegistry;
use aura_core::intent::{Intent, IntentPipeline, ParseErrorCode, ParseFailure};
use aura_core::remote::{ExecutionResult, RemoteClient, RemoteError};
use aura_core::session::{AssistantState, InputMode, Orchestrator, SessionEvent};
use aura_core::settings::Settings;
use aura_core::progress::{ProgressEvent, ProgressPhase};

fn silent_settings() -> Settings {
    Settings {
        allow_remote_intent_resolution: false,
        tts_provider: "none".to_string(),
        ..Settings::default()
    }
}

fn harness() -> Orchestrator {
    let pipeline =
        Arc::new(IntentPipeline::new("http://127.0.0.1:9/api/parse-intent").expect("patterns"));
    let client = Arc::new(RemoteClient::new("http://127.0.0.1:9"));
    let mut orch = Orchestrator::new(
        silent_settings(),
        CapabilityRegistry::new(),
        pipeline,
        client,
    );
    orch.set_dwell_periods(Duration::from_millis(10), Duration::from_millis(10));
    orch
}

fn created_result(requires_verification: bool) -> ExecutionResult {
    ExecutionResult {
        success: true,
        message: "created notes.txt".to_string(),
        requires_verification,
        data: None,
    }
}

/// Drives Idle -> ParseIntent -> Route -> Execute with a resolved intent.
fn drive_to_execute(orch: &mut Orchestrator) {
    orch.dispatch(SessionEvent::TextSubmit("create notes.txt".to_string()));
    assert_eq!(orch.state(), AssistantState::ParseIntent);
    orch.dispatch(SessionEvent::IntentResolved {
        epoch: orch.epoch(),
        result: Ok(Intent::new("create_file", 0.9).with_param("title", "notes.txt")),
    });
    assert_eq!(orch.state(), AssistantState::Execute);
}

#[tokio::test]
async fn toggle_flips_visibility_in_idle() {
    let mut orch = harness();
    assert!(!orch.context().visible);
    orch.dispatch(SessionEvent::ToggleVisibility);
    assert!(orch.context().visible);
    assert_eq!(orch.state(), AssistantState::Idle);
    orch.dispatch(SessionEvent::ToggleVisibility);
    assert!(!orch.context().visible);
}

#[tokio::test]
async fn text_submit_enters_parse_intent_and_stores_input() {
    let mut orch = harness();
    orch.dispatch(SessionEvent::TextSubmit("open the report".to_string()));
    assert_eq!(orch.state(), AssistantState::ParseIntent);
    assert_eq!(orch.context().input.as_deref(), Some("open the report"));
}

#[tokio::test]
async fn text_submit_is_ignored_in_voice_mode() {
    let mut orch = harness();
    orch.dispatch(SessionEvent::SetInputMode(InputMode::Voice));
    orch.dispatch(SessionEvent::TextSubmit("open the report".to_string()));
    assert_eq!(orch.state(), AssistantState::Idle, "voice mode rejects typed input");
}

#[tokio::test]
async fn voice_capture_is_gated_on_the_configured_provider() {
    let mut orch = harness();
    assert!(!orch.can_start_voice(), "default stt provider is none");
    orch.dispatch(SessionEvent::StartCapture);
    assert_eq!(orch.state(), AssistantState::Idle);
}

#[tokio::test]
async fn resolved_intent_routes_to_execute() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    assert_eq!(
        orch.context().last_intent.as_ref().map(|i| i.action.as_str()),
        Some("create_file")
    );
}

#[tokio::test]
async fn unknown_action_is_diverted_to_recover() {
    let mut orch = harness();
    orch.dispatch(SessionEvent::TextSubmit("gibberish".to_string()));
    orch.dispatch(SessionEvent::IntentResolved {
        epoch: orch.epoch(),
        result: Ok(Intent::new("unknown", 0.3)),
    });
    assert_eq!(orch.state(), AssistantState::Recover);
    assert!(orch.context().error.is_some(), "route rejection sets the error");
}

#[tokio::test]
async fn parse_failure_recovers_with_error() {
    let mut orch = harness();
    orch.dispatch(SessionEvent::TextSubmit("create <bad>".to_string()));
    orch.dispatch(SessionEvent::IntentResolved {
        epoch: orch.epoch(),
        result: Err(ParseFailure::new(
            ParseErrorCode::InvalidParameter,
            "filename contains invalid characters",
        )),
    });
    assert_eq!(orch.state(), AssistantState::Recover);
    assert!(orch
        .context()
        .error
        .as_deref()
        .is_some_and(|e| e.contains("invalid characters")));
}

#[tokio::test]
async fn stale_completions_are_discarded() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    let stale = orch.epoch() - 1;
    orch.dispatch(SessionEvent::Executed {
        epoch: stale,
        result: Ok(created_result(false)),
    });
    assert_eq!(orch.state(), AssistantState::Execute, "stale epoch must not transition");
    orch.dispatch(SessionEvent::IntentResolved {
        epoch: stale,
        result: Ok(Intent::new("open_item", 0.9)),
    });
    assert_eq!(orch.state(), AssistantState::Execute);
}

#[tokio::test]
async fn cancel_during_execute_recovers_in_one_dispatch() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Cancel);
    assert_eq!(orch.state(), AssistantState::Recover);
    assert!(orch.context().error.is_some());
    // The tracker reflects the abort immediately.
    assert_eq!(
        orch.tracker().current().map(|e| e.phase),
        Some(ProgressPhase::Error)
    );
}

#[tokio::test]
async fn progress_events_reach_the_tracker() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Progress {
        epoch: orch.epoch(),
        event: ProgressEvent::new(ProgressPhase::Processing, 50, "processing"),
    });
    assert_eq!(
        orch.tracker().current().map(|e| e.percent),
        Some(50),
        "live progress must be observable"
    );
}

#[tokio::test]
async fn execution_requiring_verification_enters_verify() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Executed {
        epoch: orch.epoch(),
        result: Ok(created_result(true)),
    });
    assert_eq!(orch.state(), AssistantState::Verify);

    orch.dispatch(SessionEvent::VerifyOk);
    assert_eq!(orch.state(), AssistantState::Respond);
}

#[tokio::test]
async fn declined_verification_recovers() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Executed {
        epoch: orch.epoch(),
        result: Ok(created_result(true)),
    });
    orch.dispatch(SessionEvent::VerifyErr);
    assert_eq!(orch.state(), AssistantState::Recover);
    assert!(orch.context().error.is_some());
}

#[tokio::test]
async fn cancel_in_verify_returns_to_idle_without_error() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Executed {
        epoch: orch.epoch(),
        result: Ok(created_result(true)),
    });
    orch.dispatch(SessionEvent::Cancel);
    assert_eq!(orch.state(), AssistantState::Idle);
    assert!(orch.context().error.is_none());
}

#[tokio::test]
async fn unverified_execution_responds_then_dwells_back_to_idle() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Executed {
        epoch: orch.epoch(),
        result: Ok(created_result(false)),
    });
    assert_eq!(orch.state(), AssistantState::Respond);

    orch.dispatch(SessionEvent::Responded { epoch: orch.epoch() });
    assert_eq!(orch.state(), AssistantState::Respond);
    orch.dispatch(SessionEvent::DwellElapsed { epoch: orch.epoch() });
    assert_eq!(orch.state(), AssistantState::Idle);
}

#[tokio::test]
async fn cancel_in_respond_cuts_playback_and_returns_to_idle() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Executed {
        epoch: orch.epoch(),
        result: Ok(created_result(false)),
    });
    orch.dispatch(SessionEvent::Cancel);
    assert_eq!(orch.state(), AssistantState::Idle);
}

#[tokio::test]
async fn aborted_execution_maps_to_the_abort_error() {
    let mut orch = harness();
    drive_to_execute(&mut orch);
    orch.dispatch(SessionEvent::Executed {
        epoch: orch.epoch(),
        result: Err(RemoteError::aborted()),
    });
    assert_eq!(orch.state(), AssistantState::Recover);
}

#[tokio::test]
async fn recover_accepts_a_fresh_command() {
    let mut orch = harness();
    orch.dispatch(SessionEvent::TextSubmit("gibberish".to_string()));
    orch.dispatch(SessionEvent::IntentResolved {
        epoch: orch.epoch(),
        result: Ok(Intent::new("unknown", 0.3)),
    });
    assert_eq!(orch.state(), AssistantState::Recover);

    orch.dispatch(SessionEvent::TextSubmit("open notes.txt".to_string()));
    assert_eq!(orch.state(), AssistantState::ParseIntent);
    assert!(orch.context().error.is_none(), "retry clears the error");
}

#[tokio::test]
async fn recover_dwell_clears_the_error_and_idles() {
    let mut orch = harness();
    orch.dispatch(SessionEvent::TextSubmit("gibberish".to_string()));
    orch.dispatch(SessionEvent::IntentResolved {
        epoch: orch.epoch(),
        result: Ok(Intent::new("unknown", 0.3)),
    });
    orch.dispatch(SessionEvent::DwellElapsed { epoch: orch.epoch() });
    assert_eq!(orch.state(), AssistantState::Idle);
    assert!(orch.context().error.is_none());
}

#[tokio::test]
async fn settings_apply_between_transitions() {
    let mut orch = harness();
    let mut settings = silent_settings();
    settings.stt_provider = "cloud".to_string();
    orch.dispatch(SessionEvent::SettingsChanged(settings));
    assert_eq!(orch.state(), AssistantState::Idle);
    assert_eq!(orch.context().settings.stt_provider, "cloud");
    assert!(orch.can_start_voice());
}

#[tokio::test]
async fn run_loop_consumes_events_from_the_sender() {
    let mut orch = harness();
    orch.set_dwell_periods(Duration::from_millis(5), Duration::from_millis(5));
    let events = orch.sender();
    let session = tokio::spawn(orch.run());

    events
        .send(SessionEvent::ToggleVisibility)
        .expect("loop alive");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!session.is_finished(), "loop keeps running between events");
    session.abort();
    assert!(session.await.expect_err("aborted").is_cancelled());
}
