use crate::intent::Intent;
use crate::remote::ExecutionResult;
use crate::settings::Settings;

/// The session occupies exactly one of these at a time. No terminal
/// state; every path cycles back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantState {
    Idle,
    Capture,
    ParseIntent,
    Route,
    Execute,
    Verify,
    Respond,
    Recover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Text,
    Voice,
}

/// Strict context delta. This is the only way session context mutates,
/// and only transition actions emit them.
#[derive(Debug, Clone)]
pub enum ContextDelta {
    VisibilityToggled,
    InputStored(String),
    IntentStored(Intent),
    ResultStored(ExecutionResult),
    ErrorSet(String),
    ErrorCleared,
    SettingsApplied(Settings),
    InputModeSet(InputMode),
}

/// Mutable session state, exclusively owned by the Orchestrator.
#[derive(Debug, Default)]
pub struct AssistantContext {
    pub input: Option<String>,
    pub last_intent: Option<Intent>,
    pub last_result: Option<ExecutionResult>,
    /// Non-null only transiently around the Recover state.
    pub error: Option<String>,
    pub settings: Settings,
    pub visible: bool,
    pub input_mode: InputMode,
}

impl AssistantContext {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Pure reduction: context + delta -> mutated context.
    pub fn reduce(&mut self, delta: ContextDelta) {
        match delta {
            ContextDelta::VisibilityToggled => self.visible = !self.visible,
            ContextDelta::InputStored(input) => self.input = Some(input),
            ContextDelta::IntentStored(intent) => self.last_intent = Some(intent),
            ContextDelta::ResultStored(result) => self.last_result = Some(result),
            ContextDelta::ErrorSet(message) => self.error = Some(message),
            ContextDelta::ErrorCleared => self.error = None,
            ContextDelta::SettingsApplied(settings) => self.settings = settings,
            ContextDelta::InputModeSet(mode) => self.input_mode = mode,
        }
    }
}
