pub mod event;
pub mod orchestrator;
pub mod state;

pub use event::SessionEvent;
pub use orchestrator::Orchestrator;
pub use state::{AssistantContext, AssistantState, ContextDelta, InputMode};
