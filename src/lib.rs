pub mod capability;
pub mod error;
pub mod intent;
pub mod progress;
pub mod remote;
pub mod session;
pub mod settings;

pub use error::AuraError;
pub use session::Orchestrator;
pub use settings::Settings;
