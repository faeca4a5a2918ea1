pub mod keyword;
pub mod patterns;
pub mod pipeline;
pub mod remote;
pub mod types;

pub use pipeline::{IntentPipeline, CONFIDENCE_FLOOR};
pub use types::{Intent, ParseErrorCode, ParseFailure, Suggestion, SuggestionKind};
