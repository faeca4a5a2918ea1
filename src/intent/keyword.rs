use super::types::{Intent, ParseErrorCode, ParseFailure, Suggestion, SuggestionKind};

/// Best-effort confidence assigned by the heuristic. Deliberately below the
/// pipeline's short-circuit floor so it only ever wins as a last resort.
pub const FALLBACK_CONFIDENCE: f32 = 0.6;

/// Confidence of the `unknown` fallback: low enough that the route guard
/// is the only thing standing between it and execution.
pub const UNKNOWN_CONFIDENCE: f32 = 0.3;

/// Tier-3 resolver: minimal keyword heuristic. Fails hard only for empty
/// input; ambiguous input yields the `unknown` fallback intent, which the
/// route guard diverts to recovery.
pub fn resolve(input: &str) -> Result<Intent, ParseFailure> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseFailure::new(
            ParseErrorCode::MissingInput,
            "no input to resolve",
        )
        .with_detail("text")
        .with_suggestion(Suggestion::new(
            SuggestionKind::Clarify,
            "Say or type a command first",
        )));
    }

    let lower = trimmed.to_lowercase();
    let has_word = |w: &str| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|tok| tok == w)
    };

    if has_word("create") || has_word("make") || has_word("write") {
        return Ok(Intent::new("create_file", FALLBACK_CONFIDENCE)
            .with_param("title", "untitled.txt")
            .with_param("content", trimmed)
            .with_param("path", ""));
    }
    if has_word("open") || has_word("launch") || has_word("show") {
        return Ok(Intent::new("open_item", FALLBACK_CONFIDENCE).with_param("target", trimmed));
    }
    if has_word("analyze")
        || has_word("analyse")
        || has_word("sum")
        || has_word("count")
        || has_word("average")
    {
        return Ok(Intent::new("analyze_sheet", FALLBACK_CONFIDENCE)
            .with_param("path", "")
            .with_param("op", "sum")
            .with_param("column", "value"));
    }

    // Nothing matched. Hand back the unknown intent rather than an error so
    // the route guard decides what to tell the user.
    Ok(Intent::new("unknown", UNKNOWN_CONFIDENCE).with_param("text", trimmed))
}
