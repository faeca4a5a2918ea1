use tracing::{debug, info};

use super::keyword;
use super::patterns::PatternMatcher;
use super::remote::RemoteParser;
use super::types::{Intent, ParseErrorCode, ParseFailure};
use crate::settings::Settings;

/// A tier claims the input outright when its intent scores at or above
/// this floor; below it the next tier gets a chance.
pub const CONFIDENCE_FLOOR: f32 = 0.7;

/// Tiered, short-circuiting resolver: local pattern matcher, then the
/// remote language-model parser (when settings allow), then a keyword
/// heuristic. Effectively a small rule engine evaluated in order with
/// early exit.
#[derive(Debug, Clone)]
pub struct IntentPipeline {
    patterns: PatternMatcher,
    remote: RemoteParser,
}

impl IntentPipeline {
    pub fn new(parser_url: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: PatternMatcher::new()?,
            remote: RemoteParser::new(parser_url),
        })
    }

    pub async fn resolve(
        &self,
        input: &str,
        settings: &Settings,
    ) -> Result<Intent, ParseFailure> {
        // Empty input never reaches the remote tier.
        if input.trim().is_empty() {
            return keyword::resolve(input);
        }

        // Tier 1: local patterns. Validation failures are hard stops.
        let mut held: Option<Intent> = None;
        match self.patterns.try_resolve(input) {
            Some(Err(failure)) => return Err(failure),
            Some(Ok(intent)) if intent.confidence >= CONFIDENCE_FLOOR => {
                debug!(action = %intent.action, confidence = intent.confidence, "tier-1 match");
                return Ok(intent);
            }
            Some(Ok(intent)) => held = Some(intent),
            None => {}
        }

        // Tier 2: remote parser, gated on settings.
        let mut remote_failure: Option<ParseFailure> = None;
        if settings.allow_remote_intent_resolution {
            match self
                .remote
                .parse(input, settings.api_key.as_deref())
                .await
            {
                Ok(intent) => {
                    debug!(action = %intent.action, confidence = intent.confidence, "tier-2 match");
                    return Ok(intent);
                }
                Err(failure) if failure.is_hard() => return Err(failure),
                Err(failure) => remote_failure = Some(failure),
            }
        }

        // Tier 3: keyword heuristic. When it lands on `unknown`, a held
        // sub-floor tier-1 intent or a structured remote rejection is more
        // useful than the generic fallback; transport faults are not.
        let intent = keyword::resolve(input)?;
        if intent.action == "unknown" {
            if let Some(held) = held {
                return Ok(held);
            }
            if let Some(f) = remote_failure {
                if f.code != ParseErrorCode::RemoteUnavailable {
                    return Err(f);
                }
            }
        }
        info!(action = %intent.action, "keyword fallback resolved intent");
        Ok(intent)
    }
}
