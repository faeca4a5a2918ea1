use regex::Regex;

use super::types::{Intent, ParseErrorCode, ParseFailure, Suggestion, SuggestionKind};

/// Hard ceiling on extracted filenames; anything longer is rejected
/// instead of defaulted.
pub const MAX_FILENAME_LEN: usize = 255;
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Tier-1 resolver: scores input against fixed pattern families and
/// extracts parameters for the matched family.
///
/// Families, in evaluation order: spreadsheet-analysis, document-
/// summarization, file-creation, item-opening. The first family whose
/// trigger fires claims the input.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    quoted: Regex,
    path_token: Regex,
    sheet_path: Regex,
    sheet_trigger: Regex,
    column: Regex,
    summary_trigger: Regex,
    create_trigger: Regex,
    content_tail: Regex,
    open_trigger: Regex,
}

impl PatternMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            quoted: Regex::new(r#""([^"]+)"|'([^']+)'"#)?,
            path_token: Regex::new(r"(?i)([\w.-]+\.[a-z0-9]{1,8})\b")?,
            sheet_path: Regex::new(r"(?i)([\w.-]+\.(?:csv|xlsx|xls))\b")?,
            sheet_trigger: Regex::new(
                r"(?i)\b(sum|total|average|avg|mean|count|analy[sz]e|calculate)\b",
            )?,
            column: Regex::new(r"(?i)\b(?:the\s+)?([a-z_]\w*)\s+columns?\b")?,
            summary_trigger: Regex::new(r"(?i)\b(summar(?:y|ize|ise)|tl;?dr)\b")?,
            create_trigger: Regex::new(
                r"(?i)\b(create|make|new|write)\b.*\b(file|document|note|notes)\b",
            )?,
            content_tail: Regex::new(r"(?i)\b(?:with (?:the )?content|containing|that says)\s+(.+)$")?,
            open_trigger: Regex::new(r"(?i)\b(open|launch|show)\b")?,
        })
    }

    /// Tier contract: `None` when no family matches, `Some(Err)` only for
    /// hard validation failures (filename length/characters).
    pub fn try_resolve(&self, input: &str) -> Option<Result<Intent, ParseFailure>> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if let Some(result) = self.match_spreadsheet(input) {
            return Some(result);
        }
        if let Some(result) = self.match_summary(input) {
            return Some(result);
        }
        if let Some(result) = self.match_create(input) {
            return Some(result);
        }
        if let Some(result) = self.match_open(input) {
            return Some(result);
        }
        None
    }

    fn match_spreadsheet(&self, input: &str) -> Option<Result<Intent, ParseFailure>> {
        if !self.sheet_trigger.is_match(input) {
            return None;
        }
        let path = self
            .sheet_path
            .captures(input)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())?;
        if let Err(failure) = validate_filename(&path) {
            return Some(Err(failure));
        }

        let op = map_sheet_op(input);
        let column = self
            .column
            .captures(input)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase());
        // Column defaults to "value" when the utterance never names one.
        let confidence = if column.is_some() { 0.92 } else { 0.75 };
        let intent = Intent::new("analyze_sheet", confidence)
            .with_param("path", path)
            .with_param("op", op)
            .with_param("column", column.unwrap_or_else(|| "value".to_string()));
        Some(Ok(intent))
    }

    fn match_summary(&self, input: &str) -> Option<Result<Intent, ParseFailure>> {
        if !self.summary_trigger.is_match(input) {
            return None;
        }
        let path = self.quoted_text(input).or_else(|| self.trailing_path(input));
        if let Some(ref p) = path {
            if let Err(failure) = validate_filename(p) {
                return Some(Err(failure));
            }
        }
        let confidence = if path.is_some() { 0.85 } else { 0.7 };
        let intent = Intent::new("summarize_doc", confidence)
            .with_param("path", path.unwrap_or_default())
            .with_param("length", map_summary_length(input));
        Some(Ok(intent))
    }

    fn match_create(&self, input: &str) -> Option<Result<Intent, ParseFailure>> {
        if !self.create_trigger.is_match(input) {
            return None;
        }
        let title = self.quoted_text(input).or_else(|| self.trailing_path(input));
        if let Some(ref t) = title {
            if let Err(failure) = validate_filename(t) {
                return Some(Err(failure));
            }
        }
        let content = self
            .content_tail
            .captures(input)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let confidence = if title.is_some() { 0.9 } else { 0.8 };
        let intent = Intent::new("create_file", confidence)
            .with_param("title", title.unwrap_or_else(|| "untitled.txt".to_string()))
            .with_param("content", content)
            .with_param("path", "");
        Some(Ok(intent))
    }

    fn match_open(&self, input: &str) -> Option<Result<Intent, ParseFailure>> {
        let verb = self.open_trigger.find(input)?;
        let target = self
            .quoted_text(input)
            .or_else(|| self.trailing_path(input))
            .or_else(|| {
                let rest = input[verb.end()..].trim();
                (!rest.is_empty()).then(|| rest.to_string())
            });
        let confidence = if target.is_some() { 0.85 } else { 0.7 };
        let intent = Intent::new("open_item", confidence)
            .with_param("target", target.unwrap_or_default());
        Some(Ok(intent))
    }

    fn quoted_text(&self, input: &str) -> Option<String> {
        self.quoted
            .captures(input)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
    }

    fn trailing_path(&self, input: &str) -> Option<String> {
        self.path_token
            .find_iter(input)
            .last()
            .map(|m| m.as_str().to_string())
    }
}

/// `{sum, total} -> sum`, `{average, avg, mean} -> avg`, `{count} -> count`,
/// default `sum`.
fn map_sheet_op(input: &str) -> &'static str {
    let lower = input.to_lowercase();
    let has_word = |w: &str| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|tok| tok == w)
    };
    if has_word("average") || has_word("avg") || has_word("mean") {
        "avg"
    } else if has_word("count") {
        "count"
    } else if has_word("sum") || has_word("total") {
        "sum"
    } else {
        "sum"
    }
}

/// `{bullets, bullet points} -> bullets`, `{tweet, tweet-length} -> tweet`,
/// default `short`.
fn map_summary_length(input: &str) -> &'static str {
    let lower = input.to_lowercase();
    if lower.contains("bullet") {
        "bullets"
    } else if lower.contains("tweet") {
        "tweet"
    } else {
        "short"
    }
}

/// Filenames over the length ceiling or containing disallowed characters
/// are a hard validation failure, never defaulted.
pub fn validate_filename(name: &str) -> Result<(), ParseFailure> {
    if name.len() > MAX_FILENAME_LEN {
        return Err(ParseFailure::new(
            ParseErrorCode::InvalidParameter,
            format!("filename exceeds {MAX_FILENAME_LEN} characters"),
        )
        .with_detail("title")
        .with_suggestion(Suggestion::new(
            SuggestionKind::Rephrase,
            "Use a shorter file name",
        )));
    }
    if name.contains(INVALID_FILENAME_CHARS) {
        return Err(ParseFailure::new(
            ParseErrorCode::InvalidParameter,
            "filename contains invalid characters: <>:\"|?*",
        )
        .with_detail("title")
        .with_suggestion(Suggestion::new(
            SuggestionKind::Rephrase,
            "Remove special characters from the file name",
        )));
    }
    Ok(())
}
