//! Resolver pipeline coverage: tier-1 extraction, filename validation,
//! and the offline fallback path. Remote resolution is disabled so no
//! test touches the network.

use aura_core::intent::patterns::{validate_filename, MAX_FILENAME_LEN};
use aura_core::intent::{Intent, IntentPipeline, ParseErrorCode};
use aura_core::settings::Settings;

fn offline() -> Settings {
    Settings {
        allow_remote_intent_resolution: false,
        ..Settings::default()
    }
}

fn pipeline() -> IntentPipeline {
    IntentPipeline::new("http://127.0.0.1:9/api/parse-intent").expect("patterns must compile")
}

#[tokio::test]
async fn create_file_resolves_with_title() {
    let intent = pipeline()
        .resolve("Create a file called notes.txt", &offline())
        .await
        .expect("creation phrasing should resolve");
    assert_eq!(intent.action, "create_file");
    assert_eq!(intent.param_str("title"), Some("notes.txt"));
    assert!(
        intent.confidence >= 0.8,
        "titled creation should score high, got {}",
        intent.confidence
    );
}

#[tokio::test]
async fn quoted_titles_keep_spaces() {
    let intent = pipeline()
        .resolve("Create a file called \"meeting notes.txt\"", &offline())
        .await
        .expect("quoted title should resolve");
    assert_eq!(intent.param_str("title"), Some("meeting notes.txt"));
}

#[tokio::test]
async fn content_tail_is_extracted() {
    let intent = pipeline()
        .resolve(
            "Write a note called todo.txt with the content buy milk",
            &offline(),
        )
        .await
        .expect("creation with content should resolve");
    assert_eq!(intent.action, "create_file");
    assert_eq!(intent.param_str("title"), Some("todo.txt"));
    assert_eq!(intent.param_str("content"), Some("buy milk"));
}

#[tokio::test]
async fn spreadsheet_analysis_extracts_path_op_and_column() {
    let intent = pipeline()
        .resolve("Sum the salary column in employees.csv", &offline())
        .await
        .expect("spreadsheet phrasing should resolve");
    assert_eq!(intent.action, "analyze_sheet");
    assert_eq!(intent.param_str("path"), Some("employees.csv"));
    assert_eq!(intent.param_str("op"), Some("sum"));
    assert_eq!(intent.param_str("column"), Some("salary"));
    assert!(intent.confidence >= 0.9, "named column should score high");
}

#[tokio::test]
async fn sheet_op_synonyms_map_to_canonical_ops() {
    let p = pipeline();
    let s = offline();
    let avg = p
        .resolve("Average the price column in sales.csv", &s)
        .await
        .expect("average phrasing");
    assert_eq!(avg.param_str("op"), Some("avg"));

    let count = p
        .resolve("Count the id column in data.csv", &s)
        .await
        .expect("count phrasing");
    assert_eq!(count.param_str("op"), Some("count"));

    let total = p
        .resolve("Total the amount column in ledger.xlsx", &s)
        .await
        .expect("total phrasing");
    assert_eq!(total.param_str("op"), Some("sum"));
}

#[tokio::test]
async fn unnamed_column_defaults_to_value() {
    let intent = pipeline()
        .resolve("Analyze expenses.csv", &offline())
        .await
        .expect("pathed analysis should resolve");
    assert_eq!(intent.action, "analyze_sheet");
    assert_eq!(intent.param_str("column"), Some("value"));
}

#[tokio::test]
async fn summary_length_maps_from_phrasing() {
    let p = pipeline();
    let s = offline();
    let bullets = p
        .resolve("Summarize report.pdf as bullet points", &s)
        .await
        .expect("bullet phrasing");
    assert_eq!(bullets.action, "summarize_doc");
    assert_eq!(bullets.param_str("path"), Some("report.pdf"));
    assert_eq!(bullets.param_str("length"), Some("bullets"));

    let tweet = p
        .resolve("Summarize report.pdf in a tweet", &s)
        .await
        .expect("tweet phrasing");
    assert_eq!(tweet.param_str("length"), Some("tweet"));

    let short = p
        .resolve("Summarize report.pdf", &s)
        .await
        .expect("plain phrasing");
    assert_eq!(short.param_str("length"), Some("short"));
}

#[tokio::test]
async fn open_resolves_free_text_target() {
    let intent = pipeline()
        .resolve("Open the quarterly budget", &offline())
        .await
        .expect("open phrasing should resolve");
    assert_eq!(intent.action, "open_item");
    assert_eq!(intent.param_str("target"), Some("the quarterly budget"));
}

#[tokio::test]
async fn empty_input_fails_with_suggestions() {
    let failure = pipeline()
        .resolve("   ", &offline())
        .await
        .expect_err("whitespace input must not resolve");
    assert_eq!(failure.code, ParseErrorCode::MissingInput);
    assert!(
        !failure.suggestions.is_empty(),
        "missing input should carry at least one suggestion"
    );
}

#[tokio::test]
async fn invalid_filename_characters_fail_hard() {
    let failure = pipeline()
        .resolve("Create a file called \"bad:name.txt\"", &offline())
        .await
        .expect_err("colon in filename must be rejected");
    assert_eq!(failure.code, ParseErrorCode::InvalidParameter);
    assert!(failure.is_hard(), "validation failures terminate the chain");
}

#[tokio::test]
async fn overlong_filename_fails_hard() {
    let name = format!("{}.txt", "a".repeat(MAX_FILENAME_LEN));
    let failure = pipeline()
        .resolve(&format!("Create a file called \"{name}\""), &offline())
        .await
        .expect_err("overlong filename must be rejected");
    assert_eq!(failure.code, ParseErrorCode::InvalidParameter);
}

#[test]
fn validate_filename_accepts_ordinary_names() {
    assert!(validate_filename("notes.txt").is_ok());
    assert!(validate_filename("meeting notes 2.md").is_ok());
    assert!(validate_filename("report?.txt").is_err());
}

#[tokio::test]
async fn unrecognized_input_falls_back_without_panicking() {
    let intent = pipeline()
        .resolve("what is the weather like today", &offline())
        .await
        .expect("ambiguous input resolves to the fallback intent");
    assert_eq!(intent.action, "unknown");
    assert!(
        intent.confidence <= 0.6,
        "fallback confidence stays below the floor, got {}",
        intent.confidence
    );
}

#[tokio::test]
async fn keyword_tier_claims_verb_only_input() {
    let intent = pipeline()
        .resolve("make me something nice", &offline())
        .await
        .expect("bare verb should reach the keyword tier");
    assert_eq!(intent.action, "create_file");
    assert!(intent.confidence <= 0.6);
}

#[test]
fn confidence_is_clamped_to_unit_interval() {
    assert_eq!(Intent::new("x", 1.7).confidence, 1.0);
    assert_eq!(Intent::new("x", -0.2).confidence, 0.0);
}
