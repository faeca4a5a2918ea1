use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use aura_core::capability::CapabilityRegistry;
use aura_core::intent::IntentPipeline;
use aura_core::remote::RemoteClient;
use aura_core::session::{Orchestrator, SessionEvent};
use aura_core::settings::Settings;

fn settings_from_env() -> Settings {
    let mut settings = Settings::default();
    if let Ok(url) = std::env::var("AURA_BACKEND_URL") {
        settings.parser_url = format!("{url}/api/parse-intent");
        settings.backend_url = url;
    }
    if let Ok(stt) = std::env::var("AURA_STT_PROVIDER") {
        settings.stt_provider = stt;
    }
    if let Ok(tts) = std::env::var("AURA_TTS_PROVIDER") {
        settings.tts_provider = tts;
    }
    if let Ok(key) = std::env::var("AURA_API_KEY") {
        settings.api_key = Some(key);
    }
    if std::env::var("AURA_NO_REMOTE_PARSE").is_ok() {
        settings.allow_remote_intent_resolution = false;
    }
    settings
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    tracing::info!("Aura core booting...");

    let settings = settings_from_env();
    let pipeline = Arc::new(IntentPipeline::new(settings.parser_url.clone())?);
    let client = Arc::new(RemoteClient::new(settings.backend_url.clone()));
    let registry = CapabilityRegistry::new();

    let orchestrator = Orchestrator::new(settings, registry, pipeline, client);
    let events = orchestrator.sender();
    let session = tokio::spawn(orchestrator.run());

    tracing::info!("Aura core active. Type a command, or /voice /stop /cancel /yes /no /quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        let event = match line.as_str() {
            "" => continue,
            "/quit" => break,
            "/toggle" => SessionEvent::ToggleVisibility,
            "/voice" => SessionEvent::StartCapture,
            "/stop" => SessionEvent::StopCapture,
            "/cancel" => SessionEvent::Cancel,
            "/yes" => SessionEvent::VerifyOk,
            "/no" => SessionEvent::VerifyErr,
            _ => SessionEvent::TextSubmit(line),
        };
        if events.send(event).is_err() {
            break;
        }
    }

    session.abort();
    Ok(())
}
