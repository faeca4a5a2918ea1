use std::sync::mpsc::{Receiver as StdReceiver, RecvTimeoutError, Sender as StdSender};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::{CaptureEvent, ProviderConfig};
use crate::error::CapabilityError;

const RING_CAPACITY: usize = 1 << 15;
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Cheap, idempotent availability probe. May trigger the OS permission
/// prompt on first use.
pub fn probe_microphone() -> Result<(), CapabilityError> {
    cpal::default_host()
        .default_input_device()
        .map(|_| ())
        .ok_or_else(|| CapabilityError::ProbeFailed("no input device available".to_string()))
}

/// Microphone capture handle. The cpal stream is !Send, so it lives on a
/// dedicated thread that drains samples into a ring buffer until stopped;
/// the recording is then WAV-framed and posted to the configured
/// transcription endpoint.
pub struct MicCapture {
    config: ProviderConfig,
    http: reqwest::Client,
    stop_tx: Option<StdSender<()>>,
}

impl MicCapture {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            stop_tx: None,
        }
    }
}

impl super::CaptureHandle for MicCapture {
    fn start_recording(&mut self) -> mpsc::UnboundedReceiver<CaptureEvent> {
        // Capture is exclusive per session: a prior stream stops first.
        self.stop_recording();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        self.stop_tx = Some(stop_tx);

        std::thread::spawn(move || {
            let _ = done_tx.send(capture_until_stopped(&stop_rx));
        });

        let http = self.http.clone();
        let endpoint = self.config.endpoint.clone();
        let api_key = self.config.api_key.clone();
        tokio::spawn(async move {
            let (samples, rate) = match done_rx.await {
                Ok(Ok(recording)) => recording,
                Ok(Err(e)) => {
                    let _ = events_tx.send(CaptureEvent::Error(e.to_string()));
                    let _ = events_tx.send(CaptureEvent::Final(String::new()));
                    return;
                }
                Err(_) => {
                    let _ = events_tx.send(CaptureEvent::Final(String::new()));
                    return;
                }
            };
            match transcribe(&http, endpoint.as_deref(), api_key.as_deref(), &samples, rate).await
            {
                Ok(text) => {
                    let _ = events_tx.send(CaptureEvent::Final(text));
                }
                Err(e) => {
                    let _ = events_tx.send(CaptureEvent::Error(e.to_string()));
                    let _ = events_tx.send(CaptureEvent::Final(String::new()));
                }
            }
        });

        events_rx
    }

    fn stop_recording(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Runs on the dedicated audio thread. Owns the cpal stream for its whole
/// lifetime and returns the accumulated mono samples plus the sample rate.
fn capture_until_stopped(
    stop_rx: &StdReceiver<()>,
) -> Result<(Vec<f32>, u32), CapabilityError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CapabilityError::ProbeFailed("no input device available".to_string()))?;
    info!("capture device: {}", device.name().unwrap_or_default());

    // Prefer 16kHz for transcription, then common rates.
    let target_rates = [16_000u32, 44_100, 48_000, 8_000];
    let mut selected = None;
    for &rate in &target_rates {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| CapabilityError::Capture(e.to_string()))?;
        for range in ranges {
            if range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate {
                selected = Some(range.with_sample_rate(cpal::SampleRate(rate)));
                break;
            }
        }
        if selected.is_some() {
            break;
        }
    }
    let config = match selected {
        Some(c) => c,
        None => device
            .default_input_config()
            .map_err(|e| CapabilityError::Capture(e.to_string()))?,
    };
    let rate = config.sample_rate().0;
    info!("capture config: {}Hz, {} channels", rate, config.channels());

    let rb = HeapRb::<f32>::new(RING_CAPACITY);
    let (mut prod, mut cons) = rb.split();
    let err_fn = |err| error!("capture stream error: {err}");

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &_| {
                // Full buffer drops samples (lossy by contract).
                prod.push_slice(data);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _: &_| {
                for &sample in data {
                    let _ = prod.try_push(sample as f32 / i16::MAX as f32);
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CapabilityError::Capture(format!(
                "unsupported sample format {other:?}"
            )))
        }
    }
    .map_err(|e| CapabilityError::Capture(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CapabilityError::Capture(e.to_string()))?;

    let mut samples = Vec::new();
    let mut chunk = [0f32; 1024];
    loop {
        let stopped = matches!(
            stop_rx.recv_timeout(DRAIN_INTERVAL),
            Ok(()) | Err(RecvTimeoutError::Disconnected)
        );
        loop {
            let n = cons.pop_slice(&mut chunk);
            if n == 0 {
                break;
            }
            samples.extend_from_slice(&chunk[..n]);
        }
        if stopped {
            break;
        }
    }
    drop(stream);

    Ok((samples, rate))
}

#[derive(Deserialize)]
struct TranscriptWire {
    text: String,
}

async fn transcribe(
    http: &reqwest::Client,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    samples: &[f32],
    rate: u32,
) -> Result<String, CapabilityError> {
    let endpoint = endpoint.ok_or_else(|| {
        CapabilityError::Capture("no transcription endpoint configured".to_string())
    })?;
    let wav = encode_wav(samples, rate)?;

    let mut request = http
        .post(endpoint)
        .header("content-type", "audio/wav")
        .body(wav);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .await
        .map_err(|e| CapabilityError::Capture(e.to_string()))?;
    if !response.status().is_success() {
        return Err(CapabilityError::Capture(format!(
            "transcription endpoint returned {}",
            response.status()
        )));
    }
    let wire: TranscriptWire = response
        .json()
        .await
        .map_err(|e| CapabilityError::Capture(e.to_string()))?;
    Ok(wire.text)
}

fn encode_wav(samples: &[f32], rate: u32) -> Result<Vec<u8>, CapabilityError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| CapabilityError::Capture(e.to_string()))?;
    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| CapabilityError::Capture(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| CapabilityError::Capture(e.to_string()))?;
    Ok(cursor.into_inner())
}
