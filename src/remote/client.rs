use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ExecutionResult, RemoteError, RemoteErrorCode};
use crate::progress::{ProgressEvent, ProgressPhase};

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Overall client-side deadline; no server-side timeout is assumed.
    pub timeout: Duration,
    /// Total attempt budget, not extra attempts after the first.
    pub retries: u32,
    pub retry_delay: Duration,
    /// External cancel source. Merged with the timeout-derived signal;
    /// first to fire aborts the in-flight attempt.
    pub cancel: CancellationToken,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            cancel: CancellationToken::new(),
        }
    }
}

/// Executes a request/response exchange against the backend command
/// executor with timeout, bounded retry, and cooperative cancellation.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        // No reqwest-level timeout: the deadline is enforced through the
        // merged cancellation token so cleanup stays in one place.
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Runs `action` with `payload` under the retry policy: transport/5xx
    /// failures retry with linear backoff `retry_delay * attempt`, 4xx
    /// fails immediately, cancellation fails immediately with the distinct
    /// aborted code.
    pub async fn execute(
        &self,
        action: &str,
        payload: Value,
        opts: &ExecuteOptions,
        progress: Option<&mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Result<ExecutionResult, RemoteError> {
        let url = format!("{}{}", self.base_url, endpoint_for(action));

        let merged = opts.cancel.child_token();
        let timer = {
            let deadline = merged.clone();
            let timeout = opts.timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            })
        };
        let out = self.run_attempts(&url, &payload, opts, &merged, progress).await;
        timer.abort();
        out
    }

    async fn run_attempts(
        &self,
        url: &str,
        payload: &Value,
        opts: &ExecuteOptions,
        cancel: &CancellationToken,
        progress: Option<&mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Result<ExecutionResult, RemoteError> {
        let total = opts.retries.max(1);
        let mut attempt = 1u32;
        loop {
            if cancel.is_cancelled() {
                return Err(RemoteError::aborted());
            }
            match self.attempt(url, payload, cancel, progress, attempt, total).await {
                Ok(result) => {
                    emit(
                        progress,
                        ProgressPhase::Complete,
                        100,
                        format!("complete (attempt {attempt}/{total})"),
                        url,
                    );
                    return Ok(result);
                }
                // Cancelled calls emit nothing further.
                Err(err) if err.code == RemoteErrorCode::Aborted => return Err(err),
                Err(err) => {
                    emit(
                        progress,
                        ProgressPhase::Error,
                        100,
                        format!("error (attempt {attempt}/{total}): {}", err.message),
                        url,
                    );
                    if !err.retryable() || attempt >= total {
                        return Err(err);
                    }
                    let backoff = opts.retry_delay * attempt;
                    warn!(attempt, ?backoff, "backend attempt failed, retrying: {}", err.message);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RemoteError::aborted()),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        payload: &Value,
        cancel: &CancellationToken,
        progress: Option<&mpsc::UnboundedSender<ProgressEvent>>,
        attempt: u32,
        total: u32,
    ) -> Result<ExecutionResult, RemoteError> {
        debug!(url, attempt, "dispatching backend request");
        emit(
            progress,
            ProgressPhase::Starting,
            0,
            format!("connecting (attempt {attempt}/{total})"),
            url,
        );
        emit(
            progress,
            ProgressPhase::Starting,
            25,
            format!("sending (attempt {attempt}/{total})"),
            url,
        );

        let send = self.http.post(url).json(payload).send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(RemoteError::aborted()),
            r = send => r.map_err(RemoteError::transport)?,
        };

        emit(
            progress,
            ProgressPhase::Processing,
            50,
            format!("processing (attempt {attempt}/{total})"),
            url,
        );

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = tokio::select! {
                _ = cancel.cancelled() => return Err(RemoteError::aborted()),
                b = response.text() => b.ok(),
            };
            return Err(RemoteError::http(status.as_u16(), body));
        }

        emit(
            progress,
            ProgressPhase::Completing,
            75,
            format!("receiving (attempt {attempt}/{total})"),
            url,
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(RemoteError::aborted()),
            body = response.json::<ExecutionResult>() => {
                body.map_err(RemoteError::invalid_response)
            }
        }
    }
}

fn endpoint_for(action: &str) -> String {
    match action {
        "create_file" => "/api/create-file".to_string(),
        "analyze_sheet" => "/api/analyze-sheet".to_string(),
        "summarize_doc" => "/api/summarize-doc".to_string(),
        other => format!("/api/{}", other.replace('_', "-")),
    }
}

fn emit(
    progress: Option<&mpsc::UnboundedSender<ProgressEvent>>,
    phase: ProgressPhase,
    percent: u8,
    message: String,
    url: &str,
) {
    if let Some(tx) = progress {
        let _ = tx.send(ProgressEvent::new(phase, percent, message).with_detail(url));
    }
}
