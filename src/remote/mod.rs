pub mod client;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use client::{ExecuteOptions, RemoteClient};

/// Backend command executor response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorCode {
    /// Connection-level failure; retryable.
    Transport,
    /// Non-2xx HTTP status; retryable only for the 5xx class.
    Http,
    /// User- or timeout-triggered cancellation; never retried.
    Aborted,
    /// 2xx with a body that failed to parse.
    InvalidResponse,
}

/// Typed failure raised by the Resilient Remote Client.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RemoteError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self {
            code: RemoteErrorCode::Transport,
            message: err.to_string(),
            status: None,
            details: None,
        }
    }

    pub fn http(status: u16, body: Option<String>) -> Self {
        Self {
            code: RemoteErrorCode::Http,
            message: format!("backend returned HTTP {status}"),
            status: Some(status),
            details: body.map(Value::String),
        }
    }

    pub fn aborted() -> Self {
        Self {
            code: RemoteErrorCode::Aborted,
            message: "request aborted".to_string(),
            status: None,
            details: None,
        }
    }

    pub fn invalid_response(err: impl std::fmt::Display) -> Self {
        Self {
            code: RemoteErrorCode::InvalidResponse,
            message: format!("unparseable backend response: {err}"),
            status: None,
            details: None,
        }
    }

    /// Transport faults and 5xx responses are worth another attempt;
    /// everything else fails immediately.
    pub fn retryable(&self) -> bool {
        match self.code {
            RemoteErrorCode::Transport => true,
            RemoteErrorCode::Http => self.status.is_some_and(|s| s >= 500),
            RemoteErrorCode::Aborted | RemoteErrorCode::InvalidResponse => false,
        }
    }
}
