use serde::{Deserialize, Serialize};

/// JSON text frames sent to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// Recovery gave up; carries whatever text was captured
    RecoveryFailed { error: ErrorCode, transcript: String },
    Error { error: ErrorCode },
    /// Final transcript delivered at normal finalization
    Transcript { transcript: String },
    Status { status: SessionStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Reconnecting,
    Recovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RecoveryFailed,
    SessionInitFailed,
}

impl ClientMessage {
    pub fn transcript(text: impl Into<String>) -> Self {
        Self::Transcript {
            transcript: text.into(),
        }
    }

    pub fn status(status: SessionStatus) -> Self {
        Self::Status { status }
    }

    pub fn recovery_failed(text: impl Into<String>) -> Self {
        Self::RecoveryFailed {
            error: ErrorCode::RecoveryFailed,
            transcript: text.into(),
        }
    }

    pub fn init_failed() -> Self {
        Self::Error {
            error: ErrorCode::SessionInitFailed,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
