use super::error::ProviderError;
use serde::{Deserialize, Serialize};

/// Text frame sent when the client has no more audio
pub const END_OF_STREAM: &str = r#"{"end_of_stream":true}"#;

/// Response frame received from the provider
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StreamingResponse {
    #[serde(default)]
    pub results: Vec<StreamingResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StreamingResult {
    #[serde(default)]
    pub alternatives: Vec<SpeechAlternative>,

    /// Interim results are revised later; only final ones are kept
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SpeechAlternative {
    #[serde(default)]
    pub transcript: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorStatus {
    pub code: i32,

    #[serde(default)]
    pub message: String,
}

impl StreamingResponse {
    /// Best alternative of every final result, in order
    pub fn final_transcripts(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|result| result.is_final)
            .filter_map(|result| result.alternatives.first())
            .map(|alternative| alternative.transcript.as_str())
    }

    pub fn has_interim(&self) -> bool {
        self.results.iter().any(|result| !result.is_final)
    }

    pub fn into_error(self) -> Option<ProviderError> {
        self.error.map(|status| ProviderError::Status {
            code: status.code,
            message: status.message,
        })
    }
}
