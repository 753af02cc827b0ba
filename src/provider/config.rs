use serde::{Deserialize, Serialize};

/// Recognition settings sent once at the start of every stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Audio encoding of the forwarded frames
    pub encoding: String,

    /// Sample rate of the forwarded audio
    pub sample_rate_hertz: u32,

    /// BCP-47 language tag
    pub language_code: String,

    /// Ask the provider to insert punctuation
    pub enable_automatic_punctuation: bool,

    /// Provider model name, if the provider should not pick its default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            encoding: "LINEAR16".to_string(), // 16-bit little-endian PCM
            sample_rate_hertz: 16000,
            language_code: "ja-JP".to_string(),
            enable_automatic_punctuation: true,
            model: Some("latest_long".to_string()),
        }
    }
}

/// Full configuration frame of a streaming call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingConfig {
    pub config: RecognitionConfig,
    pub interim_results: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            config: RecognitionConfig::default(),
            interim_results: true,
        }
    }
}

#[derive(Serialize)]
struct ConfigFrame<'a> {
    streaming_config: &'a StreamingConfig,
}

impl StreamingConfig {
    /// Encode as the first text frame of a stream
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ConfigFrame {
            streaming_config: self,
        })
    }
}
