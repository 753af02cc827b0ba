use crate::provider::{RecognitionConfig, StreamingConfig, TranscodeConfig};
use crate::session::SessionConfig;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    #[serde(default = "default_interim_results")]
    pub interim_results: bool,
    #[serde(default)]
    pub recognition: RecognitionConfig,
}

fn default_interim_results() -> bool {
    true
}

impl ProviderConfig {
    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            config: self.recognition.clone(),
            interim_results: self.interim_results,
        }
    }
}

impl Config {
    /// Load from a config file, overridden by `DICTATION__*` variables
    /// (e.g. `DICTATION__PROVIDER__URL`)
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("DICTATION")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
