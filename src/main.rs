use anyhow::{Context, Result};
use clap::Parser;
use dictation_gateway::{
    create_router, AppState, Config, SpeechProvider, TranscodingProvider, WebSocketProvider,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Real-time dictation gateway
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/dictation-gateway")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let bind = args.bind.unwrap_or(cfg.service.http.bind);
    let port = args.port.unwrap_or(cfg.service.http.port);

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Speech provider: {}", cfg.provider.url);

    let mut provider: Arc<dyn SpeechProvider> = Arc::new(WebSocketProvider::new(
        cfg.provider.url.clone(),
        cfg.provider.streaming_config(),
    ));
    if cfg.transcode.enabled {
        info!("Transcoding client audio with {}", cfg.transcode.program);
        provider = Arc::new(TranscodingProvider::new(
            provider,
            &cfg.transcode,
            cfg.provider.recognition.sample_rate_hertz,
        ));
    }
    let state = AppState::new(provider, cfg.session);
    let app = create_router(state);

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on ws://{}/ws/transcribe", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
