use super::error::ProviderError;
use super::events::EventSink;
use super::{ProviderStream, SpeechProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_CHUNK_BYTES: usize = 4096;

/// External decoder that turns client audio (WebM/Opus from browsers)
/// into the raw PCM the recognizer expects
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub enabled: bool,

    pub program: String,

    /// Full argument list; derived from the recognition sample rate when unset
    pub args: Option<Vec<String>>,

    /// How long `close` waits for the decoder to flush and exit
    pub drain_timeout_ms: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "ffmpeg".to_string(),
            args: None,
            drain_timeout_ms: 3000,
        }
    }
}

impl TranscodeConfig {
    pub fn command_args(&self, sample_rate_hertz: u32) -> Vec<String> {
        if let Some(args) = &self.args {
            return args.clone();
        }

        let rate = sample_rate_hertz.to_string();
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-ar",
            rate.as_str(),
            "-ac",
            "1",
            "-f",
            "s16le",
            "pipe:1",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Wraps another provider so every stream gets its own decoder process
///
/// Client audio goes to the decoder's stdin; its stdout is forwarded to the
/// wrapped stream. Decoder faults surface as stream errors.
pub struct TranscodingProvider {
    inner: Arc<dyn SpeechProvider>,
    program: String,
    args: Vec<String>,
    drain_timeout: Duration,
}

impl TranscodingProvider {
    pub fn new(
        inner: Arc<dyn SpeechProvider>,
        config: &TranscodeConfig,
        sample_rate_hertz: u32,
    ) -> Self {
        Self {
            inner,
            program: config.program.clone(),
            args: config.command_args(sample_rate_hertz),
            drain_timeout: config.drain_timeout(),
        }
    }
}

#[async_trait]
impl SpeechProvider for TranscodingProvider {
    async fn open(&self, events: EventSink) -> Result<Box<dyn ProviderStream>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProviderError::Transcoder(e.to_string()))
            .with_context(|| format!("Failed to start transcoder {}", self.program))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("transcoder stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("transcoder stdout was not captured"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr));
        }

        // Dropping `child` on failure kills the decoder
        let stream: Arc<dyn ProviderStream> = Arc::from(self.inner.open(events.clone()).await?);

        let closing = Arc::new(AtomicBool::new(false));
        let (input, input_rx) = mpsc::unbounded_channel();
        tokio::spawn(feed_decoder(stdin, input_rx, events.clone()));
        let forwarder = tokio::spawn(forward_pcm(
            stdout,
            Arc::clone(&stream),
            Arc::clone(&closing),
            events,
        ));

        debug!("Transcoder {} started for new stream", self.program);

        Ok(Box::new(TranscodingStream {
            input,
            stream,
            closing,
            forwarder: Mutex::new(Some(forwarder)),
            child: Mutex::new(Some(child)),
            drain_timeout: self.drain_timeout,
        }))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

enum Input {
    Audio(Vec<u8>),
    End,
}

/// Decoder process plus the provider stream it feeds; closed together
struct TranscodingStream {
    input: mpsc::UnboundedSender<Input>,
    stream: Arc<dyn ProviderStream>,
    closing: Arc<AtomicBool>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
    drain_timeout: Duration,
}

#[async_trait]
impl ProviderStream for TranscodingStream {
    fn send_audio(&self, audio: Vec<u8>) -> Result<()> {
        self.input
            .send(Input::Audio(audio))
            .map_err(|_| anyhow!("transcoder input has stopped"))
    }

    async fn close(&self) -> Result<()> {
        if self.closing.swap(true, Ordering::SeqCst) {
            debug!("Transcoding stream already closing");
            return Ok(());
        }

        if self.input.send(Input::End).is_err() {
            debug!("Transcoder input already stopped");
        }

        // Decoded tail must reach the provider before end of audio
        if let Some(forwarder) = self.forwarder.lock().await.take() {
            if tokio::time::timeout(self.drain_timeout, forwarder).await.is_err() {
                warn!("Transcoder output not drained within {:?}", self.drain_timeout);
            }
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(self.drain_timeout, child.wait()).await {
                Ok(Ok(status)) => debug!("Transcoder exited: {}", status),
                Ok(Err(e)) => warn!("Failed to wait for transcoder: {}", e),
                Err(_) => {
                    warn!("Transcoder did not exit in time, killing it");
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill transcoder: {}", e);
                    }
                }
            }
        }

        self.stream.close().await
    }
}

async fn feed_decoder(
    mut stdin: ChildStdin,
    mut input: mpsc::UnboundedReceiver<Input>,
    events: EventSink,
) {
    while let Some(frame) = input.recv().await {
        match frame {
            Input::Audio(audio) => {
                if let Err(e) = stdin.write_all(&audio).await {
                    warn!("Failed to write to transcoder: {}", e);
                    events.on_error(ProviderError::Transcoder(format!("write failed: {}", e)));
                    return;
                }
            }
            Input::End => break,
        }
    }
    // stdin drops here, which ends the decoder's input
}

async fn forward_pcm(
    mut stdout: ChildStdout,
    stream: Arc<dyn ProviderStream>,
    closing: Arc<AtomicBool>,
    events: EventSink,
) {
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = stream.send_audio(buf[..n].to_vec()) {
                    debug!("Decoded audio not forwarded: {}", e);
                }
            }
            Err(e) => {
                if !closing.load(Ordering::SeqCst) {
                    events.on_error(ProviderError::Transcoder(format!("read failed: {}", e)));
                }
                return;
            }
        }
    }

    if !closing.load(Ordering::SeqCst) {
        info!("Transcoder exited before end of audio");
        events.on_error(ProviderError::Transcoder(
            "exited before end of audio".to_string(),
        ));
    }
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("transcoder: {}", line);
    }
}
