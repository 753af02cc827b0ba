// Shared fakes for the integration tests
//
// ScriptedProvider hands out in-memory streams whose event sinks the test
// drives directly; RecordingClients captures everything the manager sends.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dictation_gateway::provider::{EventSink, ProviderError, ProviderStream, SpeechProvider};
use dictation_gateway::session::{SessionConfig, SessionId, TranscriptionManager};
use dictation_gateway::transport::{ClientMessage, ClientSink, CloseCode};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// What a test can observe and drive on one opened stream
#[derive(Clone)]
pub struct StreamProbe {
    pub events: EventSink,
    audio: Arc<Mutex<Vec<Vec<u8>>>>,
    closes: Arc<AtomicUsize>,
}

impl StreamProbe {
    pub fn audio(&self) -> Vec<Vec<u8>> {
        self.audio.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct ScriptedStream {
    audio: Arc<Mutex<Vec<Vec<u8>>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderStream for ScriptedStream {
    fn send_audio(&self, audio: Vec<u8>) -> Result<()> {
        self.audio.lock().unwrap().push(audio);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory provider; every successful `open` is recorded as a probe
#[derive(Default)]
pub struct ScriptedProvider {
    streams: Mutex<Vec<StreamProbe>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    open_delay_ms: AtomicU64,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` opens fail
    pub fn fail_next_opens(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Make every later open take `delay` before it returns
    pub fn delay_opens(&self, delay: Duration) {
        self.open_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn stream(&self, index: usize) -> StreamProbe {
        self.streams.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl SpeechProvider for ScriptedProvider {
    async fn open(&self, events: EventSink) -> Result<Box<dyn ProviderStream>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = self.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProviderError::Connect("scripted failure".to_string()).into());
        }

        let probe = StreamProbe {
            events,
            audio: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        let stream = ScriptedStream {
            audio: Arc::clone(&probe.audio),
            closes: Arc::clone(&probe.closes),
        };
        self.streams.lock().unwrap().push(probe);

        Ok(Box::new(stream))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Client sink that records every frame and close
#[derive(Default)]
pub struct RecordingClients {
    open: Mutex<HashSet<SessionId>>,
    sent: Mutex<Vec<(SessionId, String)>>,
    closed: Mutex<Vec<(SessionId, CloseCode)>>,
    fail_sends: AtomicBool,
}

impl RecordingClients {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect(&self, id: &SessionId) {
        self.open.lock().unwrap().insert(id.clone());
    }

    pub fn disconnect(&self, id: &SessionId) {
        self.open.lock().unwrap().remove(id);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn messages(&self, id: &SessionId) -> Vec<ClientMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(sent_to, _)| sent_to == id)
            .map(|(_, payload)| serde_json::from_str(payload).unwrap())
            .collect()
    }

    pub fn raw_messages(&self, id: &SessionId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(sent_to, _)| sent_to == id)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn closes(&self, id: &SessionId) -> Vec<CloseCode> {
        self.closed
            .lock()
            .unwrap()
            .iter()
            .filter(|(closed, _)| closed == id)
            .map(|(_, code)| *code)
            .collect()
    }
}

#[async_trait]
impl ClientSink for RecordingClients {
    async fn send_text(&self, id: &SessionId, payload: String) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated send failure"));
        }
        self.sent.lock().unwrap().push((id.clone(), payload));
        Ok(())
    }

    async fn close(&self, id: &SessionId, code: CloseCode) -> Result<()> {
        self.closed.lock().unwrap().push((id.clone(), code));
        self.disconnect(id);
        Ok(())
    }

    fn is_open(&self, id: &SessionId) -> bool {
        self.open.lock().unwrap().contains(id)
    }
}

pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub clients: Arc<RecordingClients>,
    pub manager: TranscriptionManager,
}

/// Manager wired to fakes, with a short recovery backoff
pub fn harness() -> Harness {
    harness_with_backoff(Duration::from_millis(20))
}

pub fn harness_with_backoff(backoff: Duration) -> Harness {
    let provider = ScriptedProvider::new();
    let clients = RecordingClients::new();
    let config = SessionConfig {
        recovery_backoff_ms: backoff.as_millis() as u64,
        ..SessionConfig::default()
    };
    let manager = TranscriptionManager::new(provider.clone(), clients.clone(), &config);

    Harness {
        provider,
        clients,
        manager,
    }
}

/// Poll `check` until it holds, failing the test after two seconds
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !check() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give spawned tasks a chance to run, for asserting that nothing happens
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
