//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use niko_voice::config::TimeoutConfig;
use niko_voice::llm::GenerationService;
use niko_voice::voice::{AudioSink, CaptureService, SynthesisService};
use niko_voice::{Error, PersonaConfig, Result, Services, Tone, TurnController};
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// What the mock capture does on its next call
#[derive(Debug, Clone)]
pub enum CaptureStep {
    /// Return this transcript
    Say(&'static str),
    /// Never finish
    Hang,
    /// Fail with a capture error
    Fail,
    /// Keep listening until the gate is opened, then return this transcript
    Gated(Arc<Notify>, &'static str),
}

/// Capture service driven by a script of steps
pub struct MockCapture {
    steps: Mutex<VecDeque<CaptureStep>>,
    available: bool,
    calls: Mutex<usize>,
}

impl MockCapture {
    pub fn new(steps: impl IntoIterator<Item = CaptureStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            available: true,
            calls: Mutex::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::<CaptureStep>::new())
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CaptureService for MockCapture {
    fn availability(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::CaptureUnavailable("no microphone".to_string()))
        }
    }

    async fn capture(&self) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CaptureStep::Say("hello"));

        match step {
            CaptureStep::Say(text) => Ok(text.to_string()),
            CaptureStep::Hang => std::future::pending().await,
            CaptureStep::Fail => Err(Error::Capture("microphone unplugged".to_string())),
            CaptureStep::Gated(gate, text) => {
                gate.notified().await;
                Ok(text.to_string())
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock-capture"
    }
}

/// Generation service returning a fixed reply and recording its inputs
pub struct MockGenerator {
    reply: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        Self {
            reply: None,
            ..Self::replying("")
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying("eventually")
        }
    }

    /// (instruction, transcript) pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for MockGenerator {
    async fn generate(&self, instruction: &str, transcript: &str) -> Result<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .push((instruction.to_string(), transcript.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        "mock-generator"
    }
}

/// Synthesis service returning fixed bytes and recording its inputs
pub struct MockSynthesizer {
    audio: Vec<u8>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::returning(b"ID3-fake-mp3".to_vec())
    }

    pub fn returning(audio: Vec<u8>) -> Self {
        Self {
            audio,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// (text, instructions) pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisService for MockSynthesizer {
    async fn synthesize(&self, text: &str, instructions: &str) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), instructions.to_string()));
        Ok(self.audio.clone())
    }

    fn name(&self) -> &'static str {
        "mock-synthesizer"
    }
}

/// Sink that remembers what it played
#[derive(Default)]
pub struct MockSink {
    played: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl MockSink {
    /// Sink whose output device errors on every payload
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioSink for MockSink {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        self.played.lock().unwrap().push(audio);
        if self.fail {
            return Err(Error::Playback("output device vanished".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock-sink"
    }
}

/// A controller wired to mocks, with handles to inspect them
pub struct Harness {
    pub controller: Arc<TurnController>,
    pub capture: Arc<MockCapture>,
    pub generator: Arc<MockGenerator>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub sink: Arc<MockSink>,
}

impl Harness {
    pub fn new(capture: MockCapture, generator: MockGenerator) -> Self {
        let capture = Arc::new(capture);
        let generator = Arc::new(generator);
        let synthesizer = Arc::new(MockSynthesizer::new());
        let sink = Arc::new(MockSink::default());

        let services = Services {
            capture: capture.clone(),
            generator: generator.clone(),
            synthesizer: synthesizer.clone(),
            sink: sink.clone(),
        };

        Self {
            controller: Arc::new(test_controller(services)),
            capture,
            generator,
            synthesizer,
            sink,
        }
    }
}

/// Controller for persona Ava/funny with short timeouts
pub fn test_controller(services: Services) -> TurnController {
    TurnController::new(services, PersonaConfig::new("Ava", Tone::Funny))
        .with_timeouts(short_timeouts())
}

/// Timeouts small enough for tests, large enough not to fire by accident
pub fn short_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        capture: Duration::from_secs(2),
        generation: Duration::from_secs(2),
        synthesis: Duration::from_secs(2),
        playback: Duration::from_secs(2),
    }
}

/// Request captured by the mock HTTP server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path and query
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Local HTTP server answering every request with one canned response
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// Start a server replying with `body` as JSON
    pub async fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self::start(status, "application/json", body.to_string().into_bytes()).await
    }

    /// Start a server replying with raw bytes
    pub async fn start(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status,
            content_type,
            body: Bytes::from(body),
            requests: requests.clone(),
        };

        let app = Router::new().fallback(record).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let addr = listener.local_addr().expect("mock server has no address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(State(state): State<MockState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    state.requests.lock().unwrap().push(RecordedRequest {
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body,
    });

    (
        state.status,
        [(header::CONTENT_TYPE, state.content_type)],
        state.body,
    )
        .into_response()
}
