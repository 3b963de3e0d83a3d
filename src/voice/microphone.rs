//! Microphone capture: record one utterance, then transcribe it

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::endpoint::{EndpointState, UtteranceDetector};
use super::stt::WhisperTranscriber;
use super::{CaptureService, StopOnDrop};
use crate::{Error, Result};

/// How often the recorder drains the device buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures from the default input device and transcribes with Whisper
pub struct MicrophoneCapture {
    transcriber: Option<WhisperTranscriber>,
    max_utterance: Duration,
}

impl MicrophoneCapture {
    /// Create a microphone capture service
    ///
    /// Without a transcriber the service reports itself unavailable.
    #[must_use]
    pub const fn new(transcriber: Option<WhisperTranscriber>, max_utterance: Duration) -> Self {
        Self {
            transcriber,
            max_utterance,
        }
    }
}

#[async_trait]
impl CaptureService for MicrophoneCapture {
    fn availability(&self) -> Result<()> {
        if self.transcriber.is_none() {
            return Err(Error::CaptureUnavailable(
                "speech recognition needs OPENAI_API_KEY".to_string(),
            ));
        }
        if !AudioCapture::input_available() {
            return Err(Error::CaptureUnavailable(
                "no input device available".to_string(),
            ));
        }
        Ok(())
    }

    async fn capture(&self) -> Result<String> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            Error::CaptureUnavailable("speech recognition needs OPENAI_API_KEY".to_string())
        })?;

        let stop = StopOnDrop::default();
        let flag = Arc::clone(&stop.0);
        let max_utterance = self.max_utterance;

        let samples = tokio::task::spawn_blocking(move || record_utterance(&flag, max_utterance))
            .await
            .map_err(|e| Error::Capture(format!("recorder task failed: {e}")))??;

        let Some(samples) = samples else {
            tracing::debug!("no speech before capture limit");
            return Ok(String::new());
        };

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        transcriber.transcribe(wav).await
    }

    fn name(&self) -> &'static str {
        "microphone"
    }
}

/// Record until one utterance completes, the limit passes, or `stop` is set
///
/// Returns `None` if nothing resembling speech was heard.
fn record_utterance(stop: &AtomicBool, max_utterance: Duration) -> Result<Option<Vec<f32>>> {
    let mut capture = AudioCapture::new()?;
    let mut detector = UtteranceDetector::new();
    capture.start()?;

    tracing::debug!("listening for utterance");
    let started = Instant::now();

    loop {
        std::thread::sleep(POLL_INTERVAL);

        let samples = capture.take_buffer();
        if !samples.is_empty() && detector.process(&samples) == EndpointState::Complete {
            break;
        }

        if stop.load(Ordering::Relaxed) {
            tracing::debug!("capture abandoned");
            return Ok(None);
        }

        if started.elapsed() >= max_utterance {
            tracing::debug!(
                heard_speech = detector.heard_speech(),
                "utterance limit reached"
            );
            break;
        }
    }

    capture.stop();

    let utterance = detector.take_utterance();
    Ok((!utterance.is_empty()).then_some(utterance))
}
