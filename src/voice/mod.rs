//! Voice processing module
//!
//! Service seams for the turn controller plus the concrete implementations:
//! microphone and console capture, Whisper transcription, `OpenAI` speech
//! synthesis, and speaker playback.

mod capture;
mod console;
mod endpoint;
mod microphone;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use console::ConsoleCapture;
pub use endpoint::{EndpointState, UtteranceDetector, calculate_energy};
pub use microphone::MicrophoneCapture;
pub use playback::{AudioPlayback, NullSink, SpeakerSink, decode_mp3};
pub use stt::WhisperTranscriber;
pub use tts::OpenAiSpeech;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::Result;

/// Signals a blocking audio thread to stop when the owning future is dropped
#[derive(Default)]
pub(crate) struct StopOnDrop(pub(crate) Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Produces one final transcript per request
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Check that capture can start right now
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` when the facility is missing
    fn availability(&self) -> Result<()>;

    /// Listen for a single utterance and return its transcript
    ///
    /// # Errors
    ///
    /// Returns error if recording or transcription fails
    async fn capture(&self) -> Result<String>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}

/// Turns text plus persona instructions into an audio payload
#[async_trait]
pub trait SynthesisService: Send + Sync {
    /// Synthesize `text` spoken according to `instructions`
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` if the service call fails
    async fn synthesize(&self, text: &str, instructions: &str) -> Result<Vec<u8>>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}

/// Plays a complete audio payload
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play `audio` (MP3) to completion
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` if decoding or output fails
    async fn play(&self, audio: Vec<u8>) -> Result<()>;

    /// Sink name for logging
    fn name(&self) -> &'static str;
}
