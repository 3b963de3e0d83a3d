//! Speech-to-text (STT) via `OpenAI` Whisper

use secrecy::{ExposeSecret, SecretString};

use crate::config::{CaptureConfig, SpeechConfig};
use crate::{Error, Result};

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
}

/// Transcribes speech to text
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    language: String,
    base_url: String,
}

impl WhisperTranscriber {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// The base URL is shared with the speech endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        api_key: Option<&SecretString>,
        capture: &CaptureConfig,
        speech: &SpeechConfig,
    ) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.expose_secret())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY required for Whisper".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.to_owned()),
            model: capture.stt_model.clone(),
            language: capture.language.clone(),
            base_url: speech.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Capture(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Capture(format!("Whisper request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Capture(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Capture(format!("failed to parse Whisper response: {e}")))?;

        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}
