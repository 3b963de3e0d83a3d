//! Text-to-speech (TTS) via the `OpenAI` speech endpoint

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::SynthesisService;
use crate::config::SpeechConfig;
use crate::{Error, Result};

/// Fixed response encoding; playback only decodes MP3
const RESPONSE_FORMAT: &str = "mp3";

/// Synthesizes speech with persona delivery instructions
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    voice: String,
    base_url: String,
}

/// Speech request body
#[derive(Debug, serde::Serialize)]
pub struct SpeechRequest<'a> {
    pub model: &'a str,
    pub voice: &'a str,
    pub input: &'a str,
    pub instructions: &'a str,
    pub response_format: &'a str,
}

impl OpenAiSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: Option<&SecretString>, config: &SpeechConfig) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.expose_secret())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY required for TTS".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.to_owned()),
            model: config.model.clone(),
            voice: config.voice.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the request body for `text`
    #[must_use]
    pub fn request<'a>(&'a self, text: &'a str, instructions: &'a str) -> SpeechRequest<'a> {
        SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: text,
            instructions,
            response_format: RESPONSE_FORMAT,
        }
    }
}

#[async_trait]
impl SynthesisService for OpenAiSpeech {
    async fn synthesize(&self, text: &str, instructions: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.len(), voice = %self.voice, "synthesizing speech");

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&self.request(text, instructions))
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("TTS request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("failed to read TTS audio: {e}")))?;

        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "openai-tts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_requests_mp3() {
        let key = SecretString::from("sk-test".to_string());
        let tts = OpenAiSpeech::new(Some(&key), &SpeechConfig::default()).unwrap();

        let body = serde_json::to_value(tts.request("hi there", "speak softly")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o-mini-tts",
                "voice": "nova",
                "input": "hi there",
                "instructions": "speak softly",
                "response_format": "mp3",
            })
        );
    }

    #[test]
    fn requires_api_key() {
        assert!(OpenAiSpeech::new(None, &SpeechConfig::default()).is_err());
    }
}
