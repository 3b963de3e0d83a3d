//! Gemini `generateContent` client

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::GenerationService;
use crate::config::GenerationConfig;
use crate::{Error, Result};

/// Gemini text-generation client
pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: Option<&SecretString>, config: &GenerationConfig) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.expose_secret())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("GEMINI_API_KEY required for text generation".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key: SecretString::from(api_key.to_owned()),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, instruction: &str, transcript: &str) -> Result<Option<String>> {
        let request = GenerateRequest::new(instruction, transcript);

        tracing::debug!(model = %self.model, "requesting Gemini reply");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Gemini request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Gemini API error");
            return Err(Error::Generation(format!("Gemini API error {status}: {body}")));
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            Error::Generation(format!("failed to parse Gemini response: {}", e.without_url()))
        })?;

        Ok(result.reply_text())
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// `generateContent` request body
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
}

impl GenerateRequest {
    #[must_use]
    pub fn new(instruction: &str, transcript: &str) -> Self {
        Self {
            system_instruction: Content::text(instruction),
            contents: vec![Content::text(transcript)],
        }
    }
}

/// Content block with text parts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

/// Single content part
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// `generateContent` response body; every level may be absent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Text of the first candidate's first part, if it has any words
    #[must_use]
    pub fn reply_text(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
    }
}
