//! Text generation
//!
//! Available providers:
//! - Gemini `generateContent`

mod gemini;

pub use gemini::{GeminiClient, GenerateRequest, GenerateResponse};

use async_trait::async_trait;

use crate::Result;

/// Produces a reply for a transcript under a system instruction
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate a reply
    ///
    /// Returns `Ok(None)` when the service answered but had nothing to say.
    ///
    /// # Errors
    ///
    /// Returns `Error::Generation` on network, HTTP, or decoding failures
    async fn generate(&self, instruction: &str, transcript: &str) -> Result<Option<String>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
