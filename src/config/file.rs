//! TOML configuration file loading
//!
//! Supports `~/.config/niko/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::controller::OverlapPolicy;
use crate::persona::Tone;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct NikoConfigFile {
    /// Persona defaults
    #[serde(default)]
    pub persona: PersonaFileConfig,

    /// Text-generation service
    #[serde(default)]
    pub generation: GenerationFileConfig,

    /// Speech-synthesis service
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Microphone capture and transcription
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Per-stage bounded waits
    #[serde(default)]
    pub timeouts: TimeoutsFileConfig,

    /// What to do when start is pressed mid-turn
    pub overlap: Option<OverlapPolicy>,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Persona defaults
#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    pub user_name: Option<String>,
    pub tone: Option<Tone>,
    pub assistant_name: Option<String>,
}

/// Text-generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct GenerationFileConfig {
    /// Model identifier (e.g. "gemini-2.0-flash")
    pub model: Option<String>,

    /// API base URL override
    pub base_url: Option<String>,
}

/// Speech-synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// TTS model (e.g. "gpt-4o-mini-tts")
    pub model: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub voice: Option<String>,

    /// API base URL override
    pub base_url: Option<String>,
}

/// Capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Transcription language (ISO 639-1)
    pub language: Option<String>,

    /// Longest utterance to record before giving up
    pub max_utterance_secs: Option<f32>,
}

/// Timeout configuration, in seconds
#[derive(Debug, Default, Deserialize)]
pub struct TimeoutsFileConfig {
    pub capture_secs: Option<f64>,
    pub generation_secs: Option<f64>,
    pub synthesis_secs: Option<f64>,
    pub playback_secs: Option<f64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub gemini: Option<String>,
    pub openai: Option<String>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,
}

/// Load the TOML config file from `path`, or the standard path when `None`
///
/// A missing file at the standard path yields defaults. An explicitly
/// requested path must exist and parse.
///
/// # Errors
///
/// Returns error if an explicit path cannot be read, or any file fails to parse
pub fn load_config_file(path: Option<&Path>) -> crate::Result<NikoConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(NikoConfigFile::default());
    };

    if !path.exists() {
        return Ok(NikoConfigFile::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
        e
    })?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/niko/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("niko").join("config.toml"))
}
