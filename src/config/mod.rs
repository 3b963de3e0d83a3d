//! Configuration management for Niko
//!
//! Precedence, lowest first: built-in defaults, TOML file, environment,
//! CLI flags (applied by the binary). Secrets are read once here and
//! handed to clients at construction.

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::controller::OverlapPolicy;
use crate::persona::{DEFAULT_ASSISTANT_NAME, DEFAULT_USER_NAME, PersonaConfig, Tone};
use crate::{Error, Result};

use self::file::NikoConfigFile;

/// Default HTTP API port
pub const DEFAULT_PORT: u16 = 18_800;

/// Niko configuration
#[derive(Debug)]
pub struct Config {
    /// Persona used until the user changes it
    pub persona: PersonaConfig,

    /// Text-generation service
    pub generation: GenerationConfig,

    /// Speech-synthesis service
    pub speech: SpeechConfig,

    /// Microphone capture and transcription
    pub capture: CaptureConfig,

    /// Per-stage bounded waits
    pub timeouts: TimeoutConfig,

    /// Behaviour when a turn is requested mid-turn
    pub overlap: OverlapPolicy,

    /// API keys
    pub api_keys: ApiKeys,

    /// HTTP API server port
    pub port: u16,
}

/// Text-generation configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model identifier (e.g. "gemini-2.0-flash")
    pub model: String,

    /// API base URL
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Speech-synthesis configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// TTS model (e.g. "gpt-4o-mini-tts")
    pub model: String,

    /// TTS voice identifier
    pub voice: String,

    /// API base URL
    pub base_url: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini-tts".to_string(),
            voice: "nova".to_string(),
            base_url: "https://api.openai.com".to_string(),
        }
    }
}

/// Capture and transcription configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Transcription language (ISO 639-1)
    pub language: String,

    /// Longest utterance to record before giving up
    pub max_utterance: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            language: "en".to_string(),
            max_utterance: Duration::from_secs(12),
        }
    }
}

/// Bounded waits for each pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub capture: Duration,
    pub generation: Duration,
    pub synthesis: Duration,
    pub playback: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            capture: Duration::from_secs(15),
            generation: Duration::from_secs(30),
            synthesis: Duration::from_secs(30),
            playback: Duration::from_secs(120),
        }
    }
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// Gemini API key (text generation)
    pub gemini: Option<SecretString>,

    /// `OpenAI` API key (TTS and Whisper)
    pub openai: Option<SecretString>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            persona: PersonaConfig::default(),
            generation: GenerationConfig::default(),
            speech: SpeechConfig::default(),
            capture: CaptureConfig::default(),
            timeouts: TimeoutConfig::default(),
            overlap: OverlapPolicy::default(),
            api_keys: ApiKeys::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if the config file or an environment value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path)?;
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if an environment value cannot be parsed
    pub fn from_sources<F>(fc: NikoConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let tone = match env("NIKO_TONE") {
            Some(v) => v.parse()?,
            None => fc.persona.tone.unwrap_or_default(),
        };
        let persona = PersonaConfig {
            user_name: env("NIKO_USER_NAME")
                .or(fc.persona.user_name)
                .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            tone,
            assistant_name: env("NIKO_ASSISTANT_NAME")
                .or(fc.persona.assistant_name)
                .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string()),
        };

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            model: env("NIKO_GEMINI_MODEL")
                .or(fc.generation.model)
                .unwrap_or(defaults.model),
            base_url: env("NIKO_GEMINI_BASE_URL")
                .or(fc.generation.base_url)
                .unwrap_or(defaults.base_url),
        };

        let defaults = SpeechConfig::default();
        let speech = SpeechConfig {
            model: env("NIKO_TTS_MODEL")
                .or(fc.speech.model)
                .unwrap_or(defaults.model),
            voice: env("NIKO_TTS_VOICE")
                .or(fc.speech.voice)
                .unwrap_or(defaults.voice),
            base_url: env("NIKO_OPENAI_BASE_URL")
                .or(fc.speech.base_url)
                .unwrap_or(defaults.base_url),
        };

        let defaults = CaptureConfig::default();
        let max_utterance = match env("NIKO_MAX_UTTERANCE_SECS") {
            Some(v) => Some(parse_secs("NIKO_MAX_UTTERANCE_SECS", &v)?),
            None => fc
                .capture
                .max_utterance_secs
                .map(|s| secs_to_duration("capture.max_utterance_secs", f64::from(s)))
                .transpose()?,
        };
        let capture = CaptureConfig {
            stt_model: env("NIKO_STT_MODEL")
                .or(fc.capture.stt_model)
                .unwrap_or(defaults.stt_model),
            language: env("NIKO_LANGUAGE")
                .or(fc.capture.language)
                .unwrap_or(defaults.language),
            max_utterance: max_utterance.unwrap_or(defaults.max_utterance),
        };

        let defaults = TimeoutConfig::default();
        let stage = |var: &str, file_value: Option<f64>, default: Duration| -> Result<Duration> {
            match env(var) {
                Some(v) => parse_secs(var, &v),
                None => file_value.map_or(Ok(default), |s| secs_to_duration(var, s)),
            }
        };
        let timeouts = TimeoutConfig {
            capture: stage(
                "NIKO_CAPTURE_TIMEOUT_SECS",
                fc.timeouts.capture_secs,
                defaults.capture,
            )?,
            generation: stage(
                "NIKO_GENERATION_TIMEOUT_SECS",
                fc.timeouts.generation_secs,
                defaults.generation,
            )?,
            synthesis: stage(
                "NIKO_SYNTHESIS_TIMEOUT_SECS",
                fc.timeouts.synthesis_secs,
                defaults.synthesis,
            )?,
            playback: stage(
                "NIKO_PLAYBACK_TIMEOUT_SECS",
                fc.timeouts.playback_secs,
                defaults.playback,
            )?,
        };

        let overlap = match env("NIKO_OVERLAP") {
            Some(v) => v.parse()?,
            None => fc.overlap.unwrap_or_default(),
        };

        // Load API keys (env > toml > None)
        let api_keys = ApiKeys {
            gemini: env("GEMINI_API_KEY")
                .or(fc.api_keys.gemini)
                .map(SecretString::from),
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
        };

        let port = match env("NIKO_PORT") {
            Some(v) => v
                .parse()
                .map_err(|e| Error::Config(format!("NIKO_PORT: {e}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };

        Ok(Self {
            persona,
            generation,
            speech,
            capture,
            timeouts,
            overlap,
            api_keys,
            port,
        })
    }

    /// Override the persona name and tone (CLI flags)
    pub fn apply_persona_overrides(&mut self, user_name: Option<String>, tone: Option<Tone>) {
        if let Some(name) = user_name {
            self.persona.user_name = name;
        }
        if let Some(tone) = tone {
            self.persona.tone = tone;
        }
    }
}

fn parse_secs(var: &str, value: &str) -> Result<Duration> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{var}: {e}")))?;
    secs_to_duration(var, secs)
}

fn secs_to_duration(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!("{name}: must be a positive number of seconds")));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| Error::Config(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(NikoConfigFile::default(), |_| None).unwrap();

        assert_eq!(config.persona, PersonaConfig::default());
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        assert_eq!(config.speech.voice, "nova");
        assert_eq!(config.capture.language, "en");
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.overlap, OverlapPolicy::Reject);
        assert!(config.api_keys.gemini.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn env_overrides_file() {
        let fc: NikoConfigFile = toml::from_str(
            r#"
            [persona]
            user_name = "FromFile"
            tone = "angry"

            [api_keys]
            gemini = "file-key"
            "#,
        )
        .unwrap();

        let env = env_from(&[
            ("NIKO_USER_NAME", "Ava"),
            ("GEMINI_API_KEY", "env-key"),
            ("NIKO_GENERATION_TIMEOUT_SECS", "2.5"),
            ("NIKO_OVERLAP", "ignore"),
        ]);
        let config = Config::from_sources(fc, env).unwrap();

        assert_eq!(config.persona.user_name, "Ava");
        assert_eq!(config.persona.tone, Tone::Angry);
        assert_eq!(
            config.api_keys.gemini.as_ref().unwrap().expose_secret(),
            "env-key"
        );
        assert_eq!(config.timeouts.generation, Duration::from_millis(2500));
        assert_eq!(config.overlap, OverlapPolicy::Ignore);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let env = env_from(&[("OPENAI_API_KEY", "  "), ("NIKO_TONE", "")]);
        let config = Config::from_sources(NikoConfigFile::default(), env).unwrap();
        assert!(config.api_keys.openai.is_none());
        assert_eq!(config.persona.tone, Tone::Flirty);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_tone = env_from(&[("NIKO_TONE", "sarcastic")]);
        assert!(Config::from_sources(NikoConfigFile::default(), bad_tone).is_err());

        let bad_timeout = env_from(&[("NIKO_CAPTURE_TIMEOUT_SECS", "-1")]);
        assert!(Config::from_sources(NikoConfigFile::default(), bad_timeout).is_err());

        let huge_timeout = env_from(&[("NIKO_CAPTURE_TIMEOUT_SECS", "1e30")]);
        assert!(matches!(
            Config::from_sources(NikoConfigFile::default(), huge_timeout),
            Err(Error::Config(_))
        ));

        let huge_utterance: NikoConfigFile =
            toml::from_str("[capture]\nmax_utterance_secs = 1e30\n").unwrap();
        assert!(Config::from_sources(huge_utterance, |_| None).is_err());

        let bad_port = env_from(&[("NIKO_PORT", "http")]);
        assert!(Config::from_sources(NikoConfigFile::default(), bad_port).is_err());
    }

    #[test]
    fn debug_output_redacts_keys() {
        let env = env_from(&[("OPENAI_API_KEY", "sk-very-secret")]);
        let config = Config::from_sources(NikoConfigFile::default(), env).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
    }

    #[test]
    fn cli_overrides_apply_last() {
        let mut config = Config::default();
        config.apply_persona_overrides(Some("Ava".into()), Some(Tone::Funny));
        assert_eq!(config.persona, PersonaConfig::new("Ava", Tone::Funny));
    }
}
