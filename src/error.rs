//! Error types for Niko

use thiserror::Error;

/// Result type alias for Niko operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a bounded wait applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Generation,
    Synthesis,
    Playback,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Capture => "capture",
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
            Self::Playback => "playback",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in Niko
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech capture is not available on this host
    #[error("speech capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Speech capture started but failed
    #[error("capture error: {0}")]
    Capture(String),

    /// Text-generation service error
    #[error("generation failed: {0}")]
    Generation(String),

    /// Speech-synthesis service error
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// Audio playback error
    #[error("playback failed: {0}")]
    Playback(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// A turn is already in flight
    #[error("a turn is already in progress ({0})")]
    Busy(crate::TurnStatus),

    /// A pipeline stage exceeded its bounded wait
    #[error("{stage} timed out after {secs:.1}s")]
    Timeout { stage: Stage, secs: f64 },

    /// Unknown tone value
    #[error("unknown tone: {0}")]
    UnknownTone(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the user can simply try again
    ///
    /// Missing capture hardware and bad configuration need intervention;
    /// everything a single turn can run into is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::CaptureUnavailable(_) | Self::Config(_) | Self::UnknownTone(_)
        )
    }

    /// Short machine-readable code for API responses and events
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::CaptureUnavailable(_) => "capture_unavailable",
            Self::Capture(_) => "capture_failed",
            Self::Generation(_) => "generation_failed",
            Self::Synthesis(_) => "synthesis_failed",
            Self::Playback(_) => "playback_failed",
            Self::Audio(_) => "audio",
            Self::Busy(_) => "busy",
            Self::Timeout { .. } => "timeout",
            Self::UnknownTone(_) => "unknown_tone",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Serialization(_) => "serialization",
            Self::Toml(_) => "toml",
        }
    }
}
