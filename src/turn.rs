//! Turn state, outcomes, and events

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Status of the turn controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Waiting for a start action
    #[default]
    Idle,
    /// Capture service is listening for an utterance
    Listening,
    /// Generating and speaking the reply
    Processing,
}

impl TurnStatus {
    /// Check if idle
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the start control should be enabled
    #[must_use]
    pub const fn start_enabled(self) -> bool {
        self.is_idle()
    }

    /// Text shown next to the status indicator
    #[must_use]
    pub const fn display_text(self) -> &'static str {
        match self {
            Self::Idle => "Click Start to speak",
            Self::Listening => "Listening...",
            Self::Processing => "Processing...",
        }
    }

    /// Whether `next` is a legal transition from this status
    ///
    /// The cycle is linear; any active status may fall back to idle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Listening)
                | (Self::Listening, Self::Processing)
                | (Self::Listening | Self::Processing, Self::Idle)
        )
    }
}

impl std::fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Processing => write!(f, "processing"),
        }
    }
}

/// One listen, generate, speak cycle
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub transcript: Option<String>,
    pub reply: Option<String>,
    /// Size of the synthesized payload that was played
    pub audio_bytes: Option<usize>,
}

impl Turn {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            transcript: None,
            reply: None,
            audio_bytes: None,
        }
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::new()
    }
}

/// How a requested turn ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Reply generated, synthesized, and played
    Spoken { transcript: String, reply: String },
    /// Capture finished without any words
    NoSpeech,
    /// Generation returned nothing to say
    NoReply { transcript: String },
    /// Another turn was in flight and the request was ignored
    Ignored,
    /// A newer request cancelled this turn
    Cancelled,
}

/// Events published while a turn runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Status changed
    Status { status: TurnStatus, text: &'static str },
    /// Final transcript from capture
    Transcript { turn_id: Uuid, text: String },
    /// Generated reply about to be spoken
    Reply { turn_id: Uuid, text: String },
    /// Turn failed; status has returned to idle
    Error { code: &'static str, message: String },
}

impl TurnEvent {
    #[must_use]
    pub const fn status(status: TurnStatus) -> Self {
        Self::Status {
            status,
            text: status.display_text(),
        }
    }
}
