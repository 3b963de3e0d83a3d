//! Persona configuration and instruction templates
//!
//! A persona is who the assistant speaks to (the user's name) and how
//! (the tone). Both the generation and the synthesis instructions are
//! built from it on every turn, so edits take effect on the next turn
//! without touching the capture service.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Default user name
pub const DEFAULT_USER_NAME: &str = "Manoj";

/// Default assistant name used in speech instructions
pub const DEFAULT_ASSISTANT_NAME: &str = "Niko";

/// Relationship tone for generated and spoken replies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Friendly,
    #[default]
    Flirty,
    Supportive,
    Funny,
    Romantic,
    Angry,
}

impl Tone {
    /// Every selectable tone, in display order
    pub const ALL: [Self; 6] = [
        Self::Friendly,
        Self::Flirty,
        Self::Supportive,
        Self::Funny,
        Self::Romantic,
        Self::Angry,
    ];

    /// Token used inside instruction strings
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Flirty => "flirty",
            Self::Supportive => "supportive",
            Self::Funny => "funny",
            Self::Romantic => "romantic",
            Self::Angry => "angry",
        }
    }

    /// Emoji label for selectors
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Friendly => "🫂",
            Self::Flirty => "🫦",
            Self::Supportive | Self::Romantic => "🤗",
            Self::Funny => "🤣",
            Self::Angry => "😡",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| Error::UnknownTone(s.to_string()))
    }
}

/// User-supplied persona parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaConfig {
    /// Name of the person the assistant talks to
    pub user_name: String,

    /// Relationship tone
    #[serde(default)]
    pub tone: Tone,

    /// Name the assistant speaks as
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
}

fn default_assistant_name() -> String {
    DEFAULT_ASSISTANT_NAME.to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            user_name: DEFAULT_USER_NAME.to_string(),
            tone: Tone::default(),
            assistant_name: default_assistant_name(),
        }
    }
}

impl PersonaConfig {
    /// Create a persona for a user and tone with the default assistant name
    #[must_use]
    pub fn new(user_name: impl Into<String>, tone: Tone) -> Self {
        Self {
            user_name: user_name.into(),
            tone,
            assistant_name: default_assistant_name(),
        }
    }

    /// System instruction sent to the text-generation service
    #[must_use]
    pub fn generation_instruction(&self) -> String {
        format!(
            "Respond as a persona with relationship {tone} to {name}; keep the reply short and suitable for speech.",
            tone = self.tone,
            name = self.user_name,
        )
    }

    /// Delivery instruction sent to the speech-synthesis service
    #[must_use]
    pub fn speech_instruction(&self) -> String {
        format!(
            "Speak as {assistant}, a persona with relationship {tone} to {name}; use a {tone} tone with emotional expression.",
            assistant = self.assistant_name,
            tone = self.tone,
            name = self.user_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tone_and_name_appear_in_instruction() {
        for tone in Tone::ALL {
            let persona = PersonaConfig::new("Ava", tone);
            let instruction = persona.generation_instruction();
            assert!(instruction.contains(tone.as_str()), "{instruction}");
            assert!(instruction.contains("Ava"));

            let speech = persona.speech_instruction();
            assert!(speech.contains(tone.as_str()));
            assert!(speech.contains("Ava"));
        }
    }

    #[test]
    fn instruction_is_deterministic() {
        let persona = PersonaConfig::new("Ava", Tone::Supportive);
        assert_eq!(
            persona.generation_instruction(),
            persona.generation_instruction()
        );
        assert_eq!(
            persona.generation_instruction(),
            "Respond as a persona with relationship supportive to Ava; keep the reply short and suitable for speech."
        );
    }

    #[test]
    fn tone_parse_is_case_insensitive() {
        assert_eq!("Funny".parse::<Tone>().unwrap(), Tone::Funny);
        assert_eq!(" ANGRY ".parse::<Tone>().unwrap(), Tone::Angry);
        assert!("sarcastic".parse::<Tone>().is_err());
    }

    #[test]
    fn persona_serde_uses_lowercase_tone() {
        let json = serde_json::to_value(PersonaConfig::new("Ava", Tone::Romantic)).unwrap();
        assert_eq!(json["tone"], "romantic");
        assert_eq!(json["userName"], "Ava");

        let back: PersonaConfig =
            serde_json::from_str(r#"{"userName":"Bo","tone":"friendly"}"#).unwrap();
        assert_eq!(back.tone, Tone::Friendly);
        assert_eq!(back.assistant_name, DEFAULT_ASSISTANT_NAME);
    }

    #[test]
    fn defaults_match_initial_selection() {
        let persona = PersonaConfig::default();
        assert_eq!(persona.user_name, DEFAULT_USER_NAME);
        assert_eq!(persona.tone, Tone::Flirty);
    }
}
