//! Voice preference and resolution against an engine's voice list.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// An engine-provided voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    /// Identifier passed back to the engine when speaking.
    pub id: String,
    /// Human-readable name; matched against the preference.
    pub name: String,
}

impl Voice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Coarse voice category picked by the user.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VoicePreference {
    Male,
    #[default]
    Female,
}

impl VoicePreference {
    /// Case-sensitive substring looked for in voice names.
    fn needle(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

impl std::fmt::Display for VoicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
        }
    }
}

/// Pick the first voice whose name contains the preference, else the
/// first voice listed. `None` means "let the engine use its default",
/// which is also what happens while the voice list is still loading.
pub fn select_voice(voices: &[Voice], preference: VoicePreference) -> Option<Voice> {
    let needle = preference.needle();
    let matched = voices.iter().find(|v| v.name.contains(needle));
    if matched.is_none() {
        debug!("No voice matches \"{needle}\" among {} voices", voices.len());
    }
    matched.or_else(|| voices.first()).cloned()
}
