//! Configuration management for chat-narrator.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a missing or partial file still yields a usable config.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::voice::VoicePreference;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    /// Inline key; takes precedence over `api_key_env` when non-empty.
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-3.5-turbo".into(),
            max_tokens: 2048,
            api_key_env: "CHAT_GPT_API_KEY".into(),
            api_key: String::new(),
            timeout_secs: 60,
        }
    }
}

impl CompletionConfig {
    /// Resolve the bearer token from the inline value or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSelection {
    /// Resolve the voice once when narration starts.
    PerSession,
    /// Re-resolve before every chunk, picking up a late voice list.
    PerChunk,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub chunk_size: usize,
    pub voice: VoicePreference,
    pub voice_selection: VoiceSelection,
    /// Seconds without any engine event before a chunk is given up on.
    /// 0 disables the watchdog.
    pub stall_timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            voice: VoicePreference::Female,
            voice_selection: VoiceSelection::PerChunk,
            stall_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Silent, timer-driven narration.
    Paced,
    /// External synthesiser process (espeak-ng compatible).
    Command,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub words_per_minute: u32,
    /// Synthesiser binary used by the command engine.
    pub program: String,
    /// Voice names offered by the paced engine.
    pub paced_voices: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Paced,
            words_per_minute: 180,
            program: "espeak-ng".into(),
            paced_voices: vec!["Narrator Female".into(), "Narrator Male".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8768,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub completion: CompletionConfig,
    pub narration: NarrationConfig,
    pub engine: EngineConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/chat-narrator/config.yaml
    /// 3. /etc/chat-narrator/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/chat-narrator/config.yaml")),
                Some(PathBuf::from("/etc/chat-narrator/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "narration:\n  chunk_size: 5\n  voice: male\n  voice_selection: per_session\nengine:\n  kind: command\n"
        )
        .unwrap();

        let config = Config::load(Some(&path));
        assert_eq!(config.narration.chunk_size, 5);
        assert_eq!(config.narration.voice, VoicePreference::Male);
        assert_eq!(config.narration.voice_selection, VoiceSelection::PerSession);
        assert_eq!(config.narration.stall_timeout_secs, 30);
        assert_eq!(config.engine.kind, EngineKind::Command);
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.completion.max_tokens, 2048);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "narration: [not, a, map").unwrap();

        let config = Config::load(Some(&path));
        assert_eq!(config.narration.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.api.port, 8768);
    }

    #[test]
    fn inline_key_wins_over_environment() {
        let config = CompletionConfig {
            api_key: "  sk-inline ".into(),
            api_key_env: "CHAT_NARRATOR_TEST_UNUSED_KEY".into(),
            ..CompletionConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-inline"));
    }

    #[test]
    fn missing_key_resolves_to_none() {
        let config = CompletionConfig {
            api_key_env: "CHAT_NARRATOR_TEST_DEFINITELY_UNSET".into(),
            ..CompletionConfig::default()
        };
        assert_eq!(config.resolve_api_key(), None);
    }
}
