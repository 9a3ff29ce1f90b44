//! Speech engines: the narrator's only contact with audio output.
//!
//! An engine speaks one [`Utterance`] at a time and reports progress as
//! [`EngineEvent`]s on a channel supplied with each call. For a single
//! utterance, boundary events arrive in offset order and the end event
//! comes last. After `cancel()` an engine sends nothing further for the
//! cancelled utterance.
//!
//! - `paced`: silent timer-driven engine
//! - `command`: external synthesiser process (espeak-ng compatible)

pub mod command;
pub mod paced;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{EngineConfig, EngineKind};
use crate::error::EngineError;
use crate::voice::Voice;

pub use command::CommandEngine;
pub use paced::PacedEngine;

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Identifies one chunk of one narration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId {
    pub session: u64,
    pub chunk: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    /// `None` lets the engine pick its default voice.
    pub voice: Option<Voice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Word,
    Sentence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Playback reached `char_index` (characters into the utterance text).
    Boundary {
        id: UtteranceId,
        char_index: usize,
        kind: BoundaryKind,
    },
    /// The utterance finished playing.
    End { id: UtteranceId },
}

impl EngineEvent {
    pub fn id(&self) -> UtteranceId {
        match self {
            Self::Boundary { id, .. } | Self::End { id } => *id,
        }
    }
}

pub trait SpeechEngine: Send {
    /// Voices currently known to the engine. May be empty while the
    /// engine is still discovering them.
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking. Returns once playback is queued; progress is
    /// reported on `events`.
    fn speak(&mut self, utterance: Utterance, events: EventSender) -> Result<(), EngineError>;

    /// Stop the current utterance and drop anything queued.
    fn cancel(&mut self);

    fn is_speaking(&self) -> bool;
}

/// Build the engine selected in config. Must be called inside a tokio
/// runtime: engines spawn their playback tasks on it.
pub fn from_config(config: &EngineConfig) -> Box<dyn SpeechEngine> {
    match config.kind {
        EngineKind::Paced => Box::new(PacedEngine::new(
            config.words_per_minute,
            config.paced_voices.clone(),
        )),
        EngineKind::Command => Box::new(CommandEngine::new(
            &config.program,
            config.words_per_minute,
        )),
    }
}

/// Character offsets at which each whitespace-separated word starts.
pub(crate) fn word_offsets(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut in_word = false;
    for (i, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            offsets.push(i);
            in_word = true;
        }
    }
    offsets
}

/// Time spent on one word at `words_per_minute`.
pub(crate) fn word_duration(words_per_minute: u32) -> Duration {
    Duration::from_millis(60_000 / u64::from(words_per_minute.max(1)))
}
