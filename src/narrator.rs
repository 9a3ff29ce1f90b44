//! Narration state machine.
//!
//! IDLE → SPEAKING(0) → SPEAKING(1) → … → IDLE
//!
//! Chunk `i + 1` is only queued from the end event of chunk `i`, so
//! chunks never overlap. Starting new narration (or calling `cancel`)
//! stops the engine first and moves through CANCELLED; events stamped
//! with an older session are ignored from then on.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chunker::{self, Chunk, WordSequence};
use crate::config::{NarrationConfig, VoiceSelection};
use crate::engine::{
    EngineEvent, EventReceiver, EventSender, SpeechEngine, Utterance, UtteranceId,
};
use crate::highlight::HighlightTracker;
use crate::voice::{select_voice, Voice, VoicePreference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarratorState {
    Idle,
    Speaking(usize),
    Cancelled,
}

impl std::fmt::Display for NarratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Speaking(i) => write!(f, "SPEAKING({i})"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// How a `start_speech` call went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Nothing to say; narrator stays idle.
    Empty,
    /// The engine refused the first chunk; narrator is idle.
    EngineFailed,
}

/// What an engine event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationUpdate {
    /// Event belonged to another session or chunk.
    Ignored,
    Highlight(Option<usize>),
    /// Previous chunk ended and this one was queued.
    NextChunk(usize),
    /// Last chunk ended; narrator is idle.
    Finished,
    /// The engine refused the next chunk; narrator is idle.
    EngineFailed,
}

struct Session {
    id: u64,
    words: WordSequence,
    chunk: Chunk,
    chunk_index: usize,
    chunk_total: usize,
    /// Voice fixed at session start (per-session selection only).
    voice: Option<Voice>,
}

pub struct Narrator {
    engine: Box<dyn SpeechEngine>,
    events: EventSender,
    chunk_size: usize,
    selection: VoiceSelection,
    preference: VoicePreference,
    state: NarratorState,
    session: Option<Session>,
    last_session: u64,
    tracker: HighlightTracker,
}

impl Narrator {
    /// Build a narrator around `engine`. The receiver carries the engine's
    /// events and must be fed back through [`Narrator::handle_event`].
    pub fn new(engine: Box<dyn SpeechEngine>, config: &NarrationConfig) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let narrator = Self {
            engine,
            events,
            chunk_size: config.chunk_size.max(1),
            selection: config.voice_selection,
            preference: config.voice,
            state: NarratorState::Idle,
            session: None,
            last_session: 0,
            tracker: HighlightTracker::new(),
        };
        (narrator, rx)
    }

    pub fn state(&self) -> NarratorState {
        self.state
    }

    pub fn highlight(&self) -> Option<usize> {
        self.tracker.current()
    }

    /// Word under the highlight, if narration is running.
    pub fn highlighted_word(&self) -> Option<&str> {
        let index = self.tracker.current()?;
        self.session.as_ref()?.words.get(index)
    }

    /// Id of the most recently started session (0 before the first).
    pub fn session_id(&self) -> u64 {
        self.last_session
    }

    pub fn preference(&self) -> VoicePreference {
        self.preference
    }

    pub fn set_preference(&mut self, preference: VoicePreference) {
        info!("Voice preference: {} → {preference}", self.preference);
        self.preference = preference;
    }

    /// Cancel whatever is playing, then narrate `text` from its first chunk.
    pub fn start_speech(&mut self, text: &str) -> StartOutcome {
        self.cancel();
        if self.state == NarratorState::Cancelled {
            self.transition(NarratorState::Idle);
        }

        self.last_session += 1;
        let words = chunker::split(text);
        let Some(chunk) = chunker::chunk_at(&words, 0, self.chunk_size) else {
            debug!("Session {}: nothing to narrate", self.last_session);
            return StartOutcome::Empty;
        };

        let voice = match self.selection {
            VoiceSelection::PerSession => self.resolve_voice(),
            VoiceSelection::PerChunk => None,
        };
        let chunk_total = chunker::chunk_count(words.len(), self.chunk_size);
        info!(
            "Session {}: {} words in {chunk_total} chunks",
            self.last_session,
            words.len()
        );
        self.session = Some(Session {
            id: self.last_session,
            words,
            chunk,
            chunk_index: 0,
            chunk_total,
            voice,
        });

        if self.speak_current() {
            StartOutcome::Started
        } else {
            StartOutcome::EngineFailed
        }
    }

    /// Stop narration and drop the session. Returns whether anything was
    /// playing.
    pub fn cancel(&mut self) -> bool {
        self.engine.cancel();
        self.tracker.clear();
        if self.session.take().is_none() {
            return false;
        }
        self.transition(NarratorState::Cancelled);
        true
    }

    /// Cancel and settle in Idle rather than Cancelled. Used when narration
    /// is abandoned without the user asking for it.
    pub fn stop(&mut self) -> bool {
        let stopped = self.cancel();
        self.transition(NarratorState::Idle);
        stopped
    }

    /// Whether the engine still reports playback in progress.
    pub fn engine_speaking(&self) -> bool {
        self.engine.is_speaking()
    }

    /// Feed one engine event through the state machine.
    pub fn handle_event(&mut self, event: EngineEvent) -> NarrationUpdate {
        let Some(session) = &self.session else {
            return NarrationUpdate::Ignored;
        };
        let current = UtteranceId {
            session: session.id,
            chunk: session.chunk_index,
        };
        if event.id() != current {
            debug!("Dropping stale event for {:?} (current {current:?})", event.id());
            return NarrationUpdate::Ignored;
        }

        match event {
            EngineEvent::Boundary {
                char_index, kind, ..
            } => {
                let index = self.tracker.on_boundary(&session.chunk, char_index, kind);
                NarrationUpdate::Highlight(index)
            }
            EngineEvent::End { .. } => self.advance(),
        }
    }

    fn advance(&mut self) -> NarrationUpdate {
        let Some(session) = self.session.as_mut() else {
            return NarrationUpdate::Ignored;
        };
        let next_index = session.chunk_index + 1;
        let next_start = next_index * self.chunk_size;
        let Some(next) = chunker::chunk_at(&session.words, next_start, self.chunk_size) else {
            info!("Session {} finished", session.id);
            self.session = None;
            self.tracker.clear();
            self.transition(NarratorState::Idle);
            return NarrationUpdate::Finished;
        };
        session.chunk = next;
        session.chunk_index = next_index;

        if self.speak_current() {
            NarrationUpdate::NextChunk(next_index)
        } else {
            NarrationUpdate::EngineFailed
        }
    }

    /// Hand the session's current chunk to the engine. On failure the
    /// session is dropped and the narrator goes idle.
    fn speak_current(&mut self) -> bool {
        let per_chunk_voice = match self.selection {
            VoiceSelection::PerChunk => self.resolve_voice(),
            VoiceSelection::PerSession => None,
        };
        let Some(session) = &self.session else {
            return false;
        };
        let utterance = Utterance {
            id: UtteranceId {
                session: session.id,
                chunk: session.chunk_index,
            },
            text: session.chunk.text.clone(),
            voice: per_chunk_voice.or_else(|| session.voice.clone()),
        };
        let chunk_index = session.chunk_index;
        debug!(
            "Chunk {}/{} of session {} (words {}..{})",
            chunk_index + 1,
            session.chunk_total,
            session.id,
            session.chunk.start,
            session.chunk.end()
        );

        match self.engine.speak(utterance, self.events.clone()) {
            Ok(()) => {
                self.transition(NarratorState::Speaking(chunk_index));
                true
            }
            Err(e) => {
                warn!("Speech engine failed, narration stopped: {e}");
                self.session = None;
                self.tracker.clear();
                self.transition(NarratorState::Idle);
                false
            }
        }
    }

    fn resolve_voice(&self) -> Option<Voice> {
        let voice = select_voice(&self.engine.voices(), self.preference);
        if voice.is_none() {
            debug!("Voice list empty, using engine default");
        }
        voice
    }

    fn transition(&mut self, next: NarratorState) {
        if self.state != next {
            debug!("State: {} → {next}", self.state);
            self.state = next;
        }
    }
}
