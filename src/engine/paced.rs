//! Silent engine that "speaks" at a fixed words-per-minute rate.
//!
//! Emits one word boundary per word, spaced by the per-word duration,
//! then the end event. Useful for console narration without audio and
//! for exercising the narration loop under tokio's paused clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    word_duration, word_offsets, BoundaryKind, EngineEvent, EventSender, SpeechEngine, Utterance,
};
use crate::error::EngineError;
use crate::voice::Voice;

pub struct PacedEngine {
    words_per_minute: u32,
    voices: Vec<Voice>,
    playback: Option<Playback>,
}

/// Handle on the task playing the current utterance.
struct Playback {
    token: CancellationToken,
    done: Arc<AtomicBool>,
}

impl PacedEngine {
    pub fn new(words_per_minute: u32, voice_names: Vec<String>) -> Self {
        let voices = voice_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Voice::new(format!("paced-{i}"), name))
            .collect();
        Self {
            words_per_minute,
            voices,
            playback: None,
        }
    }
}

impl SpeechEngine for PacedEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance, events: EventSender) -> Result<(), EngineError> {
        self.cancel();

        let token = CancellationToken::new();
        let done = Arc::new(AtomicBool::new(false));
        self.playback = Some(Playback {
            token: token.clone(),
            done: done.clone(),
        });

        let per_word = word_duration(self.words_per_minute);
        let id = utterance.id;
        debug!(
            "Paced utterance {}/{}: {} chars, voice {:?}",
            id.session,
            id.chunk,
            utterance.text.chars().count(),
            utterance.voice.as_ref().map(|v| v.name.as_str()),
        );

        tokio::spawn(async move {
            for char_index in word_offsets(&utterance.text) {
                if token.is_cancelled() {
                    return;
                }
                let boundary = EngineEvent::Boundary {
                    id,
                    char_index,
                    kind: BoundaryKind::Word,
                };
                if events.send(boundary).is_err() {
                    return;
                }
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(per_word) => {}
                }
            }
            if token.is_cancelled() {
                return;
            }
            done.store(true, Ordering::Relaxed);
            let _ = events.send(EngineEvent::End { id });
        });

        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.token.cancel();
        }
    }

    fn is_speaking(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.done.load(Ordering::Relaxed))
    }
}
