//! Test doubles shared by unit tests.

use std::sync::{Arc, Mutex};

use crate::engine::{BoundaryKind, EngineEvent, EventSender, SpeechEngine, Utterance};
use crate::error::EngineError;
use crate::voice::Voice;

#[derive(Default)]
struct Script {
    voices: Vec<Voice>,
    spoken: Vec<Utterance>,
    cancels: usize,
    fail_next: bool,
    speaking: bool,
    sender: Option<EventSender>,
}

/// Engine that records utterances and only emits events when a test
/// asks it to.
pub struct ScriptedEngine {
    script: ScriptHandle,
}

impl ScriptedEngine {
    pub fn new(voices: Vec<Voice>) -> Self {
        let script = ScriptHandle(Arc::new(Mutex::new(Script {
            voices,
            ..Script::default()
        })));
        Self { script }
    }

    pub fn script(&self) -> ScriptHandle {
        self.script.clone()
    }
}

impl SpeechEngine for ScriptedEngine {
    fn voices(&self) -> Vec<Voice> {
        self.script.lock().voices.clone()
    }

    fn speak(&mut self, utterance: Utterance, events: EventSender) -> Result<(), EngineError> {
        let mut script = self.script.lock();
        if script.fail_next {
            script.fail_next = false;
            return Err(EngineError::Unavailable("scripted failure".into()));
        }
        script.spoken.push(utterance);
        script.speaking = true;
        script.sender = Some(events);
        Ok(())
    }

    fn cancel(&mut self) {
        let mut script = self.script.lock();
        script.cancels += 1;
        script.speaking = false;
    }

    fn is_speaking(&self) -> bool {
        self.script.lock().speaking
    }
}

/// Test-side view of a [`ScriptedEngine`].
#[derive(Clone)]
pub struct ScriptHandle(Arc<Mutex<Script>>);

impl ScriptHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.0.lock().unwrap()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.lock().spoken.iter().map(|u| u.text.clone()).collect()
    }

    pub fn spoken_voices(&self) -> Vec<Option<String>> {
        self.lock()
            .spoken
            .iter()
            .map(|u| u.voice.as_ref().map(|v| v.id.clone()))
            .collect()
    }

    pub fn last_utterance(&self) -> Option<Utterance> {
        self.lock().spoken.last().cloned()
    }

    pub fn cancel_count(&self) -> usize {
        self.lock().cancels
    }

    pub fn set_voices(&self, voices: Vec<Voice>) {
        self.lock().voices = voices;
    }

    pub fn fail_next_speak(&self) {
        self.lock().fail_next = true;
    }

    /// Send an arbitrary event on the narrator's channel.
    pub fn emit(&self, event: EngineEvent) {
        if let Some(sender) = &self.lock().sender {
            let _ = sender.send(event);
        }
    }

    /// Fire a word boundary for the most recent utterance.
    pub fn emit_word(&self, char_index: usize) {
        let script = self.lock();
        if let (Some(sender), Some(last)) = (&script.sender, script.spoken.last()) {
            let _ = sender.send(EngineEvent::Boundary {
                id: last.id,
                char_index,
                kind: BoundaryKind::Word,
            });
        }
    }

    /// Fire the end event for the most recent utterance.
    pub fn finish_current(&self) {
        let mut script = self.lock();
        script.speaking = false;
        if let (Some(sender), Some(last)) = (&script.sender, script.spoken.last()) {
            let _ = sender.send(EngineEvent::End { id: last.id });
        }
    }
}
