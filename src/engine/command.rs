//! Engine backed by an external synthesiser process (espeak-ng compatible).
//!
//! The voice list is discovered in the background from `<program> --voices`,
//! so it may still be empty when the first utterance is spoken; callers
//! then get the synthesiser's default voice. The process gives no word
//! timing, so boundaries are estimated from the speaking rate. The end
//! event fires when the process exits.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    word_duration, word_offsets, BoundaryKind, EngineEvent, EventSender, SpeechEngine, Utterance,
};
use crate::error::EngineError;
use crate::voice::Voice;

pub struct CommandEngine {
    program: String,
    words_per_minute: u32,
    voices: Arc<Mutex<Vec<Voice>>>,
    playback: Option<Playback>,
}

struct Playback {
    token: CancellationToken,
    done: Arc<AtomicBool>,
}

impl CommandEngine {
    /// Create the engine and start loading its voice list.
    pub fn new(program: &str, words_per_minute: u32) -> Self {
        let voices = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(load_voices(program.to_string(), voices.clone()));
        Self {
            program: program.to_string(),
            words_per_minute,
            voices,
            playback: None,
        }
    }
}

impl SpeechEngine for CommandEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn speak(&mut self, utterance: Utterance, events: EventSender) -> Result<(), EngineError> {
        self.cancel();

        let mut command = Command::new(&self.program);
        command
            .arg("-s")
            .arg(self.words_per_minute.max(1).to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(voice) = &utterance.voice {
            command.arg("-v").arg(&voice.id);
        }
        command.arg("--").arg(&utterance.text);

        let mut child = command.spawn()?;

        let token = CancellationToken::new();
        let done = Arc::new(AtomicBool::new(false));
        self.playback = Some(Playback {
            token: token.clone(),
            done: done.clone(),
        });

        let id = utterance.id;
        let offsets = word_offsets(&utterance.text);
        let mut ticker = tokio::time::interval(word_duration(self.words_per_minute));

        tokio::spawn(async move {
            let mut next = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        if let Err(e) = child.kill().await {
                            debug!("Failed to kill synthesiser: {e}");
                        }
                        return;
                    }
                    status = child.wait() => {
                        match status {
                            Ok(s) if !s.success() => warn!("Synthesiser exited with {s}"),
                            Err(e) => warn!("Failed waiting on synthesiser: {e}"),
                            Ok(_) => {}
                        }
                        break;
                    }
                    _ = ticker.tick(), if next < offsets.len() => {
                        let _ = events.send(EngineEvent::Boundary {
                            id,
                            char_index: offsets[next],
                            kind: BoundaryKind::Word,
                        });
                        next += 1;
                    }
                }
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

async fn load_voices(program: String, voices: Arc<Mutex<Vec<Voice>>>) {
    let output = match Command::new(&program).arg("--voices").output().await {
        Ok(o) => o,
        Err(e) => {
            warn!("Cannot list voices from {program}: {e}");
            return;
        }
    };
    let listed = parse_voice_listing(&String::from_utf8_lossy(&output.stdout));
    info!("Loaded {} voices from {program}", listed.len());
    if let Ok(mut guard) = voices.lock() {
        *guard = listed;
    }
}

/// Parse `espeak-ng --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 3)
/// ```
///
/// The gender column is folded into the name ("English_(America) Male") so
/// preference matching works on names alone.
fn parse_voice_listing(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let age_gender = cols.next()?;
            let name = cols.next()?;
            let gender = match age_gender.rsplit('/').next() {
                Some("M") => " Male",
                Some("F") => " Female",
                _ => "",
            };
            Some(Voice::new(language, format!("{name}{gender}")))
        })
        .collect()
}
