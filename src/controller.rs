//! Narration controller: the single owner of the narrator.
//!
//! One task serialises user commands, completion results and engine events
//! on a `tokio::select!` loop and publishes a status snapshot on a watch
//! channel after every change.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::completion::{CompletionClient, CompletionResult};
use crate::engine::EventReceiver;
use crate::error::ControllerStopped;
use crate::narrator::{NarrationUpdate, Narrator, NarratorState, StartOutcome};
use crate::voice::VoicePreference;

/// Requests accepted by the controller.
#[derive(Debug)]
pub enum Command {
    SubmitPrompt {
        prompt: String,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Narrate(String),
    Cancel,
    SetVoice(VoicePreference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// A completion request is already in flight.
    Busy,
}

/// Snapshot of what the display layer needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NarrationStatus {
    /// "idle", "speaking" or "cancelled".
    pub state: String,
    pub chunk: Option<usize>,
    pub loading: bool,
    pub highlight: Option<usize>,
    pub highlighted_word: Option<String>,
    pub voice: VoicePreference,
    /// Text being (or last) narrated.
    pub response: String,
    /// Kind of the last completion failure, cleared on success.
    pub last_error: Option<String>,
    pub session: u64,
    /// Sessions that have ended for any reason.
    pub sessions_ended: u64,
}

/// Cloneable front door to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<NarrationStatus>,
}

impl ControllerHandle {
    pub async fn submit_prompt(&self, prompt: String) -> Result<SubmitOutcome, ControllerStopped> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SubmitPrompt { prompt, reply }).await?;
        rx.await.map_err(|_| ControllerStopped)
    }

    pub async fn narrate(&self, text: String) -> Result<(), ControllerStopped> {
        self.send(Command::Narrate(text)).await
    }

    pub async fn cancel(&self) -> Result<(), ControllerStopped> {
        self.send(Command::Cancel).await
    }

    pub async fn set_voice(&self, voice: VoicePreference) -> Result<(), ControllerStopped> {
        self.send(Command::SetVoice(voice)).await
    }

    pub fn status(&self) -> NarrationStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NarrationStatus> {
        self.status.clone()
    }

    async fn send(&self, command: Command) -> Result<(), ControllerStopped> {
        self.commands.send(command).await.map_err(|_| ControllerStopped)
    }
}

pub struct NarrationController {
    narrator: Narrator,
    events: EventReceiver,
    completion: Arc<CompletionClient>,
    stall_timeout: Option<Duration>,
    status: watch::Sender<NarrationStatus>,
    loading: bool,
    response: String,
    last_error: Option<String>,
    sessions_ended: u64,
    deadline: Option<Instant>,
}

impl NarrationController {
    /// Start the controller task. It runs until every handle is dropped.
    pub fn spawn(
        narrator: Narrator,
        events: EventReceiver,
        completion: Arc<CompletionClient>,
        stall_timeout: Option<Duration>,
    ) -> (ControllerHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel(NarrationStatus::default());

        let mut controller = Self {
            narrator,
            events,
            completion,
            stall_timeout: stall_timeout.filter(|d| !d.is_zero()),
            status: status_tx,
            loading: false,
            response: String::new(),
            last_error: None,
            sessions_ended: 0,
            deadline: None,
        };
        controller.publish();

        let task = tokio::spawn(async move { controller.run(commands_rx).await });
        let handle = ControllerHandle {
            commands: commands_tx,
            status: status_rx,
        };
        (handle, task)
    }

    async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        let (done_tx, mut done_rx) = mpsc::channel::<CompletionResult>(1);

        loop {
            let stall_at = self.deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        info!("Controller shutting down");
                        self.narrator.cancel();
                        break;
                    };
                    self.on_command(command, &done_tx);
                }
                Some(result) = done_rx.recv() => self.on_completion(result),
                Some(event) = self.events.recv() => {
                    let update = self.narrator.handle_event(event);
                    self.on_update(update);
                }
                _ = tokio::time::sleep_until(stall_at), if self.deadline.is_some() => {
                    warn!(
                        "No speech progress for {:?} in {} (engine speaking: {}), giving up",
                        self.stall_timeout.unwrap_or_default(),
                        self.narrator.state(),
                        self.narrator.engine_speaking()
                    );
                    self.narrator.stop();
                    self.session_ended();
                }
            }
            self.publish();
        }
        self.publish();
    }

    fn on_command(&mut self, command: Command, done_tx: &mpsc::Sender<CompletionResult>) {
        match command {
            Command::SubmitPrompt { prompt, reply } => {
                if self.loading {
                    info!("Prompt rejected: completion already in flight");
                    let _ = reply.send(SubmitOutcome::Busy);
                    return;
                }
                self.loading = true;
                let client = self.completion.clone();
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    let result = client.complete(&prompt).await;
                    let _ = done_tx.send(result).await;
                });
                let _ = reply.send(SubmitOutcome::Accepted);
            }
            Command::Narrate(text) => self.start(text),
            Command::Cancel => {
                if self.narrator.cancel() {
                    info!("Narration cancelled");
                    self.session_ended();
                }
            }
            Command::SetVoice(voice) => self.narrator.set_preference(voice),
        }
    }

    fn on_completion(&mut self, result: CompletionResult) {
        self.loading = false;
        self.last_error = result.error().map(|e| e.kind().to_string());
        self.start(result.text().to_string());
    }

    fn start(&mut self, text: String) {
        if self.narrator.cancel() {
            self.session_ended();
        }
        let outcome = self.narrator.start_speech(&text);
        self.response = text;
        match outcome {
            StartOutcome::Started => self.arm_deadline(),
            StartOutcome::Empty | StartOutcome::EngineFailed => self.session_ended(),
        }
    }

    fn on_update(&mut self, update: NarrationUpdate) {
        match update {
            NarrationUpdate::Ignored => {}
            NarrationUpdate::Highlight(_) | NarrationUpdate::NextChunk(_) => self.arm_deadline(),
            NarrationUpdate::Finished | NarrationUpdate::EngineFailed => self.session_ended(),
        }
    }

    fn arm_deadline(&mut self) {
        self.deadline = self.stall_timeout.map(|d| Instant::now() + d);
    }

    fn session_ended(&mut self) {
        self.deadline = None;
        self.sessions_ended += 1;
    }

    fn publish(&self) {
        let (state, chunk) = match self.narrator.state() {
            NarratorState::Idle => ("idle", None),
            NarratorState::Speaking(i) => ("speaking", Some(i)),
            NarratorState::Cancelled => ("cancelled", None),
        };
        let status = NarrationStatus {
            state: state.into(),
            chunk,
            loading: self.loading,
            highlight: self.narrator.highlight(),
            highlighted_word: self.narrator.highlighted_word().map(String::from),
            voice: self.narrator.preference(),
            response: self.response.clone(),
            last_error: self.last_error.clone(),
            session: self.narrator.session_id(),
            sessions_ended: self.sessions_ended,
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
