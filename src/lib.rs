//! chat-narrator: sends a prompt to a chat-completion API and reads the
//! reply aloud, tracking the word being spoken.
//!
//! Pipeline: [`completion`] fetches the reply, [`chunker`] splits it into
//! word chunks, [`narrator`] plays the chunks in order through a
//! [`engine::SpeechEngine`], and [`highlight`] follows the boundary events.
//! [`controller`] owns the narrator on a single task; [`api`] and the CLI
//! drive it.

pub mod api;
pub mod chunker;
pub mod completion;
pub mod config;
pub mod controller;
pub mod display;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod narrator;
pub mod voice;

#[cfg(test)]
pub(crate) mod test_utils;
