//! chat-narrator: ask a chat-completion API and hear the reply.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_narrator::chunker;
use chat_narrator::completion::CompletionClient;
use chat_narrator::config::{Config, EngineKind};
use chat_narrator::controller::{ControllerHandle, NarrationController, SubmitOutcome};
use chat_narrator::display::{self, Marker};
use chat_narrator::engine;
use chat_narrator::narrator::Narrator;
use chat_narrator::voice::VoicePreference;

#[derive(Parser, Debug)]
#[command(name = "chat-narrator", about = "Read chat-completion replies aloud")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Speech engine (overrides config)
    #[arg(long, global = true)]
    engine: Option<EngineKind>,

    /// Voice preference (overrides config)
    #[arg(long, global = true)]
    voice: Option<VoicePreference>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the controller and the local HTTP API until Ctrl-C
    Serve,
    /// Send one prompt, narrate the reply, then exit
    Ask { prompt: String },
    /// Narrate the given text without calling the API
    Narrate { text: String },
    /// List the voices the engine offers
    Voices,
    /// Print the chunks the text would be narrated in
    Chunks { text: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so the highlighted text owns stdout
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config.as_deref());
    if let Some(kind) = args.engine {
        config.engine.kind = kind;
    }
    if let Some(voice) = args.voice {
        config.narration.voice = voice;
    }
    info!(
        "Engine: {:?}, voice: {}, chunk size: {}",
        config.engine.kind, config.narration.voice, config.narration.chunk_size
    );

    if let Cmd::Chunks { text } = &args.command {
        let words = chunker::split(text);
        for (i, chunk) in chunker::chunks(&words, config.narration.chunk_size).enumerate() {
            println!("{i}\t{}..{}\t{}", chunk.start, chunk.end(), chunk.text);
        }
        return Ok(());
    }

    let speech = engine::from_config(&config.engine);

    if let Cmd::Voices = args.command {
        // The command engine discovers voices in the background
        let mut voices = speech.voices();
        for _ in 0..20 {
            if !voices.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            voices = speech.voices();
        }
        for voice in voices {
            println!("{}\t{}", voice.id, voice.name);
        }
        return Ok(());
    }

    let completion = Arc::new(CompletionClient::new(config.completion.clone())?);
    let (narrator, events) = Narrator::new(speech, &config.narration);
    let stall = Duration::from_secs(config.narration.stall_timeout_secs);
    let (handle, _task) = NarrationController::spawn(narrator, events, completion, Some(stall));

    match args.command {
        Cmd::Serve => {
            if config.api.enabled {
                chat_narrator::api::start_api(handle.clone(), config.api.port).await?;
            } else {
                info!("HTTP API disabled in config");
            }
            info!("Ready, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            handle.cancel().await?;
        }
        Cmd::Ask { prompt } => {
            if handle.submit_prompt(prompt).await? == SubmitOutcome::Busy {
                return Err("controller busy".into());
            }
            follow(&handle).await;
        }
        Cmd::Narrate { text } => {
            handle.narrate(text).await?;
            follow(&handle).await;
        }
        Cmd::Voices | Cmd::Chunks { .. } => {}
    }

    Ok(())
}

/// Render the highlighted reply until the first narration session ends.
/// A terminal gets one line redrawn in place; anything else gets one
/// bracketed line per highlight change.
async fn follow(handle: &ControllerHandle) {
    let mut rx = handle.subscribe();
    let mut words = chunker::WordSequence::default();
    let mut shown = String::new();
    let mut stdout = std::io::stdout();
    let terminal = stdout.is_terminal();

    loop {
        let status = rx.borrow_and_update().clone();
        if status.loading {
            if shown.is_empty() {
                shown = "Generating...".into();
                let _ = if terminal {
                    write!(stdout, "\r\x1b[2K{shown}")
                } else {
                    writeln!(stdout, "{shown}")
                };
                let _ = stdout.flush();
            }
        } else {
            if words.joined() != status.response {
                words = chunker::split(&status.response);
            }
            let line = if terminal {
                display::render_window(&words, status.highlight, 8, Marker::Ansi)
            } else {
                display::render(&words, status.highlight, Marker::Brackets)
            };
            if line != shown {
                let _ = if terminal {
                    write!(stdout, "\r\x1b[2K{line}")
                } else {
                    writeln!(stdout, "{line}")
                };
                let _ = stdout.flush();
                shown = line;
            }
        }
        if status.sessions_ended > 0 {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }

    if terminal {
        let _ = writeln!(stdout, "\r\x1b[2K{}", words.joined());
    }
}
