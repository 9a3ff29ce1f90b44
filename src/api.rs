//! Local HTTP control surface for the narration controller.
//!
//! Plays the part of the prompt form: submit a prompt, narrate text,
//! cancel, switch voice and poll what is being spoken.
//! Runs on 127.0.0.1:8768 (configurable) using axum.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::controller::{ControllerHandle, NarrationStatus, SubmitOutcome};
use crate::voice::VoicePreference;

// --- Request/Response types ---

#[derive(Deserialize)]
struct PromptRequest {
    #[serde(default)]
    prompt: String,
}

#[derive(Deserialize)]
struct NarrateRequest {
    text: String,
}

#[derive(Deserialize)]
struct SetVoiceRequest {
    voice: String,
}

#[derive(Serialize)]
struct SimpleResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Self {
        Self {
            status: status.into(),
            voice: None,
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            voice: None,
            error: Some(message.into()),
        }
    }
}

type Reply = (StatusCode, Json<SimpleResponse>);

fn stopped() -> Reply {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(SimpleResponse::err("controller stopped")),
    )
}

/// Build the axum router.
pub fn router(handle: ControllerHandle) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/prompt", post(handle_prompt))
        .route("/narrate", post(handle_narrate))
        .route("/cancel", post(handle_cancel))
        .route("/set-voice", post(handle_set_voice))
        .with_state(handle)
}

/// Start the API server as a background tokio task.
pub async fn start_api(handle: ControllerHandle, port: u16) -> std::io::Result<()> {
    let app = router(handle);
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Narration API listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Narration API server error: {e}");
        }
    });
    Ok(())
}

/// One-line log form of a prompt: the first 80 characters and the
/// total character count.
fn describe_prompt(prompt: &str) -> String {
    let count = prompt.chars().count();
    let preview: String = prompt.chars().take(80).collect();
    format!(
        "\"{}{}\" ({count} chars)",
        preview.replace('\n', " "),
        if count > 80 { "..." } else { "" },
    )
}

// --- Handlers ---

async fn handle_status(State(handle): State<ControllerHandle>) -> Json<NarrationStatus> {
    Json(handle.status())
}

async fn handle_prompt(
    State(handle): State<ControllerHandle>,
    Json(req): Json<PromptRequest>,
) -> Reply {
    info!("HTTP /prompt: {}", describe_prompt(&req.prompt));

    match handle.submit_prompt(req.prompt).await {
        Ok(SubmitOutcome::Accepted) => (StatusCode::OK, Json(SimpleResponse::ok("generating"))),
        Ok(SubmitOutcome::Busy) => (
            StatusCode::CONFLICT,
            Json(SimpleResponse::err("busy: a reply is still being generated")),
        ),
        Err(_) => stopped(),
    }
}

async fn handle_narrate(
    State(handle): State<ControllerHandle>,
    Json(req): Json<NarrateRequest>,
) -> Reply {
    match handle.narrate(req.text).await {
        Ok(()) => (StatusCode::OK, Json(SimpleResponse::ok("speaking"))),
        Err(_) => stopped(),
    }
}

async fn handle_cancel(State(handle): State<ControllerHandle>) -> Reply {
    match handle.cancel().await {
        Ok(()) => (StatusCode::OK, Json(SimpleResponse::ok("cancelled"))),
        Err(_) => stopped(),
    }
}

async fn handle_set_voice(
    State(handle): State<ControllerHandle>,
    Json(req): Json<SetVoiceRequest>,
) -> Reply {
    let Some(voice) = VoicePreference::parse(&req.voice) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(SimpleResponse::err(format!("Unknown voice: {}", req.voice))),
        );
    };
    match handle.set_voice(voice).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SimpleResponse {
                voice: Some(voice.to_string()),
                ..SimpleResponse::ok("ok")
            }),
        ),
        Err(_) => stopped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};

    use crate::completion::CompletionClient;
    use crate::config::{CompletionConfig, NarrationConfig};
    use crate::controller::NarrationController;
    use crate::narrator::Narrator;
    use crate::test_utils::{ScriptHandle, ScriptedEngine};

    async fn serve() -> (String, ScriptHandle) {
        let engine = ScriptedEngine::new(vec![]);
        let script = engine.script();
        let (narrator, events) = Narrator::new(Box::new(engine), &NarrationConfig::default());
        let client = CompletionClient::new(CompletionConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
            timeout_secs: 2,
            ..CompletionConfig::default()
        })
        .unwrap();
        let (handle, _task) =
            NarrationController::spawn(narrator, events, Arc::new(client), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(handle)).await.unwrap();
        });
        (format!("http://{addr}"), script)
    }

    async fn poll_status(base: &str, pred: impl Fn(&Value) -> bool) -> Value {
        let client = reqwest::Client::new();
        for _ in 0..100 {
            let status: Value = client
                .get(format!("{base}/status"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if pred(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("status never matched");
    }

    #[test]
    fn prompt_description_counts_characters() {
        assert_eq!(describe_prompt("héllo\nwörld"), "\"héllo wörld\" (11 chars)");

        let long = "é".repeat(100);
        let described = describe_prompt(&long);
        assert!(described.starts_with(&format!("\"{}...\"", "é".repeat(80))));
        assert!(described.ends_with("(100 chars)"));
    }

    #[tokio::test]
    async fn narrate_then_cancel() {
        let (base, script) = serve().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/narrate"))
            .json(&json!({ "text": "hello from the api" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let status = poll_status(&base, |s| s["state"] == "speaking").await;
        assert_eq!(status["response"], "hello from the api");
        assert_eq!(script.spoken_texts(), vec!["hello from the api"]);

        let resp = client.post(format!("{base}/cancel")).send().await.unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "cancelled");
        poll_status(&base, |s| s["state"] == "cancelled").await;
    }

    #[tokio::test]
    async fn prompt_failure_is_narrated_as_fallback() {
        let (base, _script) = serve().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/prompt"))
            .json(&json!({ "prompt": "hi" }))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "generating");

        let status = poll_status(&base, |s| s["state"] == "speaking").await;
        assert_eq!(status["response"], "Free tier limit exhausted");
        assert!(status["last_error"].is_string());
    }

    #[tokio::test]
    async fn set_voice_validates_input() {
        let (base, _script) = serve().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/set-voice"))
            .json(&json!({ "voice": "robot" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{base}/set-voice"))
            .json(&json!({ "voice": "Male" }))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["voice"], "male");
        poll_status(&base, |s| s["voice"] == "male").await;
    }
}
