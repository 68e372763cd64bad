//! HTTP flow against a local stand-in for the generation webhook.
//!
//! The fake webhook plays the pipeline's part too: for video jobs it writes
//! the task's final status into the in-memory store before answering.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Value};
use shorts_gen::app_state::AppState;
use shorts_gen::models::job::JobStatus;
use shorts_gen::routes;
use shorts_gen::services::generation::GenerationClient;
use shorts_gen::services::status_store::MemoryStatusStore;
use shorts_gen::services::watches::WatchRegistry;
use shorts_gen::watcher::{TaskCompletionWatcher, WatchMode, WatchOptions};

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

#[derive(Clone)]
struct Pipeline {
    store: Arc<MemoryStatusStore>,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn fake_webhook(State(pipeline): State<Pipeline>, Json(body): Json<Value>) -> Response {
    pipeline.received.lock().unwrap().push(body.clone());

    match (body["generation_type"].as_str(), body["user_id"].as_str()) {
        (_, Some("explode")) => (StatusCode::INTERNAL_SERVER_ERROR, "workflow crashed").into_response(),
        (Some("imagem"), _) => Json(json!([{ "url": "https://cdn.example.com/short.png" }])).into_response(),
        (Some("video"), user) => {
            // "slow" jobs never finish within the test.
            if user != Some("slow") {
                let task_uuid = body["task_uuid"].as_str().unwrap_or_default();
                pipeline
                    .store
                    .set_status(
                        task_uuid,
                        JobStatus::Completed {
                            result_url: "https://x/video.mp4".to_string(),
                        },
                    )
                    .await;
            }
            "Workflow was started".into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStatusStore::new());
    let received = Arc::new(Mutex::new(Vec::new()));

    let webhook = Router::new()
        .route("/webhook/gera-shorts", post(fake_webhook))
        .with_state(Pipeline {
            store: store.clone(),
            received: received.clone(),
        });
    let webhook_base = serve(webhook).await;

    let watches = WatchRegistry::new(
        TaskCompletionWatcher::new(store),
        WatchOptions::from_millis(30_000, 50, WatchMode::Push),
    );
    let state = AppState::new(
        None,
        GenerationClient::new(format!("{}/webhook/gera-shorts", webhook_base)),
        watches,
        1024 * 1024,
    );
    let base_url = serve(routes::router(state)).await;

    TestApp {
        base_url,
        client: reqwest::Client::new(),
        received,
    }
}

fn image_form(bytes: Vec<u8>, mime: &str, user_id: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .part(
            "image",
            reqwest::multipart::Part::bytes(bytes)
                .file_name("frame.png")
                .mime_str(mime)
                .unwrap(),
        )
        .text("user_id", user_id.to_string())
}

/// Poll the task view until it leaves `pending` (real time, short budget).
async fn wait_for_view(app: &TestApp, task_uuid: &str) -> Value {
    for _ in 0..40 {
        let view: Value = app
            .client
            .get(format!("{}/api/v1/videos/{}", app.base_url, task_uuid))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if view["status"] != "pending" {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("task {} stayed pending", task_uuid);
}

#[tokio::test]
async fn image_upload_returns_inline_result() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/v1/shorts", app.base_url))
        .multipart(image_form(PNG_MAGIC.to_vec(), "image/png", "user-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["file_name"], "frame.png");
    assert_eq!(body["results"][0]["url"], "https://cdn.example.com/short.png");

    let received = app.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["generation_type"], "imagem");
    assert_eq!(received[0]["imagem_nome"], "frame.png");
    assert_eq!(
        received[0]["imagem_base64"],
        base64::engine::general_purpose::STANDARD.encode(PNG_MAGIC)
    );
    assert_eq!(received[0]["opcoes"]["estilo"], "viral");
    assert_eq!(received[0]["opcoes"]["duracao"], 30);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/v1/shorts", app.base_url))
        .multipart(image_form(b"plain text".to_vec(), "text/plain", "user-1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 415);
    assert!(app.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn video_job_is_tracked_to_completion() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/v1/videos", app.base_url))
        .json(&json!({
            "user_id": "user-1",
            "image_url": "https://cdn.example.com/short.png",
            "video_description": "camera slowly zooms in",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let accepted: Value = response.json().await.unwrap();
    let task_uuid = accepted["task_uuid"].as_str().unwrap().to_string();
    assert_eq!(app.received.lock().unwrap()[0]["task_uuid"], task_uuid.as_str());

    let view = wait_for_view(&app, &task_uuid).await;
    assert_eq!(view["status"], "completed");
    assert_eq!(view["state"], "completed");
    assert_eq!(view["active"], false);
    assert_eq!(view["result_url"], "https://x/video.mp4");
}

#[tokio::test]
async fn pending_video_job_can_be_cancelled() {
    let app = spawn_app().await;

    let accepted: Value = app
        .client
        .post(format!("{}/api/v1/videos", app.base_url))
        .json(&json!({ "user_id": "slow", "video_description": "waves" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_uuid = accepted["task_uuid"].as_str().unwrap().to_string();
    let url = format!("{}/api/v1/videos/{}", app.base_url, task_uuid);

    let response = app.client.delete(&url).send().await.unwrap();
    assert_eq!(response.status(), 204);
    // Cancelling again is still fine.
    let response = app.client.delete(&url).send().await.unwrap();
    assert_eq!(response.status(), 204);

    let view: Value = app.client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(view["state"], "cancelled");
    assert_eq!(view["active"], false);
    assert!(view["result_url"].is_null());
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let app = spawn_app().await;
    let url = format!(
        "{}/api/v1/videos/{}",
        app.base_url,
        "6f1c7c8e-8d0b-4a53-9c55-3f2b7a0c1d2e"
    );

    assert_eq!(app.client.get(&url).send().await.unwrap().status(), 404);
    assert_eq!(app.client.delete(&url).send().await.unwrap().status(), 404);
}

#[tokio::test]
async fn webhook_failure_is_bad_gateway() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/v1/videos", app.base_url))
        .json(&json!({ "user_id": "explode", "video_description": "waves" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "GENERATION_FAILED");
}

#[tokio::test]
async fn health_reports_ok_without_database() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["checks"].get("database").is_none());
}
