//! Full-stack tests: HTTP API, chat backend and file catalog.
//!
//! A local axum server stands in for the chat-completions endpoint and
//! answers by recognising which prompt it was sent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use drill_engine::{create_router, AppState, Config, Difficulty};
use drill_providers::{services, CatalogEntry, ChatClient, FileCatalog};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const GENERATED: &str = "Here is the program.\n\
```java-annotated\n\
public class Library {\n\
    int count(int[] books) {\n\
        int total = 0;\n\
        for (int i = 0; i <= books.length; i++) { // ERROR: Logical - Off-by-one\n\
            total += books[i];\n\
        }\n\
        return total / 0; // ERROR: Logical - Division by zero\n\
    }\n\
}\n\
```\n\
```java-clean\n\
public class Library {\n\
    int count(int[] books) {\n\
        int total = 0;\n\
        for (int i = 0; i <= books.length; i++) {\n\
            total += books[i];\n\
        }\n\
        return total / 0;\n\
    }\n\
}\n\
```";

/// What the fake model was asked, in order.
#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<&'static str>>>);

impl Calls {
    fn push(&self, kind: &'static str) {
        self.0.lock().expect("calls lock").push(kind);
    }

    fn count(&self, kind: &str) -> usize {
        self.0
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|k| **k == kind)
            .count()
    }
}

fn reply(content: impl Into<String>) -> Json<Value> {
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content.into() } }]
    }))
}

async fn fake_completion(
    State(calls): State<Calls>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();

    if prompt.contains("EXACTLY") {
        calls.push("generate");
        return (StatusCode::OK, reply(GENERATED));
    }
    if prompt.contains("requested errors") {
        calls.push("evaluate");
        let evaluation = json!({
            "found": ["Logical - Off-by-one", "Logical - Division by zero"],
            "missing": [],
            "feedback": "Both errors are present."
        });
        return (
            StatusCode::OK,
            reply(format!("```json\n{evaluation}\n```")),
        );
    }
    if prompt.contains("A student reviewed") {
        calls.push("analyze");
        let identified = if prompt.contains("divides by zero") { 2 } else { 1 };
        let analysis = json!({
            "identified": ["Logical - Off-by-one: Loop runs past the end"],
            "missed": [],
            "identified_count": identified,
            "total_problems": 2
        });
        return (StatusCode::OK, reply(analysis.to_string()));
    }
    if prompt.contains("review attempt") {
        calls.push("guide");
        return (
            StatusCode::OK,
            reply("Look closely at every arithmetic operation."),
        );
    }
    if prompt.contains("Markdown report") {
        calls.push("report");
        return (StatusCode::OK, reply("## Well done\nYou found both problems."));
    }

    calls.push("unknown");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "unexpected prompt" })),
    )
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn catalog() -> FileCatalog {
    let entry = |name: &str, description: &str| CatalogEntry {
        category: "Logical".to_string(),
        name: name.to_string(),
        description: description.to_string(),
        difficulty: Difficulty::Easy,
        implementation_guide: None,
    };
    FileCatalog::from_entries(vec![
        entry("Off-by-one", "Loop runs past the end"),
        entry("Division by zero", "Divides by a literal zero"),
    ])
    .with_seed(7)
}

/// Starts the fake model and the API; returns the API base URL.
async fn start(model: Router) -> String {
    let model_url = serve(model).await;
    let chat = ChatClient::new(
        format!("{model_url}/v1"),
        "test-model",
        "secret",
        Duration::from_secs(5),
    )
    .expect("chat client");

    let config = Config {
        max_iterations: 3,
        ..Config::default()
    };
    let state = AppState::new(&services(catalog(), Arc::new(chat)), config);
    serve(create_router(state)).await
}

fn create_body() -> Value {
    json!({
        "codeLength": "short",
        "difficulty": "easy",
        "domain": "library",
        "errorCountStart": 2,
        "errorCountEnd": 2,
        "categories": ["logical"]
    })
}

async fn post_json(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let response = client.post(url).json(&body).send().await.expect("request");
    let status = StatusCode::from_u16(response.status().as_u16()).expect("status");
    (status, response.json().await.expect("json body"))
}

#[tokio::test]
async fn test_practice_session_over_http() {
    let calls = Calls::default();
    let model = Router::new()
        .route("/v1/chat/completions", post(fake_completion))
        .with_state(calls.clone());
    let api = start(model).await;
    let client = reqwest::Client::new();

    let (status, created) = post_json(&client, format!("{api}/api/sessions"), create_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().expect("id").to_string();

    let (status, generated) =
        post_json(&client, format!("{api}/api/sessions/{id}/generate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generated["phase"], "review");
    assert_eq!(generated["original_error_count"], 2);
    assert_eq!(generated["evaluation_attempts"], 1);
    let clean = generated["code_snippet"]["clean_code"].as_str().expect("clean code");
    assert!(clean.contains("public class Library"));
    assert!(!clean.contains("ERROR"));

    let (status, first) = post_json(
        &client,
        format!("{api}/api/sessions/{id}/review"),
        json!({ "text": "The loop condition reads one element too many", "iteration": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["phase"], "review");
    assert_eq!(first["current_iteration"], 2);
    assert_eq!(
        first["review_history"][0]["guidance"],
        "Look closely at every arithmetic operation."
    );

    let (status, second) = post_json(
        &client,
        format!("{api}/api/sessions/{id}/review"),
        json!({
            "text": "The loop reads past the end and the method divides by zero",
            "iteration": 2
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["phase"], "complete");
    assert_eq!(second["review_sufficient"], true);

    let response = client
        .get(format!("{api}/api/sessions/{id}/report"))
        .send()
        .await
        .expect("report request");
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.expect("report json");
    assert_eq!(report["sessionId"], id.as_str());
    assert!(report["report"].as_str().expect("text").contains("Well done"));

    assert_eq!(calls.count("generate"), 1);
    assert_eq!(calls.count("evaluate"), 1);
    assert_eq!(calls.count("analyze"), 2);
    assert_eq!(calls.count("guide"), 1);
    assert_eq!(calls.count("report"), 1);
    assert_eq!(calls.count("unknown"), 0);
}

#[tokio::test]
async fn test_model_outage_during_generation() {
    let model = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    );
    let api = start(model).await;
    let client = reqwest::Client::new();

    let (_, created) = post_json(&client, format!("{api}/api/sessions"), create_body()).await;
    let id = created["id"].as_str().expect("id").to_string();

    let (status, body) =
        post_json(&client, format!("{api}/api/sessions/{id}/generate"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().expect("message").contains("generation"));

    let state: Value = client
        .get(format!("{api}/api/sessions/{id}"))
        .send()
        .await
        .expect("get request")
        .json()
        .await
        .expect("state json");
    assert!(state["error"].is_string());
    assert!(state["code_snippet"].is_null());
}

#[tokio::test]
async fn test_catalog_file_feeds_generation() {
    let dir = std::env::temp_dir().join(format!("drill-catalog-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("errors.json");
    std::fs::write(
        &path,
        r#"{"errors": [
            {"category": "Logical", "name": "Off-by-one", "description": "Loop runs past the end", "difficulty": "easy"},
            {"category": "Syntax", "name": "Missing semicolon", "description": "Statement not terminated", "difficulty": "easy"}
        ]}"#,
    )
    .expect("write catalog");

    let catalog = FileCatalog::load(&path).expect("catalog loads");
    assert_eq!(catalog.len(), 2);

    let picked = catalog.pick(&["syntax".to_string()], Difficulty::Hard, 3);
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].name, "Missing semicolon");

    std::fs::remove_dir_all(&dir).expect("cleanup");
}
