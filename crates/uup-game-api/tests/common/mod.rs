#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use uup_game_api::{GameClient, GameClientConfig};

pub const SESSION_COOKIE: &str = "PHPSESSID=stub-session";

/// One request the stub backend received.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: Method,
    pub action: String,
    pub params: HashMap<String, String>,
    pub body: Option<Value>,
    pub cookie: Option<String>,
}

#[derive(Debug, Default)]
struct StubState {
    responses: HashMap<String, Value>,
    hits: Mutex<Vec<Hit>>,
}

/// In-process stand-in for `uup_game.php`, answering each action with a canned envelope.
pub struct StubBackend {
    pub addr: SocketAddr,
    state: Arc<StubState>,
}

impl StubBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> GameClient {
        let config = GameClientConfig {
            base_url: self.base_url(),
            session_cookie: Some(SESSION_COOKIE.to_string()),
            ..GameClientConfig::default()
        };
        GameClient::new(&config).unwrap_or_else(|err| panic!("client should build: {err}"))
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().unwrap_or_else(|err| panic!("hit log poisoned: {err}")).clone()
    }

    pub fn hits_for(&self, action: &str) -> Vec<Hit> {
        self.hits().into_iter().filter(|hit| hit.action == action).collect()
    }
}

async fn handle(
    State(state): State<Arc<StubState>>,
    method: Method,
    headers: HeaderMap,
    Query(mut params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let action = params.remove("action").unwrap_or_default();
    let cookie =
        headers.get(header::COOKIE).and_then(|value| value.to_str().ok()).map(str::to_string);
    let body = serde_json::from_slice(&body).ok();
    state
        .hits
        .lock()
        .unwrap_or_else(|err| panic!("hit log poisoned: {err}"))
        .push(Hit { method, action: action.clone(), params, body, cookie });

    match state.responses.get(&action) {
        Some(envelope) => Json(envelope.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown action").into_response(),
    }
}

/// Start a stub backend on an ephemeral port. `responses` maps action names to envelopes.
pub async fn spawn_backend(responses: HashMap<String, Value>) -> StubBackend {
    let state = Arc::new(StubState { responses, hits: Mutex::new(Vec::new()) });
    let app = Router::new()
        .route("/services/uup_game.php", get(handle).post(handle))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("stub listener should bind: {err}"));
    let addr = listener.local_addr().unwrap_or_else(|err| panic!("stub addr missing: {err}"));
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            panic!("stub backend stopped: {err}");
        }
    });
    StubBackend { addr, state }
}

pub fn ok(data: Value) -> Value {
    json!({"success": true, "data": data})
}

pub fn fail(reason: &str) -> Value {
    json!({"success": false, "message": "Error", "data": {"reason": reason}})
}

/// A classroom with three active assignments and one inactive one, with the student
/// partway through assignment 2 after spending a hint and a second chance on task 4.
pub fn classroom() -> HashMap<String, Value> {
    let mut responses = HashMap::new();
    responses.insert(
        "getAssignments".to_string(),
        ok(json!([
            {"id": "3", "name": "Queues", "path": "uup/queues", "active": "1", "points": "10", "challenge_pts": "2"},
            {"id": "1", "name": "Arrays", "path": "uup/arrays", "active": "1", "points": "10", "challenge_pts": "2"},
            {"id": "2", "name": "Stacks", "path": "uup/stacks", "active": "1", "points": "10", "challenge_pts": "2"},
            {"id": "4", "name": "Retired", "path": "uup/retired", "active": "0", "points": "10", "challenge_pts": "2"}
        ])),
    );
    responses.insert(
        "getPowerUpTypes".to_string(),
        ok(json!([
            {"id": "1", "name": "Hint", "price": "5"},
            {"id": "2", "name": "Second Chance", "price": "10"}
        ])),
    );
    responses.insert(
        "getChallengeConfig".to_string(),
        ok(json!({
            "enoughPoints": "40",
            "noPowerups": "5",
            "maxPoints": "60",
            "maxPointsNoPowerups": "70",
            "tasksRequired": "3"
        })),
    );
    responses.insert(
        "getTaskCategories".to_string(),
        ok(json!([
            {"id": "1", "name": "Easy", "points_percent": "0.5", "tokens": "1", "tasks_per_category": "2"},
            {"id": "2", "name": "Hard", "points_percent": "1.0", "tokens": "3", "tasks_per_category": "2"}
        ])),
    );
    responses.insert(
        "getStudentData".to_string(),
        ok(json!({
            "student": "jdoe",
            "tokens": "12",
            "assignmentPoints": [
                {"assignment_id": "1", "points": "9"},
                {"assignment_id": "2", "points": "4"},
                {"assignment_id": "4", "points": "1"}
            ],
            "powerups": [
                {"type_id": "1", "used": "1", "assignment_id": "2", "task_number": "4"},
                {"type_id": "2", "used": "1", "assignment_id": "2", "task_number": "4"},
                {"type_id": "1", "used": "0", "assignment_id": null, "task_number": null},
                {"type_id": "1", "used": "0", "assignment_id": null, "task_number": null}
            ],
            "assignmentProgress": [
                {"assignment_id": "1", "status": "Completed"},
                {"assignment_id": "2", "status": "In progress"}
            ],
            "currentTasks": [
                {"assignment_id": "2", "task_number": "4", "task_name": "Balanced brackets"}
            ],
            "completedTasks": [
                {"assignment_id": "1", "completed": "3"},
                {"assignment_id": "2", "completed": "1"}
            ],
            "turnedInTasks": [
                {"assignment_id": "1", "turned_in": "3"},
                {"assignment_id": "2", "turned_in": "2"}
            ]
        })),
    );
    responses.insert("getUsedHint".to_string(), ok(json!({"hint": "Push on open, pop on close"})));
    responses.insert("getTaskPreviousPoints".to_string(), ok(json!({"points": "3"})));
    responses
}
