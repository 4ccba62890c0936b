//! Test utilities for crates that talk to the backend.
//!
//! [`MockBackend`] is a small axum server emulating the WordPress JWT and teamtask
//! routes on an ephemeral local port. It records every request it receives and can
//! be told to fail or delay specific endpoints. Only compiled with `test-support`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::endpoints::{CURRENT_USER_PATH, TASKS_PATH, TEAMS_PATH, TOKEN_PATH};

const API_PREFIX: &str = "/wp-json";

/// One request as the mock saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

struct Account {
    password: String,
    identity: Value,
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    issued: u64,
    teams: Vec<Value>,
    tasks: Vec<Value>,
    next_id: u64,
    requests: Vec<RecordedRequest>,
    overrides: HashMap<(String, String), (u16, String)>,
    delays: HashMap<String, Duration>,
}

/// In-process stand-in for the backend
pub struct MockBackend {
    base_url: String,
    state: Arc<Mutex<MockState>>,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Bind to an ephemeral port and start serving
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState {
            next_id: 1,
            ..Default::default()
        }));

        let app = Router::new().fallback(dispatch).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let address = listener
            .local_addr()
            .expect("Failed to read mock backend address");

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}{}", address, API_PREFIX),
            state,
            server,
        }
    }

    /// Base address to hand to the gateway
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register an account; `identity` is what the current-user endpoint returns
    pub fn add_user(&self, username: &str, password: &str, identity: Value) {
        self.lock().accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                identity,
            },
        );
    }

    /// Issue a token for an existing account without going through the token route
    pub fn issue_token(&self, username: &str) -> String {
        let mut state = self.lock();
        state.issue(username)
    }

    /// Invalidate every issued token
    pub fn revoke_tokens(&self) {
        self.lock().tokens.clear();
    }

    /// Answer `method path` with a fixed status and raw body
    pub fn respond_with(&self, method: &str, path: &str, status: u16, body: &str) {
        self.lock().overrides.insert(
            (method.to_uppercase(), path.to_string()),
            (status, body.to_string()),
        );
    }

    pub fn clear_override(&self, method: &str, path: &str) {
        self.lock()
            .overrides
            .remove(&(method.to_uppercase(), path.to_string()));
    }

    /// Hold responses for `path` for the given duration
    pub fn delay(&self, path: &str, duration: Duration) {
        self.lock().delays.insert(path.to_string(), duration);
    }

    pub fn seed_team(&self, team: Value) -> u64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.teams.push(with_id(team, id));
        id
    }

    pub fn seed_task(&self, task: Value) -> u64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.tasks.push(with_id(task, id));
        id
    }

    pub fn teams(&self) -> Vec<Value> {
        self.lock().teams.clone()
    }

    pub fn tasks(&self) -> Vec<Value> {
        self.lock().tasks.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Requests received for `path`, in arrival order
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock backend state poisoned")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Identity payload for an administrator account
pub fn admin_identity(id: u64, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{}@example.com", username),
        "roles": ["administrator"],
        "name": username,
        "capabilities": { "manage_options": true, "edit_posts": true }
    })
}

/// Identity payload for a regular member; WordPress reports `slug`, not `username`
pub fn member_identity(id: u64, username: &str) -> Value {
    json!({
        "id": id,
        "slug": username,
        "email": format!("{}@example.com", username),
        "roles": ["subscriber"],
        "name": username,
        "capabilities": { "read": true, "manage_options": false }
    })
}

/// A base address nothing is listening on
pub fn unreachable_base_url() -> String {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to reserve a local port");
    let address = listener
        .local_addr()
        .expect("Failed to read reserved address");
    drop(listener);
    format!("http://{}{}", address, API_PREFIX)
}

type Shared = Arc<Mutex<MockState>>;

async fn dispatch(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(uri.path())
        .to_string();
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let authorization = header_value(header::AUTHORIZATION);
    let body: Option<Value> = serde_json::from_slice(&body).ok();

    let delay = {
        let mut state = state.lock().expect("mock backend state poisoned");
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            path: path.clone(),
            authorization: authorization.clone(),
            content_type: header_value(header::CONTENT_TYPE),
            body: body.clone(),
        });
        state.delays.get(&path).copied()
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let (status, payload) = {
        let mut state = state.lock().expect("mock backend state poisoned");
        state.route(&method, &path, authorization.as_deref(), body)
    };

    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        payload,
    )
        .into_response()
}

impl MockState {
    fn route(
        &mut self,
        method: &Method,
        path: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> (u16, String) {
        if let Some((status, payload)) = self
            .overrides
            .get(&(method.as_str().to_string(), path.to_string()))
        {
            return (*status, payload.clone());
        }

        let (status, payload) = match (method, path) {
            (&Method::POST, TOKEN_PATH) => self.token(body),
            (&Method::GET, CURRENT_USER_PATH) => match self.authenticated(authorization) {
                Some(username) => (200, self.accounts[&username].identity.clone()),
                None => not_logged_in(),
            },
            _ => {
                if let Some(rest) = path.strip_prefix(TEAMS_PATH) {
                    if self.authenticated(authorization).is_none() {
                        return respond(forbidden());
                    }
                    self.collection(Collection::Teams, method, rest, body)
                } else if let Some(rest) = path.strip_prefix(TASKS_PATH) {
                    if self.authenticated(authorization).is_none() {
                        return respond(forbidden());
                    }
                    self.collection(Collection::Tasks, method, rest, body)
                } else {
                    no_route()
                }
            }
        };

        respond((status, payload))
    }

    fn token(&mut self, body: Option<Value>) -> (u16, Value) {
        let body = body.unwrap_or(Value::Null);
        let username = body["username"].as_str().unwrap_or_default().to_string();
        let password = body["password"].as_str().unwrap_or_default();

        let valid = self
            .accounts
            .get(&username)
            .is_some_and(|account| account.password == password);
        if !valid {
            return (
                403,
                json!({
                    "code": "[jwt_auth] incorrect_password",
                    "message": "invalid credentials",
                    "data": { "status": 403 }
                }),
            );
        }

        let token = self.issue(&username);
        (
            200,
            json!({
                "token": token,
                "user_email": format!("{}@example.com", username),
                "user_nicename": username,
                "user_display_name": username,
            }),
        )
    }

    fn issue(&mut self, username: &str) -> String {
        self.issued += 1;
        let token = format!("mock-token-{}-{}", username, self.issued);
        self.tokens.insert(token.clone(), username.to_string());
        token
    }

    fn authenticated(&self, authorization: Option<&str>) -> Option<String> {
        let token = authorization?.strip_prefix("Bearer ")?;
        let username = self.tokens.get(token)?;
        self.accounts
            .contains_key(username)
            .then(|| username.clone())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn collection(
        &mut self,
        collection: Collection,
        method: &Method,
        rest: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let id = match rest {
            "" | "/" => None,
            other => match other.trim_start_matches('/').parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => return no_route(),
            },
        };

        match (method, id) {
            (&Method::GET, None) => (200, Value::Array(self.records(collection).clone())),
            (&Method::POST, None) => {
                let fields = body.unwrap_or(Value::Null);
                if let Err(message) = collection.validate(&fields, true) {
                    return (400, json!({ "code": "invalid_fields", "message": message }));
                }
                let id = self.allocate_id();
                let record = with_id(fields, id);
                self.records(collection).push(record.clone());
                (201, record)
            }
            (&Method::PUT, Some(id)) => {
                let fields = body.unwrap_or(Value::Null);
                if let Err(message) = collection.validate(&fields, false) {
                    return (400, json!({ "code": "invalid_fields", "message": message }));
                }
                let Some(record) = self
                    .records(collection)
                    .iter_mut()
                    .find(|record| record["id"] == json!(id))
                else {
                    return (404, json!({ "message": "not found" }));
                };
                if let (Some(target), Some(updates)) = (record.as_object_mut(), fields.as_object())
                {
                    for (key, value) in updates {
                        target.insert(key.clone(), value.clone());
                    }
                }
                (200, record.clone())
            }
            (&Method::DELETE, Some(id)) => {
                let records = self.records(collection);
                match records.iter().position(|record| record["id"] == json!(id)) {
                    Some(index) => {
                        let previous = records.remove(index);
                        (200, json!({ "deleted": true, "previous": previous }))
                    }
                    None => (404, json!({ "message": "not found" })),
                }
            }
            _ => no_route(),
        }
    }

    fn records(&mut self, collection: Collection) -> &mut Vec<Value> {
        match collection {
            Collection::Teams => &mut self.teams,
            Collection::Tasks => &mut self.tasks,
        }
    }
}

#[derive(Clone, Copy)]
enum Collection {
    Teams,
    Tasks,
}

impl Collection {
    fn validate(self, fields: &Value, creating: bool) -> Result<(), String> {
        let Some(fields) = fields.as_object() else {
            return Err("Request body must be a JSON object".to_string());
        };

        match self {
            Collection::Teams => {
                if creating && !has_text(fields, "name") {
                    return Err("Team name is required.".to_string());
                }
            }
            Collection::Tasks => {
                if creating && !has_text(fields, "title") {
                    return Err("Task title is required.".to_string());
                }
                if let Some(team_id) = fields.get("team_id") {
                    if !team_id.is_u64() {
                        return Err("team_id must be an integer".to_string());
                    }
                }
            }
        }

        Ok(())
    }
}

fn has_text(fields: &Map<String, Value>, key: &str) -> bool {
    fields
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|value| !value.trim().is_empty())
}

fn with_id(record: Value, id: u64) -> Value {
    let mut record = match record {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    record.insert("id".to_string(), json!(id));
    Value::Object(record)
}

fn respond((status, payload): (u16, Value)) -> (u16, String) {
    (status, payload.to_string())
}

fn not_logged_in() -> (u16, Value) {
    (
        401,
        json!({
            "code": "rest_not_logged_in",
            "message": "You are not currently logged in.",
            "data": { "status": 401 }
        }),
    )
}

fn forbidden() -> (u16, Value) {
    (
        401,
        json!({
            "code": "rest_forbidden",
            "message": "Sorry, you are not allowed to do that.",
            "data": { "status": 401 }
        }),
    )
}

fn no_route() -> (u16, Value) {
    (
        404,
        json!({
            "code": "rest_no_route",
            "message": "No route was found matching the URL and request method.",
            "data": { "status": 404 }
        }),
    )
}
