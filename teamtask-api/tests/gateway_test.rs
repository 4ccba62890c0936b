//! Gateway behavior against a live mock backend

use serde_json::json;
use std::time::Duration;
use teamtask_api::test_support::{admin_identity, unreachable_base_url, MockBackend};
use teamtask_api::{
    ApiClientConfig, ApiGateway, Method, ResultEnvelope, TaskInput, TeamInput, TeamtaskError,
    TASKS_PATH, TEAMS_PATH, TOKEN_PATH,
};
use teamtask_core::{Credential, RetryConfig};

fn signed_in_gateway(backend: &MockBackend) -> ApiGateway {
    backend.add_user("admin", "secret", admin_identity(1, "admin"));
    let gateway = ApiGateway::new(ApiClientConfig::new(backend.base_url())).unwrap();
    let token = backend.issue_token("admin");
    gateway.credential().set(Credential::new(token));
    gateway
}

#[tokio::test]
async fn test_request_carries_bearer_credential() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);

    let teams = gateway.list_teams().await.unwrap();
    assert!(teams.is_empty());

    let requests = backend.requests_to(TEAMS_PATH);
    assert_eq!(requests.len(), 1);
    let authorization = requests[0].authorization.as_deref().unwrap();
    assert!(authorization.starts_with("Bearer mock-token-admin-"));
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_request_without_credential_has_no_authorization() {
    let backend = MockBackend::start().await;
    let gateway = ApiGateway::new(ApiClientConfig::new(backend.base_url())).unwrap();

    let error = gateway.list_tasks().await.unwrap_err();
    assert!(error.is_credential_rejected());
    assert_eq!(error.user_message(), "Sorry, you are not allowed to do that.");
    assert!(backend.requests()[0].authorization.is_none());
}

#[tokio::test]
async fn test_token_exchange_never_sends_bearer() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);

    let token = gateway.request_token("admin", "secret").await.unwrap();
    assert!(token.usable_token().is_some());
    assert_eq!(token.user_nicename.as_deref(), Some("admin"));

    let requests = backend.requests_to(TOKEN_PATH);
    assert!(requests[0].authorization.is_none());
    assert_eq!(
        requests[0].body,
        Some(json!({ "username": "admin", "password": "secret" }))
    );
}

#[tokio::test]
async fn test_wrong_password_returns_backend_message() {
    let backend = MockBackend::start().await;
    backend.add_user("alice", "right", admin_identity(2, "alice"));
    let gateway = ApiGateway::new(ApiClientConfig::new(backend.base_url())).unwrap();

    let error = gateway.request_token("alice", "wrong").await.unwrap_err();
    assert_eq!(error.user_message(), "invalid credentials");
    assert_eq!(error.status(), Some(403));
}

#[tokio::test]
async fn test_in_flight_request_keeps_its_credential() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    let original = gateway.credential().snapshot().unwrap();
    backend.delay(TEAMS_PATH, Duration::from_millis(200));

    let in_flight = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.list_teams().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    gateway.credential().set(Credential::new("replaced"));

    in_flight.await.unwrap().unwrap();
    let recorded = backend.requests_to(TEAMS_PATH);
    assert_eq!(recorded[0].authorization, Some(original.bearer()));
}

#[tokio::test]
async fn test_team_crud_flow() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);

    let created = gateway
        .create_team(&TeamInput {
            name: Some("Platform".to_string()),
            description: Some("Infra".to_string()),
        })
        .await
        .unwrap();
    let id = created["id"].as_u64().unwrap();
    assert_eq!(created["name"], "Platform");

    let updated = gateway
        .update_team(id, &json!({ "description": "Infrastructure" }))
        .await
        .unwrap();
    assert_eq!(updated["description"], "Infrastructure");
    assert_eq!(updated["name"], "Platform");

    let deleted = gateway.delete_team(id).await.unwrap();
    assert_eq!(deleted["deleted"], true);
    assert!(gateway.list_teams().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_task_sends_numeric_team_id() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    let team_id = backend.seed_team(json!({ "name": "Ops" }));

    let task = gateway
        .create_task(&TaskInput::new_task("Rotate keys", team_id.to_string()))
        .await
        .unwrap();
    assert_eq!(task["team_id"], json!(team_id));
    assert_eq!(task["priority"], "medium");

    let recorded = backend.requests_to(TASKS_PATH);
    assert!(recorded[0].body.as_ref().unwrap()["team_id"].is_u64());
}

#[tokio::test]
async fn test_missing_task_update_reports_not_found() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);

    let result = gateway
        .update_task(42, &json!({ "status": "completed" }))
        .await;
    let envelope = ResultEnvelope::from(result);
    assert_eq!(envelope.data, None);
    assert_eq!(envelope.error.as_deref(), Some("not found"));
}

#[tokio::test]
async fn test_status_change_on_existing_task() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    let task_id = backend.seed_task(json!({ "title": "Review", "status": "pending" }));

    let task = gateway
        .update_task(task_id, &TaskInput::status_change("completed"))
        .await
        .unwrap();
    assert_eq!(task["status"], "completed");
    assert_eq!(backend.tasks()[0]["status"], "completed");
}

#[tokio::test]
async fn test_error_field_fallback() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    backend.respond_with("GET", TASKS_PATH, 500, r#"{"error":"database unavailable"}"#);

    let error = gateway.list_tasks().await.unwrap_err();
    assert!(matches!(error, TeamtaskError::Api { status: 500, .. }));
    assert_eq!(error.user_message(), "database unavailable");
}

#[tokio::test]
async fn test_status_only_fallback() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    backend.respond_with("DELETE", &format!("{}/3", TEAMS_PATH), 503, "");

    let error = gateway.delete_team(3).await.unwrap_err();
    assert_eq!(error.user_message(), "HTTP error! status: 503");
}

#[tokio::test]
async fn test_malformed_success_body() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    backend.respond_with("GET", TEAMS_PATH, 200, "<!DOCTYPE html><p>Hello</p>");

    let error = gateway.list_teams().await.unwrap_err();
    assert!(matches!(error, TeamtaskError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_empty_success_body_reads_as_null() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    backend.respond_with("DELETE", &format!("{}/8", TASKS_PATH), 200, "");

    let data = gateway.delete_task(8).await.unwrap();
    assert!(data.is_null());

    backend.respond_with("GET", TASKS_PATH, 200, "");
    assert!(gateway.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_backend_reports_network_error() {
    let base_url = unreachable_base_url();
    let gateway = ApiGateway::new(ApiClientConfig::new(&base_url)).unwrap();

    let error = gateway.list_teams().await.unwrap_err();
    assert!(matches!(error, TeamtaskError::Network { .. }));
    assert!(error.is_recoverable());
    assert!(error
        .user_message()
        .starts_with(&format!("Cannot reach the API at {}", base_url)));
}

#[tokio::test]
async fn test_generic_request_primitive() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);

    let error = gateway
        .request(Method::GET, "/teamtask/v1/unknown", None)
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(404));
    assert_eq!(
        error.user_message(),
        "No route was found matching the URL and request method."
    );
}

#[tokio::test]
async fn test_post_is_never_retried() {
    let backend = MockBackend::start().await;
    let config = ApiClientConfig::new(backend.base_url()).with_retry(RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
        ..Default::default()
    });
    let gateway = ApiGateway::new(config).unwrap();
    gateway.credential().set(Credential::new("anything"));
    backend.respond_with("POST", TEAMS_PATH, 500, r#"{"message":"boom"}"#);

    let error = gateway.create_team(&json!({ "name": "x" })).await.unwrap_err();
    assert_eq!(error.user_message(), "boom");
    assert_eq!(backend.requests_to(TEAMS_PATH).len(), 1);
}

#[tokio::test]
async fn test_backend_status_errors_are_not_retried() {
    let backend = MockBackend::start().await;
    let gateway = signed_in_gateway(&backend);
    let config = gateway.config().clone().with_retry(RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
        ..Default::default()
    });
    let retrying = ApiGateway::with_credential_cell(config, gateway.credential().clone()).unwrap();
    backend.respond_with("GET", TASKS_PATH, 502, "");

    assert!(retrying.list_tasks().await.is_err());
    assert_eq!(backend.requests_to(TASKS_PATH).len(), 1);
}

#[tokio::test]
async fn test_slow_backend_reports_timeout() {
    let backend = MockBackend::start().await;
    backend.add_user("admin", "secret", admin_identity(1, "admin"));
    let gateway = ApiGateway::new(ApiClientConfig::new(backend.base_url()).with_timeout(1)).unwrap();
    gateway
        .credential()
        .set(Credential::new(backend.issue_token("admin")));
    backend.delay(TEAMS_PATH, Duration::from_millis(1500));

    let error = gateway.list_teams().await.unwrap_err();

    match &error {
        TeamtaskError::Timeout { duration_ms, .. } => assert_eq!(*duration_ms, 1000),
        other => panic!("Expected Timeout error, got {:?}", other),
    }
    assert!(error.is_recoverable());
    assert_eq!(backend.requests_to(TEAMS_PATH).len(), 1);
}

#[tokio::test]
async fn test_get_is_retried_after_timeout() {
    let backend = MockBackend::start().await;
    backend.add_user("admin", "secret", admin_identity(1, "admin"));
    let config = ApiClientConfig::new(backend.base_url())
        .with_timeout(1)
        .with_retry(RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            jitter: false,
            ..Default::default()
        });
    let gateway = ApiGateway::new(config).unwrap();
    gateway
        .credential()
        .set(Credential::new(backend.issue_token("admin")));
    backend.delay(TEAMS_PATH, Duration::from_millis(1500));

    let error = gateway.list_teams().await.unwrap_err();

    assert!(matches!(error, TeamtaskError::Timeout { .. }));
    assert_eq!(backend.requests_to(TEAMS_PATH).len(), 3);
}

#[tokio::test]
async fn test_unreachable_backend_is_retried_with_backoff() {
    let config = ApiClientConfig::new(unreachable_base_url()).with_retry(RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 100,
        max_delay_ms: 1000,
        backoff_multiplier: 2.0,
        jitter: false,
    });
    let gateway = ApiGateway::new(config).unwrap();
    gateway.credential().set(Credential::new("anything"));

    let started = std::time::Instant::now();
    let error = gateway.delete_task(1).await.unwrap_err();

    // Two waits between three attempts: 100ms then 200ms.
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(matches!(error, TeamtaskError::Network { .. }));
}
