//! Named endpoint operations
//!
//! Each one only picks a path and verb and shapes the payload; all behavior lives in
//! [`ApiGateway::request`].

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::{decode, ApiGateway};
use crate::models::{shape_task_payload, CurrentUser, Task, Team, TokenResponse};
use crate::RequestResult;

pub const TOKEN_PATH: &str = "/jwt-auth/v1/token";
pub const CURRENT_USER_PATH: &str = "/wp/v2/users/me";
pub const TEAMS_PATH: &str = "/teamtask/v1/teams";
pub const TASKS_PATH: &str = "/teamtask/v1/tasks";

impl ApiGateway {
    /// Exchange a username and password for a bearer token.
    ///
    /// Sent without any current credential so a stale token cannot interfere.
    pub async fn request_token(
        &self,
        username: &str,
        password: &str,
    ) -> RequestResult<TokenResponse> {
        let body = json!({ "username": username, "password": password });
        let value = self
            .request_anonymous(Method::POST, TOKEN_PATH, Some(body))
            .await?;
        decode(value, TOKEN_PATH)
    }

    /// Fetch the identity behind the current credential
    pub async fn current_user(&self) -> RequestResult<CurrentUser> {
        self.request_as(Method::GET, CURRENT_USER_PATH, None).await
    }

    pub async fn list_teams(&self) -> RequestResult<Vec<Team>> {
        self.list(TEAMS_PATH).await
    }

    pub async fn create_team<P: Serialize + ?Sized>(&self, team: &P) -> RequestResult<Team> {
        let body = serde_json::to_value(team)?;
        self.request(Method::POST, TEAMS_PATH, Some(body)).await
    }

    pub async fn update_team<P: Serialize + ?Sized>(
        &self,
        team_id: u64,
        team: &P,
    ) -> RequestResult<Team> {
        let body = serde_json::to_value(team)?;
        self.request(Method::PUT, &item_path(TEAMS_PATH, team_id), Some(body))
            .await
    }

    pub async fn delete_team(&self, team_id: u64) -> RequestResult<Value> {
        self.request(Method::DELETE, &item_path(TEAMS_PATH, team_id), None)
            .await
    }

    pub async fn list_tasks(&self) -> RequestResult<Vec<Task>> {
        self.list(TASKS_PATH).await
    }

    pub async fn create_task<P: Serialize + ?Sized>(&self, task: &P) -> RequestResult<Task> {
        let body = shape_task_payload(serde_json::to_value(task)?);
        self.request(Method::POST, TASKS_PATH, Some(body)).await
    }

    pub async fn update_task<P: Serialize + ?Sized>(
        &self,
        task_id: u64,
        task: &P,
    ) -> RequestResult<Task> {
        let body = shape_task_payload(serde_json::to_value(task)?);
        self.request(Method::PUT, &item_path(TASKS_PATH, task_id), Some(body))
            .await
    }

    pub async fn delete_task(&self, task_id: u64) -> RequestResult<Value> {
        self.request(Method::DELETE, &item_path(TASKS_PATH, task_id), None)
            .await
    }

    /// A `null` collection reads as empty
    async fn list(&self, path: &str) -> RequestResult<Vec<Value>> {
        match self.request(Method::GET, path, None).await? {
            Value::Null => Ok(Vec::new()),
            value => decode(value, path),
        }
    }
}

pub(crate) fn item_path(collection: &str, id: u64) -> String {
    format!("{}/{}", collection, id)
}
