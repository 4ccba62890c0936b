//! Wire types and payload helpers

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use teamtask_core::Session;

use crate::RequestResult;

/// Team records are passed through untouched
pub type Team = Value;

/// Task records are passed through untouched
pub type Task = Value;

/// Successful token exchange
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_nicename: Option<String>,
    #[serde(default)]
    pub user_display_name: Option<String>,
}

impl TokenResponse {
    /// The token, if the backend actually issued a non-empty one
    pub fn usable_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.is_empty())
    }
}

/// Current-user response from the identity endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capabilities: Option<HashMap<String, Value>>,
}

impl From<CurrentUser> for Session {
    fn from(user: CurrentUser) -> Self {
        Session {
            id: user.id,
            username: user.username.or(user.slug).unwrap_or_default(),
            email: user.email,
            roles: user.roles.unwrap_or_default().into_iter().collect(),
            display_name: user.name.unwrap_or_default(),
            // Only real booleans count; anything else cannot grant a capability.
            capabilities: user
                .capabilities
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(name, value)| value.as_bool().map(|granted| (name, granted)))
                .collect(),
        }
    }
}

/// Team fields accepted by create/update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Task fields accepted by create/update
///
/// `team_id` is kept as entered; the gateway coerces it to a number before sending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl TaskInput {
    /// Fields for a brand new task, with the dashboard's defaults
    pub fn new_task(title: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            team_id: Some(team_id.into()),
            priority: Some("medium".to_string()),
            status: Some("pending".to_string()),
            ..Default::default()
        }
    }

    pub fn status_change(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }
}

/// Coerce a string `team_id` holding an integer into a JSON number.
///
/// Anything else is left for the backend to judge.
pub fn shape_task_payload(mut payload: Value) -> Value {
    if let Some(team_id) = payload.get_mut("team_id") {
        if let Some(id) = team_id.as_str().and_then(|raw| raw.trim().parse::<i64>().ok()) {
            *team_id = Value::from(id);
        }
    }
    payload
}

/// Serializable `{data, error}` form of a request result.
///
/// `error` is present exactly when the request failed. A success whose body was
/// empty carries `data: null`, so readers must test for `error`, not for `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ResultEnvelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl<T> From<RequestResult<T>> for ResultEnvelope<T> {
    fn from(result: RequestResult<T>) -> Self {
        match result {
            Ok(data) => Self::data(data),
            Err(error) => Self::error(error.user_message()),
        }
    }
}
