//! Session lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;
use teamtask_core::Session;

/// Where the session lifecycle currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Process start; persisted state not checked yet
    Initializing,
    Anonymous,
    /// Login in progress
    Authenticating,
    Authenticated,
    /// Logout in progress
    Invalidating,
}

impl SessionState {
    /// UI should show a loading indicator
    pub fn is_loading(self) -> bool {
        matches!(self, SessionState::Initializing | SessionState::Authenticating)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Initializing => "initializing",
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Invalidating => "invalidating",
        };
        f.write_str(name)
    }
}

/// A state together with the identity valid in it.
///
/// `session` is set exactly when `state` is `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl SessionStatus {
    pub fn initializing() -> Self {
        Self::without_session(SessionState::Initializing)
    }

    pub fn anonymous() -> Self {
        Self::without_session(SessionState::Anonymous)
    }

    pub fn authenticated(session: Session) -> Self {
        Self {
            state: SessionState::Authenticated,
            session: Some(session),
        }
    }

    pub(crate) fn without_session(state: SessionState) -> Self {
        Self {
            state,
            session: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated && self.session.is_some()
    }
}

/// Result of a login attempt, in the shape UI code consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loading_states() {
        assert!(SessionState::Initializing.is_loading());
        assert!(SessionState::Authenticating.is_loading());
        assert!(!SessionState::Anonymous.is_loading());
        assert!(!SessionState::Authenticated.is_loading());
        assert!(!SessionState::Invalidating.is_loading());
    }

    #[test]
    fn test_login_outcome_shape() {
        assert_eq!(
            serde_json::to_value(LoginOutcome::succeeded()).unwrap(),
            json!({ "success": true })
        );
        assert_eq!(
            serde_json::to_value(LoginOutcome::failed("invalid credentials")).unwrap(),
            json!({ "success": false, "error": "invalid credentials" })
        );
    }

    #[test]
    fn test_status_serialization() {
        let status = SessionStatus::anonymous();
        assert!(!status.is_authenticated());
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({ "state": "anonymous" })
        );
        assert_eq!(SessionState::Invalidating.to_string(), "invalidating");
    }
}
