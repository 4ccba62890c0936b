//! Core data type definitions

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Role name that grants administrator access in the dashboard
pub const ADMINISTRATOR_ROLE: &str = "administrator";

/// Capability flag that grants administrator access even without the role
pub const MANAGE_OPTIONS_CAPABILITY: &str = "manage_options";

/// Opaque bearer token identifying an authenticated session to the backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// Tokens end up in log fields through `?` formatting, so never print them.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Materialized identity of the signed-in user
///
/// Built from the backend's current-user response and never edited locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,
}

impl Session {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.get(capability).copied().unwrap_or(false)
    }

    /// Administrator check used to gate UI.
    ///
    /// This reads cached identity only. The backend enforces authorization on every
    /// privileged write independently of this answer.
    pub fn is_administrator(&self) -> bool {
        self.has_role(ADMINISTRATOR_ROLE) || self.has_capability(MANAGE_OPTIONS_CAPABILITY)
    }

    /// Name to show in UI, falling back to the login name
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(roles: &[&str], capabilities: &[(&str, bool)]) -> Session {
        Session {
            id: 7,
            username: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            display_name: "Alice".to_string(),
            capabilities: capabilities
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn test_administrator_role_grants_access() {
        assert!(session(&["administrator"], &[]).is_administrator());
        assert!(session(&["editor", "administrator"], &[]).is_administrator());
    }

    #[test]
    fn test_manage_options_capability_grants_access() {
        assert!(session(&["editor"], &[("manage_options", true)]).is_administrator());
        assert!(!session(&["editor"], &[("manage_options", false)]).is_administrator());
    }

    #[test]
    fn test_regular_user_is_not_administrator() {
        assert!(!session(&["subscriber"], &[("edit_posts", true)]).is_administrator());
        assert!(!session(&[], &[]).is_administrator());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
        assert_eq!(credential.bearer(), "Bearer secret-token");
    }

    #[test]
    fn test_session_serializes_display_name_as_name() {
        let value = serde_json::to_value(session(&["administrator"], &[])).unwrap();
        assert_eq!(value["name"], "Alice");
        assert!(value.get("display_name").is_none());

        let restored: Session = serde_json::from_value(value).unwrap();
        assert_eq!(restored, session(&["administrator"], &[]));
    }

    #[test]
    fn test_label_falls_back_to_username() {
        let mut s = session(&[], &[]);
        assert_eq!(s.label(), "Alice");
        s.display_name.clear();
        assert_eq!(s.label(), "alice");
    }
}
