//! Shared holder for the current bearer credential

use std::sync::Arc;
use teamtask_core::Credential;
use tokio::sync::watch;

/// The single current credential, shared between the session manager (writer) and
/// the gateway (reader).
///
/// Clones point at the same cell. Replacing the value is atomic for readers, and a
/// request works from the [`snapshot`](Self::snapshot) it took when it started.
#[derive(Clone)]
pub struct CredentialCell {
    inner: Arc<watch::Sender<Option<Credential>>>,
}

impl CredentialCell {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            inner: Arc::new(sender),
        }
    }

    /// Install a new credential, returning the one it superseded
    pub fn set(&self, credential: Credential) -> Option<Credential> {
        self.inner.send_replace(Some(credential))
    }

    /// Drop the current credential, returning it
    pub fn clear(&self) -> Option<Credential> {
        self.inner.send_replace(None)
    }

    pub fn replace(&self, credential: Option<Credential>) -> Option<Credential> {
        self.inner.send_replace(credential)
    }

    pub fn snapshot(&self) -> Option<Credential> {
        self.inner.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner.borrow().is_some()
    }
}

impl Default for CredentialCell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCell")
            .field("is_set", &self.is_set())
            .finish()
    }
}
