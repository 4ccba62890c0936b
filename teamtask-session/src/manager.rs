//! Session Manager - owns the credential, the identity and the lifecycle state
//!
//! All state changes go through this type. Readers observe them through
//! [`SessionManager::subscribe`] or the synchronous accessors, none of which touch
//! the network.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use teamtask_api::{ApiClientConfig, ApiGateway, CredentialCell};
use teamtask_core::{
    log_operation_error, log_operation_start, log_operation_success, Credential, Session,
    TeamtaskConfig, TeamtaskResult,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::state::{LoginOutcome, SessionState, SessionStatus};
use crate::storage::{FileSessionStore, PersistedSession, SessionStore};

/// Shown when the token exchange succeeds without handing out a token
const MISSING_TOKEN_MESSAGE: &str = "Login failed: the server did not return a token";

/// Shown when a logout lands while a login is still in flight
const SUPERSEDED_MESSAGE: &str = "Signed out before login completed";

/// Single source of truth for who is signed in.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct SessionManager {
    gateway: ApiGateway,
    store: Arc<dyn SessionStore>,
    status: watch::Sender<SessionStatus>,
    /// Serializes login and session checks
    flow: Mutex<()>,
    /// Held by logout and by every epoch check that is followed by a commit
    commit: std::sync::Mutex<()>,
    /// Bumped by every logout so in-flight flows know not to commit
    epoch: AtomicU64,
    /// Bumped when a session check finishes
    checks_completed: AtomicU64,
}

impl SessionManager {
    /// Create a manager that writes the credential into `gateway`'s cell
    pub fn new(gateway: ApiGateway, store: Arc<dyn SessionStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::initializing());

        Self {
            gateway,
            store,
            status,
            flow: Mutex::new(()),
            commit: std::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
            checks_completed: AtomicU64::new(0),
        }
    }

    /// Build the gateway from `config` and persist sessions under `data_dir`
    pub fn open<P: AsRef<Path>>(config: &TeamtaskConfig, data_dir: P) -> TeamtaskResult<Self> {
        let gateway = ApiGateway::new(ApiClientConfig::from(config))?;
        let store = FileSessionStore::new(data_dir)?;
        Ok(Self::new(gateway, Arc::new(store)))
    }

    /// Gateway sharing this manager's credential
    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn current_session(&self) -> Option<Session> {
        self.status.borrow().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// Administrator check from cached identity; false without a session.
    ///
    /// Never contacts the backend. It only gates UI: the backend enforces
    /// authorization on every privileged write on its own.
    pub fn is_authorized(&self) -> bool {
        self.status
            .borrow()
            .session
            .as_ref()
            .is_some_and(Session::is_administrator)
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Restore the persisted session and confirm it with the backend.
    ///
    /// Callers that queued behind an in-flight check return once it finishes
    /// without repeating the network work. Any failure clears the persisted pair
    /// and leaves the manager `Anonymous`.
    pub async fn check_session(&self) {
        let observed = self.checks_completed.load(Ordering::SeqCst);
        let _flow = self.flow.lock().await;

        if self.checks_completed.load(Ordering::SeqCst) != observed {
            debug!("Session check already completed by a concurrent caller");
            return;
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        self.revalidate(epoch).await;
        self.checks_completed.fetch_add(1, Ordering::SeqCst);
    }

    async fn revalidate(&self, epoch: u64) {
        let persisted = match self.store.load() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                debug!("No persisted session");
                self.credential().clear();
                self.publish(SessionStatus::anonymous());
                return;
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                self.discard();
                return;
            }
        };

        log_operation_start!("check_session", user = %persisted.session.username);
        {
            let _commit = self.lock_commit();
            if !self.is_current(epoch) {
                debug!("Session check superseded by logout");
                return;
            }
            self.credential().set(persisted.credential.clone());
        }

        let session = match self.gateway.current_user().await {
            Ok(user) => Session::from(user),
            Err(e) => {
                let _commit = self.lock_commit();
                if self.is_current(epoch) {
                    log_operation_error!("check_session", e);
                    self.discard();
                } else {
                    debug!("Session check superseded by logout");
                    self.credential().clear();
                }
                return;
            }
        };

        // Written before the commit lock is taken: a store may call back into the manager.
        self.persist(&PersistedSession {
            credential: persisted.credential,
            session: session.clone(),
        });

        let _commit = self.lock_commit();
        if !self.is_current(epoch) {
            debug!("Session check superseded by logout");
            self.abandon();
            return;
        }
        log_operation_success!("check_session", user = %session.username);
        self.publish(SessionStatus::authenticated(session));
    }

    /// Exchange credentials for a token, then fetch the identity it belongs to.
    ///
    /// Succeeds only when both calls do. On failure the previous credential and
    /// state are put back and nothing is persisted.
    pub async fn login(&self, username: &str, password: &str) -> LoginOutcome {
        let _flow = self.flow.lock().await;

        let epoch = self.epoch.load(Ordering::SeqCst);
        // A failed attempt keeps an existing session; otherwise it lands on Anonymous.
        let status = self.status();
        let previous = if status.is_authenticated() {
            Rollback {
                status,
                credential: self.credential().snapshot(),
            }
        } else {
            Rollback {
                status: SessionStatus::anonymous(),
                credential: None,
            }
        };

        log_operation_start!("login", user = %username);
        self.publish(SessionStatus::without_session(SessionState::Authenticating));

        let credential = match self.gateway.request_token(username, password).await {
            Ok(response) => match response.usable_token() {
                Some(token) => Credential::new(token),
                None => return self.fail_login(epoch, previous, MISSING_TOKEN_MESSAGE),
            },
            Err(e) => return self.fail_login(epoch, previous, e.user_message()),
        };

        {
            let _commit = self.lock_commit();
            if !self.is_current(epoch) {
                return LoginOutcome::failed(SUPERSEDED_MESSAGE);
            }
            // The identity fetch below must carry the new token.
            self.credential().set(credential.clone());
        }

        let session = match self.gateway.current_user().await {
            Ok(user) => Session::from(user),
            Err(e) => return self.fail_login(epoch, previous, e.user_message()),
        };

        self.persist(&PersistedSession {
            credential,
            session: session.clone(),
        });

        let _commit = self.lock_commit();
        if !self.is_current(epoch) {
            self.abandon();
            return LoginOutcome::failed(SUPERSEDED_MESSAGE);
        }

        log_operation_success!(
            "login",
            user = %session.username,
            administrator = session.is_administrator()
        );
        self.publish(SessionStatus::authenticated(session));
        LoginOutcome::succeeded()
    }

    /// Forget the credential and identity. No network call; cannot fail.
    pub fn logout(&self) {
        let _commit = self.lock_commit();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.credential().clear();
        self.publish(SessionStatus::without_session(SessionState::Invalidating));

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }

        self.publish(SessionStatus::anonymous());
        info!("Signed out");
    }

    fn credential(&self) -> &CredentialCell {
        self.gateway.credential()
    }

    fn lock_commit(&self) -> MutexGuard<'_, ()> {
        self.commit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn publish(&self, status: SessionStatus) {
        debug!(state = %status.state, "Session state changed");
        self.status.send_replace(status);
    }

    fn persist(&self, persisted: &PersistedSession) {
        if let Err(e) = self.store.save(persisted) {
            warn!(error = %e, "Failed to persist session; it will not survive a restart");
        }
    }

    /// Drop everything after a failed check
    fn discard(&self) {
        self.credential().clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        self.publish(SessionStatus::anonymous());
    }

    /// Undo a commit that a logout overtook; the logout already published `Anonymous`
    fn abandon(&self) {
        self.credential().clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    fn fail_login(
        &self,
        epoch: u64,
        previous: Rollback,
        message: impl Into<String>,
    ) -> LoginOutcome {
        let message = message.into();
        log_operation_error!("login", message);

        let _commit = self.lock_commit();
        if self.is_current(epoch) {
            self.credential().replace(previous.credential);
            self.publish(previous.status);
        } else {
            self.credential().clear();
        }

        LoginOutcome::failed(message)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// What a failed login puts back
struct Rollback {
    status: SessionStatus,
    credential: Option<Credential>,
}
