//! Teamtask Session - authenticated session lifecycle
//!
//! Acquires, persists, validates and clears the bearer credential, and derives the
//! administrator decision from the identity the backend reports for it.
//!
//! ```no_run
//! # async fn demo() -> teamtask_core::TeamtaskResult<()> {
//! use teamtask_core::TeamtaskConfig;
//! use teamtask_session::SessionManager;
//!
//! let manager = SessionManager::open(&TeamtaskConfig::default(), "/tmp/teamtask")?;
//! manager.check_session().await;
//! if !manager.is_authenticated() {
//!     let outcome = manager.login("alice", "secret").await;
//!     println!("{:?}", outcome.error);
//! }
//! let teams = manager.gateway().list_teams().await;
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod state;
pub mod storage;

pub use manager::SessionManager;
pub use state::{LoginOutcome, SessionState, SessionStatus};
pub use storage::{FileSessionStore, MemorySessionStore, PersistedSession, SessionStore};
