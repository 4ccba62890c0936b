//! Teamtask API - gateway to the teamtask REST backend
//!
//! Builds outbound requests (base address, JSON body, bearer credential), performs
//! them, and normalizes every outcome into a [`RequestResult`]. Transport failures,
//! non-success statuses and unparseable bodies all arrive as a [`TeamtaskError`];
//! nothing is thrown past this layer.
//!
//! ```no_run
//! # async fn demo() -> teamtask_core::TeamtaskResult<()> {
//! use teamtask_api::{ApiClientConfig, ApiGateway};
//!
//! let gateway = ApiGateway::new(ApiClientConfig::new("http://localhost/wp-json"))?;
//! let teams = gateway.list_teams().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credential;
pub mod endpoints;
pub mod models;
pub mod response;

#[cfg(feature = "test-support")]
pub mod test_support;


pub use client::ApiGateway;
pub use config::ApiClientConfig;
pub use credential::CredentialCell;
pub use endpoints::{CURRENT_USER_PATH, TASKS_PATH, TEAMS_PATH, TOKEN_PATH};
pub use models::{
    shape_task_payload, CurrentUser, ResultEnvelope, Task, TaskInput, Team, TeamInput,
    TokenResponse,
};

pub use reqwest::Method;
pub use teamtask_core::{TeamtaskError, TeamtaskResult};

/// Outcome of every network-facing operation: the data, or the error explaining why not
pub type RequestResult<T> = Result<T, TeamtaskError>;
