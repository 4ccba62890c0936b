//! Teamtask Core - shared building blocks for the teamtask client
//!
//! Error taxonomy, configuration, logging, retry policy and the identity types that
//! both the API gateway and the session manager speak.

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use retry::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
