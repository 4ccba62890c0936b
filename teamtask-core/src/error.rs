//! Unified error handling system
//!
//! Every failure the client can observe is one of the variants below. Network-facing
//! operations return them through `TeamtaskResult`, and UI code reads the bare
//! human-readable text through [`TeamtaskError::user_message`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type TeamtaskResult<T> = Result<T, TeamtaskError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the teamtask client
#[derive(Error, Debug)]
pub enum TeamtaskError {
    /// The backend rejected the credential (HTTP 401/403).
    #[error("Authentication error: {message}")]
    Authentication {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// The request never reached the server.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    /// The backend answered with a non-success status and its own message.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// The backend answered but the body could not be parsed.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl TeamtaskError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            TeamtaskError::Authentication { context, .. } => Some(context),
            TeamtaskError::Network { context, .. } => Some(context),
            TeamtaskError::Timeout { context, .. } => Some(context),
            TeamtaskError::Api { context, .. } => Some(context),
            TeamtaskError::MalformedResponse { context, .. } => Some(context),
            TeamtaskError::Config { context, .. } => Some(context),
            TeamtaskError::Storage { context, .. } => Some(context),
            TeamtaskError::Validation { context, .. } => Some(context),
            TeamtaskError::Internal { context, .. } => Some(context),
            TeamtaskError::Io(_) | TeamtaskError::Serialization(_) => None,
        }
    }

    /// The message a user should see, without the category prefix used by `Display`.
    ///
    /// Backend-provided messages come back verbatim.
    pub fn user_message(&self) -> String {
        match self {
            TeamtaskError::Authentication { message, .. }
            | TeamtaskError::Network { message, .. }
            | TeamtaskError::Api { message, .. }
            | TeamtaskError::MalformedResponse { message, .. }
            | TeamtaskError::Config { message, .. }
            | TeamtaskError::Storage { message, .. }
            | TeamtaskError::Validation { message, .. }
            | TeamtaskError::Internal { message, .. } => message.clone(),
            TeamtaskError::Timeout {
                operation,
                duration_ms,
                ..
            } => format!("{} timed out after {} ms", operation, duration_ms),
            TeamtaskError::Io(e) => e.to_string(),
            TeamtaskError::Serialization(e) => e.to_string(),
        }
    }

    /// HTTP status code, when the backend produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            TeamtaskError::Authentication { status, .. } | TeamtaskError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// True when the backend refused the bearer credential
    pub fn is_credential_rejected(&self) -> bool {
        matches!(self, TeamtaskError::Authentication { .. })
    }

    /// Check if error is recoverable
    ///
    /// Only transport-level failures qualify; anything the backend answered is final.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TeamtaskError::Network { .. } | TeamtaskError::Timeout { .. }
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            TeamtaskError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            TeamtaskError::Config { .. } | TeamtaskError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
                );
            }
            TeamtaskError::Network { .. } | TeamtaskError::Timeout { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Network or timeout error (may be recoverable)"
                );
            }
            TeamtaskError::Authentication { .. } | TeamtaskError::Api { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    status = ?self.status(),
                    error = %self,
                    "Backend rejected request"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::TeamtaskError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'teamtask config init' to create a default config"),
        }
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::TeamtaskError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::TeamtaskError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::TeamtaskError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
