//! Error types for remote CRM calls.

use thiserror::Error;

/// Errors returned by a [`CrmClient`](super::CrmClient).
#[derive(Debug, Clone, Error)]
pub enum CrmError {
    /// The remote side answered with an error payload.
    #[error("{entity}.{action} failed: {message}")]
    Api {
        entity: String,
        action: String,
        message: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    /// The response could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The HTTP client could not be built.
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl CrmError {
    pub fn api(entity: &str, action: &str, message: impl Into<String>) -> Self {
        Self::Api {
            entity: entity.to_string(),
            action: action.to_string(),
            message: message.into(),
        }
    }

    /// Whether the failure happened in transport rather than in the CRM.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::Timeout | Self::Http { .. }
        )
    }
}
