use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    #[error("Element not found for target '{target}' (tried {tried} candidates)")]
    NotFound { target: String, tried: usize },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid payload: {0}")]
    Validation(String),

    #[error("Transient UI error: {0}")]
    TransientUi(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Browser error: {0}")]
    Platform(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    pub fn not_found(target: impl std::fmt::Display, tried: usize) -> Self {
        AutomationError::NotFound {
            target: target.to_string(),
            tried,
        }
    }

    /// Errors that invalidate the whole job rather than a single item.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            AutomationError::Navigation(_)
                | AutomationError::Auth(_)
                | AutomationError::SessionExpired(_)
                | AutomationError::Cancelled(_)
        )
    }

    /// Errors that usually clear up when the element is resolved again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutomationError::TransientUi(_) | AutomationError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for AutomationError {
    fn from(e: serde_json::Error) -> Self {
        AutomationError::Internal(format!("JSON error: {e}"))
    }
}
