use std::time::Duration;

use thiserror::Error;

pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{operation} failed with status {status} ({code}): {message}")]
    Service {
        operation: String,
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    #[error("{operation}: transport error: {source}")]
    Transport {
        operation: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("{operation}: unable to decode response: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{resource} was not deleted within {waited:?}")]
    DeletionTimeout { resource: String, waited: Duration },

    #[error("request signing failed: {0}")]
    Signing(String),
}

impl CloudError {
    pub fn service(
        operation: impl Into<String>,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CloudError::Service {
            operation: operation.into(),
            status,
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn not_found(operation: impl Into<String>, what: &str) -> Self {
        Self::service(operation, 404, "NotAuthorizedOrNotFound", format!("{what} not found"))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Throttling, server faults and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CloudError::Service { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            CloudError::Transport { .. } => true,
            _ => false,
        }
    }
}
