//! Error types for the L4 load balancer status layer

use thiserror::Error;

use crate::cloud::CloudError;

/// Main error type for status reconciliation
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Error returned by the cloud resource provider
    #[error("Cloud provider error: {0}")]
    CloudError(#[from] CloudError),

    /// Invalid operator configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A Service or referenced object failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status code of a Kubernetes API error response, if any
    fn api_code(&self) -> Option<u16> {
        match self {
            Error::KubeError(kube::Error::Api(resp)) => Some(resp.code),
            _ => None,
        }
    }

    /// True when the referenced object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::CloudError(e) => matches!(e, CloudError::NotFound(_)),
            _ => self.api_code() == Some(404),
        }
    }

    /// True when an optimistic-concurrency check rejected a write
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::CloudError(e) => matches!(e, CloudError::Conflict(_)),
            _ => self.api_code() == Some(409),
        }
    }

    /// Whether the caller's reconciliation loop should retry the pass
    ///
    /// Conflicts and transport/server failures are retryable; configuration,
    /// validation and serialization errors are not going to fix themselves.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(resp)) => {
                resp.code == 409 || resp.code == 429 || resp.code >= 500
            }
            Error::KubeError(_) => true,
            Error::CloudError(e) => e.is_retryable(),
            Error::ConfigError(_) | Error::ValidationError(_) | Error::SerializationError(_) => {
                false
            }
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
