// src/error.rs
//! Error taxonomy for the signal pipeline.
//!
//! Every variant is recoverable from the point of view of the hosting process:
//! source clients degrade to empty/partial results and the batch runner records
//! failures per entity. Only `Transport` on the primary source changes control
//! flow (it moves the entity fetch into its failed state).

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalError {
    /// Network failure or timeout on an external call.
    #[error("transport error ({source_name}): {message}")]
    Transport {
        source_name: &'static str,
        message: String,
    },

    /// Non-ok status or malformed payload from a source.
    #[error("provider error ({source_name}): {message}")]
    Provider {
        source_name: &'static str,
        message: String,
    },

    /// Page content could not be fetched or parsed.
    #[error("extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Missing credential or unusable setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unrecoverable failure while processing one batch entity.
    #[error("entity '{entity}' failed: {message}")]
    EntityProcessing { entity: String, message: String },

    #[error("batch cancelled before entity was processed")]
    Cancelled,
}

impl SignalError {
    pub fn transport(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            source_name,
            message: message.into(),
        }
    }

    pub fn provider(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            source_name,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Classify a reqwest failure: connect/timeout/request errors are transport
    /// problems, status and body decode errors are provider problems.
    pub fn from_reqwest(source_name: &'static str, e: reqwest::Error) -> Self {
        if e.is_status() || e.is_decode() || e.is_body() {
            Self::provider(source_name, e.to_string())
        } else {
            Self::transport(source_name, e.to_string())
        }
    }
}

pub type SignalResult<T> = Result<T, SignalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_flag_only_on_transport() {
        assert!(SignalError::transport("newsapi", "timed out").is_transport());
        assert!(!SignalError::provider("newsapi", "status=error").is_transport());
        assert!(!SignalError::Configuration("NEWS_API missing".into()).is_transport());
    }

    #[test]
    fn display_names_the_source() {
        let e = SignalError::provider("serper", "bad json");
        assert_eq!(e.to_string(), "provider error (serper): bad json");
    }
}
