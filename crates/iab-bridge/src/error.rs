//! Error types for the request bridge.
//!
//! Host failures arrive in whatever shape the host chose (plain string, arbitrary JSON,
//! or a proper error object). They are normalized into [`HostError`] before reaching
//! the caller, so every rejection has the same shape.

use serde::{Deserialize, Serialize};

use crate::bridge::protocol::RequestId;
use crate::bridge::transport::TransportError;

/// Normalized error reported by the host for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Any other fields of the host's error object, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Raw failure value as sent by the host, before normalization.
///
/// Untagged: an object with a string `message` is an error object, a JSON string is a
/// message, anything else is kept as an opaque value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostFailure {
    Error(HostError),
    Message(String),
    Value(serde_json::Value),
}

impl From<HostError> for HostFailure {
    fn from(error: HostError) -> Self {
        Self::Error(error)
    }
}

impl From<String> for HostFailure {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for HostFailure {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<serde_json::Value> for HostFailure {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<HostFailure> for HostError {
    fn from(failure: HostFailure) -> Self {
        match failure {
            HostFailure::Error(error) => error,
            HostFailure::Message(message) => HostError::new(message),
            HostFailure::Value(serde_json::Value::String(message)) => HostError::new(message),
            HostFailure::Value(value) => HostError::new(value.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Completion for an id that is not pending: never issued, or already completed.
    #[error("completion for unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("request {id} rejected by host: {error}")]
    Host { id: RequestId, error: HostError },

    #[error("failed to post request {id}: {source}")]
    Transport {
        id: RequestId,
        source: TransportError,
    },

    #[error("failed to encode request {id}: {source}")]
    Encode {
        id: RequestId,
        source: serde_json::Error,
    },

    #[error("unexpected result shape for request {id}: {source}")]
    Decode {
        id: RequestId,
        source: serde_json::Error,
    },

    /// The bridge was dropped while the request was still pending.
    #[error("request {0} abandoned before the host completed it")]
    Abandoned(RequestId),
}

impl BridgeError {
    /// Host-side error, if this is a host rejection.
    pub fn host_error(&self) -> Option<&HostError> {
        match self {
            Self::Host { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            Self::UnknownRequest(id) | Self::Abandoned(id) => *id,
            Self::Host { id, .. }
            | Self::Transport { id, .. }
            | Self::Encode { id, .. }
            | Self::Decode { id, .. } => *id,
        }
    }
}
