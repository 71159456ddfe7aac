//! Connector error types.
//!
//! Every failure a connector reports falls in one of three groups: the
//! target could not be reached (transient), the target refused the change
//! (permanent), or the object the change addressed is in a state that
//! conflicts with it (`AlreadyExists`, `NotFound`). Synchronization treats
//! the last group specially, so it has dedicated variants.

use thiserror::Error;

use crate::ids::ResourceId;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error reported by a connector or by connector lookup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Target system could not be reached.
    #[error("target unreachable: {message}")]
    Unreachable {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Call did not complete in time.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    /// Credentials rejected or operation not permitted.
    #[error("access denied for {operation}")]
    AccessDenied { operation: String },

    /// Connector configuration is unusable.
    #[error("connector misconfigured: {message}")]
    Misconfigured { message: String },

    /// No connector is registered for the resource.
    #[error("no connector configured for resource {resource_id}")]
    NoConnector { resource_id: ResourceId },

    /// Object class is not part of the discovered schema.
    #[error("unknown object class '{object_class}'")]
    UnknownObjectClass { object_class: String },

    /// Attribute values do not fit the target schema.
    #[error("schema violation on '{attribute}': {message}")]
    SchemaViolation { attribute: String, message: String },

    /// Create collided with an existing object.
    #[error("object already exists: {identifier}")]
    AlreadyExists { identifier: String },

    /// Modify or delete addressed a missing object.
    #[error("object not found: {identifier}")]
    NotFound { identifier: String },

    /// Target refused the change for another reason.
    #[error("change rejected: {message}")]
    Rejected {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("internal connector error: {message}")]
    Internal { message: String },
}

impl ConnectorError {
    /// Whether the same call may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }

    /// Whether the error describes the state of the addressed object rather
    /// than a failure of the call.
    pub fn is_object_state(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::NotFound { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "UNREACHABLE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::AccessDenied { .. } => "ACCESS_DENIED",
            Self::Misconfigured { .. } => "MISCONFIGURED",
            Self::NoConnector { .. } => "NO_CONNECTOR",
            Self::UnknownObjectClass { .. } => "UNKNOWN_OBJECT_CLASS",
            Self::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Rejected { .. } => "REJECTED",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
            source: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            source: None,
        }
    }

    /// Rejection carrying the underlying client error.
    pub fn rejected_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Rejected {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn already_exists(identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            identifier: identifier.into(),
        }
    }

    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
