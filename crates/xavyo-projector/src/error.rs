//! Projector error types.

use thiserror::Error;
use xavyo_connector::ConnectorError;

/// Errors that can occur while projecting or executing changes.
#[derive(Debug, Error)]
pub enum ProjectorError {
    /// Malformed item, delta or object definition.
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// Object or remote entity missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Uniqueness conflict.
    #[error("Object already exists: {identifier}")]
    AlreadyExists { identifier: String },

    /// Conflicting mappings or a mapping fighting an explicit request.
    #[error("Policy violation: {message}")]
    PolicyViolation { message: String },

    /// Transient fault talking to a resource.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// Permanent misconfiguration.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Rejected by an authorization collaborator.
    #[error("Security error: {message}")]
    Security { message: String },

    /// Mapping evaluation failure.
    #[error("Expression error in mapping '{mapping}': {message}")]
    Expression { mapping: String, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProjectorError {
    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            identifier: identifier.into(),
        }
    }

    /// Create a policy violation error.
    pub fn policy_violation(message: impl Into<String>) -> Self {
        Self::PolicyViolation {
            message: message.into(),
        }
    }

    /// Create a communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an expression error.
    pub fn expression(mapping: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expression {
            mapping: mapping.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::PolicyViolation { .. } => "POLICY_VIOLATION",
            Self::Communication { .. } => "COMMUNICATION_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Security { .. } => "SECURITY_ERROR",
            Self::Expression { .. } => "EXPRESSION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a uniqueness conflict.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this is a policy violation.
    #[must_use]
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PolicyViolation { .. })
    }
}

impl From<ConnectorError> for ProjectorError {
    fn from(err: ConnectorError) -> Self {
        let message = err.to_string();
        match err {
            ConnectorError::AlreadyExists { identifier } => Self::AlreadyExists { identifier },
            ConnectorError::NotFound { identifier } => Self::not_found("object", identifier),
            ConnectorError::NoConnector { resource_id } => {
                Self::not_found("resource", resource_id.to_string())
            }
            ConnectorError::UnknownObjectClass { .. } | ConnectorError::SchemaViolation { .. } => {
                Self::Schema { message }
            }
            ConnectorError::AccessDenied { .. } => Self::Security { message },
            ConnectorError::Misconfigured { .. } => Self::Configuration { message },
            ConnectorError::Internal { .. } => Self::Internal { message },
            ConnectorError::Unreachable { .. }
            | ConnectorError::Timeout { .. }
            | ConnectorError::Rejected { .. } => Self::Communication { message },
        }
    }
}

/// Result type for projector operations.
pub type ProjectorResult<T> = Result<T, ProjectorError>;
