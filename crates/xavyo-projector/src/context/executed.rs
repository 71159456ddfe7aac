//! Record of executed changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delta::ObjectDelta;
use crate::error::{ProjectorError, ProjectorResult};
use crate::result::OperationStatus;

/// A change that was sent to the repository or a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedDelta {
    pub delta: ObjectDelta,
    /// Canonical fingerprint of `delta`.
    pub fingerprint: String,
    pub status: OperationStatus,
    pub wave: u32,
    pub executed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Oid of the object the change resulted in, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_oid: Option<String>,
}

impl ExecutedDelta {
    /// Record a successful execution.
    pub fn succeeded(delta: ObjectDelta, wave: u32, object_oid: Option<String>) -> ProjectorResult<Self> {
        let fingerprint = delta.fingerprint()?;
        Ok(Self {
            delta,
            fingerprint,
            status: OperationStatus::Success,
            wave,
            executed_at: Utc::now(),
            error_code: None,
            object_oid,
        })
    }

    /// Record a failed execution.
    pub fn failed(delta: ObjectDelta, wave: u32, err: &ProjectorError) -> ProjectorResult<Self> {
        let fingerprint = delta.fingerprint()?;
        let object_oid = delta.oid.clone();
        Ok(Self {
            delta,
            fingerprint,
            status: OperationStatus::FatalError,
            wave,
            executed_at: Utc::now(),
            error_code: Some(err.error_code().to_string()),
            object_oid,
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}
