//! Hierarchical operation results.
//!
//! Every projector and executor step records an [`OperationResult`]; children
//! roll up into their parent with [`OperationResult::compute_status`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProjectorError;

/// Outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Warning,
    /// Some parts failed, the rest succeeded.
    PartialError,
    /// An error happened but the intended state was reached anyway.
    HandledError,
    FatalError,
    NotApplicable,
    Unknown,
}

impl OperationStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Warning => "warning",
            OperationStatus::PartialError => "partial_error",
            OperationStatus::HandledError => "handled_error",
            OperationStatus::FatalError => "fatal_error",
            OperationStatus::NotApplicable => "not_applicable",
            OperationStatus::Unknown => "unknown",
        }
    }

    /// Statuses that do not represent a failure.
    #[must_use]
    pub fn is_success_like(&self) -> bool {
        matches!(
            self,
            OperationStatus::Success
                | OperationStatus::Warning
                | OperationStatus::HandledError
                | OperationStatus::NotApplicable
        )
    }

    /// Weight used when rolling children up into a parent.
    fn severity(self) -> u8 {
        match self {
            OperationStatus::Unknown | OperationStatus::NotApplicable => 0,
            OperationStatus::Success | OperationStatus::HandledError => 1,
            OperationStatus::Warning => 2,
            OperationStatus::PartialError => 3,
            OperationStatus::FatalError => 4,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the result tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: String,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subresults: Vec<OperationResult>,
}

impl OperationResult {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: OperationStatus::Unknown,
            message: None,
            error_code: None,
            subresults: Vec::new(),
        }
    }

    pub fn add_subresult(&mut self, subresult: OperationResult) {
        self.subresults.push(subresult);
    }

    pub fn record_success(&mut self) {
        self.status = OperationStatus::Success;
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.status = OperationStatus::Warning;
        self.message = Some(message.into());
    }

    pub fn record_handled_error(&mut self, err: &ProjectorError) {
        self.status = OperationStatus::HandledError;
        self.message = Some(err.to_string());
        self.error_code = Some(err.error_code().to_string());
    }

    pub fn record_partial_error(&mut self, err: &ProjectorError) {
        self.status = OperationStatus::PartialError;
        self.message = Some(err.to_string());
        self.error_code = Some(err.error_code().to_string());
    }

    pub fn record_fatal_error(&mut self, err: &ProjectorError) {
        self.status = OperationStatus::FatalError;
        self.message = Some(err.to_string());
        self.error_code = Some(err.error_code().to_string());
    }

    pub fn record_not_applicable(&mut self, message: impl Into<String>) {
        self.status = OperationStatus::NotApplicable;
        self.message = Some(message.into());
    }

    /// Derive the status from the subresults when not set explicitly.
    ///
    /// The most severe child wins; handled errors count as success. A node
    /// whose children are all not-applicable is not applicable.
    pub fn compute_status(&mut self) {
        for sub in &mut self.subresults {
            sub.compute_status();
        }
        if self.status != OperationStatus::Unknown {
            return;
        }
        let worst = self
            .subresults
            .iter()
            .map(|s| s.status)
            .max_by_key(|s| s.severity());
        self.status = match worst {
            None => OperationStatus::Success,
            Some(OperationStatus::HandledError) => OperationStatus::Success,
            Some(OperationStatus::Unknown) => OperationStatus::Success,
            Some(status) => status,
        };
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.status == OperationStatus::FatalError
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == OperationStatus::PartialError
    }

    /// Depth-first search for subresults with the given operation name.
    pub fn find_all<'a>(&'a self, operation: &str) -> Vec<&'a OperationResult> {
        let mut found = Vec::new();
        self.collect(operation, &mut found);
        found
    }

    fn collect<'a>(&'a self, operation: &str, found: &mut Vec<&'a OperationResult>) {
        if self.operation == operation {
            found.push(self);
        }
        for sub in &self.subresults {
            sub.collect(operation, found);
        }
    }
}
