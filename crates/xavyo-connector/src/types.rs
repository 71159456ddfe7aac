//! Connector Framework type definitions
//!
//! Enums shared by connectors and the synchronization engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of object a shadow represents on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowKind {
    /// A user account.
    Account,
    /// A group, role or other privilege-carrying object.
    Entitlement,
    /// Anything else (organizational units, devices, ...).
    Generic,
}

impl ShadowKind {
    /// Get all shadow kinds.
    #[must_use]
    pub fn all() -> &'static [ShadowKind] {
        &[ShadowKind::Account, ShadowKind::Entitlement, ShadowKind::Generic]
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ShadowKind::Account => "account",
            ShadowKind::Entitlement => "entitlement",
            ShadowKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ShadowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShadowKind {
    type Err = ParseShadowKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "account" => Ok(ShadowKind::Account),
            "entitlement" => Ok(ShadowKind::Entitlement),
            "generic" => Ok(ShadowKind::Generic),
            _ => Err(ParseShadowKindError(s.to_string())),
        }
    }
}

/// Error parsing shadow kind from string.
#[derive(Debug, Clone)]
pub struct ParseShadowKindError(String);

impl fmt::Display for ParseShadowKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid shadow kind '{}', expected one of: account, entitlement, generic",
            self.0
        )
    }
}

impl std::error::Error for ParseShadowKindError {}
