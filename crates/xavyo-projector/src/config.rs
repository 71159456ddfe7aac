//! Projector configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ProjectorError, ProjectorResult};

/// Configuration shared by the projector, the change executor and the clockwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Maximum number of "restart requested" rounds before giving up.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Suppress removal of values the target does not have.
    #[serde(default = "default_true")]
    pub filter_existing_values: bool,
    /// Compute the projections of one wave concurrently.
    #[serde(default = "default_true")]
    pub concurrent_projections: bool,
    /// Upper bound for the number of waves a context may need.
    #[serde(default = "default_max_waves_limit")]
    pub max_waves_limit: u32,
    /// Compare full shadows against mapping output to catch drift.
    #[serde(default = "default_true")]
    pub reconcile_full_shadows: bool,
}

fn default_max_restarts() -> u32 {
    3
}

fn default_max_waves_limit() -> u32 {
    32
}

fn default_true() -> bool {
    true
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            filter_existing_values: true,
            concurrent_projections: true,
            max_waves_limit: default_max_waves_limit(),
            reconcile_full_shadows: true,
        }
    }
}

impl ProjectorConfig {
    /// Parse a configuration from JSON, applying defaults and validating it.
    pub fn from_json(json: &str) -> ProjectorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ProjectorResult<()> {
        if self.max_waves_limit == 0 {
            return Err(ProjectorError::configuration(
                "max_waves_limit must be at least 1",
            ));
        }
        if self.max_restarts > 100 {
            return Err(ProjectorError::configuration(
                "max_restarts must not exceed 100",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProjectorConfig::default();
        assert_eq!(config.max_restarts, 3);
        assert_eq!(config.max_waves_limit, 32);
        assert!(config.filter_existing_values);
        assert!(config.concurrent_projections);
        assert!(config.reconcile_full_shadows);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ProjectorConfig::from_json(r#"{"max_restarts": 1}"#).unwrap();
        assert_eq!(config.max_restarts, 1);
        assert_eq!(config.max_waves_limit, 32);
    }

    #[test]
    fn test_validation_rejects_zero_waves() {
        let err = ProjectorConfig::from_json(r#"{"max_waves_limit": 0}"#).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_from_json_malformed() {
        let err = ProjectorConfig::from_json("{").unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
