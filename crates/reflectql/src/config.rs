//! Schema builder configuration.
//!
//! Configuration can be embedded in a host application's TOML file.
//!
//! # Example Configuration
//!
//! ```toml
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! subscription_buffer = 16
//! ```

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Builder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Enable introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,

    /// Capacity of the channel between a subscription producer and the
    /// engine's delivery loop.
    /// Default: 16
    #[serde(default = "default_subscription_buffer")]
    pub subscription_buffer: usize,
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection() -> bool {
    true
}

fn default_subscription_buffer() -> usize {
    16
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: default_introspection(),
            subscription_buffer: default_subscription_buffer(),
        }
    }
}

impl BuilderConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidConfig`] if the document does not parse
    /// or fails validation.
    pub fn from_toml_str(source: &str) -> Result<Self, BuildError> {
        let config: Self =
            toml::from_str(source).map_err(|e| BuildError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.max_depth == 0 {
            return Err(BuildError::InvalidConfig("max_depth must be > 0".into()));
        }
        if self.max_complexity == 0 {
            return Err(BuildError::InvalidConfig("max_complexity must be > 0".into()));
        }
        if self.subscription_buffer == 0 {
            return Err(BuildError::InvalidConfig(
                "subscription_buffer must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuilderConfig::default();
        assert_eq!(config.max_depth, 15);
        assert_eq!(config.max_complexity, 500);
        assert!(config.introspection);
        assert_eq!(config.subscription_buffer, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = BuilderConfig::default();
        config.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = BuilderConfig::default();
        config.max_complexity = 0;
        assert!(config.validate().is_err());

        let mut config = BuilderConfig::default();
        config.subscription_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let config = BuilderConfig::from_toml_str(
            r#"
            max_depth = 20
            introspection = false
            subscription_buffer = 1
        "#,
        )
        .unwrap();
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.max_complexity, 500);
        assert!(!config.introspection);
        assert_eq!(config.subscription_buffer, 1);
    }

    #[test]
    fn test_toml_rejects_zero() {
        let err = BuilderConfig::from_toml_str("max_depth = 0").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
