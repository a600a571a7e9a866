//! Model Configuration
//!
//! A [`ModelConfig`] only affects diagnostics. Evaluation and propagation
//! semantics are the same for every configuration.
//!
//! Configs are plain serde structs, so they can be embedded in a larger
//! application config or parsed from JSON directly:
//!
//! ```rust,ignore
//! let config = ModelConfig::from_json(r#"{ "label": "form", "trace_edges": true }"#)?;
//! let model: Model<i64> = Model::with_config(config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Diagnostic settings for a [`Model`](crate::Model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Name attached to every log event emitted by the model.
    pub label: String,

    /// Log every newly recorded dependency edge at trace level.
    pub trace_edges: bool,

    /// Active-stack depth above which a warning is logged.
    ///
    /// Deep nesting usually means a long dependency chain or a cycle that
    /// is only kept finite by equal-value suppression.
    pub nesting_warn_depth: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            label: "model".to_string(),
            trace_edges: false,
            nesting_warn_depth: 64,
        }
    }
}

impl ModelConfig {
    /// Parse a config from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.nesting_warn_depth == 0 {
            return Err(ConfigError::Invalid(
                "nesting_warn_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
