//! Grader configuration.
//!
//! Configuration is plain data with serde defaults, so a JSON file only needs
//! to name the settings it changes:
//!
//! ```json
//! { "passing_score": 60.0, "limits": { "max_depth": 32 } }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LimitDimension, StructuralLimitExceeded};
use crate::scoring::RubricWeights;

/// Default passing threshold, in percent.
pub const DEFAULT_PASSING_SCORE: f64 = 70.0;

/// Default weight of one extra (unexpected) feature against matched ones.
pub const DEFAULT_EXTRA_PENALTY: f64 = 0.5;

/// Structural bounds on the queries we are willing to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum nesting depth of expressions, subqueries and trees.
    pub max_depth: usize,
    /// Maximum number of items in one list (projections, IN lists, children).
    pub max_width: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_width: 1024,
        }
    }
}

impl Limits {
    /// Fails if `depth` is beyond `max_depth`.
    pub const fn check_depth(&self, depth: usize) -> Result<(), StructuralLimitExceeded> {
        if depth > self.max_depth {
            Err(StructuralLimitExceeded {
                dimension: LimitDimension::Depth,
                limit: self.max_depth,
            })
        } else {
            Ok(())
        }
    }

    /// Fails if `width` is beyond `max_width`.
    pub const fn check_width(&self, width: usize) -> Result<(), StructuralLimitExceeded> {
        if width > self.max_width {
            Err(StructuralLimitExceeded {
                dimension: LimitDimension::Width,
                limit: self.max_width,
            })
        } else {
            Ok(())
        }
    }
}

/// Errors raised while loading a [`GraderConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Settings shared by every evaluation performed by a [`Grader`](crate::Grader).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub limits: Limits,
    /// Penalty subtracted per extra feature in the set matcher.
    pub extra_penalty: f64,
    /// Percentage at or above which a report is marked as passed.
    pub passing_score: f64,
    /// Rubric applied when the caller does not supply weights.
    pub default_rubric: Option<RubricWeights>,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            extra_penalty: DEFAULT_EXTRA_PENALTY,
            passing_score: DEFAULT_PASSING_SCORE,
            default_rubric: None,
        }
    }
}

impl GraderConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.extra_penalty.is_finite() || self.extra_penalty < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "extra_penalty must be a non-negative number, got {}",
                self.extra_penalty
            )));
        }
        if !(0.0..=100.0).contains(&self.passing_score) {
            return Err(ConfigError::Invalid(format!(
                "passing_score must be within 0..=100, got {}",
                self.passing_score
            )));
        }
        if self.limits.max_depth == 0 || self.limits.max_width == 0 {
            return Err(ConfigError::Invalid(String::from(
                "limits must be greater than zero",
            )));
        }
        if let Some(rubric) = &self.default_rubric {
            rubric
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}
