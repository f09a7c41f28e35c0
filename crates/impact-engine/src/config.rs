//! Pipeline and tick configuration.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take the defaults below.
//!
//! ```
//! use impact_engine::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{ "damage": 25.0 }"#).unwrap();
//! assert_eq!(config.damage, 25.0);
//! assert_eq!(config.proximity_threshold, 0.5);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::oracle::CollisionFilter;
use crate::EngineError;

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Tunables of the damage pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// A hit only counts when closer than this to the projectile.
    pub proximity_threshold: f32,
    /// Health removed per counted hit.
    pub damage: f32,
    /// Filter passed to every cast.
    pub collision_filter: CollisionFilter,
    /// Entities per worker batch.
    pub batch_size: usize,
    /// Populations smaller than this are processed on the calling thread.
    pub parallel_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: 0.5,
            damage: 10.0,
            collision_filter: CollisionFilter::ALL,
            batch_size: 64,
            parallel_threshold: 256,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::from_json_str(&read_config(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.proximity_threshold.is_finite() && self.proximity_threshold > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "proximity_threshold must be positive and finite, got {}",
                self.proximity_threshold
            )));
        }
        if !(self.damage.is_finite() && self.damage >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "damage must be non-negative and finite, got {}",
                self.damage
            )));
        }
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "batch_size must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    pub pipeline: PipelineConfig,
}

impl Default for TickConfig {
    /// 60 Hz, default pipeline.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl TickConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::from_json_str(&read_config(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        self.pipeline.validate()
    }
}

fn read_config(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })
}
