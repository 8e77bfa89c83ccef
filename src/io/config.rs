//! YAML configuration for co-location runs.
//!
//! Holds the per-mission path templates used by the candidate finder, optional
//! variable-name overrides and the worker/merge limits. The file is read once at
//! start-up into an immutable [`ColocConfig`] that is passed explicitly.
//!
//! ```yaml
//! paths:
//!   ERA5: ["/data/era5/%Y/%m/era_5-copernicus__%Y%m%d.nc"]
//!   S1:
//!     L2: ["/data/sar/L2/%Y/%j/s1*%Y%m%d*.nc"]
//! variable_names:
//!   ERA5: { wind_speed: u10 }
//! workers: 4
//! max_concurrent_merges: 2
//! merge:
//!   radius_km: 25.0
//! table:
//!   ref: { mission: S1, level: L2, time_margin_seconds: 30 }
//!   match: { mission: HY2, match_filename: true }
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CanonicalVar, Level, Mission};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("No path template configured for mission {mission}{}", .level.map(|l| format!(" level {}", l)).unwrap_or_default())]
    MissingTemplate {
        mission: Mission,
        level: Option<Level>,
    },

    #[error("Invalid minimal area `{value}`: {reason}")]
    InvalidMinimalArea { value: String, reason: String },

    #[error("Invalid configuration value {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Path templates of one mission, optionally split by SAR level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathTemplates {
    Flat(Vec<String>),
    ByLevel(BTreeMap<Level, Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Search radius of the radius-mean resampler, in kilometres.
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

fn default_radius_km() -> f64 {
    25.0
}

fn default_max_concurrent_merges() -> usize {
    2
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            radius_km: default_radius_km(),
        }
    }
}

/// How granules of one side of a pair table are turned into products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSide {
    pub mission: Mission,
    #[serde(default)]
    pub level: Option<Level>,
    /// Seconds added on both ends of the granule's time span when searching.
    #[serde(default)]
    pub time_margin_seconds: i64,
    /// Prefer candidates whose name matches the first template's basename
    /// expanded for the granule's start day.
    #[serde(default)]
    pub match_filename: bool,
}

/// Missions of the two columns of a pair table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    #[serde(rename = "ref")]
    pub reference: TableSide,
    #[serde(rename = "match")]
    pub matched: TableSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColocConfig {
    #[serde(default)]
    pub paths: BTreeMap<Mission, PathTemplates>,
    #[serde(default)]
    pub variable_names: BTreeMap<Mission, BTreeMap<CanonicalVar, String>>,
    /// Worker threads for pair evaluation; `None` uses every available core.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_max_concurrent_merges")]
    pub max_concurrent_merges: usize,
    #[serde(default)]
    pub merge: MergeSettings,
    /// Needed only for pair-table runs.
    #[serde(default)]
    pub table: Option<TableSettings>,
}

impl Default for ColocConfig {
    fn default() -> Self {
        Self {
            paths: BTreeMap::new(),
            variable_names: BTreeMap::new(),
            workers: None,
            max_concurrent_merges: default_max_concurrent_merges(),
            merge: MergeSettings::default(),
            table: None,
        }
    }
}

impl ColocConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ColocConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_concurrent_merges == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_merges",
                reason: "must be greater than 0".into(),
            });
        }
        if !(self.merge.radius_km.is_finite() && self.merge.radius_km > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "merge.radius_km",
                reason: format!("must be a positive number, got {}", self.merge.radius_km),
            });
        }
        if let Some(table) = &self.table {
            for side in [&table.reference, &table.matched] {
                if side.time_margin_seconds < 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "table.time_margin_seconds",
                        reason: format!("must not be negative, got {}", side.time_margin_seconds),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn table_settings(&self) -> Result<&TableSettings, ConfigError> {
        self.table.as_ref().ok_or(ConfigError::InvalidValue {
            field: "table",
            reason: "pair-table runs need the `table` section".into(),
        })
    }

    /// Templates for a mission. For SAR missions without an explicit level every
    /// configured level is searched.
    pub fn templates(
        &self,
        mission: Mission,
        level: Option<Level>,
    ) -> Result<Vec<String>, ConfigError> {
        let missing = || ConfigError::MissingTemplate { mission, level };
        let templates = match self.paths.get(&mission) {
            None => return Err(missing()),
            Some(PathTemplates::Flat(list)) => list.clone(),
            Some(PathTemplates::ByLevel(by_level)) => match level {
                Some(l) => by_level.get(&l).cloned().ok_or_else(missing)?,
                None => by_level.values().flatten().cloned().collect(),
            },
        };
        if templates.is_empty() {
            return Err(missing());
        }
        Ok(templates)
    }

    pub fn variable_overrides(&self, mission: Mission) -> Vec<(CanonicalVar, String)> {
        self.variable_names
            .get(&mission)
            .map(|m| m.iter().map(|(k, v)| (*k, v.clone())).collect())
            .unwrap_or_default()
    }
}
