use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::io::ConfigError;
use crate::types::Level;

/// Minimal intersection area, stored in km².
///
/// Parsed from `"1600km2"`, `"1600000000m2"` or a bare number of km².
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinimalArea {
    km2: f64,
}

impl MinimalArea {
    pub fn from_km2(km2: f64) -> Result<Self, ConfigError> {
        if !km2.is_finite() || km2 < 0.0 {
            return Err(ConfigError::InvalidMinimalArea {
                value: km2.to_string(),
                reason: "must be a finite, non-negative area".into(),
            });
        }
        Ok(Self { km2 })
    }

    pub fn km2(&self) -> f64 {
        self.km2
    }
}

impl Default for MinimalArea {
    fn default() -> Self {
        Self { km2: 1600.0 }
    }
}

impl std::str::FromStr for MinimalArea {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidMinimalArea {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let lowered = s.trim().to_lowercase();
        let (number, per_km2) = if let Some(n) = lowered.strip_suffix("km2") {
            (n, 1.0)
        } else if let Some(n) = lowered.strip_suffix("m2") {
            (n, 1e6)
        } else {
            (lowered.as_str(), 1.0)
        };
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number followed by `km2` or `m2`"))?;
        Self::from_km2(value / per_km2).map_err(|_| invalid("must be a finite, non-negative area"))
    }
}

impl TryFrom<String> for MinimalArea {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MinimalArea> for String {
    fn from(a: MinimalArea) -> Self {
        a.to_string()
    }
}

impl std::fmt::Display for MinimalArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}km2", self.km2)
    }
}

/// Thresholds applied to every evaluated pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColocationCriteria {
    pub delta_time: Duration,
    pub minimal_area: MinimalArea,
}

impl ColocationCriteria {
    pub fn new(delta_minutes: i64, minimal_area: MinimalArea) -> Self {
        Self {
            delta_time: Duration::minutes(delta_minutes),
            minimal_area,
        }
    }
}

impl Default for ColocationCriteria {
    fn default() -> Self {
        Self::new(60, MinimalArea::default())
    }
}

/// Run-level parameters suitable for config files and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    /// Temporal tolerance in minutes.
    pub delta_time: i64,
    pub minimal_area: MinimalArea,
    pub want_listing: bool,
    pub want_merge: bool,
    /// SAR processing level of mission candidates.
    pub level: Option<Level>,
    /// Explicit candidate subset, overriding filesystem discovery.
    pub input_ds: Option<Vec<String>>,
    pub destination_folder: PathBuf,
    pub listing_filename: Option<String>,
    pub colocation_filename: Option<String>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            delta_time: 60,
            minimal_area: MinimalArea::default(),
            want_listing: false,
            want_merge: true,
            level: None,
            input_ds: None,
            destination_folder: PathBuf::from("/tmp"),
            listing_filename: None,
            colocation_filename: None,
        }
    }
}

impl RunParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delta_time < 0 {
            return Err(ConfigError::InvalidValue {
                field: "delta_time",
                reason: format!("must be non-negative, got {}", self.delta_time),
            });
        }
        Ok(())
    }

    pub fn criteria(&self) -> ColocationCriteria {
        ColocationCriteria::new(self.delta_time, self.minimal_area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_km2_m2_and_bare_numbers() {
        assert_eq!("1600km2".parse::<MinimalArea>().unwrap().km2(), 1600.0);
        assert_eq!("1600 KM2".parse::<MinimalArea>().unwrap().km2(), 1600.0);
        assert_eq!("1600000000m2".parse::<MinimalArea>().unwrap().km2(), 1600.0);
        assert_eq!("250.5".parse::<MinimalArea>().unwrap().km2(), 250.5);
    }

    #[test]
    fn rejects_malformed_minimal_area() {
        assert!("big".parse::<MinimalArea>().is_err());
        assert!("-3km2".parse::<MinimalArea>().is_err());
        assert!("km2".parse::<MinimalArea>().is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let p = RunParams::default();
        assert_eq!(p.delta_time, 60);
        assert_eq!(p.minimal_area.km2(), 1600.0);
        assert!(!p.want_listing);
        assert!(p.want_merge);
        assert_eq!(p.destination_folder, PathBuf::from("/tmp"));
    }

    #[test]
    fn run_params_deserialize_with_defaults() {
        let p: RunParams =
            serde_json::from_str(r#"{"delta_time": 30, "minimal_area": "500km2"}"#).unwrap();
        assert_eq!(p.delta_time, 30);
        assert_eq!(p.minimal_area.km2(), 500.0);
        assert!(p.want_merge);
    }

    #[test]
    fn negative_delta_is_invalid() {
        let p = RunParams {
            delta_time: -1,
            ..RunParams::default()
        };
        assert!(p.validate().is_err());
    }
}
