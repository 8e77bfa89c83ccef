//! Normalized product metadata shared by every mission.
//!
//! `ProductMetadata` is built once by an adapter and never mutated afterwards;
//! every engine decision reads from it.
use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use geo::MultiPolygon;

use crate::io::adapter::AdapterError;
use crate::types::{AcquisitionType, CanonicalVar, Level, Mission};

/// Canonical variable name -> mission-specific variable name.
pub type VariableNameMap = BTreeMap<CanonicalVar, String>;

/// Closed UTC interval `[start, stop]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        if start <= stop {
            Self { start, stop }
        } else {
            Self {
                start: stop,
                stop: start,
            }
        }
    }

    /// Window grown by `delta` on both ends.
    pub fn widen(&self, delta: Duration) -> Self {
        Self {
            start: self.start - delta,
            stop: self.stop + delta,
        }
    }

    /// Inclusive interval intersection test.
    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start <= other.stop && other.start <= self.stop
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.stop
    }

    pub fn mid(&self) -> DateTime<Utc> {
        self.start + (self.stop - self.start) / 2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductMetadata {
    mission: Mission,
    level: Option<Level>,
    acquisition_type: AcquisitionType,
    start_time: DateTime<Utc>,
    stop_time: DateTime<Utc>,
    footprint: MultiPolygon<f64>,
    variable_name_map: VariableNameMap,
    source_ref: String,
}

impl ProductMetadata {
    /// Build metadata, checking the time span and footprint.
    ///
    /// `level` is only meaningful for SAR missions and is dropped for the others.
    pub fn new(
        mission: Mission,
        level: Option<Level>,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
        footprint: impl Into<MultiPolygon<f64>>,
        source_ref: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let source_ref = source_ref.into();
        if start_time > stop_time {
            return Err(AdapterError::InvalidTimeSpan {
                source_ref,
                start: start_time,
                stop: stop_time,
            });
        }
        let footprint = footprint.into();
        if footprint.0.is_empty() || footprint.0.iter().all(|p| p.exterior().0.is_empty()) {
            return Err(AdapterError::EmptyFootprint { source_ref });
        }
        Ok(Self {
            mission,
            level: if mission.is_sar() { level } else { None },
            acquisition_type: mission.acquisition_type(),
            start_time,
            stop_time,
            footprint,
            variable_name_map: crate::io::missions::default_variable_map(mission),
            source_ref,
        })
    }

    /// Replace the footprint, e.g. with one computed upstream.
    pub fn with_footprint(
        mut self,
        footprint: impl Into<MultiPolygon<f64>>,
    ) -> Result<Self, AdapterError> {
        let footprint = footprint.into();
        if footprint.0.is_empty() || footprint.0.iter().all(|p| p.exterior().0.is_empty()) {
            return Err(AdapterError::EmptyFootprint {
                source_ref: self.source_ref,
            });
        }
        self.footprint = footprint;
        Ok(self)
    }

    /// Replace entries of the mission's default variable map.
    pub fn with_variable_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (CanonicalVar, String)>,
    {
        self.variable_name_map.extend(overrides);
        self
    }

    pub fn mission(&self) -> Mission {
        self.mission
    }

    pub fn level(&self) -> Option<Level> {
        self.level
    }

    pub fn acquisition_type(&self) -> AcquisitionType {
        self.acquisition_type
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn stop_time(&self) -> DateTime<Utc> {
        self.stop_time
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            stop: self.stop_time,
        }
    }

    pub fn footprint(&self) -> &MultiPolygon<f64> {
        &self.footprint
    }

    pub fn variable_name_map(&self) -> &VariableNameMap {
        &self.variable_name_map
    }

    pub fn variable_name(&self, var: CanonicalVar) -> Option<&str> {
        self.variable_name_map.get(&var).map(String::as_str)
    }

    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn is_l1(&self) -> bool {
        self.level == Some(Level::L1)
    }

    /// Basename of the source reference.
    pub fn basename(&self) -> &str {
        Path::new(&self.source_ref)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source_ref)
    }

    /// Product name used in merged filenames: basename up to the first `.`.
    pub fn product_name(&self) -> &str {
        let base = self.basename();
        base.split('.').next().unwrap_or(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo::polygon;

    fn square() -> geo::Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)]
    }

    #[test]
    fn rejects_start_after_stop() {
        let start = Utc.with_ymd_and_hms(2018, 10, 9, 15, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2018, 10, 9, 14, 0, 0).unwrap();
        let err = ProductMetadata::new(Mission::S1, Some(Level::L2), start, stop, square(), "a.nc");
        assert!(matches!(err, Err(AdapterError::InvalidTimeSpan { .. })));
    }

    #[test]
    fn equal_start_and_stop_is_allowed() {
        let t = Utc.with_ymd_and_hms(2018, 10, 9, 0, 0, 0).unwrap();
        let meta = ProductMetadata::new(Mission::Era5, None, t, t, square(), "x.nc").unwrap();
        assert_eq!(meta.acquisition_type(), AcquisitionType::ModelRegularGrid);
    }

    #[test]
    fn level_is_dropped_for_non_sar() {
        let t = Utc.with_ymd_and_hms(2018, 10, 9, 0, 0, 0).unwrap();
        let meta = ProductMetadata::new(Mission::Smos, Some(Level::L1), t, t, square(), "x.nc").unwrap();
        assert_eq!(meta.level(), None);
        assert!(!meta.is_l1());
    }

    #[test]
    fn product_name_stops_at_first_dot() {
        let t = Utc.with_ymd_and_hms(2018, 10, 9, 0, 0, 0).unwrap();
        let meta = ProductMetadata::new(
            Mission::Era5,
            None,
            t,
            t,
            square(),
            "/data/era5/era_5-copernicus__20181009.nc",
        )
        .unwrap();
        assert_eq!(meta.basename(), "era_5-copernicus__20181009.nc");
        assert_eq!(meta.product_name(), "era_5-copernicus__20181009");
    }

    #[test]
    fn widened_window_is_inclusive_at_the_edges() {
        let a = TimeWindow::new(
            Utc.with_ymd_and_hms(2018, 10, 9, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2018, 10, 9, 14, 10, 0).unwrap(),
        );
        let b = TimeWindow::new(
            Utc.with_ymd_and_hms(2018, 10, 9, 15, 10, 0).unwrap(),
            Utc.with_ymd_and_hms(2018, 10, 9, 15, 20, 0).unwrap(),
        );
        assert!(!a.intersects(&b));
        assert!(a.widen(Duration::minutes(60)).intersects(&b));
        assert!(!a.widen(Duration::minutes(59)).intersects(&b));
    }
}
