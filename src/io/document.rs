//! JSON product documents and the adapter that reads them.
//!
//! A product document is the decoded form of one product: optional mission,
//! level and times, a footprint (WKT), geolocation, variables and attributes.
//! It is read from `<source_ref>.json` when that sidecar exists, otherwise from
//! `source_ref` itself.
//!
//! Missing fields are derived the way each mission encodes them: times from
//! the product name, from minutes of day folded onto the day marker, or from
//! the time variable; the footprint from the convex hull of the valid
//! geolocation points.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use ndarray::{Array1, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::geometry::{convex_hull_footprint, parse_wkt};
use crate::io::adapter::{AdapterError, DatasetProvider, MetadataAdapter};
use crate::io::config::ColocConfig;
use crate::io::conversions::{epoch_seconds_to_utc, fold_minutes_of_day, utc_to_epoch_seconds};
use crate::io::dataset::{AttrValue, Dataset, Geolocation};
use crate::io::metadata::{ProductMetadata, TimeWindow, VariableNameMap};
use crate::io::missions::{
    day_marker, default_variable_map, detect_mission, filename_time_span, minute_variable,
    sar_level_from_name,
};
use crate::types::{CanonicalVar, Level, Mission};

pub type GridDoc = Vec<Vec<Option<f64>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeolocationDoc {
    Regular { lon: Vec<f64>, lat: Vec<f64> },
    Irregular { lon: GridDoc, lat: GridDoc },
}

/// A variable as `(rows, cols)` or `(time, rows, cols)` nested arrays; `null` is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableDoc {
    Grid(GridDoc),
    Series(Vec<GridDoc>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<Mission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,
    /// `POLYGON` / `MULTIPOLYGON` WKT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeolocationDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_axis: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDoc>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl ProductDocument {
    pub fn load(path: &Path) -> Result<Self, AdapterError> {
        let content = fs::read_to_string(path).map_err(|source| AdapterError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| AdapterError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AdapterError> {
        let io_err = |source| AdapterError::Io {
            path: path.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| AdapterError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, json).map_err(io_err)
    }
}

/// Location of the document describing the product at `path`.
pub fn document_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "json") {
        return path.to_path_buf();
    }
    let mut sidecar = path.as_os_str().to_owned();
    sidecar.push(".json");
    let sidecar = PathBuf::from(sidecar);
    if sidecar.exists() {
        sidecar
    } else {
        path.to_path_buf()
    }
}

fn grid_to_array(grid: &GridDoc, shape: Option<(usize, usize)>) -> Result<Array2<f64>, String> {
    let rows = grid.len();
    let cols = grid.first().map(Vec::len).unwrap_or(0);
    if let Some(expected) = shape {
        if (rows, cols) != expected {
            return Err(format!(
                "shape ({}, {}) doesn't match geolocation ({}, {})",
                rows, cols, expected.0, expected.1
            ));
        }
    }
    if grid.iter().any(|r| r.len() != cols) {
        return Err("ragged rows".into());
    }
    Ok(Array2::from_shape_fn((rows, cols), |(r, c)| {
        grid[r][c].unwrap_or(f64::NAN)
    }))
}

fn array_to_grid(a: &Array2<f64>) -> GridDoc {
    a.rows()
        .into_iter()
        .map(|row| row.iter().map(|&v| v.is_finite().then_some(v)).collect())
        .collect()
}

impl TryFrom<&GeolocationDoc> for Geolocation {
    type Error = String;

    fn try_from(doc: &GeolocationDoc) -> Result<Self, Self::Error> {
        match doc {
            GeolocationDoc::Regular { lon, lat } => Ok(Geolocation::Regular {
                lon: Array1::from(lon.clone()),
                lat: Array1::from(lat.clone()),
            }),
            GeolocationDoc::Irregular { lon, lat } => {
                let lon = grid_to_array(lon, None)?;
                let lat = grid_to_array(lat, Some(lon.dim()))?;
                Ok(Geolocation::Irregular { lon, lat })
            }
        }
    }
}

impl From<&Geolocation> for GeolocationDoc {
    fn from(g: &Geolocation) -> Self {
        match g {
            Geolocation::Regular { lon, lat } => GeolocationDoc::Regular {
                lon: lon.to_vec(),
                lat: lat.to_vec(),
            },
            Geolocation::Irregular { lon, lat } => GeolocationDoc::Irregular {
                lon: array_to_grid(lon),
                lat: array_to_grid(lat),
            },
        }
    }
}

impl From<&Array2<f64>> for VariableDoc {
    fn from(a: &Array2<f64>) -> Self {
        VariableDoc::Grid(array_to_grid(a))
    }
}

impl VariableDoc {
    fn to_cube(&self, shape: (usize, usize)) -> Result<Array3<f64>, String> {
        match self {
            VariableDoc::Grid(g) => Ok(grid_to_array(g, Some(shape))?.insert_axis(Axis(0))),
            VariableDoc::Series(steps) => {
                let mut cube = Array3::from_elem((steps.len(), shape.0, shape.1), f64::NAN);
                for (i, g) in steps.iter().enumerate() {
                    cube.index_axis_mut(Axis(0), i)
                        .assign(&grid_to_array(g, Some(shape))?);
                }
                Ok(cube)
            }
        }
    }

    fn finite_range(&self) -> Option<(f64, f64)> {
        let values: Box<dyn Iterator<Item = &Option<f64>>> = match self {
            VariableDoc::Grid(g) => Box::new(g.iter().flatten()),
            VariableDoc::Series(s) => Box::new(s.iter().flatten().flatten()),
        };
        values
            .filter_map(|v| v.filter(|x| x.is_finite()))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Reads product documents; implements both adapter seams.
///
/// Relative source references are resolved against the product root when one
/// is set, so listings can carry bare product names.
#[derive(Debug, Clone, Default)]
pub struct DocumentAdapter {
    overrides: BTreeMap<Mission, Vec<(CanonicalVar, String)>>,
    root: Option<PathBuf>,
}

impl DocumentAdapter {
    pub fn new(config: &ColocConfig) -> Self {
        let overrides = Mission::ALL
            .iter()
            .map(|m| (*m, config.variable_overrides(*m)))
            .filter(|(_, o)| !o.is_empty())
            .collect();
        Self {
            overrides,
            root: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, source_ref: &str) -> PathBuf {
        let path = Path::new(source_ref);
        let path = match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };
        document_path(&path)
    }

    fn variable_map(&self, mission: Mission) -> VariableNameMap {
        let mut map = default_variable_map(mission);
        if let Some(o) = self.overrides.get(&mission) {
            map.extend(o.iter().cloned());
        }
        map
    }

    fn time_span(
        &self,
        doc: &ProductDocument,
        mission: Mission,
        basename: &str,
        source_ref: &str,
    ) -> Result<TimeWindow, AdapterError> {
        if let (Some(start), Some(stop)) = (doc.start_time, doc.stop_time) {
            return Ok(TimeWindow { start, stop });
        }
        if let Some(window) = filename_time_span(mission, basename)? {
            return Ok(window);
        }
        if let Some(minute_name) = minute_variable(mission) {
            let day = day_marker(mission, basename).ok_or_else(|| AdapterError::FilenameTime {
                name: basename.to_string(),
                message: "no day marker in product name".into(),
            })?;
            return Ok(minutes_span(day, doc.variables.get(minute_name)));
        }
        let map = self.variable_map(mission);
        let time_name = map
            .get(&CanonicalVar::Time)
            .map(String::as_str)
            .unwrap_or("time");
        let from_var = doc
            .variables
            .get(time_name)
            .and_then(VariableDoc::finite_range)
            .and_then(|(lo, hi)| Some((epoch_seconds_to_utc(lo)?, epoch_seconds_to_utc(hi)?)));
        let from_axis = doc
            .time_axis
            .iter()
            .min()
            .zip(doc.time_axis.iter().max())
            .map(|(a, b)| (*a, *b));
        match from_var.or(from_axis) {
            Some((start, stop)) => Ok(TimeWindow::new(start, stop)),
            None => Err(AdapterError::MissingVariable {
                source_ref: source_ref.to_string(),
                variable: time_name.to_string(),
            }),
        }
    }
}

/// Span of the valid minutes of day, or the whole day when none are recorded.
fn minutes_span(day: NaiveDate, minutes: Option<&VariableDoc>) -> TimeWindow {
    let whole_day = || {
        let start = Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN));
        TimeWindow::new(start, start + Duration::days(1) - Duration::seconds(1))
    };
    minutes
        .and_then(VariableDoc::finite_range)
        .and_then(|(lo, hi)| {
            Some(TimeWindow::new(
                fold_minutes_of_day(day, lo)?,
                fold_minutes_of_day(day, hi)?,
            ))
        })
        .unwrap_or_else(whole_day)
}

fn basename_of(source_ref: &str) -> &str {
    Path::new(source_ref)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source_ref)
}

impl MetadataAdapter for DocumentAdapter {
    fn metadata(&self, source_ref: &str) -> Result<ProductMetadata, AdapterError> {
        let doc = ProductDocument::load(&self.resolve(source_ref))?;
        let basename = basename_of(source_ref);
        let mission = doc
            .mission
            .or_else(|| detect_mission(basename))
            .ok_or_else(|| AdapterError::UnknownMission {
                name: basename.to_string(),
            })?;
        let level = mission
            .is_sar()
            .then(|| doc.level.unwrap_or_else(|| sar_level_from_name(basename)));
        let window = self.time_span(&doc, mission, basename, source_ref)?;

        let footprint = match &doc.footprint {
            Some(text) => parse_wkt(text).map_err(|message| AdapterError::InvalidFootprint {
                source_ref: source_ref.to_string(),
                message,
            })?,
            None => {
                let points = doc
                    .geolocation
                    .as_ref()
                    .and_then(|g| Geolocation::try_from(g).ok())
                    .map(|g| g.valid_points())
                    .unwrap_or_default();
                let hull = convex_hull_footprint(&points).ok_or_else(|| {
                    AdapterError::EmptyFootprint {
                        source_ref: source_ref.to_string(),
                    }
                })?;
                debug!("Footprint of {} from convex hull of {} points", basename, points.len());
                hull.into()
            }
        };

        let overrides = self.overrides.get(&mission).cloned().unwrap_or_default();
        Ok(ProductMetadata::new(
            mission,
            level,
            window.start,
            window.stop,
            footprint,
            source_ref,
        )?
        .with_variable_overrides(overrides))
    }
}

impl DatasetProvider for DocumentAdapter {
    fn dataset(&self, meta: &ProductMetadata) -> Result<Dataset, AdapterError> {
        let source_ref = meta.source_ref();
        let doc = ProductDocument::load(&self.resolve(source_ref))?;
        let inconsistent = |message: String| AdapterError::InconsistentDataset {
            source_ref: source_ref.to_string(),
            message,
        };
        let geolocation = doc
            .geolocation
            .as_ref()
            .ok_or_else(|| AdapterError::MissingVariable {
                source_ref: source_ref.to_string(),
                variable: "geolocation".into(),
            })
            .and_then(|g| Geolocation::try_from(g).map_err(inconsistent))?;
        let shape = geolocation.shape();

        let mut variables = BTreeMap::new();
        for (name, var) in &doc.variables {
            let cube = var
                .to_cube(shape)
                .map_err(|m| inconsistent(format!("variable `{}`: {}", name, m)))?;
            variables.insert(name.clone(), cube);
        }
        let steps = variables.values().map(|c| c.len_of(Axis(0))).max().unwrap_or(1);
        if variables.values().any(|c| c.len_of(Axis(0)) != steps) {
            return Err(inconsistent("variables have different numbers of time steps".into()));
        }
        if steps > 1 && doc.time_axis.len() != steps {
            return Err(inconsistent(format!(
                "{} time steps but a time axis of {}",
                steps,
                doc.time_axis.len()
            )));
        }

        // Minutes of day become absolute times under the mission's time variable.
        if let (Some(minute_name), Some(day)) = (
            minute_variable(meta.mission()),
            day_marker(meta.mission(), meta.basename()),
        ) {
            if let (Some(minutes), Some(time_name)) = (
                variables.get(minute_name),
                meta.variable_name(CanonicalVar::Time),
            ) {
                let times = minutes.mapv(|m| {
                    fold_minutes_of_day(day, m)
                        .map(utc_to_epoch_seconds)
                        .unwrap_or(f64::NAN)
                });
                variables.insert(time_name.to_string(), times);
            }
        }

        Ok(Dataset {
            geolocation,
            time_axis: doc.time_axis,
            variables,
            attributes: doc.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_doc(dir: &Path, name: &str, doc: &ProductDocument) -> String {
        let path = dir.join(name);
        doc.save(&path).unwrap();
        path.display().to_string()
    }

    #[test]
    fn sar_metadata_from_name_and_wkt() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ProductDocument {
            footprint: Some("POLYGON((0 0,1 0,1 1,0 1,0 0))".into()),
            ..Default::default()
        };
        let src = write_doc(
            dir.path(),
            "s1a-ew-owi-cm-20181009t142906-20181009t143110-000003-02A122_ll_gd.nc",
            &doc,
        );
        let meta = DocumentAdapter::default().metadata(&src).unwrap();
        assert_eq!(meta.mission(), Mission::S1);
        assert_eq!(meta.level(), Some(Level::L2));
        assert_eq!(
            meta.start_time(),
            Utc.with_ymd_and_hms(2018, 10, 9, 14, 29, 6).unwrap()
        );
    }

    #[test]
    fn windsat_times_are_folded_from_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ProductDocument {
            geolocation: Some(GeolocationDoc::Regular {
                lon: vec![0.0, 1.0],
                lat: vec![0.0, 1.0],
            }),
            variables: BTreeMap::from([(
                "mingmt".to_string(),
                VariableDoc::Grid(vec![vec![Some(600.0), None], vec![Some(630.0), Some(615.0)]]),
            )]),
            ..Default::default()
        };
        let src = write_doc(dir.path(), "wsat_20181009v7.0.1.gz", &doc);
        let adapter = DocumentAdapter::default();
        let meta = adapter.metadata(&src).unwrap();
        assert_eq!(meta.start_time(), Utc.with_ymd_and_hms(2018, 10, 9, 10, 0, 0).unwrap());
        assert_eq!(meta.stop_time(), Utc.with_ymd_and_hms(2018, 10, 9, 10, 30, 0).unwrap());

        let ds = adapter.dataset(&meta).unwrap();
        let t = ds.variables["time"][[0, 1, 0]];
        assert_eq!(epoch_seconds_to_utc(t), Some(Utc.with_ymd_and_hms(2018, 10, 9, 10, 30, 0).unwrap()));
        assert!(ds.variables["time"][[0, 0, 1]].is_nan());
    }

    #[test]
    fn footprint_falls_back_to_convex_hull() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ProductDocument {
            start_time: Some(Utc.with_ymd_and_hms(2018, 10, 9, 0, 0, 0).unwrap()),
            stop_time: Some(Utc.with_ymd_and_hms(2018, 10, 9, 1, 0, 0).unwrap()),
            geolocation: Some(GeolocationDoc::Irregular {
                lon: vec![vec![Some(0.0), Some(2.0)], vec![Some(0.0), None]],
                lat: vec![vec![Some(0.0), Some(0.0)], vec![Some(2.0), Some(2.0)]],
            }),
            ..Default::default()
        };
        let src = write_doc(dir.path(), "ascat_b_20181009.nc", &doc);
        let meta = DocumentAdapter::default().metadata(&src).unwrap();
        use geo::Area;
        assert!((meta.footprint().unsigned_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_mission_is_an_adapter_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_doc(dir.path(), "landsat.json", &ProductDocument::default());
        assert!(matches!(
            DocumentAdapter::default().metadata(&src),
            Err(AdapterError::UnknownMission { .. })
        ));
    }

    #[test]
    fn sidecar_document_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let product = dir.path().join("era_5-copernicus__20181009.nc");
        let sidecar = dir.path().join("era_5-copernicus__20181009.nc.json");
        fs::write(&sidecar, "{}").unwrap();
        assert_eq!(document_path(&product), sidecar);
    }

    #[test]
    fn relative_refs_resolve_against_root() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ProductDocument {
            footprint: Some("POLYGON((0 0,1 0,1 1,0 1,0 0))".into()),
            ..Default::default()
        };
        write_doc(dir.path(), "era_5-copernicus__20181009.nc", &doc);
        let meta = DocumentAdapter::default()
            .with_root(dir.path())
            .metadata("era_5-copernicus__20181009.nc")
            .unwrap();
        assert_eq!(meta.source_ref(), "era_5-copernicus__20181009.nc");
        assert_eq!(meta.mission(), Mission::Era5);
    }

    #[test]
    fn ragged_variable_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ProductDocument {
            footprint: Some("POLYGON((0 0,1 0,1 1,0 1,0 0))".into()),
            geolocation: Some(GeolocationDoc::Regular {
                lon: vec![0.0, 1.0],
                lat: vec![0.0, 1.0],
            }),
            variables: BTreeMap::from([(
                "u10".to_string(),
                VariableDoc::Grid(vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0)]]),
            )]),
            ..Default::default()
        };
        let src = write_doc(dir.path(), "era_5-copernicus__20181009.nc", &doc);
        let adapter = DocumentAdapter::default();
        let meta = adapter.metadata(&src).unwrap();
        assert!(matches!(
            adapter.dataset(&meta),
            Err(AdapterError::InconsistentDataset { .. })
        ));
    }
}
