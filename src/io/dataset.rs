//! In-memory gridded content of a product.
//!
//! Variables are stored as `(time, row, col)` cubes under their mission-specific
//! names; `NaN` marks missing data. A [`Frame`] is a single time step.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

/// Dataset-level attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Number(v) => write!(f, "{}", v),
            AttrValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Coordinates of a 2-D grid.
#[derive(Debug, Clone, PartialEq)]
pub enum Geolocation {
    /// Separable axes: `lat` indexes rows, `lon` indexes columns.
    Regular { lon: Array1<f64>, lat: Array1<f64> },
    /// Per-pixel coordinates, both shaped `(rows, cols)`.
    Irregular { lon: Array2<f64>, lat: Array2<f64> },
}

impl Geolocation {
    pub fn is_regular(&self) -> bool {
        matches!(self, Geolocation::Regular { .. })
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Geolocation::Regular { lon, lat } => (lat.len(), lon.len()),
            Geolocation::Irregular { lon, .. } => lon.dim(),
        }
    }

    /// `(lon, lat)` of a cell centre.
    pub fn point(&self, row: usize, col: usize) -> (f64, f64) {
        match self {
            Geolocation::Regular { lon, lat } => (lon[col], lat[row]),
            Geolocation::Irregular { lon, lat } => (lon[[row, col]], lat[[row, col]]),
        }
    }

    pub fn lon_grid(&self) -> Array2<f64> {
        let (rows, cols) = self.shape();
        Array2::from_shape_fn((rows, cols), |(r, c)| self.point(r, c).0)
    }

    pub fn lat_grid(&self) -> Array2<f64> {
        let (rows, cols) = self.shape();
        Array2::from_shape_fn((rows, cols), |(r, c)| self.point(r, c).1)
    }

    /// Every finite `(lon, lat)` point of the grid.
    pub fn valid_points(&self) -> Vec<(f64, f64)> {
        let (rows, cols) = self.shape();
        let mut out = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let (x, y) = self.point(r, c);
                if x.is_finite() && y.is_finite() {
                    out.push((x, y));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub geolocation: Geolocation,
    /// Nominal timestamp of each step along axis 0; empty for single-step data.
    pub time_axis: Vec<DateTime<Utc>>,
    pub variables: BTreeMap<String, Array3<f64>>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Dataset {
    pub fn n_steps(&self) -> usize {
        self.variables
            .values()
            .next()
            .map(|v| v.len_of(Axis(0)))
            .unwrap_or(0)
    }

    /// Index of the time step nearest `t`; step 0 when the dataset has no time axis.
    pub fn nearest_step(&self, t: DateTime<Utc>) -> usize {
        self.time_axis
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (**s - t).num_milliseconds().unsigned_abs())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Reduce the dataset to the time step nearest `t`.
    pub fn nearest_frame(&self, t: DateTime<Utc>) -> Frame {
        let step = self.nearest_step(t);
        let variables = self
            .variables
            .iter()
            .map(|(name, cube)| {
                let idx = step.min(cube.len_of(Axis(0)).saturating_sub(1));
                (name.clone(), cube.index_axis(Axis(0), idx).to_owned())
            })
            .collect();
        Frame {
            geolocation: self.geolocation.clone(),
            time: self.time_axis.get(step).copied(),
            variables,
            attributes: self.attributes.clone(),
        }
    }
}

/// One time step of a [`Dataset`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub geolocation: Geolocation,
    pub time: Option<DateTime<Utc>>,
    pub variables: BTreeMap<String, Array2<f64>>,
    pub attributes: BTreeMap<String, AttrValue>,
}
