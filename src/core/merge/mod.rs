//! Merging of two co-located products into one dataset on a common grid.
//!
//! Both products are reduced to the time step nearest the other's mid-time,
//! renamed to canonical variable names, aligned on a common grid (see [`grid`]),
//! masked to the overlap and to co-valid points, then suffixed `_1` / `_2`.
//! Summary statistics of every variable present on both sides are attached as
//! dataset attributes.
pub mod grid;
pub mod resample;
pub mod stats;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, SecondsFormat};
use geo::MultiPolygon;
use ndarray::{Array2, Zip};
use tracing::debug;

use crate::core::geometry::to_wkt;
use crate::io::conversions::utc_to_epoch_seconds;
use crate::io::dataset::{AttrValue, Dataset, Frame, Geolocation};
use crate::io::metadata::ProductMetadata;
use crate::types::{AcquisitionType, CanonicalVar};

use grid::{Fields, Layer, align};
pub use stats::VariableStats;

/// Combined dataset of a co-located pair.
#[derive(Debug, Clone)]
pub struct MergedDataset {
    /// Product names (basename up to the first `.`) of sides `_1` and `_2`.
    pub product_names: [String; 2],
    pub geolocation: Geolocation,
    pub variables: BTreeMap<String, Array2<f64>>,
    pub attributes: BTreeMap<String, AttrValue>,
    pub statistics: Vec<VariableStats>,
}

impl MergedDataset {
    /// `sat_coloc_<name_1>__<name_2>.nc`
    pub fn default_filename(&self) -> String {
        format!(
            "sat_coloc_{}__{}.nc",
            self.product_names[0], self.product_names[1]
        )
    }

    pub fn statistics_for(&self, variable: &str) -> Option<&VariableStats> {
        self.statistics.iter().find(|s| s.variable == variable)
    }
}

/// True when `b` must become side `_1`: it has a strictly higher observation
/// priority than `a`. Ties keep evaluation order.
pub fn swaps_order(a: AcquisitionType, b: AcquisitionType) -> bool {
    b.priority() > a.priority()
}

/// Inputs of one side of a merge.
pub struct MergeSide<'a> {
    pub meta: &'a ProductMetadata,
    pub dataset: &'a Dataset,
}

/// Merge settings shared by every pair of a run.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    pub delta_time: Duration,
    pub radius_km: f64,
}

/// Produce the merged dataset, or `None` when the grids share no valid cell.
pub fn merge_pair(
    first: MergeSide<'_>,
    second: MergeSide<'_>,
    overlap: &MultiPolygon<f64>,
    area_km2: f64,
    options: MergeOptions,
) -> Option<MergedDataset> {
    let frame1 = prepare_frame(&first, second.meta, options.delta_time);
    let frame2 = prepare_frame(&second, first.meta, options.delta_time);
    let layer1 = to_layer(frame1.clone(), first.meta);
    let layer2 = to_layer(frame2.clone(), second.meta);

    let Some(mut aligned) = align(&layer1, &layer2, overlap, options.radius_km) else {
        debug!(
            "No common grid between {} and {}",
            first.meta.source_ref(),
            second.meta.source_ref()
        );
        return None;
    };

    let common: BTreeSet<String> = aligned
        .first
        .keys()
        .filter(|k| aligned.second.contains_key(*k))
        .filter(|k| is_canonical(k))
        .cloned()
        .collect();

    for name in &common {
        if let (Some(a), Some(b)) = (aligned.first.get_mut(name), aligned.second.get_mut(name)) {
            mask_to_co_valid(a, b);
        }
    }

    let statistics: Vec<VariableStats> = common
        .iter()
        .filter_map(|name| {
            let a = aligned.first.get(name)?;
            let b = aligned.second.get(name)?;
            Some(VariableStats::compute(name, a.view(), b.view()))
        })
        .collect();

    let mut variables = BTreeMap::new();
    variables.extend(suffixed(std::mem::take(&mut aligned.first), 1));
    variables.extend(suffixed(std::mem::take(&mut aligned.second), 2));

    let mut attributes = BTreeMap::new();
    attributes.extend(source_attributes(first.meta, &frame1, 1));
    attributes.extend(source_attributes(second.meta, &frame2, 2));
    attributes.insert("polygon_common_zone".to_string(), AttrValue::Text(to_wkt(overlap)));
    attributes.insert("area_intersection".to_string(), AttrValue::Number(area_km2));
    let time_difference = (first.meta.time_window().mid() - second.meta.time_window().mid())
        .num_milliseconds()
        .abs() as f64
        / 1000.0;
    attributes.insert("time_difference".to_string(), AttrValue::Number(time_difference));
    attributes.insert(
        "version".to_string(),
        AttrValue::Text(env!("CARGO_PKG_VERSION").to_string()),
    );
    for s in &statistics {
        attributes.extend(s.attributes());
    }

    Some(MergedDataset {
        product_names: [
            first.meta.product_name().to_string(),
            second.meta.product_name().to_string(),
        ],
        geolocation: aligned.geolocation,
        variables,
        attributes,
        statistics,
    })
}

fn is_canonical(name: &str) -> bool {
    CanonicalVar::ALL
        .iter()
        .any(|v| !v.is_coordinate() && v.as_str() == name)
}

/// Time step nearest the other product's mid-time; daily grid pixels observed
/// outside the other product's tolerance window are masked.
fn prepare_frame(side: &MergeSide<'_>, other: &ProductMetadata, delta: Duration) -> Frame {
    let mut frame = side.dataset.nearest_frame(other.time_window().mid());
    if side.meta.acquisition_type() != AcquisitionType::DailyRegularGrid {
        return frame;
    }
    let Some(time_name) = side.meta.variable_name(CanonicalVar::Time) else {
        return frame;
    };
    let Some(times) = frame.variables.get(time_name).cloned() else {
        return frame;
    };
    let window = other.time_window().widen(delta);
    let (lo, hi) = (
        utc_to_epoch_seconds(window.start),
        utc_to_epoch_seconds(window.stop),
    );
    let keep = times.mapv(|t| t.is_finite() && t >= lo && t <= hi);
    for (name, values) in frame.variables.iter_mut() {
        if name == time_name {
            continue;
        }
        values.zip_mut_with(&keep, |v, &k| {
            if !k {
                *v = f64::NAN;
            }
        });
    }
    frame
}

/// Rename mapped variables to canonical names and drop geolocation and time.
fn to_layer(frame: Frame, meta: &ProductMetadata) -> Layer {
    let map = meta.variable_name_map();
    let coordinate_names: BTreeSet<&str> = map
        .iter()
        .filter(|(k, _)| k.is_coordinate())
        .map(|(_, v)| v.as_str())
        .collect();
    let minute_name = crate::io::missions::minute_variable(meta.mission());
    let mut fields = Fields::new();
    for (name, values) in frame.variables {
        if coordinate_names.contains(name.as_str()) || minute_name == Some(name.as_str()) {
            continue;
        }
        let canonical = map
            .iter()
            .find(|(k, v)| !k.is_coordinate() && **v == name)
            .map(|(k, _)| k.as_str().to_string());
        fields.insert(canonical.unwrap_or(name), values);
    }
    Layer {
        geolocation: frame.geolocation,
        fields,
    }
}

fn mask_to_co_valid(a: &mut Array2<f64>, b: &mut Array2<f64>) {
    Zip::from(a).and(b).for_each(|x, y| {
        if !(x.is_finite() && y.is_finite()) {
            *x = f64::NAN;
            *y = f64::NAN;
        }
    });
}

fn suffixed(fields: Fields, side: u8) -> impl Iterator<Item = (String, Array2<f64>)> {
    fields
        .into_iter()
        .map(move |(k, v)| (format!("{}_{}", k, side), v))
}

fn source_attributes(
    meta: &ProductMetadata,
    frame: &Frame,
    side: u8,
) -> Vec<(String, AttrValue)> {
    let mut out: Vec<(String, AttrValue)> = frame
        .attributes
        .iter()
        .map(|(k, v)| (format!("{}_{}", k, side), v.clone()))
        .collect();
    let rfc = |t: chrono::DateTime<chrono::Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
    out.extend([
        (
            format!("sourceProduct_{}", side),
            AttrValue::Text(meta.basename().to_string()),
        ),
        (
            format!("missionName_{}", side),
            AttrValue::Text(meta.mission().to_string()),
        ),
        (
            format!("acquisitionType_{}", side),
            AttrValue::Text(meta.acquisition_type().to_string()),
        ),
        (
            format!("measurementStartDate_{}", side),
            AttrValue::Text(rfc(meta.start_time())),
        ),
        (
            format!("measurementStopDate_{}", side),
            AttrValue::Text(rfc(meta.stop_time())),
        ),
        (
            format!("footprint_{}", side),
            AttrValue::Text(to_wkt(meta.footprint())),
        ),
    ]);
    out
}
