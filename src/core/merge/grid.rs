//! Common-grid construction for two products.
//!
//! The target grid is chosen from the geolocation kinds of both sides:
//! - two regular grids: the coarser grid's axes, restricted to the overlap of
//!   both coordinate extents; the finer side is interpolated bilinearly;
//! - one regular grid: its axes cropped to the overlap bounding box; the
//!   irregular side is bin-averaged into the cells;
//! - no regular grid: the first (higher priority) side's native grid; the
//!   other side is resampled by radius mean.
//!
//! Cells whose centre falls outside the overlap geometry are then masked and
//! the grid is cropped to the rows and columns that remain.
use std::collections::BTreeMap;

use geo::MultiPolygon;
use ndarray::{Array1, Array2, s};

use crate::core::geometry::{bounding_rect, covers_point};
use crate::core::merge::resample::{bilinear_regrid, bin_average, radius_mean};
use crate::io::dataset::Geolocation;

pub type Fields = BTreeMap<String, Array2<f64>>;

/// Variables of one side on its own grid.
#[derive(Debug, Clone)]
pub struct Layer {
    pub geolocation: Geolocation,
    pub fields: Fields,
}

/// Both sides on the same grid.
#[derive(Debug, Clone)]
pub struct AlignedPair {
    pub geolocation: Geolocation,
    pub first: Fields,
    pub second: Fields,
}

fn axis_spacing(axis: &Array1<f64>) -> f64 {
    let n = axis.len();
    if n < 2 {
        return 0.0;
    }
    (axis[n - 1] - axis[0]).abs() / (n - 1) as f64
}

fn axis_extent(axis: &Array1<f64>) -> (f64, f64) {
    axis.iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn within(v: f64, lo: f64, hi: f64, wrap: bool) -> bool {
    let shifts: &[f64] = if wrap { &[0.0, 360.0, -360.0] } else { &[0.0] };
    shifts.iter().any(|dx| v + dx >= lo && v + dx <= hi)
}

fn filter_axis(axis: &Array1<f64>, lo: f64, hi: f64, wrap: bool) -> Array1<f64> {
    axis.iter()
        .copied()
        .filter(|&v| within(v, lo, hi, wrap))
        .collect()
}

fn regrid_fields(fields: &Fields, f: impl Fn(&Array2<f64>) -> Array2<f64>) -> Fields {
    fields.iter().map(|(k, v)| (k.clone(), f(v))).collect()
}

/// Resample both layers onto a common grid, or `None` when the grids share no cell.
pub fn align(
    first: &Layer,
    second: &Layer,
    overlap: &MultiPolygon<f64>,
    radius_km: f64,
) -> Option<AlignedPair> {
    use Geolocation::{Irregular, Regular};
    let aligned = match (&first.geolocation, &second.geolocation) {
        (Regular { lon: lon1, lat: lat1 }, Regular { lon: lon2, lat: lat2 }) => {
            let cell1 = axis_spacing(lon1) * axis_spacing(lat1);
            let cell2 = axis_spacing(lon2) * axis_spacing(lat2);
            let (coarse_lon, coarse_lat) = if cell2 > cell1 { (lon2, lat2) } else { (lon1, lat1) };
            let (lo1, hi1) = axis_extent(lon1);
            let (lo2, hi2) = axis_extent(lon2);
            let (la1, ha1) = axis_extent(lat1);
            let (la2, ha2) = axis_extent(lat2);
            let dst_lon = filter_axis(coarse_lon, lo1.max(lo2), hi1.min(hi2), false);
            let dst_lat = filter_axis(coarse_lat, la1.max(la2), ha1.min(ha2), false);
            if dst_lon.is_empty() || dst_lat.is_empty() {
                return None;
            }
            AlignedPair {
                first: regrid_fields(&first.fields, |v| {
                    bilinear_regrid(v, lon1, lat1, &dst_lon, &dst_lat)
                }),
                second: regrid_fields(&second.fields, |v| {
                    bilinear_regrid(v, lon2, lat2, &dst_lon, &dst_lat)
                }),
                geolocation: Regular {
                    lon: dst_lon,
                    lat: dst_lat,
                },
            }
        }
        (Regular { lon, lat }, Irregular { lon: ilon, lat: ilat }) => {
            let (dst_lon, dst_lat) = crop_axes_to(lon, lat, overlap)?;
            AlignedPair {
                first: regrid_fields(&first.fields, |v| {
                    bilinear_regrid(v, lon, lat, &dst_lon, &dst_lat)
                }),
                second: regrid_fields(&second.fields, |v| {
                    bin_average(v, ilon, ilat, &dst_lon, &dst_lat)
                }),
                geolocation: Regular {
                    lon: dst_lon,
                    lat: dst_lat,
                },
            }
        }
        (Irregular { lon: ilon, lat: ilat }, Regular { lon, lat }) => {
            let (dst_lon, dst_lat) = crop_axes_to(lon, lat, overlap)?;
            AlignedPair {
                first: regrid_fields(&first.fields, |v| {
                    bin_average(v, ilon, ilat, &dst_lon, &dst_lat)
                }),
                second: regrid_fields(&second.fields, |v| {
                    bilinear_regrid(v, lon, lat, &dst_lon, &dst_lat)
                }),
                geolocation: Regular {
                    lon: dst_lon,
                    lat: dst_lat,
                },
            }
        }
        (Irregular { lon: lon1, lat: lat1 }, Irregular { lon: lon2, lat: lat2 }) => AlignedPair {
            first: first.fields.clone(),
            second: regrid_fields(&second.fields, |v| {
                radius_mean(v, lon2, lat2, lon1, lat1, radius_km)
            }),
            geolocation: first.geolocation.clone(),
        },
    };
    mask_and_crop(aligned, overlap)
}

fn crop_axes_to(
    lon: &Array1<f64>,
    lat: &Array1<f64>,
    overlap: &MultiPolygon<f64>,
) -> Option<(Array1<f64>, Array1<f64>)> {
    let bbox = bounding_rect(overlap)?;
    let half_lon = axis_spacing(lon) / 2.0;
    let half_lat = axis_spacing(lat) / 2.0;
    let dst_lon = filter_axis(lon, bbox.min().x - half_lon, bbox.max().x + half_lon, true);
    let dst_lat = filter_axis(lat, bbox.min().y - half_lat, bbox.max().y + half_lat, false);
    if dst_lon.is_empty() || dst_lat.is_empty() {
        None
    } else {
        Some((dst_lon, dst_lat))
    }
}

/// Mask cells outside `overlap` and crop to the remaining rows and columns.
fn mask_and_crop(mut aligned: AlignedPair, overlap: &MultiPolygon<f64>) -> Option<AlignedPair> {
    let (rows, cols) = aligned.geolocation.shape();
    let inside = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (x, y) = aligned.geolocation.point(r, c);
        covers_point(overlap, x, y)
    });
    let kept_rows: Vec<usize> = (0..rows).filter(|&r| inside.row(r).iter().any(|&k| k)).collect();
    let kept_cols: Vec<usize> = (0..cols)
        .filter(|&c| inside.column(c).iter().any(|&k| k))
        .collect();
    let (r0, r1) = (*kept_rows.first()?, *kept_rows.last()?);
    let (c0, c1) = (*kept_cols.first()?, *kept_cols.last()?);

    for field in aligned.first.values_mut().chain(aligned.second.values_mut()) {
        field.zip_mut_with(&inside, |v, &k| {
            if !k {
                *v = f64::NAN;
            }
        });
    }

    let crop = |a: &Array2<f64>| a.slice(s![r0..=r1, c0..=c1]).to_owned();
    let geolocation = match &aligned.geolocation {
        Geolocation::Regular { lon, lat } => Geolocation::Regular {
            lon: lon.slice(s![c0..=c1]).to_owned(),
            lat: lat.slice(s![r0..=r1]).to_owned(),
        },
        Geolocation::Irregular { lon, lat } => Geolocation::Irregular {
            lon: crop(lon),
            lat: crop(lat),
        },
    };
    Some(AlignedPair {
        geolocation,
        first: aligned.first.iter().map(|(k, v)| (k.clone(), crop(v))).collect(),
        second: aligned.second.iter().map(|(k, v)| (k.clone(), crop(v))).collect(),
    })
}
