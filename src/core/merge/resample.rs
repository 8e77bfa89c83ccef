//! Resampling of one grid onto another.
//!
//! Three kernels are used when aligning two products:
//! - bilinear interpolation between regular grids,
//! - bin averaging of irregular points into the cells of a regular grid,
//! - radius mean (great-circle distance) between irregular grids.
//!
//! All kernels treat `NaN` as missing and produce `NaN` where nothing valid
//! contributes.
use ndarray::{Array1, Array2, Zip};

use crate::core::geometry::haversine_km;

const AXIS_EPS: f64 = 1e-9;

/// Fractional index of `v` along a monotonic axis, or `None` outside the axis.
///
/// Longitudes are retried shifted by ±360° when `wrap_lon` is set.
pub fn fractional_index(axis: &Array1<f64>, v: f64, wrap_lon: bool) -> Option<f64> {
    if !v.is_finite() || axis.is_empty() {
        return None;
    }
    let candidates: &[f64] = if wrap_lon { &[0.0, 360.0, -360.0] } else { &[0.0] };
    candidates
        .iter()
        .find_map(|dx| locate(axis, v + dx))
}

fn locate(axis: &Array1<f64>, v: f64) -> Option<f64> {
    let n = axis.len();
    if n == 1 {
        return ((axis[0] - v).abs() <= AXIS_EPS).then_some(0.0);
    }
    let ascending = axis[n - 1] > axis[0];
    let (lo, hi) = if ascending {
        (axis[0], axis[n - 1])
    } else {
        (axis[n - 1], axis[0])
    };
    if v < lo - AXIS_EPS || v > hi + AXIS_EPS {
        return None;
    }
    let values = axis.as_slice()?;
    // First index whose value is past `v` in axis order.
    let upper = if ascending {
        values.partition_point(|&a| a <= v)
    } else {
        values.partition_point(|&a| a >= v)
    };
    let i1 = upper.clamp(1, n - 1);
    let i0 = i1 - 1;
    let (a0, a1) = (values[i0], values[i1]);
    let t = if a1 == a0 { 0.0 } else { (v - a0) / (a1 - a0) };
    Some((i0 as f64 + t).clamp(0.0, (n - 1) as f64))
}

/// Bilinear sample at fractional `(row, col)`. Corners with zero weight are
/// ignored; any weighted `NaN` corner yields `NaN`.
pub fn bilinear_at(data: &Array2<f64>, row: f64, col: f64) -> f64 {
    let (height, width) = data.dim();
    if height == 0 || width == 0 || row < 0.0 || col < 0.0 {
        return f64::NAN;
    }
    let r0 = row.floor() as usize;
    let c0 = col.floor() as usize;
    if r0 >= height || c0 >= width {
        return f64::NAN;
    }
    let r1 = (r0 + 1).min(height - 1);
    let c1 = (c0 + 1).min(width - 1);
    let rf = row - r0 as f64;
    let cf = col - c0 as f64;

    let corners = [
        (r0, c0, (1.0 - rf) * (1.0 - cf)),
        (r0, c1, (1.0 - rf) * cf),
        (r1, c0, rf * (1.0 - cf)),
        (r1, c1, rf * cf),
    ];
    let mut acc = 0.0;
    for (r, c, w) in corners {
        if w == 0.0 {
            continue;
        }
        let v = data[[r, c]];
        if v.is_nan() {
            return f64::NAN;
        }
        acc += v * w;
    }
    acc
}

/// Interpolate a regular grid onto other regular axes.
pub fn bilinear_regrid(
    data: &Array2<f64>,
    src_lon: &Array1<f64>,
    src_lat: &Array1<f64>,
    dst_lon: &Array1<f64>,
    dst_lat: &Array1<f64>,
) -> Array2<f64> {
    let cols: Vec<Option<f64>> = dst_lon
        .iter()
        .map(|&x| fractional_index(src_lon, x, true))
        .collect();
    let rows: Vec<Option<f64>> = dst_lat
        .iter()
        .map(|&y| fractional_index(src_lat, y, false))
        .collect();
    Array2::from_shape_fn((dst_lat.len(), dst_lon.len()), |(r, c)| {
        match (rows[r], cols[c]) {
            (Some(fr), Some(fc)) => bilinear_at(data, fr, fc),
            _ => f64::NAN,
        }
    })
}

/// Average irregular points into the nearest cell of regular axes.
pub fn bin_average(
    data: &Array2<f64>,
    src_lon: &Array2<f64>,
    src_lat: &Array2<f64>,
    dst_lon: &Array1<f64>,
    dst_lat: &Array1<f64>,
) -> Array2<f64> {
    let shape = (dst_lat.len(), dst_lon.len());
    let mut sum = Array2::<f64>::zeros(shape);
    let mut count = Array2::<u32>::zeros(shape);
    Zip::from(data)
        .and(src_lon)
        .and(src_lat)
        .for_each(|&v, &x, &y| {
            if !v.is_finite() {
                return;
            }
            let (Some(fc), Some(fr)) = (
                fractional_index(dst_lon, x, true),
                fractional_index(dst_lat, y, false),
            ) else {
                return;
            };
            let idx = [fr.round() as usize, fc.round() as usize];
            sum[idx] += v;
            count[idx] += 1;
        });
    Zip::from(&sum)
        .and(&count)
        .map_collect(|&s, &n| if n == 0 { f64::NAN } else { s / f64::from(n) })
}

/// Mean of the valid source values within `radius_km` of each target point.
pub fn radius_mean(
    data: &Array2<f64>,
    src_lon: &Array2<f64>,
    src_lat: &Array2<f64>,
    dst_lon: &Array2<f64>,
    dst_lat: &Array2<f64>,
    radius_km: f64,
) -> Array2<f64> {
    // Valid source points sorted by latitude for a band prefilter.
    let mut points: Vec<(f64, f64, f64)> = Zip::from(data)
        .and(src_lon)
        .and(src_lat)
        .fold(Vec::new(), |mut acc, &v, &x, &y| {
            if v.is_finite() && x.is_finite() && y.is_finite() {
                acc.push((y, x, v));
            }
            acc
        });
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let band_deg = radius_km / 111.0 + 1e-6;

    Zip::from(dst_lon)
        .and(dst_lat)
        .par_map_collect(|&x, &y| {
            if !x.is_finite() || !y.is_finite() {
                return f64::NAN;
            }
            let start = points.partition_point(|p| p.0 < y - band_deg);
            let (mut acc, mut n) = (0.0, 0u32);
            for &(py, px, v) in points[start..].iter().take_while(|p| p.0 <= y + band_deg) {
                if haversine_km(x, y, px, py) <= radius_km {
                    acc += v;
                    n += 1;
                }
            }
            if n == 0 { f64::NAN } else { acc / f64::from(n) }
        })
}
