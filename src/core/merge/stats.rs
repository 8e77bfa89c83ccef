//! Comparison statistics between the two sides of a merged variable.
use ndarray::{ArrayView2, Zip};
use serde::Serialize;

use crate::io::dataset::AttrValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableStats {
    /// Canonical variable name.
    pub variable: String,
    pub counted_points: usize,
    /// Mean of `_1 - _2`.
    pub bias: f64,
    /// Population standard deviation of `_1 - _2`.
    pub standard_deviation: f64,
    /// RMS difference over the mean of every co-located observation, in percent.
    pub scatter_index: f64,
}

impl VariableStats {
    /// Compare two aligned fields over the points valid on both sides.
    pub fn compute(variable: &str, first: ArrayView2<f64>, second: ArrayView2<f64>) -> Self {
        let (n, sum_d, sum_d2, sum_obs) = Zip::from(first).and(second).fold(
            (0usize, 0.0f64, 0.0f64, 0.0f64),
            |(n, sd, sd2, so), &a, &b| {
                if a.is_finite() && b.is_finite() {
                    let d = a - b;
                    (n + 1, sd + d, sd2 + d * d, so + a + b)
                } else {
                    (n, sd, sd2, so)
                }
            },
        );
        if n == 0 {
            return Self {
                variable: variable.to_string(),
                counted_points: 0,
                bias: f64::NAN,
                standard_deviation: f64::NAN,
                scatter_index: f64::NAN,
            };
        }
        let count = n as f64;
        let bias = sum_d / count;
        let mean_sq = sum_d2 / count;
        let variance = (mean_sq - bias * bias).max(0.0);
        let mean_obs = sum_obs / (2.0 * count);
        let scatter_index = if mean_obs == 0.0 {
            f64::NAN
        } else {
            mean_sq.sqrt() / mean_obs * 100.0
        };
        Self {
            variable: variable.to_string(),
            counted_points: n,
            bias,
            standard_deviation: variance.sqrt(),
            scatter_index,
        }
    }

    /// Dataset attributes carrying these statistics. Wind speed uses the bare
    /// keys, other variables are prefixed with their name.
    pub fn attributes(&self) -> Vec<(String, AttrValue)> {
        let key = |name: &str| {
            if self.variable == "wind_speed" {
                name.to_string()
            } else {
                format!("{}_{}", self.variable, name)
            }
        };
        vec![
            (key("counted_points"), AttrValue::Number(self.counted_points as f64)),
            (key("Bias"), AttrValue::Number(self.bias)),
            (key("Standard deviation"), AttrValue::Number(self.standard_deviation)),
            (key("scatter_index"), AttrValue::Number(self.scatter_index)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_stats_over_co_valid_points() {
        let a = array![[10.0, 12.0, f64::NAN], [8.0, 5.0, 1.0]];
        let b = array![[9.0, 10.0, 3.0], [9.0, f64::NAN, 1.0]];
        // Differences on co-valid points: 1, 2, -1, 0.
        let s = VariableStats::compute("wind_speed", a.view(), b.view());
        assert_eq!(s.counted_points, 4);
        assert!((s.bias - 0.5).abs() < 1e-12);
        // Population variance: mean(d^2) - bias^2 = 1.5 - 0.25.
        assert!((s.standard_deviation - 1.25f64.sqrt()).abs() < 1e-12);
        // Mean of all co-located observations: (10+12+8+1+9+10+9+1) / 8 = 7.5.
        let expected_si = 1.5f64.sqrt() / 7.5 * 100.0;
        assert!((s.scatter_index - expected_si).abs() < 1e-9);
    }

    #[test]
    fn test_stats_without_points_are_nan() {
        let a = array![[f64::NAN]];
        let b = array![[1.0]];
        let s = VariableStats::compute("wind_speed", a.view(), b.view());
        assert_eq!(s.counted_points, 0);
        assert!(s.bias.is_nan() && s.standard_deviation.is_nan() && s.scatter_index.is_nan());
    }

    #[test]
    fn test_attribute_keys() {
        let a = array![[1.0]];
        let s = VariableStats::compute("wind_speed", a.view(), a.view());
        let keys: Vec<String> = s.attributes().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["counted_points", "Bias", "Standard deviation", "scatter_index"]);

        let s = VariableStats::compute("wind_direction", a.view(), a.view());
        assert_eq!(s.attributes()[1].0, "wind_direction_Bias");
    }
}
