//! Per-pair co-location evaluation.
//!
//! [`IntersectionEngine::evaluate`] runs the temporal test, the compatibility
//! lookup and the spatial test, in that order, and decides what the pair is
//! eligible for. [`IntersectionEngine::merge`] then produces the merged dataset
//! for eligible pairs. Evaluation is a pure function of the two metadata
//! values and is safe to run concurrently.
use std::sync::Arc;

use geo::MultiPolygon;
use tracing::{debug, warn};

use crate::core::geometry::{equal_area_km2, intersect};
use crate::core::merge::{MergeOptions, MergeSide, MergedDataset, merge_pair, swaps_order};
use crate::core::params::ColocationCriteria;
use crate::core::policy::compatibility;
use crate::io::adapter::DatasetProvider;
use crate::io::metadata::ProductMetadata;
use crate::types::{ColocStatus, Mission};

/// Order-independent identity of a pair of products.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }

    pub fn refs(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// Outcome of evaluating one pair. Never mutated once returned.
#[derive(Debug, Clone)]
pub struct IntersectionResult {
    /// Source references in evaluation order.
    pub pair: (String, String),
    pub missions: (Mission, Mission),
    pub temporal_overlap: bool,
    pub spatial_overlap_geometry: Option<MultiPolygon<f64>>,
    pub overlap_area_km2: Option<f64>,
    pub listing_allowed: bool,
    pub merge_allowed: bool,
    pub merged_dataset: Option<Arc<MergedDataset>>,
    pub status: ColocStatus,
}

impl IntersectionResult {
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.pair.0, &self.pair.1)
    }

    /// `<ref_1>:<ref_2>` in evaluation order.
    pub fn listing_line(&self) -> String {
        format!("{}:{}", self.pair.0, self.pair.1)
    }

    pub fn is_listed(&self) -> bool {
        matches!(
            self.status,
            ColocStatus::ListedOnly | ColocStatus::ListedAndMerged
        )
    }

    fn rejected(a: &ProductMetadata, b: &ProductMetadata, status: ColocStatus) -> Self {
        Self {
            pair: (a.source_ref().to_string(), b.source_ref().to_string()),
            missions: (a.mission(), b.mission()),
            temporal_overlap: status != ColocStatus::RejectedTemporal,
            spatial_overlap_geometry: None,
            overlap_area_km2: None,
            listing_allowed: false,
            merge_allowed: false,
            merged_dataset: None,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntersectionEngine {
    criteria: ColocationCriteria,
    radius_km: f64,
}

impl IntersectionEngine {
    pub fn new(criteria: ColocationCriteria, radius_km: f64) -> Self {
        Self {
            criteria,
            radius_km,
        }
    }

    pub fn criteria(&self) -> &ColocationCriteria {
        &self.criteria
    }

    /// Temporal, compatibility and spatial tests; no dataset is loaded.
    pub fn evaluate(&self, a: &ProductMetadata, b: &ProductMetadata) -> IntersectionResult {
        let delta = self.criteria.delta_time;
        if !a.time_window().widen(delta).intersects(&b.time_window()) {
            debug!(
                "{} / {}: no temporal overlap",
                a.source_ref(),
                b.source_ref()
            );
            return IntersectionResult::rejected(a, b, ColocStatus::RejectedTemporal);
        }

        let policy = compatibility(a.acquisition_type(), b.acquisition_type());
        if !policy.is_viable() {
            debug!(
                "{} / {}: {} and {} can't be co-located",
                a.source_ref(),
                b.source_ref(),
                a.acquisition_type(),
                b.acquisition_type()
            );
            return IntersectionResult::rejected(a, b, ColocStatus::RejectedSpatial);
        }

        // Intersect in a fixed operand order so (A, B) and (B, A) agree exactly.
        let (p, q) = if a.source_ref() <= b.source_ref() {
            (a, b)
        } else {
            (b, a)
        };
        let Some(geometry) = intersect(p.footprint(), q.footprint()) else {
            debug!("{} / {}: footprints don't intersect", a.source_ref(), b.source_ref());
            return IntersectionResult::rejected(a, b, ColocStatus::RejectedSpatial);
        };
        let area = equal_area_km2(&geometry);
        let spatial_pass = area >= self.criteria.minimal_area.km2();

        let listing_allowed = policy.listing_allowed && spatial_pass;
        let merge_allowed = policy.merge_allowed && spatial_pass && !a.is_l1() && !b.is_l1();
        let status = if listing_allowed || merge_allowed {
            ColocStatus::ListedOnly
        } else {
            ColocStatus::RejectedSpatial
        };
        debug!(
            "{} / {}: overlap {:.1} km2 -> {}",
            a.source_ref(),
            b.source_ref(),
            area,
            status
        );
        IntersectionResult {
            pair: (a.source_ref().to_string(), b.source_ref().to_string()),
            missions: (a.mission(), b.mission()),
            temporal_overlap: true,
            spatial_overlap_geometry: Some(geometry),
            overlap_area_km2: Some(area),
            listing_allowed,
            merge_allowed,
            merged_dataset: None,
            status,
        }
    }

    /// Build the merged dataset of a merge-eligible result. Load failures and
    /// empty common grids leave the result `listed_only`.
    pub fn merge(
        &self,
        mut result: IntersectionResult,
        a: &ProductMetadata,
        b: &ProductMetadata,
        provider: &dyn DatasetProvider,
    ) -> IntersectionResult {
        if !result.merge_allowed || result.merged_dataset.is_some() {
            return result;
        }
        let Some(geometry) = result.spatial_overlap_geometry.as_ref() else {
            return result;
        };
        let (first, second) = if swaps_order(a.acquisition_type(), b.acquisition_type()) {
            (b, a)
        } else {
            (a, b)
        };
        let load = |m: &ProductMetadata| {
            provider.dataset(m).map_err(|e| {
                warn!("Merge skipped, can't load {}: {}", m.source_ref(), e);
            })
        };
        let (Ok(ds1), Ok(ds2)) = (load(first), load(second)) else {
            return result;
        };
        let merged = merge_pair(
            MergeSide {
                meta: first,
                dataset: &ds1,
            },
            MergeSide {
                meta: second,
                dataset: &ds2,
            },
            geometry,
            result.overlap_area_km2.unwrap_or_default(),
            MergeOptions {
                delta_time: self.criteria.delta_time,
                radius_km: self.radius_km,
            },
        );
        match merged {
            Some(ds) => {
                result.merged_dataset = Some(Arc::new(ds));
                result.status = ColocStatus::ListedAndMerged;
            }
            None => warn!(
                "Merge skipped for {}: empty common grid",
                result.listing_line()
            ),
        }
        result
    }

    /// `evaluate` followed by `merge` when eligible.
    pub fn evaluate_with_merge(
        &self,
        a: &ProductMetadata,
        b: &ProductMetadata,
        provider: &dyn DatasetProvider,
    ) -> IntersectionResult {
        let result = self.evaluate(a, b);
        self.merge(result, a, b, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use geo::polygon;

    use crate::core::params::MinimalArea;
    use crate::types::Level;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> geo::Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]
    }

    fn meta(mission: Mission, level: Option<Level>, hour: u32, fp: geo::Polygon<f64>, name: &str) -> ProductMetadata {
        let start = Utc.with_ymd_and_hms(2018, 10, 9, hour, 0, 0).unwrap();
        ProductMetadata::new(mission, level, start, start + Duration::minutes(2), fp, name).unwrap()
    }

    fn engine() -> IntersectionEngine {
        IntersectionEngine::new(ColocationCriteria::new(60, MinimalArea::default()), 25.0)
    }

    #[test]
    fn temporal_failure_skips_everything_else() {
        let a = meta(Mission::S1, Some(Level::L2), 10, rect(0.0, 0.0, 2.0, 2.0), "a.nc");
        let b = meta(Mission::S1, Some(Level::L2), 14, rect(0.0, 0.0, 2.0, 2.0), "b.nc");
        let r = engine().evaluate(&a, &b);
        assert_eq!(r.status, ColocStatus::RejectedTemporal);
        assert!(!r.temporal_overlap);
        assert!(r.overlap_area_km2.is_none());
    }

    #[test]
    fn non_viable_pair_leaves_overlap_fields_null() {
        let a = meta(Mission::Ascat, None, 10, rect(0.0, 0.0, 2.0, 2.0), "ascat_a.nc");
        let b = meta(Mission::Hy2, None, 10, rect(0.0, 0.0, 2.0, 2.0), "hy_b.nc");
        let r = engine().evaluate(&a, &b);
        assert_eq!(r.status, ColocStatus::RejectedSpatial);
        assert!(r.temporal_overlap);
        assert!(r.spatial_overlap_geometry.is_none());
        assert!(r.overlap_area_km2.is_none());
    }

    #[test]
    fn l1_products_are_listed_but_never_merge_eligible() {
        let a = meta(Mission::S1, Some(Level::L1), 10, rect(0.0, 0.0, 2.0, 2.0), "S1A_L1");
        let b = meta(Mission::Era5, None, 10, rect(-1.0, -1.0, 3.0, 3.0), "era_5-copernicus__20181009.nc");
        let r = engine().evaluate(&a, &b);
        assert_eq!(r.status, ColocStatus::ListedOnly);
        assert!(r.listing_allowed);
        assert!(!r.merge_allowed);
    }

    #[test]
    fn pair_key_ignores_order() {
        assert_eq!(PairKey::new("x", "y"), PairKey::new("y", "x"));
        assert_eq!(PairKey::new("y", "x").to_string(), "x:y");
    }
}
