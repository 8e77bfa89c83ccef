//! Acquisition-type compatibility table.
//!
//! Decides, for an unordered pair of acquisition types, whether a co-located pair
//! may be listed and whether the two products may be merged. The table is the
//! single authority for these decisions and is symmetric by construction: the
//! lookup normalizes the pair before matching.
use crate::types::AcquisitionType;

/// Operations permitted for a pair of acquisition types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Compatibility {
    pub listing_allowed: bool,
    pub merge_allowed: bool,
}

impl Compatibility {
    const fn new(listing_allowed: bool, merge_allowed: bool) -> Self {
        Self {
            listing_allowed,
            merge_allowed,
        }
    }

    /// `(F, F)` pairs are never viable; geometry work can be skipped.
    pub fn is_viable(&self) -> bool {
        self.listing_allowed || self.merge_allowed
    }
}

pub fn compatibility(a: AcquisitionType, b: AcquisitionType) -> Compatibility {
    use AcquisitionType::*;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    match (lo, hi) {
        (TruncatedSwath, TruncatedSwath) => Compatibility::new(true, true),
        (Swath, TruncatedSwath) => Compatibility::new(true, false),
        (TruncatedSwath, DailyRegularGrid) => Compatibility::new(true, true),
        (TruncatedSwath, ModelRegularGrid) => Compatibility::new(true, true),
        (Swath, Swath) => Compatibility::new(false, false),
        (Swath, DailyRegularGrid) => Compatibility::new(false, false),
        (Swath, ModelRegularGrid) => Compatibility::new(true, false),
        (DailyRegularGrid, DailyRegularGrid) => Compatibility::new(false, false),
        (DailyRegularGrid, ModelRegularGrid) => Compatibility::new(true, false),
        (ModelRegularGrid, ModelRegularGrid) => Compatibility::new(true, false),
        // Remaining combinations are the mirrored forms, unreachable after normalization.
        (TruncatedSwath, Swath)
        | (DailyRegularGrid, Swath | TruncatedSwath)
        | (ModelRegularGrid, Swath | TruncatedSwath | DailyRegularGrid) => {
            compatibility(hi, lo)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AcquisitionType::*;

    #[test]
    fn policy_is_symmetric() {
        for a in AcquisitionType::ALL {
            for b in AcquisitionType::ALL {
                assert_eq!(compatibility(a, b), compatibility(b, a), "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn only_truncated_swath_pairs_can_merge() {
        for a in AcquisitionType::ALL {
            for b in AcquisitionType::ALL {
                let merge = compatibility(a, b).merge_allowed;
                let expected = (a == TruncatedSwath && b != Swath)
                    || (b == TruncatedSwath && a != Swath);
                assert_eq!(merge, expected, "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn non_viable_pairs() {
        assert!(!compatibility(Swath, Swath).is_viable());
        assert!(!compatibility(Swath, DailyRegularGrid).is_viable());
        assert!(!compatibility(DailyRegularGrid, DailyRegularGrid).is_viable());
        assert!(compatibility(ModelRegularGrid, ModelRegularGrid).is_viable());
    }
}
