//! Shared types and enums used across satcoloc.
//! Includes `Mission`, `Level`, `AcquisitionType`, `CanonicalVar` and the per-pair
//! `ColocStatus`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Missions (or model families) whose products can be co-located.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mission {
    #[value(name = "SMOS")]
    Smos,
    #[value(name = "HY2")]
    Hy2,
    #[value(name = "ASCAT")]
    Ascat,
    #[value(name = "ERA5")]
    Era5,
    #[value(name = "RS2")]
    Rs2,
    #[value(name = "S1")]
    S1,
    #[value(name = "RCM")]
    Rcm,
    #[value(name = "WS")]
    Ws,
    #[value(name = "SMAP")]
    Smap,
}

impl Mission {
    pub const ALL: [Mission; 9] = [
        Mission::Smos,
        Mission::Hy2,
        Mission::Ascat,
        Mission::Era5,
        Mission::Rs2,
        Mission::S1,
        Mission::Rcm,
        Mission::Ws,
        Mission::Smap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mission::Smos => "SMOS",
            Mission::Hy2 => "HY2",
            Mission::Ascat => "ASCAT",
            Mission::Era5 => "ERA5",
            Mission::Rs2 => "RS2",
            Mission::S1 => "S1",
            Mission::Rcm => "RCM",
            Mission::Ws => "WS",
            Mission::Smap => "SMAP",
        }
    }

    pub fn is_sar(&self) -> bool {
        matches!(self, Mission::Rs2 | Mission::S1 | Mission::Rcm)
    }

    /// Name used in listing filenames: every SAR mission is rendered as `SAR`.
    pub fn listing_name(&self) -> &'static str {
        if self.is_sar() { "SAR" } else { self.as_str() }
    }

    /// Acquisition type is fixed per mission; it is never inferred from data.
    pub fn acquisition_type(&self) -> AcquisitionType {
        match self {
            Mission::Rs2 | Mission::S1 | Mission::Rcm => AcquisitionType::TruncatedSwath,
            Mission::Hy2 | Mission::Ascat => AcquisitionType::Swath,
            Mission::Smos | Mission::Ws | Mission::Smap => AcquisitionType::DailyRegularGrid,
            Mission::Era5 => AcquisitionType::ModelRegularGrid,
        }
    }
}

impl std::fmt::Display for Mission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mission::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown mission `{}`", s))
    }
}

/// Processing level of SAR products.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
pub enum Level {
    L1,
    L2,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::L1 => write!(f, "L1"),
            Level::L2 => write!(f, "L2"),
        }
    }
}

/// Geometric/sampling character of a product.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionType {
    Swath,
    TruncatedSwath,
    DailyRegularGrid,
    ModelRegularGrid,
}

impl AcquisitionType {
    pub const ALL: [AcquisitionType; 4] = [
        AcquisitionType::TruncatedSwath,
        AcquisitionType::Swath,
        AcquisitionType::DailyRegularGrid,
        AcquisitionType::ModelRegularGrid,
    ];

    /// Observation priority used to order the two products of a merge: the
    /// most local observation comes first, the model last.
    pub fn priority(&self) -> u8 {
        match self {
            AcquisitionType::TruncatedSwath => 3,
            AcquisitionType::Swath => 2,
            AcquisitionType::DailyRegularGrid => 1,
            AcquisitionType::ModelRegularGrid => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionType::Swath => "swath",
            AcquisitionType::TruncatedSwath => "truncated_swath",
            AcquisitionType::DailyRegularGrid => "daily_regular_grid",
            AcquisitionType::ModelRegularGrid => "model_regular_grid",
        }
    }
}

impl std::fmt::Display for AcquisitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical variable names shared by every mission.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalVar {
    WindSpeed,
    WindDirection,
    WindFromDirection,
    Longitude,
    Latitude,
    Time,
}

impl CanonicalVar {
    pub const ALL: [CanonicalVar; 6] = [
        CanonicalVar::WindSpeed,
        CanonicalVar::WindDirection,
        CanonicalVar::WindFromDirection,
        CanonicalVar::Longitude,
        CanonicalVar::Latitude,
        CanonicalVar::Time,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalVar::WindSpeed => "wind_speed",
            CanonicalVar::WindDirection => "wind_direction",
            CanonicalVar::WindFromDirection => "wind_from_direction",
            CanonicalVar::Longitude => "longitude",
            CanonicalVar::Latitude => "latitude",
            CanonicalVar::Time => "time",
        }
    }

    /// Geolocation and time carry the grid, they are not merged as data variables.
    pub fn is_coordinate(&self) -> bool {
        matches!(
            self,
            CanonicalVar::Longitude | CanonicalVar::Latitude | CanonicalVar::Time
        )
    }
}

impl std::fmt::Display for CanonicalVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal state of one evaluated pair.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColocStatus {
    RejectedTemporal,
    RejectedSpatial,
    ListedOnly,
    ListedAndMerged,
}

impl ColocStatus {
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            ColocStatus::RejectedTemporal | ColocStatus::RejectedSpatial
        )
    }
}

impl std::fmt::Display for ColocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColocStatus::RejectedTemporal => write!(f, "rejected_temporal"),
            ColocStatus::RejectedSpatial => write!(f, "rejected_spatial"),
            ColocStatus::ListedOnly => write!(f, "listed_only"),
            ColocStatus::ListedAndMerged => write!(f, "listed_and_merged"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sar_missions_render_as_sar_in_listings() {
        assert_eq!(Mission::S1.listing_name(), "SAR");
        assert_eq!(Mission::Rs2.listing_name(), "SAR");
        assert_eq!(Mission::Rcm.listing_name(), "SAR");
        assert_eq!(Mission::Era5.listing_name(), "ERA5");
    }

    #[test]
    fn mission_parses_case_insensitively() {
        assert_eq!("era5".parse::<Mission>().unwrap(), Mission::Era5);
        assert_eq!("Ws".parse::<Mission>().unwrap(), Mission::Ws);
        assert!("landsat".parse::<Mission>().is_err());
    }

    #[test]
    fn acquisition_type_is_fixed_per_mission() {
        assert_eq!(Mission::S1.acquisition_type(), AcquisitionType::TruncatedSwath);
        assert_eq!(Mission::Ascat.acquisition_type(), AcquisitionType::Swath);
        assert_eq!(Mission::Smap.acquisition_type(), AcquisitionType::DailyRegularGrid);
        assert_eq!(Mission::Era5.acquisition_type(), AcquisitionType::ModelRegularGrid);
    }
}
