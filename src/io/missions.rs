//! Per-mission profiles: name detection, filename timing and variable names.
//!
//! Every mission-specific rule is an exhaustive `match` over [`Mission`], so adding
//! a mission is a compile-time checked change.
use chrono::{Duration, NaiveDate, TimeZone, Utc};

use crate::io::adapter::AdapterError;
use crate::io::conversions::{parse_compact_datetime, parse_compact_day};
use crate::io::metadata::{TimeWindow, VariableNameMap};
use crate::types::{CanonicalVar, Level, Mission};

const SAR_PREFIXES: [(&str, Mission); 6] = [
    ("S1A", Mission::S1),
    ("S1B", Mission::S1),
    ("RS2", Mission::Rs2),
    ("RCM1", Mission::Rcm),
    ("RCM2", Mission::Rcm),
    ("RCM3", Mission::Rcm),
];

/// Recognize the mission from a product basename.
pub fn detect_mission(basename: &str) -> Option<Mission> {
    let upper = basename.to_uppercase();
    let tokens: Vec<&str> = upper.split('_').collect();
    let head = tokens[0].split('-').next().unwrap_or_default();
    if let Some((_, m)) = SAR_PREFIXES.iter().find(|(p, _)| *p == head) {
        return Some(*m);
    }
    if upper.starts_with("SM_") {
        return Some(Mission::Smos);
    }
    if upper.starts_with("WSAT_") {
        return Some(Mission::Ws);
    }
    if tokens.get(1) == Some(&"SMAP") {
        return Some(Mission::Smap);
    }
    if tokens.get(3) == Some(&"HY") {
        return Some(Mission::Hy2);
    }
    if upper.starts_with("ASCAT") {
        return Some(Mission::Ascat);
    }
    if upper.starts_with("ERA_5") {
        return Some(Mission::Era5);
    }
    None
}

/// SAR level from the product name: level-2 products are NetCDF files, level-1
/// products are SAFE-like directories.
pub fn sar_level_from_name(basename: &str) -> Level {
    if basename.to_lowercase().ends_with(".nc") {
        Level::L2
    } else {
        Level::L1
    }
}

pub fn default_variable_map(mission: Mission) -> VariableNameMap {
    let entries: &[(CanonicalVar, &str)] = match mission {
        Mission::Rs2 | Mission::S1 | Mission::Rcm => &[
            (CanonicalVar::Longitude, "lon"),
            (CanonicalVar::Latitude, "lat"),
            (CanonicalVar::Time, "time"),
            (CanonicalVar::WindSpeed, "wind_speed"),
            (CanonicalVar::WindDirection, "wind_direction"),
        ],
        Mission::Era5 => &[
            (CanonicalVar::Longitude, "longitude050"),
            (CanonicalVar::Latitude, "latitude050"),
            (CanonicalVar::Time, "time"),
            (CanonicalVar::WindSpeed, "u10"),
            (CanonicalVar::WindDirection, "v10"),
        ],
        Mission::Ws => &[
            (CanonicalVar::Longitude, "longitude"),
            (CanonicalVar::Latitude, "latitude"),
            (CanonicalVar::Time, "time"),
            (CanonicalVar::WindSpeed, "w-mf"),
            (CanonicalVar::WindDirection, "wdir"),
        ],
        Mission::Smos => &[
            (CanonicalVar::Longitude, "lon"),
            (CanonicalVar::Latitude, "lat"),
            (CanonicalVar::Time, "measurement_time"),
            (CanonicalVar::WindSpeed, "wind_speed"),
        ],
        Mission::Smap => &[
            (CanonicalVar::Longitude, "lon"),
            (CanonicalVar::Latitude, "lat"),
            (CanonicalVar::Time, "time"),
            (CanonicalVar::WindSpeed, "wind"),
        ],
        Mission::Hy2 | Mission::Ascat => &[
            (CanonicalVar::Longitude, "lon"),
            (CanonicalVar::Latitude, "lat"),
            (CanonicalVar::Time, "time"),
            (CanonicalVar::WindSpeed, "wind_speed"),
            (CanonicalVar::WindDirection, "wind_dir"),
        ],
    };
    entries
        .iter()
        .map(|(k, v)| (*k, (*v).to_string()))
        .collect()
}

/// Variable holding minutes since midnight, for missions that store time that way.
pub fn minute_variable(mission: Mission) -> Option<&'static str> {
    match mission {
        Mission::Ws => Some("mingmt"),
        Mission::Smap => Some("minute"),
        Mission::Smos
        | Mission::Hy2
        | Mission::Ascat
        | Mission::Era5
        | Mission::Rs2
        | Mission::S1
        | Mission::Rcm => None,
    }
}

/// Day marker carried in the name of daily products that store minutes of day.
pub fn day_marker(mission: Mission, basename: &str) -> Option<NaiveDate> {
    match mission {
        Mission::Ws => {
            let token = basename.split('_').nth(1)?;
            parse_compact_day(token.split('v').next()?)
        }
        Mission::Smap => {
            let tokens: Vec<&str> = basename.split('_').collect();
            if tokens.len() < 7 {
                return None;
            }
            parse_compact_day(&tokens[4..7].concat())
        }
        Mission::Smos
        | Mission::Hy2
        | Mission::Ascat
        | Mission::Era5
        | Mission::Rs2
        | Mission::S1
        | Mission::Rcm => None,
    }
}

/// Acquisition span encoded in the product name, for missions whose names carry it.
///
/// `Ok(None)` means the mission's times live in the data, not in the name.
pub fn filename_time_span(
    mission: Mission,
    basename: &str,
) -> Result<Option<TimeWindow>, AdapterError> {
    let fail = |message: &str| AdapterError::FilenameTime {
        name: basename.to_string(),
        message: message.to_string(),
    };
    match mission {
        Mission::Rs2 | Mission::S1 | Mission::Rcm => sar_time_span(basename).map(Some),
        Mission::Era5 => {
            let last = basename
                .rsplit('_')
                .next()
                .ok_or_else(|| fail("no `_` separated token"))?;
            let day = parse_compact_day(last.split('.').next().unwrap_or_default())
                .ok_or_else(|| fail("last `_` token is not a YYYYMMDD day"))?;
            let midnight = day.and_hms_opt(0, 0, 0).ok_or_else(|| fail("invalid day"))?;
            let start = Utc.from_utc_datetime(&midnight);
            Ok(Some(TimeWindow::new(start, start + Duration::hours(23))))
        }
        Mission::Smos | Mission::Hy2 | Mission::Ascat | Mission::Ws | Mission::Smap => Ok(None),
    }
}

fn sar_time_span(basename: &str) -> Result<TimeWindow, AdapterError> {
    let fail = |message: String| AdapterError::FilenameTime {
        name: basename.to_string(),
        message,
    };
    let upper = basename.to_uppercase();
    let parse = |s: &str| {
        parse_compact_datetime(s).ok_or_else(|| fail(format!("`{}` is not YYYYMMDDTHHMMSS", s)))
    };
    if sar_level_from_name(basename) == Level::L2 {
        let tokens: Vec<&str> = upper.split('-').collect();
        if tokens.len() < 6 {
            return Err(fail("expected at least 6 `-` separated tokens".into()));
        }
        return Ok(TimeWindow::new(parse(tokens[4])?, parse(tokens[5])?));
    }
    let tokens: Vec<&str> = upper.split('_').collect();
    if upper.starts_with("S1") {
        if tokens.len() < 5 {
            return Err(fail("expected at least 5 `_` separated tokens".into()));
        }
        let n = tokens.len();
        return Ok(TimeWindow::new(parse(tokens[n - 5])?, parse(tokens[n - 4])?));
    }
    if upper.starts_with("RCM") || upper.starts_with("RS2") {
        if tokens.len() < 7 {
            return Err(fail("expected at least 7 `_` separated tokens".into()));
        }
        // Only the start is encoded; scenes last five minutes.
        let start = parse(&format!("{}{}", tokens[5], tokens[6]))?;
        return Ok(TimeWindow::new(start, start + Duration::minutes(5)));
    }
    Err(fail("not a RS2, RCM or S1 product".into()))
}

/// Sort and grouping keys of a SMOS product name: `(prefix, orbit, day, generation)`.
pub fn smos_generation_key(basename: &str) -> Option<(String, String, i64, i64)> {
    let tokens: Vec<&str> = basename.split('_').collect();
    let n = tokens.len();
    if n < 5 {
        return None;
    }
    let orbit = tokens[n - 5].to_string();
    let day = tokens[n - 4].parse().ok()?;
    let generation = tokens[n - 2].parse().ok()?;
    Some((tokens[..n - 2].join("_"), orbit, day, generation))
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1_L2: &str = "s1a-ew-owi-cm-20181009t142906-20181009t143110-000003-02A122_ll_gd.nc";

    #[test]
    fn detects_missions_from_names() {
        assert_eq!(detect_mission(S1_L2), Some(Mission::S1));
        assert_eq!(detect_mission("era_5-copernicus__20181009.nc"), Some(Mission::Era5));
        assert_eq!(
            detect_mission("SM_OPER_MIR_SCNFSW_20181009T000000_20181009T235959_300_001_7.nc"),
            Some(Mission::Smos)
        );
        assert_eq!(detect_mission("wsat_20181009v7.0.1.gz"), Some(Mission::Ws));
        assert_eq!(
            detect_mission("RSS_smap_wind_daily_2018_10_09_v01.0.nc"),
            Some(Mission::Smap)
        );
        assert_eq!(
            detect_mission("20181009_0600_HY_2B_L2B_wind.nc"),
            None,
            "the HY marker is the fourth token, not the third"
        );
        assert_eq!(detect_mission("a_b_c_HY_2B.nc"), Some(Mission::Hy2));
        assert_eq!(detect_mission("RCM2_OK_1234_5678_SC50MB_20200101_120000"), Some(Mission::Rcm));
        assert_eq!(detect_mission("landsat"), None);
    }

    #[test]
    fn sar_l2_times_come_from_dash_tokens() {
        let w = filename_time_span(Mission::S1, S1_L2).unwrap().unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2018, 10, 9, 14, 29, 6).unwrap());
        assert_eq!(w.stop, Utc.with_ymd_and_hms(2018, 10, 9, 14, 31, 10).unwrap());
    }

    #[test]
    fn s1_l1_times_come_from_trailing_tokens() {
        let name = "S1A_EW_GRDM_1SDH_20181009T142906_20181009T143110_024041_02A122_7E8B.SAFE";
        let w = filename_time_span(Mission::S1, name).unwrap().unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2018, 10, 9, 14, 29, 6).unwrap());
        assert_eq!(w.stop, Utc.with_ymd_and_hms(2018, 10, 9, 14, 31, 10).unwrap());
    }

    #[test]
    fn radarsat_l1_scene_lasts_five_minutes() {
        let name = "RS2_OK1234_PK5678_DK9_SCWA_20181009_142906_VV_VH_SGF";
        let w = filename_time_span(Mission::Rs2, name).unwrap().unwrap();
        assert_eq!(w.stop - w.start, Duration::minutes(5));
        assert_eq!(w.start, Utc.with_ymd_and_hms(2018, 10, 9, 14, 29, 6).unwrap());
    }

    #[test]
    fn era5_covers_the_day_hourly() {
        let w = filename_time_span(Mission::Era5, "era_5-copernicus__20181009.nc")
            .unwrap()
            .unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2018, 10, 9, 0, 0, 0).unwrap());
        assert_eq!(w.stop, Utc.with_ymd_and_hms(2018, 10, 9, 23, 0, 0).unwrap());
    }

    #[test]
    fn malformed_sar_name_is_an_adapter_error() {
        let res = filename_time_span(Mission::S1, "s1a-ew-owi.nc");
        assert!(matches!(res, Err(AdapterError::FilenameTime { .. })));
    }

    #[test]
    fn day_markers_for_minute_based_missions() {
        assert_eq!(
            day_marker(Mission::Ws, "wsat_20181009v7.0.1.gz"),
            NaiveDate::from_ymd_opt(2018, 10, 9)
        );
        assert_eq!(
            day_marker(Mission::Smap, "RSS_smap_wind_daily_2018_10_09_v01.0.nc"),
            NaiveDate::from_ymd_opt(2018, 10, 9)
        );
        assert_eq!(day_marker(Mission::Smos, "SM_x.nc"), None);
    }

    #[test]
    fn smos_generation_key_groups_by_prefix() {
        let a = smos_generation_key("SM_OPER_MIR_SCNFSW_A_20181009_300_001_7.nc").unwrap();
        let b = smos_generation_key("SM_OPER_MIR_SCNFSW_A_20181009_300_002_7.nc").unwrap();
        assert_eq!(a.0, b.0);
        assert_eq!(a.2, 20181009);
        assert!(b.3 > a.3);
    }
}
