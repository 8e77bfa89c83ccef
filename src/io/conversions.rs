//! Time conversions shared by mission adapters.
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Fold a minutes-since-midnight offset with the product's day marker into an
/// absolute UTC timestamp. Fractional minutes are kept to the millisecond.
///
/// Returns `None` for non-finite offsets.
pub fn fold_minutes_of_day(day: NaiveDate, minutes: f64) -> Option<DateTime<Utc>> {
    if !minutes.is_finite() {
        return None;
    }
    let midnight = day.and_hms_opt(0, 0, 0)?;
    let millis = (minutes * 60_000.0).round() as i64;
    Some(Utc.from_utc_datetime(&midnight) + Duration::milliseconds(millis))
}

/// Seconds since the Unix epoch as a UTC timestamp; `None` for NaN or out of range.
pub fn epoch_seconds_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

pub fn utc_to_epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9
}

/// Parse a compact `YYYYMMDDHHMMSS` timestamp (a `T` separator is tolerated).
pub fn parse_compact_datetime(s: &str) -> Option<DateTime<Utc>> {
    let cleaned: String = s.chars().filter(|c| *c != 'T' && *c != 't').collect();
    if cleaned.len() != 14 {
        return None;
    }
    NaiveDateTime::parse_from_str(&cleaned, "%Y%m%d%H%M%S")
        .ok()
        .map(|n| Utc.from_utc_datetime(&n))
}

/// Parse a compact `YYYYMMDD` day.
pub fn parse_compact_day(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_minutes_onto_day() {
        let day = NaiveDate::from_ymd_opt(2018, 10, 9).unwrap();
        let t = fold_minutes_of_day(day, 869.5).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2018, 10, 9, 14, 29, 30).unwrap());
    }

    #[test]
    fn folding_past_midnight_rolls_the_day() {
        let day = NaiveDate::from_ymd_opt(2018, 12, 31).unwrap();
        let t = fold_minutes_of_day(day, 1445.0).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2019, 1, 1, 0, 5, 0).unwrap());
    }

    #[test]
    fn folding_nan_yields_none() {
        let day = NaiveDate::from_ymd_opt(2018, 10, 9).unwrap();
        assert!(fold_minutes_of_day(day, f64::NAN).is_none());
    }

    #[test]
    fn compact_datetime_accepts_t_separator() {
        let t = parse_compact_datetime("20181009T142906").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2018, 10, 9, 14, 29, 6).unwrap());
        assert!(parse_compact_datetime("2018100914").is_none());
    }

    #[test]
    fn epoch_seconds_round_trip_through_utc() {
        let t = Utc.with_ymd_and_hms(2018, 10, 9, 14, 29, 6).unwrap();
        assert_eq!(epoch_seconds_to_utc(utc_to_epoch_seconds(t)), Some(t));
    }
}
