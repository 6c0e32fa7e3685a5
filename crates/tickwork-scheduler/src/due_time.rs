//! Convert a wall-clock `HH:mm` into the delay until it next occurs.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone};
use regex::Regex;

use crate::DueTimeError;

static TIME_OF_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").unwrap());

/// Parse a strict 24-hour `HH:mm` string.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, DueTimeError> {
    let invalid = || DueTimeError::InvalidFormat(input.to_string());
    let caps = TIME_OF_DAY_RE.captures(input).ok_or_else(invalid)?;
    let hour = caps[1].parse::<u32>().map_err(|_| invalid())?;
    let minute = caps[2].parse::<u32>().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Delay from `now` until `time_of_day` next occurs in `now`'s time zone.
///
/// If today's occurrence has already passed the target rolls over by 24
/// hours. An occurrence exactly at `now` yields zero.
pub fn duration_until<Tz: TimeZone>(
    time_of_day: &str,
    now: &DateTime<Tz>,
) -> Result<Duration, DueTimeError> {
    let time = parse_time_of_day(time_of_day)?;
    let local = now.date_naive().and_time(time);
    let candidate = now
        .timezone()
        .from_local_datetime(&local)
        .earliest()
        .ok_or_else(|| DueTimeError::NonexistentLocalTime(time_of_day.to_string()))?;

    let target = if candidate < *now {
        candidate + TimeDelta::hours(24)
    } else {
        candidate
    };

    let delta = target.naive_utc() - now.naive_utc();
    Ok(delta.to_std().unwrap_or(Duration::ZERO))
}

/// [`duration_until`] against the local wall clock.
pub fn duration_from_now(time_of_day: &str) -> Result<Duration, DueTimeError> {
    duration_until(time_of_day, &Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, h, m, 0).unwrap()
    }

    #[test]
    fn later_today_is_the_gap() {
        let d = duration_until("09:00", &at(8, 0)).unwrap();
        assert_eq!(d, Duration::from_secs(3600));
    }

    #[test]
    fn passed_today_rolls_to_tomorrow() {
        let d = duration_until("09:00", &at(10, 0)).unwrap();
        assert_eq!(d, Duration::from_secs(23 * 3600));
    }

    #[test]
    fn exactly_now_is_zero() {
        assert_eq!(duration_until("09:00", &at(9, 0)).unwrap(), Duration::ZERO);
    }

    #[test]
    fn seconds_into_the_minute_still_roll_over() {
        let now = Utc.with_ymd_and_hms(2024, 7, 15, 9, 0, 30).unwrap();
        let d = duration_until("09:00", &now).unwrap();
        assert_eq!(d, Duration::from_secs(24 * 3600 - 30));
    }

    #[test]
    fn midnight_edges() {
        assert_eq!(
            duration_until("00:00", &at(23, 59)).unwrap(),
            Duration::from_secs(60)
        );
        assert_eq!(
            duration_until("23:59", &at(0, 0)).unwrap(),
            Duration::from_secs(23 * 3600 + 59 * 60)
        );
    }

    #[test]
    fn uses_the_zone_of_now() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        // 08:00 at +02:00 is 06:00 UTC.
        let now = tz.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).unwrap();
        assert_eq!(
            duration_until("09:30", &now).unwrap(),
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "9:00", "09:60", "24:00", "09:0", "0900", "09-00", " 09:00", "09:00 ", "", "ab:cd",
            "09:00:00", "٠٩:٠٠",
        ] {
            assert_eq!(
                duration_until(bad, &at(8, 0)),
                Err(DueTimeError::InvalidFormat(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_accepts_bounds() {
        assert_eq!(
            parse_time_of_day("00:00").unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("23:59").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn from_now_accepts_valid_input() {
        let d = duration_from_now("12:00");
        // The local zone may skip this time on a DST day; anything else is in range.
        if let Ok(d) = d {
            assert!(d <= Duration::from_secs(24 * 3600));
        }
        assert!(duration_from_now("12:60").is_err());
    }

    proptest! {
        #[test]
        fn result_lands_on_the_requested_time(
            now_h in 0u32..24, now_m in 0u32..60, now_s in 0u32..60,
            h in 0u32..24, m in 0u32..60,
        ) {
            let now = Utc.with_ymd_and_hms(2024, 2, 28, now_h, now_m, now_s).unwrap();
            let input = format!("{h:02}:{m:02}");
            let d = duration_until(&input, &now).unwrap();

            prop_assert!(d < Duration::from_secs(24 * 3600));
            let target = now + TimeDelta::from_std(d).unwrap();
            prop_assert_eq!((target.hour(), target.minute(), target.second()), (h, m, 0));
        }

        #[test]
        fn out_of_range_values_are_rejected(h in 24u32..100, m in 60u32..100) {
            let bad_hour = format!("{h:02}:00");
            let bad_minute = format!("00:{m:02}");
            prop_assert!(parse_time_of_day(&bad_hour).is_err());
            prop_assert!(parse_time_of_day(&bad_minute).is_err());
        }
    }
}
