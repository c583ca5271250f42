//! Tests for the clock seam, timezones and calendar months

use chrono::{NaiveDate, TimeZone, Utc};
use core_kernel::{Clock, FixedClock, MonthKey, SystemClock, TemporalError, Timezone};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

mod clocks {
    use super::*;

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = FixedClock::on(date(2024, 6, 15));
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.today(), date(2024, 6, 15));
    }

    #[test]
    fn test_fixed_clock_set() {
        let clock = FixedClock::on(date(2024, 6, 15));
        clock.set(Utc.with_ymd_and_hms(2025, 1, 2, 9, 30, 0).unwrap());
        assert_eq!(clock.today(), date(2025, 1, 2));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}

mod timezones {
    use super::*;

    #[test]
    fn test_local_date_crosses_midnight() {
        let tz: Timezone = "Pacific/Auckland".parse().unwrap();
        // 20:00 UTC on Jan 1 is already Jan 2 in Auckland
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        assert_eq!(tz.local_date(instant), date(2024, 1, 2));
    }

    #[test]
    fn test_today_uses_clock() {
        let tz: Timezone = "America/New_York".parse().unwrap();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap());
        assert_eq!(tz.today(&clock), date(2024, 3, 9));
    }

    #[test]
    fn test_invalid_timezone() {
        let err = "Nowhere/Special".parse::<Timezone>().unwrap_err();
        assert_eq!(err, TemporalError::InvalidTimezone("Nowhere/Special".to_string()));
    }

    #[test]
    fn test_timezone_serde_round_trip() {
        let tz: Timezone = "Europe/Berlin".parse().unwrap();
        let json = serde_json::to_string(&tz).unwrap();
        assert_eq!(json, "\"Europe/Berlin\"");
    }

    #[test]
    fn test_default_is_utc() {
        assert_eq!(Timezone::default().name(), "UTC");
    }
}

mod months {
    use super::*;

    #[test]
    fn test_month_of_date() {
        assert_eq!(MonthKey::of(date(2024, 11, 30)).to_string(), "2024-11");
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(MonthKey::new(2024, 13).is_err());
        assert!(MonthKey::new(2024, 0).is_err());
    }

    #[test]
    fn test_trailing_twelve_months() {
        let months = MonthKey::new(2024, 6).unwrap().trailing(12);
        assert_eq!(months.len(), 12);
        assert_eq!(months.first().unwrap().to_string(), "2023-07");
        assert_eq!(months.last().unwrap().to_string(), "2024-06");
    }

    #[test]
    fn test_trailing_zero_is_empty() {
        assert!(MonthKey::new(2024, 6).unwrap().trailing(0).is_empty());
    }

    #[test]
    fn test_first_day() {
        assert_eq!(MonthKey::new(2024, 2).unwrap().first_day().unwrap(), date(2024, 2, 1));
    }
}
