
use chrono::{Duration, NaiveDate};


/// This is the standard way of converting a date to a daily bucket key in apptime.
pub fn date_to_bucket_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Iterates over the trailing `days` calendar days ending at `today`, inclusive.
pub fn trailing_days(today: NaiveDate, days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..days as i64).map(move |offset| today - Duration::days(offset))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{date_to_bucket_key, trailing_days};

    #[test]
    fn bucket_key_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(date_to_bucket_key(date), "2026-03-07");
    }

    #[test]
    fn trailing_days_includes_today_and_goes_backwards() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let days = trailing_days(today, 3).collect::<Vec<_>>();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            ]
        );
    }
}
