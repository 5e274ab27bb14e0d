use chrono::{DateTime, Duration, NaiveDate, Utc};

const ISO_DATE: &str = "%Y-%m-%d";
const STATEMENT_HEADER_DATE: &str = "%b %d, %Y";

/// Resolves the "today" that bounds the most recent fundamentals interval.
/// An explicit `YYYY-MM-DD` wins; otherwise the UTC calendar date of `now_utc`.
pub fn resolve_today(today_arg: Option<&str>, now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    if let Some(s) = today_arg {
        return Ok(NaiveDate::parse_from_str(s.trim(), ISO_DATE)?);
    }
    Ok(now_utc.date_naive())
}

/// Statement column headers come either as `2023-12-31` or `Dec 31, 2023`.
pub fn parse_period_header(header: &str) -> Option<NaiveDate> {
    let s = header.trim();
    NaiveDate::parse_from_str(s, ISO_DATE)
        .or_else(|_| NaiveDate::parse_from_str(s, STATEMENT_HEADER_DATE))
        .ok()
}

/// Days during which one report's fundamentals are in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityInterval {
    pub start: NaiveDate,
    pub end: IntervalEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalEnd {
    /// Superseded by the next report on this date.
    Exclusive(NaiveDate),
    /// No newer report: valid through this date.
    Inclusive(NaiveDate),
}

impl ValidityInterval {
    pub fn new(start: NaiveDate, next_report: Option<NaiveDate>, today: NaiveDate) -> Self {
        let end = match next_report {
            Some(next) => IntervalEnd::Exclusive(next),
            None => IntervalEnd::Inclusive(today),
        };
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start
            && match self.end {
                IntervalEnd::Exclusive(end) => date < end,
                IntervalEnd::Inclusive(end) => date <= end,
            }
    }

    /// Every calendar day in the interval, ascending. Empty when the end precedes the start.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        std::iter::successors(Some(self.start), |d| d.checked_add_signed(Duration::days(1)))
            .take_while(move |d| self.contains(*d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, ISO_DATE).unwrap()
    }

    #[test]
    fn explicit_today_overrides_clock() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        assert_eq!(resolve_today(Some("2024-03-01"), now).unwrap(), d("2024-03-01"));
        assert_eq!(resolve_today(None, now).unwrap(), d("2026-01-05"));
        assert!(resolve_today(Some("03/01/2024"), now).is_err());
    }

    #[test]
    fn parses_both_header_styles() {
        assert_eq!(parse_period_header("Dec 31, 2023"), Some(d("2023-12-31")));
        assert_eq!(parse_period_header("2023-12-31"), Some(d("2023-12-31")));
        assert_eq!(parse_period_header("TTM"), None);
    }

    #[test]
    fn closed_interval_excludes_next_report_date() {
        let iv = ValidityInterval::new(d("2024-01-01"), Some(d("2024-01-04")), d("2024-12-31"));
        let days: Vec<_> = iv.days().collect();
        assert_eq!(days, vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03")]);
    }

    #[test]
    fn open_interval_includes_today() {
        let iv = ValidityInterval::new(d("2024-01-01"), None, d("2024-01-03"));
        assert_eq!(iv.days().count(), 3);
        assert!(iv.contains(d("2024-01-03")));
        assert!(!iv.contains(d("2024-01-04")));
    }

    #[test]
    fn report_after_today_has_no_days() {
        let iv = ValidityInterval::new(d("2024-02-01"), None, d("2024-01-31"));
        assert_eq!(iv.days().count(), 0);
    }
}
