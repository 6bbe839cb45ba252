use std::fmt;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Calendar-month partition index: `year * 12 + month` (month is 1-based, UTC).
///
/// Consecutive months map to consecutive integers, so stepping a scan one
/// month forward or backward is plain integer arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(i32);

impl Period {
    /// Wrap a raw period value as stored.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The period for a calendar year and 1-based month.
    pub fn from_year_month(year: i32, month: u32) -> Result<Self, TypeError> {
        if !(1..=12).contains(&month) {
            return Err(TypeError::InvalidPeriod(format!("month {month} out of range")));
        }
        Ok(Self(year * 12 + month as i32))
    }

    /// The period containing `time`.
    pub fn of(time: DateTime<Utc>) -> Self {
        Self(time.year() * 12 + time.month() as i32)
    }

    pub fn raw(&self) -> i32 {
        self.0
    }

    pub fn year(&self) -> i32 {
        (self.0 - 1).div_euclid(12)
    }

    /// 1-based month.
    pub fn month(&self) -> u32 {
        ((self.0 - 1).rem_euclid(12) + 1) as u32
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn prev(&self) -> Self {
        Self(self.0 - 1)
    }

    /// First instant of the month.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year(), self.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Inclusive range of periods between two instants, in ascending order.
    pub fn span(from: DateTime<Utc>, to: DateTime<Utc>) -> impl DoubleEndedIterator<Item = Period> {
        let (lo, hi) = (Self::of(from).0, Self::of(to).0);
        (lo..=hi).map(Period)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn wire_value_is_year_times_twelve_plus_month() {
        assert_eq!(Period::of(at(2014, 1, 15)).raw(), 2014 * 12 + 1);
        assert_eq!(Period::of(at(2014, 12, 31)).raw(), 2014 * 12 + 12);
    }

    #[test]
    fn december_to_january_is_contiguous() {
        let dec = Period::of(at(2020, 12, 1));
        let jan = Period::of(at(2021, 1, 1));
        assert_eq!(dec.next(), jan);
        assert_eq!(jan.prev(), dec);
        assert_eq!(jan.year(), 2021);
        assert_eq!(jan.month(), 1);
        assert_eq!(dec.month(), 12);
    }

    #[test]
    fn start_is_first_of_month() {
        let p = Period::from_year_month(2023, 2).unwrap();
        assert_eq!(p.start(), Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(p.to_string(), "2023-02");
    }

    #[test]
    fn span_is_inclusive() {
        let months: Vec<String> = Period::span(at(2022, 11, 3), at(2023, 2, 1))
            .map(|p| p.to_string())
            .collect();
        assert_eq!(months, ["2022-11", "2022-12", "2023-01", "2023-02"]);
        assert_eq!(Period::span(at(2023, 2, 1), at(2022, 11, 3)).count(), 0);
    }

    #[test]
    fn rejects_bad_month() {
        assert!(Period::from_year_month(2020, 0).is_err());
        assert!(Period::from_year_month(2020, 13).is_err());
    }
}
