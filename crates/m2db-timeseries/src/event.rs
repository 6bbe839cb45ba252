use chrono::{DateTime, Duration, Utc};
use m2db_store::Row;
use m2db_types::{Period, TimeId};
use serde::{Deserialize, Serialize};

use crate::error::{SeriesError, SeriesResult};

/// Joins a series id and an event type into the typed series key.
pub const TYPE_SEPARATOR: char = '!';

/// The key an event is stored under: `id`, or `id!type` when typed.
pub fn series_key(series_id: &str, kind: Option<&str>) -> String {
    match kind {
        Some(kind) => format!("{series_id}{TYPE_SEPARATOR}{kind}"),
        None => series_id.to_string(),
    }
}

/// One timestamped entry of a series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub series_id: String,
    pub kind: Option<String>,
    pub time: TimeId,
    pub payload: String,
}

impl Event {
    pub fn new(
        series_id: impl Into<String>,
        kind: Option<&str>,
        time: TimeId,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            series_id: series_id.into(),
            kind: kind.map(str::to_string),
            time,
            payload: payload.into(),
        }
    }

    /// An event stamped with a fresh id for the current instant.
    pub fn now(series_id: impl Into<String>, kind: Option<&str>, payload: impl Into<String>) -> Self {
        Self::new(series_id, kind, TimeId::now(), payload)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.time.timestamp()
    }

    pub fn period(&self) -> Period {
        Period::of(self.timestamp())
    }

    /// Keys this event is stored under: the bare key, then the typed one.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = vec![self.series_id.clone()];
        if let Some(kind) = &self.kind {
            keys.push(series_key(&self.series_id, Some(kind)));
        }
        keys
    }

    pub(crate) fn from_row(row: &Row) -> SeriesResult<Self> {
        let series_id = row.text("id")?.ok_or(SeriesError::MissingColumn("id"))?;
        let uuid = row.uuid("time")?.ok_or(SeriesError::MissingColumn("time"))?;
        Ok(Self {
            series_id,
            kind: row.text("type")?,
            time: TimeId::from_uuid(uuid)?,
            payload: row.text("data")?.unwrap_or_default(),
        })
    }
}

/// Time bounds of a query or delete. Open ends fall back to the series'
/// configured horizon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// The default horizon in both directions.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
        }
    }

    pub fn since(begin: DateTime<Utc>) -> Self {
        Self {
            begin: Some(begin),
            end: None,
        }
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            begin: None,
            end: Some(end),
        }
    }

    /// Fill open ends relative to `now`.
    pub(crate) fn resolve(
        &self,
        now: DateTime<Utc>,
        lookback: Duration,
        lookahead: Duration,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.begin.unwrap_or(now - lookback),
            self.end.unwrap_or(now + lookahead),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn typed_key_joins_with_separator() {
        assert_eq!(series_key("dev1", None), "dev1");
        assert_eq!(series_key("dev1", Some("loc")), "dev1!loc");
    }

    #[test]
    fn typed_event_has_two_keys() {
        let bare = Event::now("dev1", None, "{}");
        assert_eq!(bare.keys(), vec!["dev1".to_string()]);
        let typed = Event::now("dev1", Some("loc"), "{}");
        assert_eq!(typed.keys(), vec!["dev1".to_string(), "dev1!loc".to_string()]);
    }

    #[test]
    fn period_follows_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let e = Event::new("s", None, TimeId::at(t), "");
        assert_eq!(e.period(), Period::from_year_month(2024, 3).unwrap());
        assert_eq!(e.timestamp(), t);
    }

    #[test]
    fn open_range_uses_horizon() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let (b, e) = TimeRange::all().resolve(now, Duration::days(730), Duration::days(7));
        assert_eq!(b, now - Duration::days(730));
        assert_eq!(e, now + Duration::days(7));

        let fixed = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let (b, _) = TimeRange::since(fixed).resolve(now, Duration::days(1), Duration::days(1));
        assert_eq!(b, fixed);
    }
}
