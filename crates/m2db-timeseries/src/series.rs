use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use m2db_store::{provision_all, Delete, Insert, Order, Select, Session, Statement, Value};
use m2db_types::{Period, TimeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::{EventCursor, PeriodPlan};
use crate::editor::EventEditor;
use crate::error::SeriesResult;
use crate::event::{series_key, Event, TimeRange};
use crate::schema::{definitions, EVENTS_TABLE, PERIOD_INDEX_TABLE};

/// Time-series configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// How far back an open range begins, in days.
    pub lookback_days: u32,
    /// How far ahead an open range ends, in days.
    pub lookahead_days: u32,
    /// Record each saved event's period in the period index.
    pub index_periods: bool,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            lookback_days: 730,
            lookahead_days: 7,
            index_periods: true,
        }
    }
}

impl SeriesConfig {
    pub fn lookback(&self) -> Duration {
        Duration::days(i64::from(self.lookback_days))
    }

    pub fn lookahead(&self) -> Duration {
        Duration::days(i64::from(self.lookahead_days))
    }
}

/// Monthly-partitioned event log.
///
/// Cheap to clone; clones share the session.
#[derive(Clone, Debug)]
pub struct TimeSeries {
    session: Arc<Session>,
    config: SeriesConfig,
}

impl TimeSeries {
    pub fn new(session: Arc<Session>, config: SeriesConfig) -> Self {
        Self { session, config }
    }

    /// Create or migrate the event and period index tables.
    pub fn provision(&self) -> SeriesResult<()> {
        provision_all(&self.session, &definitions())?;
        Ok(())
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    fn resolve(&self, range: TimeRange) -> (DateTime<Utc>, DateTime<Utc>) {
        range.resolve(Utc::now(), self.config.lookback(), self.config.lookahead())
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Store an event under its bare key and, when typed, its typed key.
    ///
    /// Saving again with the same series, type and time replaces the
    /// payload. The period index is updated afterwards on the session's
    /// detached executor; failures there are logged, never returned.
    pub fn save(&self, event: &Event) -> SeriesResult<()> {
        let period = event.period();
        let keys = event.keys();
        let insert: Statement = Insert::new(EVENTS_TABLE)
            .columns(["series", "period", "time", "id", "type", "data"])
            .into();
        for key in &keys {
            self.session.run(
                &insert,
                vec![
                    key.as_str().into(),
                    period.raw().into(),
                    time_value(event.time),
                    event.series_id.as_str().into(),
                    event.kind.as_deref().into(),
                    event.payload.as_str().into(),
                ],
            )?;
        }

        if self.config.index_periods {
            let index: Statement = Insert::new(PERIOD_INDEX_TABLE)
                .columns(["series", "period"])
                .into();
            for key in keys {
                self.session
                    .run_detached(&index, vec![key.into(), period.raw().into()]);
            }
        }
        debug!(series = %event.series_id, kind = ?event.kind, time = %event.time, "event saved");
        Ok(())
    }

    /// Save a new event stamped with the current instant.
    pub fn append(&self, series_id: &str, kind: Option<&str>, payload: &str) -> SeriesResult<Event> {
        let event = Event::now(series_id, kind, payload);
        self.save(&event)?;
        Ok(event)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// The event with exactly this id, if stored under the series key.
    pub fn get(&self, series_id: &str, kind: Option<&str>, time: TimeId) -> SeriesResult<Option<Event>> {
        let select = Select::new(EVENTS_TABLE)
            .columns(["id", "type", "time", "data"])
            .where_eq("series")
            .where_eq("period")
            .where_eq("time");
        let period = Period::of(time.timestamp());
        let rows = self.session.run(
            &select.into(),
            vec![
                series_key(series_id, kind).into(),
                period.raw().into(),
                time_value(time),
            ],
        )?;
        rows.first().map(Event::from_row).transpose()
    }

    /// Events inside `range`, visiting every month between its bounds one
    /// partition at a time. Bounds are compared at millisecond precision. Does not depend on the period index.
    pub fn query(&self, series_id: &str, kind: Option<&str>, range: TimeRange, order: Order) -> EventCursor {
        let (begin, end) = self.resolve(range);
        let plan = PeriodPlan::range(Period::of(begin), Period::of(end), order);
        self.cursor(series_id, kind, begin, end, order, plan)
    }

    /// Like [`query`](Self::query), but only visits months the period index
    /// lists. Events whose index write was lost are not returned.
    pub fn query_indexed(
        &self,
        series_id: &str,
        kind: Option<&str>,
        range: TimeRange,
        order: Order,
    ) -> SeriesResult<EventCursor> {
        let (begin, end) = self.resolve(range);
        let (low, high) = (Period::of(begin), Period::of(end));
        let mut periods: Vec<Period> = self
            .periods(series_id, kind)?
            .into_iter()
            .filter(|p| (low..=high).contains(p))
            .collect();
        if order == Order::Desc {
            periods.reverse();
        }
        let plan = PeriodPlan::Listed(periods.into_iter());
        Ok(self.cursor(series_id, kind, begin, end, order, plan))
    }

    /// Every event of one calendar month.
    pub fn query_period(&self, series_id: &str, kind: Option<&str>, period: Period, order: Order) -> EventCursor {
        let begin = period.start();
        let end = period.next().start() - Duration::milliseconds(1);
        let plan = PeriodPlan::range(period, period, order);
        self.cursor(series_id, kind, begin, end, order, plan)
    }

    fn cursor(
        &self,
        series_id: &str,
        kind: Option<&str>,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        order: Order,
        plan: PeriodPlan,
    ) -> EventCursor {
        EventCursor::new(
            Arc::clone(&self.session),
            series_key(series_id, kind),
            TimeId::min_for(begin),
            TimeId::max_for(end),
            order,
            plan,
        )
    }

    /// Months the period index lists for the series key, ascending.
    pub fn periods(&self, series_id: &str, kind: Option<&str>) -> SeriesResult<Vec<Period>> {
        let select = Select::new(PERIOD_INDEX_TABLE)
            .columns(["period"])
            .where_eq("series");
        let rows = self
            .session
            .run(&select.into(), vec![series_key(series_id, kind).into()])?;
        let mut periods = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(raw) = row.int("period")? {
                periods.push(Period::from_raw(raw));
            }
        }
        Ok(periods)
    }

    // ---------------------------------------------------------------------
    // Deletes
    // ---------------------------------------------------------------------

    /// Delete one event from every key it is stored under.
    pub fn delete(&self, event: &Event) -> SeriesResult<()> {
        let delete: Statement = Delete::new(EVENTS_TABLE)
            .where_eq("series")
            .where_eq("period")
            .where_eq("time")
            .into();
        let period = event.period();
        for key in event.keys() {
            self.session.run(
                &delete,
                vec![key.into(), period.raw().into(), time_value(event.time)],
            )?;
        }
        Ok(())
    }

    /// Read every event inside `range` and delete each one. Exact to the
    /// millisecond. Returns how many events were deleted.
    pub fn delete_precise(&self, series_id: &str, kind: Option<&str>, range: TimeRange) -> SeriesResult<usize> {
        let mut deleted = 0;
        for event in self.query(series_id, kind, range, Order::Desc) {
            self.delete(&event?)?;
            deleted += 1;
        }
        debug!(series = series_id, kind = ?kind, deleted, "events deleted precisely");
        Ok(deleted)
    }

    /// Drop whole monthly partitions overlapping `range` without reading
    /// them, along with their period index entries.
    ///
    /// Month granular: events in the first and last month but outside the
    /// range are deleted too. With a type, the bare partitions of those
    /// months go as well, including events of other types. Returns the
    /// number of months dropped.
    pub fn delete_roughly(&self, series_id: &str, kind: Option<&str>, range: TimeRange) -> SeriesResult<usize> {
        let (begin, end) = self.resolve(range);
        let periods: Vec<Period> = Period::span(begin, end).collect();
        self.drop_periods(series_id, kind, &periods)?;
        debug!(series = series_id, kind = ?kind, months = periods.len(), "periods deleted");
        Ok(periods.len())
    }

    /// Drop every month of the default horizon plus any month the period
    /// index still lists.
    pub fn delete_all(&self, series_id: &str, kind: Option<&str>) -> SeriesResult<usize> {
        let (begin, end) = self.resolve(TimeRange::all());
        let mut periods: BTreeSet<Period> = Period::span(begin, end).collect();
        periods.extend(self.periods(series_id, None)?);
        if kind.is_some() {
            periods.extend(self.periods(series_id, kind)?);
        }
        let periods: Vec<Period> = periods.into_iter().collect();
        self.drop_periods(series_id, kind, &periods)?;
        debug!(series = series_id, kind = ?kind, months = periods.len(), "series deleted");
        Ok(periods.len())
    }

    fn drop_periods(&self, series_id: &str, kind: Option<&str>, periods: &[Period]) -> SeriesResult<()> {
        let mut keys = vec![series_id.to_string()];
        if kind.is_some() {
            keys.push(series_key(series_id, kind));
        }
        let partition: Statement = Delete::new(EVENTS_TABLE)
            .where_eq("series")
            .where_eq("period")
            .into();
        let index: Statement = Delete::new(PERIOD_INDEX_TABLE)
            .where_eq("series")
            .where_eq("period")
            .into();
        for period in periods {
            for key in &keys {
                let values = vec![Value::from(key.as_str()), period.raw().into()];
                self.session.run(&partition, values.clone())?;
                self.session.run(&index, values)?;
            }
        }
        Ok(())
    }

    /// Open an event's JSON payload for field edits.
    pub fn editor(&self, event: Event) -> SeriesResult<EventEditor<'_>> {
        EventEditor::open(self, event)
    }
}

fn time_value(time: TimeId) -> Value {
    Value::TimeUuid(*time.as_uuid())
}
