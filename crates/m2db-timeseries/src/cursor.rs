use std::fmt;
use std::sync::Arc;
use std::vec;

use m2db_store::{CmpOp, Order, Row, Select, Session, Statement, Value};
use m2db_types::{Period, TimeId};
use tracing::trace;

use crate::error::SeriesResult;
use crate::event::Event;
use crate::schema::EVENTS_TABLE;

/// Which periods a cursor visits, in visiting order.
#[derive(Debug)]
pub(crate) enum PeriodPlan {
    /// Every period between two bounds, stepping one month at a time.
    Range {
        next: Option<Period>,
        last: Period,
        order: Order,
    },
    /// An explicit list, already in visiting order.
    Listed(vec::IntoIter<Period>),
}

impl PeriodPlan {
    /// Every period from `low` to `high` inclusive, ascending for `Asc`
    /// and descending for `Desc`. Empty when the bounds are crossed.
    pub(crate) fn range(low: Period, high: Period, order: Order) -> Self {
        let (next, last) = match order {
            Order::Asc => (low, high),
            Order::Desc => (high, low),
        };
        let crossed = low > high;
        Self::Range {
            next: (!crossed).then_some(next),
            last,
            order,
        }
    }

    fn advance(&mut self) -> Option<Period> {
        match self {
            Self::Range { next, last, order } => {
                let current = (*next)?;
                *next = if current == *last {
                    None
                } else {
                    Some(match order {
                        Order::Asc => current.next(),
                        Order::Desc => current.prev(),
                    })
                };
                Some(current)
            }
            Self::Listed(periods) => periods.next(),
        }
    }
}

enum CursorState {
    /// Rows fetched from one period and not yet yielded.
    AtPeriod(Period, vec::IntoIter<Row>),
    /// The current period is drained; the next one must be fetched.
    Exhausted,
    Done,
}

/// Lazy, forward-only sequence of events spanning monthly partitions.
///
/// Each partition is fetched with one bounded range query only when the
/// previous one is drained, so stopping early never touches the remaining
/// months. A store failure is yielded once and ends the sequence. To
/// restart, build a new cursor.
pub struct EventCursor {
    session: Arc<Session>,
    key: String,
    begin: TimeId,
    end: TimeId,
    order: Order,
    plan: PeriodPlan,
    state: CursorState,
    visited: usize,
}

impl EventCursor {
    pub(crate) fn new(
        session: Arc<Session>,
        key: String,
        begin: TimeId,
        end: TimeId,
        order: Order,
        plan: PeriodPlan,
    ) -> Self {
        Self {
            session,
            key,
            begin,
            end,
            order,
            plan,
            state: CursorState::Exhausted,
            visited: 0,
        }
    }

    /// Series key being scanned.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// How many partitions have been queried so far.
    pub fn periods_visited(&self) -> usize {
        self.visited
    }

    /// The period whose rows are currently being yielded.
    pub fn current_period(&self) -> Option<Period> {
        match &self.state {
            CursorState::AtPeriod(period, _) => Some(*period),
            _ => None,
        }
    }

    fn statement(&self) -> Statement {
        Select::new(EVENTS_TABLE)
            .columns(["id", "type", "time", "data"])
            .where_eq("series")
            .where_eq("period")
            .filter("time", CmpOp::Gt)
            .filter("time", CmpOp::Lt)
            .order_by("time", self.order)
            .into()
    }

    fn fetch(&mut self, period: Period) -> SeriesResult<vec::IntoIter<Row>> {
        self.visited += 1;
        let values = vec![
            Value::from(self.key.as_str()),
            period.raw().into(),
            Value::TimeUuid(*self.begin.as_uuid()),
            Value::TimeUuid(*self.end.as_uuid()),
        ];
        let rows = self.session.run(&self.statement(), values)?;
        trace!(key = %self.key, %period, rows = rows.len(), "period fetched");
        Ok(rows.into_iter())
    }
}

impl Iterator for EventCursor {
    type Item = SeriesResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                CursorState::AtPeriod(_, rows) => match rows.next() {
                    Some(row) => return Some(Event::from_row(&row)),
                    None => self.state = CursorState::Exhausted,
                },
                CursorState::Exhausted => {
                    let Some(period) = self.plan.advance() else {
                        self.state = CursorState::Done;
                        continue;
                    };
                    match self.fetch(period) {
                        Ok(rows) => self.state = CursorState::AtPeriod(period, rows),
                        Err(e) => {
                            self.state = CursorState::Done;
                            return Some(Err(e));
                        }
                    }
                }
                CursorState::Done => return None,
            }
        }
    }
}

impl fmt::Debug for EventCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCursor")
            .field("key", &self.key)
            .field("order", &self.order)
            .field("current_period", &self.current_period())
            .field("visited", &self.visited)
            .finish()
    }
}
