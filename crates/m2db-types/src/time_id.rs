use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

use crate::error::TypeError;

/// Largest same-millisecond counter that fits the 12 bits after the version.
const MAX_COUNTER: u16 = 0x0FFF;

/// Largest millisecond value representable in the 48-bit timestamp field.
const MAX_MILLIS: u64 = (1 << 48) - 1;

/// Time-ordered unique identifier for time-series events.
///
/// Laid out as a UUID v7: a 48-bit big-endian Unix millisecond timestamp,
/// then a 12-bit counter, then 62 random bits. Byte order equals time
/// order, so the derived `Ord` sorts identifiers chronologically and the
/// counter plus random tail keeps same-instant identifiers distinct.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeId(Uuid);

impl TimeId {
    /// A fresh identifier for the current instant, strictly greater than
    /// any identifier previously returned by `now()` in this process.
    pub fn now() -> Self {
        static PROCESS: TimeIdGenerator = TimeIdGenerator::new();
        PROCESS.next()
    }

    /// A fresh identifier at an explicit instant.
    ///
    /// Identifiers minted this way for the same millisecond are unique but
    /// carry no order among themselves; use a [`TimeIdGenerator`] when
    /// same-millisecond order matters.
    pub fn at(time: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let counter = (rng.next_u32() as u16) & MAX_COUNTER;
        let mut tail = [0u8; 8];
        rng.fill_bytes(&mut tail);
        Self::compose(millis_of(time), counter, &tail)
    }

    /// The smallest identifier that can exist for the millisecond of `time`.
    pub fn min_for(time: DateTime<Utc>) -> Self {
        Self::compose(millis_of(time), 0, &[0x00; 8])
    }

    /// The largest identifier that can exist for the millisecond of `time`.
    pub fn max_for(time: DateTime<Utc>) -> Self {
        Self::compose(millis_of(time), MAX_COUNTER, &[0xFF; 8])
    }

    /// Wrap an existing UUID, rejecting anything that is not version 7.
    pub fn from_uuid(uuid: Uuid) -> Result<Self, TypeError> {
        match uuid.get_version_num() {
            7 => Ok(Self(uuid)),
            other => Err(TypeError::NotTimeOrdered(other)),
        }
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Milliseconds since the Unix epoch encoded in the identifier.
    pub fn timestamp_millis(&self) -> u64 {
        let bytes = self.0.as_bytes();
        bytes[..6]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    /// The instant encoded in the identifier.
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_millis() as i64).unwrap_or_default()
    }

    fn compose(millis: u64, counter: u16, tail: &[u8; 8]) -> Self {
        let mut random = [0u8; 10];
        random[0] = ((counter >> 8) as u8) & 0x0F;
        random[1] = counter as u8;
        random[2..].copy_from_slice(tail);
        Self(Builder::from_unix_timestamp_millis(millis.min(MAX_MILLIS), &random).into_uuid())
    }
}

/// Milliseconds since the epoch, clamped into the encodable range.
fn millis_of(time: DateTime<Utc>) -> u64 {
    time.timestamp_millis().clamp(0, MAX_MILLIS as i64) as u64
}

impl fmt::Debug for TimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeId({}@{})", self.0, self.timestamp_millis())
    }
}

impl fmt::Display for TimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TimeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(|e| TypeError::InvalidTimeId(e.to_string()))?;
        Self::from_uuid(uuid)
    }
}

impl From<TimeId> for Uuid {
    fn from(id: TimeId) -> Self {
        id.0
    }
}

struct GeneratorState {
    last_millis: u64,
    counter: u16,
}

/// Monotonic [`TimeId`] source.
///
/// Uses the same rule as a hybrid logical clock: the millisecond component
/// is `max(wall_clock, last)`, and the counter increments while the
/// millisecond does not move. When the counter overflows, the millisecond
/// is pushed one step forward.
pub struct TimeIdGenerator {
    state: Mutex<GeneratorState>,
}

impl TimeIdGenerator {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                last_millis: 0,
                counter: 0,
            }),
        }
    }

    /// Next identifier for the current wall-clock instant.
    pub fn next(&self) -> TimeId {
        self.next_at_millis(millis_of(Utc::now()))
    }

    fn next_at_millis(&self, wall: u64) -> TimeId {
        let (millis, counter) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if wall > state.last_millis {
                state.last_millis = wall;
                state.counter = 0;
            } else if state.counter == MAX_COUNTER {
                state.last_millis += 1;
                state.counter = 0;
            } else {
                state.counter += 1;
            }
            (state.last_millis, state.counter)
        };
        let mut tail = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut tail);
        TimeId::compose(millis, counter, &tail)
    }
}

impl Default for TimeIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimeIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeIdGenerator").finish_non_exhaustive()
    }
}
