use chrono::{DateTime, Utc};
use m2db_types::TimeId;
use serde_json::{Map, Value as JsonValue};

use crate::error::{SeriesError, SeriesResult};
use crate::event::Event;
use crate::series::TimeSeries;

/// Field-level editor for an event whose payload is a JSON object.
///
/// Saving writes the event back under the same series, type and time id,
/// replacing its payload in place rather than appending a new event.
#[derive(Debug)]
pub struct EventEditor<'a> {
    series: &'a TimeSeries,
    event: Event,
    fields: Map<String, JsonValue>,
    modified: bool,
}

impl<'a> EventEditor<'a> {
    /// An empty payload opens as an empty object.
    pub(crate) fn open(series: &'a TimeSeries, event: Event) -> SeriesResult<Self> {
        let fields = if event.payload.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str(&event.payload) {
                Ok(JsonValue::Object(fields)) => fields,
                Ok(other) => return Err(SeriesError::Payload(format!("found {other}"))),
                Err(e) => return Err(SeriesError::Payload(e.to_string())),
            }
        };
        Ok(Self {
            series,
            event,
            fields,
            modified: false,
        })
    }

    pub fn series_id(&self) -> &str {
        &self.event.series_id
    }

    pub fn kind(&self) -> Option<&str> {
        self.event.kind.as_deref()
    }

    pub fn time(&self) -> TimeId {
        self.event.time
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.event.timestamp()
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.fields
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(JsonValue::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(JsonValue::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(JsonValue::as_f64)
    }

    pub fn set(&mut self, name: &str, value: impl Into<JsonValue>) {
        self.fields.insert(name.to_string(), value.into());
        self.modified = true;
    }

    pub fn remove(&mut self, name: &str) -> Option<JsonValue> {
        let removed = self.fields.remove(name);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Replace every field.
    pub fn replace(&mut self, fields: Map<String, JsonValue>) {
        self.fields = fields;
        self.modified = true;
    }

    /// Write the payload back if anything changed. Returns whether a write
    /// happened.
    pub fn save(&mut self) -> SeriesResult<bool> {
        if !self.modified {
            return Ok(false);
        }
        self.event.payload = JsonValue::Object(self.fields.clone()).to_string();
        self.series.save(&self.event)?;
        self.modified = false;
        Ok(true)
    }

    /// Delete the underlying event.
    pub fn delete(self) -> SeriesResult<()> {
        self.series.delete(&self.event)
    }

    /// The event as it would be saved now.
    pub fn to_event(&self) -> Event {
        Event {
            payload: JsonValue::Object(self.fields.clone()).to_string(),
            ..self.event.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use m2db_store::Order;

    use super::*;
    use crate::event::TimeRange;
    use crate::series::tests::setup;

    fn saved(ts: &TimeSeries, payload: &str) -> Event {
        let t = Utc.with_ymd_and_hms(2023, 5, 5, 5, 5, 5).unwrap();
        let event = Event::new("car", Some("pos"), TimeId::at(t), payload);
        ts.save(&event).unwrap();
        event
    }

    fn range() -> TimeRange {
        TimeRange::between(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn edit_rewrites_in_place() {
        let (_, ts) = setup();
        let event = saved(&ts, r#"{"lat":48.85,"lon":2.35,"label":"paris"}"#);

        let mut editor = ts.editor(event.clone()).unwrap();
        assert_eq!(editor.get_str("label"), Some("paris"));
        assert_eq!(editor.get_f64("lat"), Some(48.85));
        editor.set("speed", 42);
        editor.remove("label");
        assert!(editor.save().unwrap());

        let all: Vec<Event> = ts
            .query("car", None, range(), Order::Asc)
            .map(Result::unwrap)
            .collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].time, event.time);
        let reopened = ts.editor(all[0].clone()).unwrap();
        assert_eq!(reopened.get_i64("speed"), Some(42));
        assert_eq!(reopened.get("label"), None);
        assert_eq!(reopened.kind(), Some("pos"));
    }

    #[test]
    fn unmodified_editor_does_not_write() {
        let (store, ts) = setup();
        let event = saved(&ts, "{}");
        let mut editor = ts.editor(event).unwrap();
        assert_eq!(editor.remove("missing"), None);
        store.fail_writes_to(crate::schema::EVENTS_TABLE);
        assert!(!editor.save().unwrap());
    }

    #[test]
    fn empty_payload_opens_as_object() {
        let (_, ts) = setup();
        let mut editor = ts.editor(saved(&ts, "")).unwrap();
        assert!(editor.fields().is_empty());
        editor.set("k", "v");
        assert_eq!(editor.to_event().payload, r#"{"k":"v"}"#);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let (_, ts) = setup();
        assert!(matches!(ts.editor(saved(&ts, "[1,2]")), Err(SeriesError::Payload(_))));
        assert!(matches!(ts.editor(saved(&ts, "not json")), Err(SeriesError::Payload(_))));
    }

    #[test]
    fn delete_removes_both_copies() {
        let (_, ts) = setup();
        let editor = ts.editor(saved(&ts, "{}")).unwrap();
        editor.delete().unwrap();
        assert_eq!(ts.query("car", None, range(), Order::Asc).count(), 0);
        assert_eq!(ts.query("car", Some("pos"), range(), Order::Asc).count(), 0);
    }
}
