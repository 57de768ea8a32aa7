//! Roster data model: the JSON contract between the parse stage and the
//! ICS exporter.
//!
//! The wire schema is fixed by [`crate::prompts::SYSTEM_PROMPT_PARSE`]:
//!
//! ```json
//! { "events": [ { "start_utc": "...", "end_utc": "...", "duty_type": "...",
//!                 "flights": [...], "activities": [...], "location": "...",
//!                 "is_all_day": true, "error": "..." } ] }
//! ```
//!
//! On the wire an event carries two optional arrays, `flights` and
//! `activities`. In Rust they collapse into [`EventDetail`], so an event can
//! never hold both. Deserialising an object that has both fails, which the
//! orchestrator reports as invalid model output.

use crate::error::RosterError;
use serde::{Deserialize, Serialize};

/// A full duty schedule, in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub events: Vec<Event>,
}

impl Roster {
    /// Number of duty blocks.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Load a stored roster: either the bare `{"events": [...]}` object or a
    /// saved parse result whose roster sits under `data`.
    pub fn from_stored_json(text: &str) -> Result<Self, RosterError> {
        let invalid = |e: serde_json::Error| RosterError::InvalidRoster {
            detail: e.to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(text).map_err(invalid)?;
        let roster = match value {
            serde_json::Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or_default()
            }
            other => other,
        };
        serde_json::from_value(roster).map_err(invalid)
    }
}

/// One duty block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventWire", into = "EventWire")]
pub struct Event {
    /// ISO-8601 UTC instant (`...Z`), verbatim from the parse model.
    pub start_utc: Option<String>,
    /// ISO-8601 UTC instant (`...Z`), verbatim from the parse model.
    pub end_utc: Option<String>,
    /// Duty code exactly as printed on the roster.
    pub duty_type: String,
    pub is_all_day: Option<bool>,
    /// Departure point of a single-line duty.
    pub location: Option<String>,
    pub detail: EventDetail,
    /// Set by the parse model when part of the event was unreadable.
    pub error: Option<String>,
}

impl Event {
    /// A plain event with the given duty code and times.
    pub fn new(
        duty_type: impl Into<String>,
        start_utc: impl Into<String>,
        end_utc: impl Into<String>,
    ) -> Self {
        Self {
            start_utc: Some(start_utc.into()),
            end_utc: Some(end_utc.into()),
            duty_type: duty_type.into(),
            is_all_day: None,
            location: None,
            detail: EventDetail::Plain,
            error: None,
        }
    }

    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn all_day(mut self, value: bool) -> Self {
        self.is_all_day = Some(value);
        self
    }

    pub fn flights(&self) -> &[Flight] {
        match &self.detail {
            EventDetail::Flights(flights) => flights,
            _ => &[],
        }
    }

    pub fn activities(&self) -> &[Activity] {
        match &self.detail {
            EventDetail::Activities(activities) => activities,
            _ => &[],
        }
    }
}

/// Sub-segments of a duty block. At most one kind per event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventDetail {
    /// Operational or deadhead sectors (`FLIGHT`, `DH`).
    Flights(Vec<Flight>),
    /// Generic segments (ground transport, simulator, training, …).
    Activities(Vec<Activity>),
    /// Single-line duty without sub-segments (`HSBY`, `A/L`, …).
    #[default]
    Plain,
}

/// One flight sector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_airport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_airport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time_utc: Option<String>,
}

/// One generic sub-segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_utc: Option<String>,
}

// ── Wire representation ──────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct EventWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_utc: Option<String>,
    duty_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flights: Option<Vec<Flight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    activities: Option<Vec<Activity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<EventWire> for Event {
    type Error = String;

    fn try_from(wire: EventWire) -> Result<Self, Self::Error> {
        let detail = match (wire.flights, wire.activities) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "event '{}' has both \"flights\" and \"activities\"",
                    wire.duty_type
                ))
            }
            (Some(flights), None) => EventDetail::Flights(flights),
            (None, Some(activities)) => EventDetail::Activities(activities),
            (None, None) => EventDetail::Plain,
        };
        Ok(Event {
            start_utc: wire.start_utc,
            end_utc: wire.end_utc,
            duty_type: wire.duty_type,
            is_all_day: wire.is_all_day,
            location: wire.location,
            detail,
            error: wire.error,
        })
    }
}

impl From<Event> for EventWire {
    fn from(event: Event) -> Self {
        let (flights, activities) = match event.detail {
            EventDetail::Flights(f) => (Some(f), None),
            EventDetail::Activities(a) => (None, Some(a)),
            EventDetail::Plain => (None, None),
        };
        EventWire {
            start_utc: event.start_utc,
            end_utc: event.end_utc,
            duty_type: event.duty_type,
            is_all_day: event.is_all_day,
            location: event.location,
            flights,
            activities,
            error: event.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flight_event_from_wire() {
        let json = r#"{
            "start_utc": "2025-01-01T05:15:00Z",
            "end_utc": "2025-01-01T14:00:00Z",
            "duty_type": "FLIGHT",
            "flights": [{
                "flight_number": "FR123",
                "departure_airport": "STN",
                "departure_time_utc": "2025-01-01T06:00:00Z",
                "arrival_airport": "DUB",
                "arrival_time_utc": "2025-01-01T07:10:00Z"
            }]
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.duty_type, "FLIGHT");
        assert_eq!(event.flights().len(), 1);
        assert!(event.activities().is_empty());
        assert_eq!(event.flights()[0].flight_number.as_deref(), Some("FR123"));
    }

    #[test]
    fn both_arrays_rejected() {
        let json = r#"{"duty_type":"GT","flights":[],"activities":[]}"#;
        let err = serde_json::from_str::<Event>(json).unwrap_err();
        assert!(err.to_string().contains("both"), "got: {err}");
    }

    #[test]
    fn plain_event_without_times() {
        let json = r#"{"duty_type":"HSBY","location":"STN","error":"end time unreadable"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.detail, EventDetail::Plain);
        assert!(event.start_utc.is_none());
        assert_eq!(event.error.as_deref(), Some("end time unreadable"));
    }

    #[test]
    fn missing_duty_type_rejected() {
        let json = r#"{"start_utc":"2025-01-01T00:00:00Z","end_utc":"2025-01-01T01:00:00Z"}"#;
        assert!(serde_json::from_str::<Event>(json).is_err());
    }

    #[test]
    fn serialises_back_to_wire_shape() {
        let event = Event::new("GT", "2025-01-02T08:00:00Z", "2025-01-02T09:00:00Z").with_detail(
            EventDetail::Activities(vec![Activity {
                start_place: Some("STN".into()),
                start_time_utc: Some("2025-01-02T08:00:00Z".into()),
                end_place: Some("LTN".into()),
                end_time_utc: Some("2025-01-02T09:00:00Z".into()),
            }]),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("activities").is_some());
        assert!(value.get("flights").is_none());
        assert!(value.get("location").is_none());
        assert_eq!(value["activities"][0]["end_place"], "LTN");
    }

    #[test]
    fn stored_json_accepts_both_shapes() {
        let bare = r#"{"events":[{"duty_type":"A/L","start_utc":"2025-12-25T00:00:00Z","end_utc":"2025-12-25T23:59:00Z"}]}"#;
        let wrapped = format!(
            r#"{{"data":{bare},"ocr_usage":{{"input_tokens":1,"output_tokens":2,"cached_input_tokens":0,"cached_output_tokens":0}}}}"#
        );
        let a = Roster::from_stored_json(bare).unwrap();
        let b = Roster::from_stored_json(&wrapped).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn stored_json_rejects_garbage() {
        assert!(matches!(
            Roster::from_stored_json("[1, 2]"),
            Err(RosterError::InvalidRoster { .. })
        ));
        assert!(matches!(
            Roster::from_stored_json("not json"),
            Err(RosterError::InvalidRoster { .. })
        ));
    }

    #[test]
    fn roster_preserves_order() {
        let json = r#"{"events":[
            {"duty_type":"A","start_utc":"2025-01-01T00:00:00Z","end_utc":"2025-01-01T01:00:00Z"},
            {"duty_type":"B","start_utc":"2025-01-02T00:00:00Z","end_utc":"2025-01-02T01:00:00Z"},
            {"duty_type":"C","start_utc":"2025-01-03T00:00:00Z","end_utc":"2025-01-03T01:00:00Z"}
        ]}"#;
        let roster: Roster = serde_json::from_str(json).unwrap();
        let codes: Vec<&str> = roster.events.iter().map(|e| e.duty_type.as_str()).collect();
        assert_eq!(codes, ["A", "B", "C"]);
        assert_eq!(roster.len(), 3);
    }
}
