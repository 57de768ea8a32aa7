//! ICS export: [`Roster`] → RFC 5545-flavoured calendar text.
//!
//! The exporter is a pure function of its inputs plus one clock reading.
//! [`json_to_ics`] reads the clock itself; [`json_to_ics_at`] takes it as an
//! argument so output is byte-for-byte reproducible in tests.
//!
//! ## Best-effort policy
//!
//! The parse stage is strict about *structure*, but an event that lacks
//! `start_utc` or `end_utc` still decodes. Such events are skipped here with
//! a warning instead of failing the export: one unreadable duty should not
//! cost the user the rest of their month. Timestamps inside an event that are
//! present but unparseable fall back to the export clock.
//!
//! ## Known conformance gaps
//!
//! Lines are never folded at 75 octets, and `COLOR` is emitted as a plain
//! property (the RFC 7986 form). Both are accepted by the calendar clients
//! this output targets.

use crate::roster::{Event, Roster};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Duty type → event colour. Unlisted duty types get no `COLOR` line.
pub const DUTY_COLORS: &[(&str, &str)] = &[
    ("FLIGHT", "#4285F4"),
    ("DH", "#DB4437"),
    ("HSBY", "#F4B400"),
    ("A/L", "#0F9D58"),
];

const ICS_DATE_TIME: &str = "%Y%m%dT%H%M%SZ";
const ICS_DATE: &str = "%Y%m%d";
const UNKNOWN_FLIGHT: &str = "UNKNOWN";
const UNKNOWN_PLACE: &str = "???";

/// Colour for a duty type, if it has one.
pub fn duty_color(duty_type: &str) -> Option<&'static str> {
    DUTY_COLORS
        .iter()
        .find(|(duty, _)| *duty == duty_type)
        .map(|(_, color)| *color)
}

/// Render `roster` as ICS text, stamping events with the current time.
pub fn json_to_ics(roster: &Roster, calendar_name: &str, local_tz: Tz) -> String {
    json_to_ics_at(roster, calendar_name, local_tz, Utc::now())
}

/// Render `roster` as ICS text using `now` for `DTSTAMP` and for timestamp
/// fallbacks.
///
/// Events keep roster order. Lines are joined with CRLF and the text has no
/// trailing line break.
pub fn json_to_ics_at(
    roster: &Roster,
    calendar_name: &str,
    local_tz: Tz,
    now: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:-//{}//RosterToICS//EN", escape_text(calendar_name)),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
    ];

    let ctx = RenderContext { local_tz, now };
    let mut seen_uids: HashMap<String, usize> = HashMap::new();
    let mut exported = 0usize;

    for (idx, event) in roster.events.iter().enumerate() {
        let (Some(start_utc), Some(end_utc)) =
            (event.start_utc.as_deref(), event.end_utc.as_deref())
        else {
            warn!(
                "Skipping event {} ({}): missing start_utc or end_utc",
                idx + 1,
                event.duty_type
            );
            continue;
        };

        let base_uid = format!("{}|{}|{}", event.duty_type, start_utc, end_utc);
        let count = seen_uids.entry(base_uid.clone()).or_insert(0);
        *count += 1;
        let uid = if *count == 1 {
            base_uid
        } else {
            debug!("Duplicate UID '{}', appending #{}", base_uid, count);
            format!("{base_uid}#{count}")
        };

        ctx.push_event(&mut lines, event, &uid, start_utc, end_utc);
        exported += 1;
    }

    lines.push("END:VCALENDAR".to_string());
    info!(
        "Exported {} of {} events to ICS",
        exported,
        roster.events.len()
    );
    lines.join("\r\n")
}

// ── Event rendering ──────────────────────────────────────────────────────────

struct RenderContext {
    local_tz: Tz,
    now: DateTime<Utc>,
}

impl RenderContext {
    fn push_event(
        &self,
        lines: &mut Vec<String>,
        event: &Event,
        uid: &str,
        start_utc: &str,
        end_utc: &str,
    ) {
        let start = self.parse_utc(Some(start_utc));
        let end = self.parse_utc(Some(end_utc));

        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}", escape_text(uid)));
        lines.push(format!("DTSTAMP:{}", self.now.format(ICS_DATE_TIME)));

        if event.is_all_day == Some(true) || event.duty_type == "A/L" {
            let day = start.date_naive();
            lines.push(format!("DTSTART;VALUE=DATE:{}", day.format(ICS_DATE)));
            lines.push(format!("DTEND;VALUE=DATE:{}", next_day(day).format(ICS_DATE)));
        } else {
            lines.push(format!("DTSTART:{}", start.format(ICS_DATE_TIME)));
            lines.push(format!("DTEND:{}", end.format(ICS_DATE_TIME)));
        }

        lines.push(format!("SUMMARY:{}", escape_text(&event.duty_type)));
        lines.push(format!(
            "DESCRIPTION:{}",
            escape_text(&self.describe(event, start, end))
        ));
        if let Some(color) = duty_color(&event.duty_type) {
            lines.push(format!("COLOR:{color}"));
        }
        lines.push("END:VEVENT".to_string());
    }

    /// Duty-type specific description, lines separated by `\n`.
    fn describe(&self, event: &Event, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let check_in = format!("CHECK-IN {} ({})", utc_clock(start), self.local_clock(start));
        let check_out = format!("CHECK-OUT {} ({})", utc_clock(end), self.local_clock(end));

        let mut out = Vec::new();
        match event.duty_type.as_str() {
            "FLIGHT" | "DH" => {
                out.push(check_in);
                for flight in event.flights() {
                    out.push(format!(
                        "{} {} {} {} {}",
                        flight.flight_number.as_deref().unwrap_or(UNKNOWN_FLIGHT),
                        flight.departure_airport.as_deref().unwrap_or(UNKNOWN_PLACE),
                        utc_clock(self.parse_utc(flight.departure_time_utc.as_deref())),
                        flight.arrival_airport.as_deref().unwrap_or(UNKNOWN_PLACE),
                        utc_clock(self.parse_utc(flight.arrival_time_utc.as_deref())),
                    ));
                }
                out.push(check_out);
            }
            "HSBY" => {
                out.push("Standby (HSBY)".to_string());
                out.push(format!(
                    "{} – {} ({} – {})",
                    utc_clock(start),
                    utc_clock(end),
                    self.local_clock(start),
                    self.local_clock(end)
                ));
                if let Some(location) = event.location.as_deref().filter(|l| !l.trim().is_empty()) {
                    out.push(format!("Location: {location}"));
                }
            }
            "A/L" => out.push("Annual leave".to_string()),
            other => {
                out.push(format!("Duty: {other}"));
                out.push(check_in);
                for activity in event.activities() {
                    out.push(format!(
                        "{} {} -> {} {}",
                        activity.start_place.as_deref().unwrap_or(UNKNOWN_PLACE),
                        utc_clock(self.parse_utc(activity.start_time_utc.as_deref())),
                        activity.end_place.as_deref().unwrap_or(UNKNOWN_PLACE),
                        utc_clock(self.parse_utc(activity.end_time_utc.as_deref())),
                    ));
                }
                out.push(check_out);
            }
        }
        out.join("\n")
    }

    /// Parse an ISO-8601 instant; missing or unparseable values become `now`.
    fn parse_utc(&self, value: Option<&str>) -> DateTime<Utc> {
        match value.and_then(parse_instant) {
            Some(dt) => dt,
            None => {
                debug!("Unparseable timestamp {:?}, using export time", value);
                self.now
            }
        }
    }

    fn local_clock(&self, dt: DateTime<Utc>) -> String {
        format!("{} LT", dt.with_timezone(&self.local_tz).format("%H:%M"))
    }
}

/// RFC 3339 first, then the seconds-less and zone-less forms models sometimes
/// emit (`2025-01-01T06:00Z`, `2025-01-01T06:00:00`), read as UTC.
fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = value.trim_end_matches(['Z', 'z']);
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|n| n.and_utc())
}

fn next_day(day: NaiveDate) -> NaiveDate {
    day.succ_opt().unwrap_or(day)
}

fn utc_clock(dt: DateTime<Utc>) -> String {
    format!("{}z", dt.format("%H:%M"))
}

/// Escape a TEXT value: `\` `,` `;` get a backslash, CR, LF and CRLF
/// become `\n`.
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(';', "\\;")
        .replace("\r\n", "\\n")
        .replace(['\r', '\n'], "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Activity, EventDetail, Flight};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 12, 34, 56).unwrap()
    }

    fn export(events: Vec<Event>) -> String {
        json_to_ics_at(
            &Roster { events },
            "Roster",
            chrono_tz::Europe::Berlin,
            fixed_now(),
        )
    }

    fn lines(ics: &str) -> Vec<&str> {
        ics.split("\r\n").collect()
    }

    fn flight_event() -> Event {
        Event::new("FLIGHT", "2025-01-01T05:15:00Z", "2025-01-01T14:00:00Z").with_detail(
            EventDetail::Flights(vec![Flight {
                flight_number: Some("FR123".into()),
                departure_airport: Some("STN".into()),
                departure_time_utc: Some("2025-01-01T06:00:00Z".into()),
                arrival_airport: Some("DUB".into()),
                arrival_time_utc: Some("2025-01-01T07:10:00Z".into()),
            }]),
        )
    }

    #[test]
    fn empty_roster_has_envelope_only() {
        let ics = export(vec![]);
        assert_eq!(
            lines(&ics),
            [
                "BEGIN:VCALENDAR",
                "VERSION:2.0",
                "PRODID:-//Roster//RosterToICS//EN",
                "CALSCALE:GREGORIAN",
                "METHOD:PUBLISH",
                "END:VCALENDAR"
            ]
        );
        assert!(!ics.ends_with("\r\n"));
    }

    #[test]
    fn annual_leave_is_all_day() {
        let ics = export(vec![Event::new(
            "A/L",
            "2025-12-25T00:00:00Z",
            "2025-12-25T23:59:00Z",
        )]);
        let l = lines(&ics);
        assert!(l.contains(&"DTSTART;VALUE=DATE:20251225"));
        assert!(l.contains(&"DTEND;VALUE=DATE:20251226"));
        assert!(l.contains(&"SUMMARY:A/L"));
        assert!(l.contains(&"DESCRIPTION:Annual leave"));
        assert!(l.contains(&"COLOR:#0F9D58"));
    }

    #[test]
    fn is_all_day_flag_uses_date_form() {
        let ics = export(vec![Event::new(
            "OFFICE",
            "2025-12-31T00:00:00Z",
            "2025-12-31T23:59:00Z",
        )
        .all_day(true)]);
        assert!(ics.contains("DTSTART;VALUE=DATE:20251231\r\n"));
        assert!(ics.contains("DTEND;VALUE=DATE:20260101\r\n"));
        assert!(!ics.contains("COLOR:"));
    }

    #[test]
    fn missing_end_is_skipped() {
        let mut event = Event::new("HSBY", "2025-01-01T06:00:00Z", "x");
        event.end_utc = None;
        let ics = export(vec![event]);
        assert!(!ics.contains("BEGIN:VEVENT"));
        assert_eq!(ics.matches("BEGIN:VCALENDAR").count(), 1);
        assert!(ics.ends_with("END:VCALENDAR"));
    }

    #[test]
    fn flight_description() {
        let ics = export(vec![flight_event()]);
        let l = lines(&ics);
        assert!(l.contains(&"UID:FLIGHT|2025-01-01T05:15:00Z|2025-01-01T14:00:00Z"));
        assert!(l.contains(&"DTSTAMP:20251120T123456Z"));
        assert!(l.contains(&"DTSTART:20250101T051500Z"));
        assert!(l.contains(&"DTEND:20250101T140000Z"));
        assert!(l.contains(&"COLOR:#4285F4"));
        assert!(l.contains(
            &"DESCRIPTION:CHECK-IN 05:15z (06:15 LT)\\nFR123 STN 06:00z DUB 07:10z\\nCHECK-OUT 14:00z (15:00 LT)"
        ));
    }

    #[test]
    fn local_time_follows_dst() {
        let event = Event::new("DH", "2025-07-01T05:15:00Z", "2025-07-01T09:00:00Z")
            .with_detail(EventDetail::Flights(vec![]));
        let ics = export(vec![event]);
        assert!(ics.contains("CHECK-IN 05:15z (07:15 LT)\\nCHECK-OUT 09:00z (11:00 LT)"));
        assert!(ics.contains("COLOR:#DB4437"));
    }

    #[test]
    fn other_zone_changes_local_times_only() {
        let ics = json_to_ics_at(
            &Roster {
                events: vec![flight_event()],
            },
            "Crew",
            chrono_tz::Europe::Dublin,
            fixed_now(),
        );
        assert!(ics.contains("PRODID:-//Crew//RosterToICS//EN"));
        assert!(ics.contains("CHECK-IN 05:15z (05:15 LT)"));
        assert!(ics.contains("DTSTART:20250101T051500Z"));
    }

    #[test]
    fn missing_flight_fields_use_placeholders() {
        let event = Event::new("FLIGHT", "2025-01-01T05:15:00Z", "2025-01-01T14:00:00Z")
            .with_detail(EventDetail::Flights(vec![Flight {
                departure_time_utc: Some("2025-01-01T06:00Z".into()),
                arrival_time_utc: Some("garbage".into()),
                ..Default::default()
            }]));
        let ics = export(vec![event]);
        assert!(ics.contains("\\nUNKNOWN ??? 06:00z ??? 12:34z\\n"), "{ics}");
    }

    #[test]
    fn standby_description() {
        let event = Event::new("HSBY", "2025-01-03T04:00:00Z", "2025-01-03T12:00:00Z")
            .with_location("STN");
        let ics = export(vec![event]);
        assert!(ics.contains(
            "DESCRIPTION:Standby (HSBY)\\n04:00z – 12:00z (05:00 LT – 13:00 LT)\\nLocation: STN\r\n"
        ));
        assert!(ics.contains("COLOR:#F4B400"));
    }

    #[test]
    fn standby_blank_location_omitted() {
        let event = Event::new("HSBY", "2025-01-03T04:00:00Z", "2025-01-03T12:00:00Z")
            .with_location("  ");
        let ics = export(vec![event]);
        assert!(!ics.contains("Location:"));
    }

    #[test]
    fn activity_description() {
        let event = Event::new("GT", "2025-01-02T08:00:00Z", "2025-01-02T10:00:00Z")
            .with_detail(EventDetail::Activities(vec![Activity {
                start_place: Some("STN".into()),
                start_time_utc: Some("2025-01-02T08:15:00Z".into()),
                end_place: None,
                end_time_utc: Some("2025-01-02T09:30:00Z".into()),
            }]));
        let ics = export(vec![event]);
        assert!(ics.contains(
            "DESCRIPTION:Duty: GT\\nCHECK-IN 08:00z (09:00 LT)\\nSTN 08:15z -> ??? 09:30z\\nCHECK-OUT 10:00z (11:00 LT)\r\n"
        ));
        assert!(!ics.contains("COLOR:"));
    }

    #[test]
    fn text_escaping() {
        assert_eq!(escape_text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");

        let event = Event::new("SIM;X,Y", "2025-01-02T08:00:00Z", "2025-01-02T10:00:00Z");
        let ics = export(vec![event]);
        assert!(ics.contains("SUMMARY:SIM\\;X\\,Y\r\n"));
        assert!(ics.contains("DESCRIPTION:Duty: SIM\\;X\\,Y\\nCHECK-IN"));
    }

    #[test]
    fn line_breaks_never_leak_into_property_lines() {
        assert_eq!(escape_text("a\r\nb\rc\nd"), "a\\nb\\nc\\nd");

        let event = Event::new("GT\nX", "2025-01-01T06:00:00Z", "2025-01-01T07:00:00Z")
            .with_location("STN\r")
            .with_detail(EventDetail::Activities(vec![Activity {
                start_place: Some("ST\rN".into()),
                ..Default::default()
            }]));
        let ics = json_to_ics_at(
            &Roster {
                events: vec![event],
            },
            "Crew\nRoster",
            chrono_tz::Europe::Berlin,
            fixed_now(),
        );

        for line in lines(&ics) {
            assert!(
                !line.contains('\n') && !line.contains('\r'),
                "raw line break in {line:?}"
            );
        }
        assert!(ics.contains("UID:GT\\nX|2025-01-01T06:00:00Z|2025-01-01T07:00:00Z\r\n"));
        assert!(ics.contains("PRODID:-//Crew\\nRoster//RosterToICS//EN\r\n"));
        assert!(ics.contains("SUMMARY:GT\\nX\r\n"));
    }

    #[test]
    fn duplicate_uids_get_discriminator() {
        let ics = export(vec![flight_event(), flight_event(), flight_event()]);
        let uids: Vec<&str> = lines(&ics)
            .into_iter()
            .filter(|l| l.starts_with("UID:"))
            .collect();
        assert_eq!(
            uids,
            [
                "UID:FLIGHT|2025-01-01T05:15:00Z|2025-01-01T14:00:00Z",
                "UID:FLIGHT|2025-01-01T05:15:00Z|2025-01-01T14:00:00Z#2",
                "UID:FLIGHT|2025-01-01T05:15:00Z|2025-01-01T14:00:00Z#3",
            ]
        );
    }

    #[test]
    fn event_order_preserved() {
        let ics = export(vec![
            Event::new("SIM", "2025-01-05T08:00:00Z", "2025-01-05T12:00:00Z"),
            Event::new("A/L", "2025-01-01T00:00:00Z", "2025-01-01T23:59:00Z"),
        ]);
        let sim = ics.find("SUMMARY:SIM").unwrap();
        let leave = ics.find("SUMMARY:A/L").unwrap();
        assert!(sim < leave);
    }

    #[test]
    fn output_stable_without_dtstamp() {
        let roster = Roster {
            events: vec![
                flight_event(),
                Event::new("HSBY", "2025-01-03T04:00:00Z", "2025-01-03T12:00:00Z"),
            ],
        };
        let strip = |s: String| {
            s.split("\r\n")
                .filter(|l| !l.starts_with("DTSTAMP:"))
                .collect::<Vec<_>>()
                .join("\r\n")
        };
        let a = strip(json_to_ics(&roster, "Roster", chrono_tz::Europe::Berlin));
        let b = strip(json_to_ics(&roster, "Roster", chrono_tz::Europe::Berlin));
        assert_eq!(a, b);
    }

    #[test]
    fn instant_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap();
        assert_eq!(parse_instant("2025-01-01T06:00:00Z"), Some(expected));
        assert_eq!(parse_instant("2025-01-01T07:00:00+01:00"), Some(expected));
        assert_eq!(parse_instant("2025-01-01T06:00Z"), Some(expected));
        assert_eq!(parse_instant(" 2025-01-01T06:00:00 "), Some(expected));
        assert_eq!(parse_instant("06:00"), None);
        assert_eq!(parse_instant(""), None);
    }
}
