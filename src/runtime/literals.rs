use crate::runtime::data_structures::value::Value;
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::{cell::RefCell, rc::Rc};

/// A pluggable parser that tries to turn an unbound name into a typed value.  Handlers run in
/// priority order and the first success wins.
pub type LiteralHandler = Rc<dyn Fn(&str) -> Option<Value>>;

/// The interpreter's configured time zone, shared with the literal handlers that need it so that
/// zone changes are observed without re-registering anything.
pub type SharedTimeZone = Rc<RefCell<Tz>>;

/// Build the standard literal handlers in priority order, highest first: boolean, float, zoned
/// datetime, literal date, time-of-day, integer.
pub fn standard_handlers(timezone: &SharedTimeZone) -> Vec<LiteralHandler> {
    vec![
        Rc::new(to_bool),
        Rc::new(to_float),
        to_zoned_datetime(timezone.clone()),
        to_literal_date(timezone.clone()),
        Rc::new(to_time),
        Rc::new(to_int),
    ]
}

/// Parse the boolean literals `TRUE` and `FALSE`.  Nothing else is accepted, not even other
/// casings.
pub fn to_bool(text: &str) -> Option<Value> {
    match text {
        "TRUE" => Some(Value::Bool(true)),
        "FALSE" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Parse a float literal.  The text must contain a decimal point and parse as a finite 64-bit
/// float.
pub fn to_float(text: &str) -> Option<Value> {
    if !text.contains('.') {
        return None;
    }

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(Value::Float(value)),
        _ => None,
    }
}

/// Parse an integer literal.  The text must not contain a decimal point and must round-trip
/// canonically, so `42abc` and `007` are words, not numbers.
pub fn to_int(text: &str) -> Option<Value> {
    if text.contains('.') {
        return None;
    }

    let value = text.parse::<i64>().ok()?;

    if value.to_string() != text {
        return None;
    }

    Some(Value::Int(value))
}

/// Parse a time-of-day literal: `H:MM`, optionally followed by `AM` or `PM`.
///
/// `12:00 AM` is midnight and `12:00 PM` is noon; an out-of-range hour with `AM` is wrapped back
/// into range the way the reference clocks do (`22:15 AM` reads as `10:15`).
pub fn to_time(text: &str) -> Option<Value> {
    let (time_part, meridiem) = if let Some(stripped) = text.strip_suffix("AM") {
        (stripped.trim_end(), Some("AM"))
    } else if let Some(stripped) = text.strip_suffix("PM") {
        (stripped.trim_end(), Some("PM"))
    } else {
        (text, None)
    };

    let (hours_part, minutes_part) = time_part.split_once(':')?;

    if hours_part.is_empty()
        || hours_part.len() > 2
        || !hours_part.chars().all(|ch| ch.is_ascii_digit())
    {
        return None;
    }

    if minutes_part.len() != 2 || !minutes_part.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }

    let mut hours: u32 = hours_part.parse().ok()?;
    let minutes: u32 = minutes_part.parse().ok()?;

    match meridiem {
        Some("PM") if hours < 12 => hours += 12,
        Some("AM") if hours == 12 => hours = 0,
        Some("AM") if hours > 12 => hours -= 12,
        _ => {}
    }

    if hours > 23 || minutes >= 60 {
        return None;
    }

    // Times are instants on the year-zero epoch day, in UTC.
    let time = Tz::UTC
        .with_ymd_and_hms(0, 1, 1, hours, minutes, 0)
        .single()?;

    Some(Value::DateTime(time))
}

/// Build the literal date handler: `YYYY-MM-DD`, where each group may also be the literal
/// wildcard `YYYY`, `MM`, or `DD` meaning today's value in the configured zone.
pub fn to_literal_date(timezone: SharedTimeZone) -> LiteralHandler {
    Rc::new(move |text| {
        let mut parts = text.split('-');

        let year_part = parts.next()?;
        let month_part = parts.next()?;
        let day_part = parts.next()?;

        if parts.next().is_some() {
            return None;
        }

        let group_ok = |part: &str, wildcard: &str, width: usize| {
            part == wildcard || (part.len() == width && part.chars().all(|ch| ch.is_ascii_digit()))
        };

        if !group_ok(year_part, "YYYY", 4)
            || !group_ok(month_part, "MM", 2)
            || !group_ok(day_part, "DD", 2)
        {
            return None;
        }

        let zone = *timezone.borrow();
        let today = Utc::now().with_timezone(&zone);

        let year = if year_part == "YYYY" {
            today.year()
        } else {
            year_part.parse().ok()?
        };

        let month = if month_part == "MM" {
            today.month()
        } else {
            month_part.parse().ok()?
        };

        let day = if day_part == "DD" {
            today.day()
        } else {
            day_part.parse().ok()?
        };

        let date = zone.with_ymd_and_hms(year, month, day, 0, 0, 0).earliest()?;

        Some(Value::DateTime(date))
    })
}

/// Does the text end with a `±HH:MM` offset?
fn has_trailing_offset(text: &str) -> bool {
    let bytes = text.as_bytes();

    if bytes.len() < 6 {
        return false;
    }

    let tail = &bytes[bytes.len() - 6..];

    (tail[0] == b'+' || tail[0] == b'-')
        && tail[1].is_ascii_digit()
        && tail[2].is_ascii_digit()
        && tail[3] == b':'
        && tail[4].is_ascii_digit()
        && tail[5].is_ascii_digit()
}

/// Build the zoned datetime handler.  Accepted shapes:
///
/// - `2025-05-24T10:15:00[America/Los_Angeles]` — wall clock in the named zone.
/// - `2025-05-24T10:15:00-07:00[America/Los_Angeles]` — offset instant, shown in the named zone.
/// - `2025-05-24T10:15:00Z` — UTC.
/// - `2025-05-24T10:15:00-05:00` — offset instant, normalized to UTC.
/// - `2025-05-24T10:15:00` — wall clock in the interpreter's configured zone.
pub fn to_zoned_datetime(timezone: SharedTimeZone) -> LiteralHandler {
    Rc::new(move |text| {
        if !text.contains('T') {
            return None;
        }

        // RFC 9557 bracket notation carries an IANA zone name.
        if let Some(bracket_start) = text.find('[') {
            if !text.ends_with(']') {
                return None;
            }

            let zone: Tz = text[bracket_start + 1..text.len() - 1].parse().ok()?;
            let datetime_part = &text[..bracket_start];

            let has_offset = datetime_part.contains('+')
                || datetime_part.rfind('-').is_some_and(|index| index > 10);

            if has_offset {
                let parsed = DateTime::parse_from_rfc3339(datetime_part).ok()?;
                return Some(Value::DateTime(parsed.with_timezone(&zone)));
            }

            let naive =
                NaiveDateTime::parse_from_str(datetime_part, "%Y-%m-%dT%H:%M:%S").ok()?;

            return Some(Value::DateTime(zone.from_local_datetime(&naive).earliest()?));
        }

        if text.ends_with('Z') {
            let parsed = DateTime::parse_from_rfc3339(text).ok()?;
            return Some(Value::DateTime(parsed.with_timezone(&Tz::UTC)));
        }

        // Explicit offsets are normalized to UTC for canonical storage.
        if has_trailing_offset(text) {
            let parsed = DateTime::parse_from_rfc3339(text).ok()?;
            return Some(Value::DateTime(parsed.with_timezone(&Tz::UTC)));
        }

        // No zone information at all: use the interpreter's configured zone.
        let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").ok()?;
        let zone = *timezone.borrow();

        Some(Value::DateTime(zone.from_local_datetime(&naive).earliest()?))
    })
}
