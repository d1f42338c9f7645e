//! Datetime recognition for JSON string leaves.
//!
//! The API sends dates as `YYYY-mm-dd` and timestamps as
//! `YYYY-mm-ddTHH:MM:SS[.ffffff][Z|+HH:MM]` (a space separator also occurs).
//! Strings of that shape are decoded into [`ParsedDatetime`]; anything else,
//! including calendar-invalid near matches such as `2026-02-30`, stays a
//! plain string. Decoding never fails.
//!
//! A `ParsedDatetime` remembers the textual layout it came from so that it
//! serializes back to the same form when a document is written or patched.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::value::Value;

/// Field names the API uses for date, datetime and time values.
pub const DEFAULT_DATETIME_FIELDS: &[&str] = &[
    "absent_date",
    "birth_date",
    "date_arrival",
    "dob",
    "doe",
    "dol",
    "end_date",
    "expiry_date",
    "finish_date",
    "jour_date",
    "last_occ_date",
    "lst_up_date",
    "note_date",
    "photo_update_on",
    "shed_end_date",
    "shed_start_date",
    "start_date",
    "str_ent_date",
    "term_date",
    "tran_date",
    "valid_date",
    "visa_expiry",
    "corr_date",
    "date_uploaded",
    "par_date",
    "update_on",
    "updated_on",
    "abs_from_time",
    "abs_to_time",
    "absent_time",
    "med_time",
];

const MAX_PRECISION: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Layout {
    Date,
    DateTime {
        separator: char,
        precision: u8,
        zulu: bool,
    },
}

/// A datetime decoded from an API string.
///
/// Carries year through microsecond plus an optional UTC offset, and the
/// layout of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedDatetime {
    naive: NaiveDateTime,
    offset: Option<FixedOffset>,
    layout: Layout,
}

impl ParsedDatetime {
    /// Parses a date or timestamp string, or returns `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let bytes = raw.as_bytes();
        if bytes.len() < 10 || !is_date_shape(&bytes[..10]) {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(
            number(&bytes[0..4]) as i32,
            number(&bytes[5..7]),
            number(&bytes[8..10]),
        )?;
        if bytes.len() == 10 {
            return Some(Self::date(date));
        }

        let separator = match bytes[10] {
            b'T' => 'T',
            b' ' => ' ',
            _ => return None,
        };
        let time = &raw[11..];
        let tb = time.as_bytes();
        if tb.len() < 8 || !is_time_shape(&tb[..8]) {
            return None;
        }
        let (hour, minute, second) = (number(&tb[0..2]), number(&tb[3..5]), number(&tb[6..8]));

        let mut rest = &time[8..];
        let mut precision = 0u8;
        let mut micro = 0u32;
        // Read by hand: chrono's `%.f` accepts up to nine digits and does not
        // report how many were present, which rendering needs.
        if let Some(fraction) = rest.strip_prefix('.') {
            let digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 || digits > MAX_PRECISION as usize {
                return None;
            }
            precision = digits as u8;
            micro = number(&fraction.as_bytes()[..digits]) * 10u32.pow(6 - digits as u32);
            rest = &fraction[digits..];
        }

        let (offset, zulu) = match rest {
            "" => (None, false),
            "Z" | "z" => (Some(FixedOffset::east_opt(0)?), true),
            other => (Some(parse_offset(other)?), false),
        };

        let time = NaiveTime::from_hms_micro_opt(hour, minute, second, micro)?;
        Some(Self {
            naive: date.and_time(time),
            offset,
            layout: Layout::DateTime {
                separator,
                precision,
                zulu,
            },
        })
    }

    /// A date-only value rendered as `YYYY-mm-dd`.
    pub fn date(date: NaiveDate) -> Self {
        Self {
            naive: date.and_time(NaiveTime::MIN),
            offset: None,
            layout: Layout::Date,
        }
    }

    /// A naive timestamp rendered as `YYYY-mm-ddTHH:MM:SS` followed by
    /// `precision` fractional digits (clamped to 6).
    pub fn timestamp(naive: NaiveDateTime, precision: u8) -> Self {
        Self {
            naive,
            offset: None,
            layout: Layout::DateTime {
                separator: 'T',
                precision: precision.min(MAX_PRECISION),
                zulu: false,
            },
        }
    }

    pub fn year(&self) -> i32 {
        self.naive.year()
    }

    pub fn month(&self) -> u32 {
        self.naive.month()
    }

    pub fn day(&self) -> u32 {
        self.naive.day()
    }

    pub fn hour(&self) -> u32 {
        self.naive.hour()
    }

    pub fn minute(&self) -> u32 {
        self.naive.minute()
    }

    pub fn second(&self) -> u32 {
        self.naive.second()
    }

    pub fn microsecond(&self) -> u32 {
        self.naive.nanosecond() / 1_000
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    pub fn is_date_only(&self) -> bool {
        self.layout == Layout::Date
    }

    /// Number of fractional-second digits in the source text.
    pub fn precision(&self) -> u8 {
        match self.layout {
            Layout::Date => 0,
            Layout::DateTime { precision, .. } => precision,
        }
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.naive
    }

    /// Offset-aware form, when the source carried `Z` or an explicit offset.
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = self.offset?;
        self.naive.and_local_timezone(offset).single()
    }
}

impl fmt::Display for ParsedDatetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.naive.format("%Y-%m-%d"))?;
        let Layout::DateTime {
            separator,
            precision,
            zulu,
        } = self.layout
        else {
            return Ok(());
        };
        write!(f, "{separator}{}", self.naive.format("%H:%M:%S"))?;
        if precision > 0 {
            let fraction = format!("{:06}", self.microsecond());
            write!(f, ".{}", &fraction[..precision as usize])?;
        }
        match self.offset {
            Some(_) if zulu => f.write_str("Z"),
            Some(offset) => write!(f, "{offset}"),
            None => Ok(()),
        }
    }
}

impl serde::Serialize for ParsedDatetime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rewrites JSON string leaves while a body is being decoded.
///
/// `key` is the name of the nearest enclosing object field (array elements
/// inherit it), `None` for strings outside any object. Returning `None` keeps
/// the string unchanged. Implementations must not panic.
pub trait ScalarHook: Send + Sync {
    fn decode(&self, key: Option<&str>, raw: &str) -> Option<Value>;
}

/// Hook that leaves every string untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl ScalarHook for NoopHook {
    fn decode(&self, _key: Option<&str>, _raw: &str) -> Option<Value> {
        None
    }
}

/// Decodes datetime-shaped strings into [`Value::DateTime`].
///
/// By default every string leaf is examined. [`DatetimeHook::for_fields`]
/// limits decoding to the named fields, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct DatetimeHook {
    fields: Option<HashSet<String>>,
}

impl DatetimeHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fields: Some(
                fields
                    .into_iter()
                    .map(|f| f.as_ref().to_lowercase())
                    .collect(),
            ),
        }
    }

    /// Restricted to [`DEFAULT_DATETIME_FIELDS`].
    pub fn known_fields() -> Self {
        Self::for_fields(DEFAULT_DATETIME_FIELDS)
    }

    fn accepts(&self, key: Option<&str>) -> bool {
        match (&self.fields, key) {
            (None, _) => true,
            (Some(fields), Some(key)) => fields.contains(&key.to_lowercase()),
            (Some(_), None) => false,
        }
    }
}

impl ScalarHook for DatetimeHook {
    fn decode(&self, key: Option<&str>, raw: &str) -> Option<Value> {
        if !self.accepts(key) {
            return None;
        }
        ParsedDatetime::parse(raw).map(Value::DateTime)
    }
}

/// Decodes one string leaf: a datetime when it parses, otherwise the string.
pub fn decode_scalar(raw: &str) -> Value {
    match ParsedDatetime::parse(raw) {
        Some(dt) => Value::DateTime(dt),
        None => Value::String(raw.to_string()),
    }
}

fn is_date_shape(b: &[u8]) -> bool {
    b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

fn is_time_shape(b: &[u8]) -> bool {
    b[..2].iter().all(u8::is_ascii_digit)
        && b[2] == b':'
        && b[3..5].iter().all(u8::is_ascii_digit)
        && b[5] == b':'
        && b[6..8].iter().all(u8::is_ascii_digit)
}

/// `+HH:MM` or `+HHMM`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let b = s.as_bytes();
    let sign = match b.first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let (hours, minutes) = match b.len() {
        6 if b[3] == b':' => (&b[1..3], &b[4..6]),
        5 => (&b[1..3], &b[3..5]),
        _ => return None,
    };
    if !hours.iter().chain(minutes).all(u8::is_ascii_digit) {
        return None;
    }
    let (hours, minutes) = (number(hours) as i32, number(minutes) as i32);
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Decimal value of a run of ASCII digits already checked by the caller.
fn number(digits: &[u8]) -> u32 {
    digits
        .iter()
        .fold(0, |acc, d| acc * 10 + u32::from(d - b'0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp_with_microseconds() {
        let dt = ParsedDatetime::parse("2026-02-11T10:45:12.557000").unwrap();
        assert_eq!(dt.year(), 2026);
        assert_eq!(dt.month(), 2);
        assert_eq!(dt.day(), 11);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 45);
        assert_eq!(dt.second(), 12);
        assert_eq!(dt.microsecond(), 557000);
        assert_eq!(dt.offset(), None);
        assert_eq!(dt.precision(), 6);
    }

    #[test]
    fn short_fractions_scale_to_microseconds() {
        let dt = ParsedDatetime::parse("2026-02-11T10:45:12.5").unwrap();
        assert_eq!(dt.microsecond(), 500000);
        assert_eq!(dt.to_string(), "2026-02-11T10:45:12.5");
    }

    #[test]
    fn parses_date_only() {
        let dt = ParsedDatetime::parse("2010-03-04").unwrap();
        assert!(dt.is_date_only());
        assert_eq!((dt.year(), dt.month(), dt.day()), (2010, 3, 4));
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.to_string(), "2010-03-04");
    }

    #[test]
    fn parses_zulu_and_offsets() {
        let z = ParsedDatetime::parse("2025-12-31T23:59:59.123Z").unwrap();
        assert_eq!(z.offset().unwrap().local_minus_utc(), 0);
        assert_eq!(z.to_string(), "2025-12-31T23:59:59.123Z");

        let plus = ParsedDatetime::parse("2025-12-31T23:59:59+10:00").unwrap();
        assert_eq!(plus.offset().unwrap().local_minus_utc(), 36_000);
        assert_eq!(plus.to_string(), "2025-12-31T23:59:59+10:00");

        let minus = ParsedDatetime::parse("2025-12-31T23:59:59-0530").unwrap();
        assert_eq!(minus.offset().unwrap().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert!(minus.to_datetime().is_some());
    }

    #[test]
    fn space_separator_round_trips() {
        let dt = ParsedDatetime::parse("2026-02-11 08:00:00").unwrap();
        assert_eq!(dt.to_string(), "2026-02-11 08:00:00");
    }

    #[test]
    fn near_matches_stay_strings() {
        for raw in [
            "not-a-date",
            "2026-13-01",
            "2026-02-30",
            "2026-2-11",
            "2026-02-11T25:00:00",
            "2026-02-11T10:45",
            "2026-02-11T10:45:12.",
            "2026-02-11T10:45:12.1234567",
            "2026-02-11T10:45:12+99:00",
            "2026-02-11X10:45:12",
            "20260211",
            "",
        ] {
            assert_eq!(decode_scalar(raw), Value::String(raw.to_string()), "{raw}");
        }
    }

    #[test]
    fn decode_scalar_converts_recognized_strings() {
        assert!(matches!(
            decode_scalar("2026-02-11T10:45:12.557000"),
            Value::DateTime(_)
        ));
    }

    #[test]
    fn field_restricted_hook_only_decodes_named_fields() {
        let hook = DatetimeHook::for_fields(["DOB"]);
        assert!(hook.decode(Some("dob"), "2010-03-04").is_some());
        assert!(hook.decode(Some("stud_code"), "2010-03-04").is_none());
        assert!(hook.decode(None, "2010-03-04").is_none());

        let known = DatetimeHook::known_fields();
        assert!(known.decode(Some("update_on"), "2026-02-11T10:45:12").is_some());
    }

    #[test]
    fn timestamp_constructor_clamps_precision() {
        let naive = NaiveDate::from_ymd_opt(2026, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 123456)
            .unwrap();
        assert_eq!(ParsedDatetime::timestamp(naive, 3).to_string(), "2026-01-02T03:04:05.123");
        assert_eq!(ParsedDatetime::timestamp(naive, 9).precision(), 6);
    }
}
