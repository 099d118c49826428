use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::model::Ms;

/// Source of "now". Production uses [`SystemClock`]; tests pin time with [`FixedClock`].
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Ms;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Ms {
        system_now_ms()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: Ms) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: Ms) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Ms) {
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> Ms {
        self.now.load(Ordering::SeqCst)
    }
}

pub fn system_now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

/// Format as ISO-8601 with millisecond precision and a `Z` suffix.
pub fn to_iso8601(ms: Ms) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an RFC 3339 instant, or a naive date-time taken as UTC.
pub fn parse_instant(s: &str) -> Option<Ms> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Calendar day of `ms` in UTC.
pub fn utc_day(ms: Ms) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Serde adapter storing [`Ms`] as an ISO-8601 string.
pub mod iso8601 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_instant, to_iso8601};
    use crate::model::Ms;

    pub fn serialize<S: Serializer>(ms: &Ms, serializer: S) -> Result<S::Ok, S::Error> {
        let s = to_iso8601(*ms)
            .ok_or_else(|| serde::ser::Error::custom(format!("timestamp out of range: {ms}")))?;
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Ms, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_instant(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s:?}")))
    }
}
