use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A UTC instant.
///
/// The text form is RFC 3339 with nanosecond precision and a `Z` suffix, so
/// a value survives a text round-trip exactly. Local time never appears in
/// the text form: offsets are accepted on input and normalized to UTC.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// The UNIX epoch.
    pub fn zero() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Create from seconds and nanoseconds since the UNIX epoch.
    ///
    /// Returns `None` if the value is out of chrono's representable range.
    pub fn from_unix(secs: i64, nanos: u32) -> Option<Self> {
        Utc.timestamp_opt(secs, nanos).single().map(Self)
    }

    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.0.timestamp_subsec_nanos()
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Canonical text form.
    pub fn to_text(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Parse any RFC 3339 timestamp, normalizing to UTC.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|_| TypeError::text("time", s))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl FromStr for Timestamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_text())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_utc_with_nanos() {
        let ts = Timestamp::from_unix(0, 5).unwrap();
        assert_eq!(ts.to_text(), "1970-01-01T00:00:00.000000005Z");
    }

    #[test]
    fn offsets_normalize_to_utc() {
        let ts = Timestamp::parse("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(ts.to_text(), "2024-03-01T08:00:00.000000000Z");
    }

    #[test]
    fn roundtrip_keeps_nanoseconds() {
        let ts = Timestamp::from_unix(1_700_000_000, 123_456_789).unwrap();
        let back = Timestamp::parse(&ts.to_text()).unwrap();
        assert_eq!(ts, back);
        assert_eq!(back.subsec_nanos(), 123_456_789);
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            Timestamp::parse("yesterday"),
            Err(TypeError::InvalidText { kind: "time", .. })
        ));
    }

    #[test]
    fn ordering_follows_time() {
        let a = Timestamp::from_unix(10, 0).unwrap();
        let b = Timestamp::from_unix(10, 1).unwrap();
        assert!(a < b);
        assert!(Timestamp::zero() < a);
    }
}
