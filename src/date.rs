//! Conversion between the property list epoch and Unix time.
//!
//! Property lists store dates as signed floating-point seconds relative to
//! 2001-01-01T00:00:00Z. Values in this crate are kept relative to the Unix
//! epoch instead, and converted at the format boundary.

use std::fmt;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

use crate::error::{PlistError, PlistResult};

/// Seconds between 1970-01-01T00:00:00Z and 2001-01-01T00:00:00Z.
pub const APPLE_EPOCH_OFFSET: f64 = 978_307_200.0;

/// An absolute point in time, stored as fractional seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Date {
    unix_seconds: f64,
}

impl Date {
    /// The property list epoch, 2001-01-01T00:00:00Z.
    pub const APPLE_EPOCH: Date = Date::from_unix_seconds(APPLE_EPOCH_OFFSET);

    pub const fn from_unix_seconds(unix_seconds: f64) -> Self {
        Self { unix_seconds }
    }

    /// Seconds since 1970-01-01T00:00:00Z.
    pub fn unix_seconds(self) -> f64 {
        self.unix_seconds
    }

    /// Builds a date from seconds since 2001-01-01T00:00:00Z.
    pub fn from_apple_timestamp(timestamp: f64) -> Self {
        Self::from_unix_seconds(timestamp + APPLE_EPOCH_OFFSET)
    }

    /// Seconds since 2001-01-01T00:00:00Z.
    pub fn apple_timestamp(self) -> f64 {
        self.unix_seconds - APPLE_EPOCH_OFFSET
    }

    /// Converts to a calendar date, or `None` when the timestamp is not
    /// finite or lies outside the range chrono can represent.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if !self.unix_seconds.is_finite() {
            return None;
        }
        let secs = self.unix_seconds.floor();
        if secs < i64::MIN as f64 || secs >= i64::MAX as f64 {
            return None;
        }
        let nanos = ((self.unix_seconds - secs) * 1e9) as u32;
        DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
    }

    /// Formats the date as `YYYY-MM-DDTHH:MM:SSZ`, dropping sub-second
    /// precision. Only years 0 through 9999 have a four-digit form.
    pub fn to_iso8601(self) -> PlistResult<String> {
        let dt = self.to_datetime().ok_or_else(|| {
            PlistError::InvalidDate(format!(
                "timestamp {} has no calendar representation",
                self.unix_seconds
            ))
        })?;
        if !(0..=9999).contains(&dt.year()) {
            return Err(PlistError::InvalidDate(format!(
                "year {} does not fit YYYY-MM-DDTHH:MM:SSZ",
                dt.year()
            )));
        }
        Ok(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Parses ISO-8601 text such as `2012-10-14T23:21:04Z`.
    pub fn parse_iso8601(text: &str) -> PlistResult<Self> {
        let dt = DateTime::parse_from_rfc3339(text.trim())
            .map_err(|e| PlistError::InvalidDate(format!("{text:?}: {e}")))?;
        Ok(Self::from(dt.with_timezone(&Utc)))
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(dt: DateTime<Utc>) -> Self {
        let secs = dt.timestamp() as f64;
        let frac = f64::from(dt.timestamp_subsec_nanos()) / 1e9;
        Self::from_unix_seconds(secs + frac)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => write!(f, "date({})", self.unix_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn apple_epoch_is_2001() {
        let dt = Date::APPLE_EPOCH.to_datetime().unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(Date::APPLE_EPOCH.apple_timestamp(), 0.0);
    }

    #[test]
    fn native_timestamp_converts_exactly() {
        // 978307200 + 338610664 = 1316917864
        let date = Date::from_apple_timestamp(338_610_664.0);
        assert_eq!(date.unix_seconds(), 1_316_917_864.0);
        assert_eq!(date.to_iso8601().unwrap(), "2011-09-25T02:31:04Z");
        assert_eq!(date.apple_timestamp(), 338_610_664.0);
    }

    #[test]
    fn dates_before_the_epoch() {
        let date = Date::from_apple_timestamp(-86_400.0);
        assert_eq!(date.to_iso8601().unwrap(), "2000-12-31T00:00:00Z");
    }

    #[test]
    fn iso8601_drops_subseconds() {
        let date = Date::from_unix_seconds(1_316_917_864.75);
        assert_eq!(date.to_iso8601().unwrap(), "2011-09-25T02:31:04Z");
    }

    #[test]
    fn parse_iso8601() {
        let date = Date::parse_iso8601("2012-10-14T23:21:04Z").unwrap();
        let expected = Utc.with_ymd_and_hms(2012, 10, 14, 23, 21, 4).unwrap();
        assert_eq!(date, Date::from(expected));
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = Date::parse_iso8601("yesterday").unwrap_err();
        assert!(matches!(err, PlistError::InvalidDate(_)));
    }

    #[test]
    fn non_finite_has_no_calendar_form() {
        assert!(Date::from_unix_seconds(f64::NAN).to_datetime().is_none());
        assert!(Date::from_unix_seconds(f64::INFINITY).to_iso8601().is_err());
    }

    #[test]
    fn iso8601_year_range() {
        let last = Date::from_unix_seconds(253_402_300_799.0);
        let text = last.to_iso8601().unwrap();
        assert_eq!(text, "9999-12-31T23:59:59Z");
        assert_eq!(Date::parse_iso8601(&text).unwrap(), last);

        let err = Date::from_unix_seconds(253_402_300_800.0).to_iso8601().unwrap_err();
        assert!(matches!(err, PlistError::InvalidDate(_)));
        let before_year_zero = Date::from_unix_seconds(-62_167_219_201.0);
        assert!(before_year_zero.to_iso8601().is_err());
    }
}
