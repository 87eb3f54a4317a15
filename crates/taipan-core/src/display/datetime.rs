//! Survey timestamps. Observing dates are kept and shown in UTC so that a
//! night's records read the same from every site.

use std::fmt;

use jiff::{tz::TimeZone, Timestamp};

/// A survey event time as `YYYY-MM-DD HH:MM:SS UTC`.
pub struct SurveyTime<'a>(pub &'a Timestamp);

impl fmt::Display for SurveyTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let utc = self.0.to_zoned(TimeZone::UTC);
        write!(f, "{} UTC", utc.strftime("%Y-%m-%d %H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_time_is_utc() {
        let ts: Timestamp = "2017-03-04T23:05:09+10:00".parse().unwrap();
        assert_eq!(SurveyTime(&ts).to_string(), "2017-03-04 13:05:09 UTC");
    }
}
