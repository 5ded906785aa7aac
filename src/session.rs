use chrono::{DateTime, TimeZone};
use core::fmt;

/// Partition key for every snapshot uploaded during one run, derived from
/// the process start time to the minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    pub fn starting_at<Z: TimeZone>(start: &DateTime<Z>) -> Self
    where
        Z::Offset: fmt::Display,
    {
        Self(start.format("session_%Y-%m-%d_%H-%M").to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
