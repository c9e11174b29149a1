//! Timezone-aware timestamps for log lines.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{NetprobeError, Result};

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats the current time in a configured IANA zone.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    tz: Tz,
}

impl Clock {
    /// Build a clock for an IANA zone name such as `Asia/Bangkok`.
    pub fn new(zone: &str) -> Result<Self> {
        let tz = zone
            .parse::<Tz>()
            .map_err(|e| NetprobeError::invalid("target.timezone", e.to_string()))?;
        Ok(Self { tz })
    }

    pub fn zone_name(&self) -> &'static str {
        self.tz.name()
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Current local time as `YYYY-MM-DD HH:MM:SS`.
    pub fn stamp(&self) -> String {
        self.format(Utc::now())
    }

    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.tz).format(STAMP_FORMAT).to_string()
    }
}
