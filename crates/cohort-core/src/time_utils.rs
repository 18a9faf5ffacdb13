use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset as _, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::warn;

use crate::error::{CohortError, Result};
use crate::models::CohortId;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails or the detected name is not a
/// known IANA zone.
pub fn get_system_timezone() -> String {
    match iana_time_zone::get_timezone() {
        Ok(name) if name.parse::<Tz>().is_ok() => name,
        Ok(name) => {
            warn!("System timezone {:?} is not a known IANA zone, using UTC", name);
            "UTC".to_string()
        }
        Err(e) => {
            warn!("Could not detect system timezone ({}), using UTC", e);
            "UTC".to_string()
        }
    }
}

// ── TargetTimezone ────────────────────────────────────────────────────────────

/// Timezone that signup timestamps are normalized into before bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetTimezone {
    /// A fixed UTC offset such as `-0500`.
    Fixed(FixedOffset),
    /// A named IANA zone; the offset follows its daylight-saving rules.
    Named(Tz),
}

impl TargetTimezone {
    /// Convert a UTC instant into this timezone.
    pub fn normalize(&self, dt: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            TargetTimezone::Fixed(offset) => dt.with_timezone(offset),
            TargetTimezone::Named(tz) => {
                let local = dt.with_timezone(tz);
                local.with_timezone(&local.offset().fix())
            }
        }
    }
}

impl fmt::Display for TargetTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetTimezone::Fixed(offset) => write!(f, "{}", offset),
            TargetTimezone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

fn utc_offset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([+-])(\d{2})(?::?(\d{2}))?$").expect("regex is valid"))
}

/// Parse a timezone given either as a UTC offset (`-0500`, `+05:30`, `+02`,
/// `Z`) or as an IANA name (`America/New_York`, `UTC`).
pub fn parse_timezone(s: &str) -> Result<TargetTimezone> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("z") {
        return Ok(TargetTimezone::Fixed(Utc.fix()));
    }

    if let Some(caps) = utc_offset_regex().captures(trimmed) {
        let hours: i32 = caps[2]
            .parse()
            .map_err(|_| CohortError::InvalidTimezone(s.to_string()))?;
        let minutes: i32 = caps
            .get(3)
            .map_or(Ok(0), |m| m.as_str().parse())
            .map_err(|_| CohortError::InvalidTimezone(s.to_string()))?;
        if hours > 23 || minutes > 59 {
            return Err(CohortError::InvalidTimezone(s.to_string()));
        }
        let sign = if &caps[1] == "-" { -1 } else { 1 };
        return FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(TargetTimezone::Fixed)
            .ok_or_else(|| CohortError::InvalidTimezone(s.to_string()));
    }

    trimmed
        .parse::<Tz>()
        .map(TargetTimezone::Named)
        .map_err(|_| CohortError::InvalidTimezone(s.to_string()))
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Parses raw signup timestamps and normalizes them into the target timezone.
#[derive(Debug, Clone)]
pub struct TimezoneHandler {
    target: TargetTimezone,
}

impl TimezoneHandler {
    /// Create a handler for the timezone named by `tz_name`.
    pub fn new(tz_name: &str) -> Result<Self> {
        Ok(Self {
            target: parse_timezone(tz_name)?,
        })
    }

    pub fn with_target(target: TargetTimezone) -> Self {
        Self { target }
    }

    /// Validate that `tz_name` is a UTC offset or a recognised IANA name.
    pub fn validate_timezone(tz_name: &str) -> bool {
        parse_timezone(tz_name).is_ok()
    }

    /// Parse a timestamp and convert it into the target timezone.
    ///
    /// Accepts RFC 3339, `%Y-%m-%d %H:%M:%S%z` and naive timestamps, the
    /// latter interpreted as UTC.
    pub fn parse_timestamp(&self, s: &str) -> Result<DateTime<FixedOffset>> {
        parse_utc_timestamp(s).map(|dt| self.target.normalize(dt))
    }

    pub fn normalize(&self, dt: DateTime<Utc>) -> DateTime<FixedOffset> {
        self.target.normalize(dt)
    }

    pub fn target(&self) -> TargetTimezone {
        self.target
    }
}

/// Parse a timestamp string into a UTC [`DateTime`].
pub fn parse_utc_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(CohortError::TimestampParse(s.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    const OFFSET_FMTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%z"];
    for fmt in OFFSET_FMTS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    const NAIVE_FMTS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in NAIVE_FMTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive.and_utc());
        }
    }

    Err(CohortError::TimestampParse(s.to_string()))
}

// ── Weekly cohort keys ────────────────────────────────────────────────────────

/// Monday opening ISO week 1 of 1971; cohort week 0.
fn week_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1971, 1, 4).expect("epoch date is valid")
}

/// Map a signup date to its weekly cohort id.
///
/// Weeks start on Monday; ids count whole weeks since 1971-01-04 and are
/// negative for earlier dates.
pub fn calculate_week_id(date: NaiveDate) -> CohortId {
    (date - week_epoch()).num_days().div_euclid(7)
}

/// The Monday that opens the week identified by `cohort_id`.
pub fn week_start(cohort_id: CohortId) -> NaiveDate {
    week_epoch() + Duration::days(cohort_id * 7)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
