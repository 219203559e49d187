//! Billing periods
//!
//! A billing period is a named calendar window used to group usage. Every
//! period kind derives two things purely from its own fields: an inclusive
//! UTC time range covering exactly one calendar unit, and a canonical key
//! such as `daily-2025-01-15` or `monthly-2025-01`. Keys carry a per-kind
//! prefix so that kinds never collide, and within a kind they sort
//! chronologically for four-digit years.
//!
//! Constructors reject impossible fields instead of clamping them.
//!
//! # Examples
//!
//! ```
//! use meterbill_core::period::{BillingPeriod, CalendarPeriod};
//! use chrono::{TimeZone, Utc};
//!
//! let period = BillingPeriod::monthly(2025, 1).unwrap();
//! let (start, end) = period.time_range();
//!
//! assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
//! assert_eq!(end.to_rfc3339(), "2025-01-31T23:59:59.999999999+00:00");
//! assert_eq!(period.key(), "monthly-2025-01");
//! ```

use crate::error::{MeterbillError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operations shared by every billing period kind
pub trait CalendarPeriod {
    /// Inclusive start and inclusive end of the calendar unit
    ///
    /// The end is the last nanosecond before the following unit starts.
    fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>);

    /// Canonical, sortable identifier, namespaced by the period kind
    fn key(&self) -> String;
}

/// Midnight UTC at the start of `date`
fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// 23:59:59.999999999 UTC on `date`
fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date) + (Duration::days(1) - Duration::nanoseconds(1))
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn parse_field<T: FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MeterbillError::InvalidPeriod(format!("malformed period key '{key}'")))
}

/// Kind of billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// One calendar day
    Daily,
    /// One ISO-8601 week, Monday to Sunday
    Weekly,
    /// One calendar month
    Monthly,
}

impl PeriodKind {
    /// Key prefix used by periods of this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for PeriodKind {
    type Err = MeterbillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(MeterbillError::InvalidArgument(format!(
                "unknown period kind '{s}', expected daily, weekly or monthly"
            ))),
        }
    }
}

/// A single UTC calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DailyPeriod {
    date: NaiveDate,
}

impl DailyPeriod {
    /// Period for a calendar date
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    /// Period for year, month and day, rejecting impossible dates
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self::new)
            .ok_or_else(|| {
                MeterbillError::InvalidPeriod(format!(
                    "{year:04}-{month:02}-{day:02} is not a calendar date"
                ))
            })
    }

    /// The UTC day holding `instant`
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self::new(instant.date_naive())
    }

    /// The calendar date
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The following day
    pub fn next(&self) -> Option<Self> {
        self.date.succ_opt().map(Self::new)
    }
}

impl CalendarPeriod for DailyPeriod {
    fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (day_start(self.date), day_end(self.date))
    }

    fn key(&self) -> String {
        format!(
            "daily-{:04}-{:02}-{:02}",
            self.date.year(),
            self.date.month(),
            self.date.day()
        )
    }
}

/// A single ISO-8601 week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeeklyPeriod {
    year: i32,
    week: u32,
    monday: NaiveDate,
    sunday: NaiveDate,
}

impl WeeklyPeriod {
    /// Period for an ISO week-numbering year and week number
    pub fn new(year: i32, week: u32) -> Result<Self> {
        let invalid =
            || MeterbillError::InvalidPeriod(format!("{year:04}-W{week:02} is not an ISO week"));
        let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
        let sunday = NaiveDate::from_isoywd_opt(year, week, Weekday::Sun).ok_or_else(invalid)?;

        Ok(Self {
            year,
            week,
            monday,
            sunday,
        })
    }

    /// The ISO week holding `instant`
    pub fn containing(instant: DateTime<Utc>) -> Result<Self> {
        let iso = instant.date_naive().iso_week();
        Self::new(iso.year(), iso.week())
    }

    /// ISO week-numbering year
    pub fn year(&self) -> i32 {
        self.year
    }

    /// ISO week number, 1 to 53
    pub fn week(&self) -> u32 {
        self.week
    }

    /// The following week
    pub fn next(&self) -> Option<Self> {
        let following = self.sunday.succ_opt()?.iso_week();
        Self::new(following.year(), following.week()).ok()
    }
}

impl CalendarPeriod for WeeklyPeriod {
    fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (day_start(self.monday), day_end(self.sunday))
    }

    fn key(&self) -> String {
        format!("weekly-{:04}-W{:02}", self.year, self.week)
    }
}

/// A single calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthlyPeriod {
    year: i32,
    month: u32,
    first_day: NaiveDate,
    last_day: NaiveDate,
}

impl MonthlyPeriod {
    /// Period for a year and month number (1-12)
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(MeterbillError::InvalidPeriod(format!(
                "month {month} is outside 1-12"
            )));
        }

        let invalid = || {
            MeterbillError::InvalidPeriod(format!("{year:04}-{month:02} is outside the calendar"))
        };
        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let last_day = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))
            .ok_or_else(invalid)?;

        Ok(Self {
            year,
            month,
            first_day,
            last_day,
        })
    }

    /// The UTC calendar month holding `instant`
    pub fn containing(instant: DateTime<Utc>) -> Result<Self> {
        Self::new(instant.year(), instant.month())
    }

    /// Calendar year
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month number, 1 to 12
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following month
    pub fn next(&self) -> Option<Self> {
        if self.month == 12 {
            Self::new(self.year.checked_add(1)?, 1).ok()
        } else {
            Self::new(self.year, self.month + 1).ok()
        }
    }
}

impl CalendarPeriod for MonthlyPeriod {
    fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (day_start(self.first_day), day_end(self.last_day))
    }

    fn key(&self) -> String {
        format!("monthly-{:04}-{:02}", self.year, self.month)
    }
}

/// Billing period of any supported kind
///
/// Serializes as its canonical key.
///
/// # Examples
///
/// ```
/// use meterbill_core::period::{BillingPeriod, CalendarPeriod, PeriodKind};
/// use chrono::{TimeZone, Utc};
///
/// let instant = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
/// let period = BillingPeriod::containing(PeriodKind::Daily, instant).unwrap();
/// assert_eq!(period.key(), "daily-2025-01-15");
///
/// let parsed: BillingPeriod = "daily-2025-01-15".parse().unwrap();
/// assert_eq!(parsed, period);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BillingPeriod {
    /// One calendar day
    Daily(DailyPeriod),
    /// One ISO week
    Weekly(WeeklyPeriod),
    /// One calendar month
    Monthly(MonthlyPeriod),
}

impl BillingPeriod {
    /// Daily period for a date
    pub fn daily(date: NaiveDate) -> Self {
        Self::Daily(DailyPeriod::new(date))
    }

    /// Weekly period for an ISO year and week
    pub fn weekly(year: i32, week: u32) -> Result<Self> {
        WeeklyPeriod::new(year, week).map(Self::Weekly)
    }

    /// Monthly period for a year and month
    pub fn monthly(year: i32, month: u32) -> Result<Self> {
        MonthlyPeriod::new(year, month).map(Self::Monthly)
    }

    /// The period of `kind` whose range holds `instant`
    pub fn containing(kind: PeriodKind, instant: DateTime<Utc>) -> Result<Self> {
        match kind {
            PeriodKind::Daily => Ok(Self::Daily(DailyPeriod::containing(instant))),
            PeriodKind::Weekly => WeeklyPeriod::containing(instant).map(Self::Weekly),
            PeriodKind::Monthly => MonthlyPeriod::containing(instant).map(Self::Monthly),
        }
    }

    /// Kind of this period
    pub fn kind(&self) -> PeriodKind {
        match self {
            Self::Daily(_) => PeriodKind::Daily,
            Self::Weekly(_) => PeriodKind::Weekly,
            Self::Monthly(_) => PeriodKind::Monthly,
        }
    }

    /// The immediately following period of the same kind
    ///
    /// `None` only past the end of the representable calendar.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Daily(p) => p.next().map(Self::Daily),
            Self::Weekly(p) => p.next().map(Self::Weekly),
            Self::Monthly(p) => p.next().map(Self::Monthly),
        }
    }

    /// Whether `instant` falls inside the period
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let (start, end) = self.time_range();
        start <= instant && instant <= end
    }

    fn parse_key(s: &str) -> Result<Self> {
        let (prefix, rest) = s
            .split_once('-')
            .ok_or_else(|| MeterbillError::InvalidPeriod(format!("malformed period key '{s}'")))?;
        let malformed = || MeterbillError::InvalidPeriod(format!("malformed period key '{s}'"));

        match prefix.parse::<PeriodKind>().map_err(|_| malformed())? {
            PeriodKind::Daily => {
                let mut parts = rest.rsplitn(3, '-');
                let day = parts.next().ok_or_else(malformed)?;
                let month = parts.next().ok_or_else(malformed)?;
                let year = parts.next().ok_or_else(malformed)?;
                DailyPeriod::from_ymd(
                    parse_field(year, s)?,
                    parse_field(month, s)?,
                    parse_field(day, s)?,
                )
                .map(Self::Daily)
            }
            PeriodKind::Weekly => {
                let (year, week) = rest.rsplit_once("-W").ok_or_else(malformed)?;
                Self::weekly(parse_field(year, s)?, parse_field(week, s)?)
            }
            PeriodKind::Monthly => {
                let (year, month) = rest.rsplit_once('-').ok_or_else(malformed)?;
                Self::monthly(parse_field(year, s)?, parse_field(month, s)?)
            }
        }
    }
}

impl CalendarPeriod for BillingPeriod {
    fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            Self::Daily(p) => p.time_range(),
            Self::Weekly(p) => p.time_range(),
            Self::Monthly(p) => p.time_range(),
        }
    }

    fn key(&self) -> String {
        match self {
            Self::Daily(p) => p.key(),
            Self::Weekly(p) => p.key(),
            Self::Monthly(p) => p.key(),
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for BillingPeriod {
    type Err = MeterbillError;

    /// Parse a canonical key; non-canonical spellings such as
    /// `monthly-2025-1` are rejected.
    fn from_str(s: &str) -> Result<Self> {
        let period = Self::parse_key(s)?;
        if period.key() != s {
            return Err(MeterbillError::InvalidPeriod(format!(
                "'{s}' is not canonical, expected '{}'",
                period.key()
            )));
        }
        Ok(period)
    }
}

impl TryFrom<String> for BillingPeriod {
    type Error = MeterbillError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BillingPeriod> for String {
    fn from(period: BillingPeriod) -> Self {
        period.key()
    }
}
