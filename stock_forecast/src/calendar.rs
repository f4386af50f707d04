//! Week bucketing for weekly aggregation
//!
//! A week is identified by a `WeekKey` of the form `YYYY-WW`. The key is
//! derived from the date the week *starts* on, so a week that straddles New
//! Year is one bucket rather than two.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// First day of the aggregation week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    /// Sunday-origin weeks, numbered like `%U`
    #[default]
    Sunday,
    /// Monday-origin weeks, numbered like `%W`
    Monday,
}

impl WeekStart {
    /// The weekday a week begins on
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }

    /// The first day of the week containing `date`
    pub fn start_of_week(self, date: NaiveDate) -> NaiveDate {
        let elapsed = match self {
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
            WeekStart::Monday => date.weekday().num_days_from_monday(),
        };
        date - Duration::days(elapsed as i64)
    }

    fn week_format(self) -> &'static str {
        match self {
            WeekStart::Sunday => "%Y-%U",
            WeekStart::Monday => "%Y-%W",
        }
    }

    /// First occurrence of the starting weekday in `year` (start of week 01)
    fn first_week_start(self, year: i32) -> Option<NaiveDate> {
        let jan_first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let since = match self {
            WeekStart::Sunday => jan_first.weekday().num_days_from_sunday(),
            WeekStart::Monday => jan_first.weekday().num_days_from_monday(),
        };
        let offset = (7 - since) % 7;
        Some(jan_first + Duration::days(offset as i64))
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekStart::Sunday => write!(f, "sunday"),
            WeekStart::Monday => write!(f, "monday"),
        }
    }
}

/// Canonical year-week bucket identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekKey(String);

impl WeekKey {
    /// Bucket a calendar date
    pub fn for_date(date: NaiveDate, week_start: WeekStart) -> Self {
        let start = week_start.start_of_week(date);
        WeekKey(start.format(week_start.week_format()).to_string())
    }

    /// Validate a key read back from storage
    pub fn parse(text: &str, week_start: WeekStart) -> Result<Self> {
        let key = WeekKey(text.trim().to_string());
        key.week_start(week_start)?;
        Ok(key)
    }

    /// Calendar date of the first day of this week
    pub fn week_start(&self, week_start: WeekStart) -> Result<NaiveDate> {
        let invalid = || {
            ForecastError::ValidationError(format!(
                "Invalid week key '{}' for {}-based weeks",
                self.0, week_start
            ))
        };

        let (year, week) = self.0.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || week.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: i64 = week.parse().map_err(|_| invalid())?;
        if !(1..=53).contains(&week) {
            return Err(invalid());
        }

        let first = week_start.first_week_start(year).ok_or_else(invalid)?;
        let date = first + Duration::weeks(week - 1);

        // Week 53 only exists in some years
        if WeekKey::for_date(date, week_start) != *self {
            return Err(invalid());
        }

        Ok(date)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
