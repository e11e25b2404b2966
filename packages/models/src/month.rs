//! Calendar month keys for monthly report batches.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Day of month up to which the previous month is still the default batch.
const PREVIOUS_MONTH_CUTOFF_DAY: u32 = 10;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A `(year, month)` batch key, printed and parsed as `YYYY-MM`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// # Errors
    ///
    /// Returns an error if `month` is not in `1..=12`.
    pub const fn new(year: i32, month: u32) -> Result<Self, InvalidYearMonthError> {
        if month == 0 || month > 12 {
            return Err(InvalidYearMonthError::Month { month });
        }
        Ok(Self { year, month })
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The month containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The batch to process when none is given explicitly.
    ///
    /// Early in a month the previous month's data is the one still being
    /// completed, so up to day 10 the previous month is chosen.
    #[must_use]
    pub fn default_for(today: NaiveDate) -> Self {
        let current = Self::containing(today);
        if today.day() <= PREVIOUS_MONTH_CUTOFF_DAY {
            current.previous()
        } else {
            current
        }
    }

    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First instant of the month, 00:00 UTC.
    #[must_use]
    pub fn start(self) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(DateTime::<Utc>::MIN_UTC, |naive| naive.and_utc())
    }

    /// Half-open UTC range `[start, next month's start)`.
    #[must_use]
    pub fn range(self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start(), self.next().start())
    }

    /// English month name, e.g. `"January"`.
    #[must_use]
    pub const fn month_name(self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// Zero-padded `(YYYY, MM)` parts used in artifact file names.
    #[must_use]
    pub fn file_parts(self) -> (String, String) {
        (format!("{:04}", self.year), format!("{:02}", self.month))
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = InvalidYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidYearMonthError::Format {
            input: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = InvalidYearMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Error returned for a malformed `YYYY-MM` month key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidYearMonthError {
    /// Not in `YYYY-MM` form.
    Format { input: String },
    /// Month outside `1..=12`.
    Month { month: u32 },
}

impl std::fmt::Display for InvalidYearMonthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format { input } => {
                write!(f, "invalid month '{input}': expected YYYY-MM (e.g. 2025-01)")
            }
            Self::Month { month } => write!(f, "invalid month number {month}: expected 1-12"),
        }
    }
}

impl std::error::Error for InvalidYearMonthError {}
