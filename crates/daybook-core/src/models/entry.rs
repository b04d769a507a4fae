//! Journal entry model

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Timestamp;
use crate::error::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date that keys an entry, always `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryDate(NaiveDate);

impl EntryDate {
    /// Build a date from its parts, rejecting impossible calendar dates
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, Error> {
        if !(1..=9999).contains(&year) {
            return Err(Error::InvalidInput(format!("year {year} is out of range")));
        }
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| {
                Error::InvalidInput(format!("{year:04}-{month:02}-{day:02} is not a real date"))
            })
    }

    /// Today's date in the local timezone
    #[must_use]
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(self) -> u32 {
        self.0.day()
    }

    /// The following calendar day, if any
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// The preceding calendar day, if any
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    #[must_use]
    pub const fn as_naive(self) -> NaiveDate {
        self.0
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for EntryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for EntryDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput(format!("date '{s}' must be in YYYY-MM-DD format"));

        let bytes = s.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(index, byte)| match index {
                4 | 7 => *byte == b'-',
                _ => byte.is_ascii_digit(),
            });
        if !shape_ok {
            return Err(invalid());
        }

        let date = NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| invalid())?;
        if date.year() < 1 {
            return Err(invalid());
        }
        Ok(Self(date))
    }
}

impl Serialize for EntryDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntryDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One journal entry. An empty message is a tombstone: the entry was
/// deleted as of `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub date: EntryDate,
    pub message: String,
    pub timestamp: Timestamp,
}

impl Entry {
    #[must_use]
    pub fn new(date: EntryDate, message: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            date,
            message: message.into(),
            timestamp,
        }
    }

    /// Deletion marker for `date`
    #[must_use]
    pub const fn tombstone(date: EntryDate, timestamp: Timestamp) -> Self {
        Self {
            date,
            message: String::new(),
            timestamp,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.message.is_empty()
    }
}
