//! Month tokens and the ordered month sequence that forms the animation index space.

use crate::{ViewerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One frame of the time series, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: u16,
    month: u8,
}

impl Month {
    /// Creates a month, rejecting month numbers outside `1..=12`
    pub fn new(year: u16, month: u8) -> Result<Self> {
        if !(1..=12).contains(&month) || year > 9999 {
            return Err(ViewerError::InvalidMonth(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// Calendar successor (December rolls into January)
    pub fn succ(&self) -> Month {
        if self.month == 12 {
            Month { year: self.year + 1, month: 1 }
        } else {
            Month { year: self.year, month: self.month + 1 }
        }
    }
}

impl FromStr for Month {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ViewerError::InvalidMonth(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(invalid());
        }
        let (year, month) = (&s[..4], &s[5..]);
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: u16 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        Month::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Month {
    type Error = ViewerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Inclusive window of months a data set covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub start: Month,
    pub end: Month,
}

impl Coverage {
    pub fn new(start: Month, end: Month) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, month: Month) -> bool {
        month >= self.start && month <= self.end
    }
}

/// Non-empty, strictly increasing list of months
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthSequence {
    months: Vec<Month>,
}

impl MonthSequence {
    /// Builds a sequence, rejecting empty or unordered input
    pub fn new(months: Vec<Month>) -> Result<Self> {
        if months.is_empty() {
            return Err(ViewerError::Manifest("month sequence is empty".to_string()));
        }
        if let Some(pair) = months.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ViewerError::Manifest(format!(
                "months are not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { months })
    }

    /// Every month from `start` to `end`, inclusive
    pub fn range(start: Month, end: Month) -> Result<Self> {
        let mut months = Vec::new();
        let mut month = start;
        while month <= end {
            months.push(month);
            month = month.succ();
        }
        Self::new(months)
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Month> {
        self.months.get(index).copied()
    }

    /// Index clamped into `[0, len - 1]`
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.months.len() - 1)
    }

    /// Month at `index` modulo the sequence length; negative offsets wrap from the end
    pub fn wrapped(&self, index: i64) -> Month {
        let count = self.months.len() as i64;
        self.months[index.rem_euclid(count) as usize]
    }

    pub fn position(&self, month: Month) -> Option<usize> {
        self.months.binary_search(&month).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Month> {
        self.months.iter()
    }

    pub fn as_slice(&self) -> &[Month] {
        &self.months
    }
}
