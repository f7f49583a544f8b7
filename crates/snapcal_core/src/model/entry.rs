//! Calorie entry domain model.
//!
//! # Responsibility
//! - Define the canonical calorie record and its insertion-time partial.
//! - Own the `YYYY-MM-DD` day-key format that partitions entries into ledgers.
//!
//! # Invariants
//! - `id` is stable and never reused for another entry.
//! - `kcal` and `qty_g` (when present) are finite and non-negative.
//! - `name` is non-empty after trimming.
//! - `date` always round-trips through the `%Y-%m-%d` format.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every calorie entry.
pub type EntryId = Uuid;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar-day key in `YYYY-MM-DD` form.
///
/// Lexicographic order equals chronological order, so `Ord` is derived.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(String);

impl DayKey {
    /// Parses and validates a day-key string.
    ///
    /// # Errors
    /// - Returns `DayKeyError` when `value` is not a real date in
    ///   zero-padded `YYYY-MM-DD` form.
    pub fn parse(value: &str) -> Result<Self, DayKeyError> {
        let trimmed = value.trim();
        let date = NaiveDate::parse_from_str(trimmed, DAY_KEY_FORMAT)
            .map_err(|_| DayKeyError(trimmed.to_string()))?;
        let key = Self::from_date(date);
        // chrono accepts unpadded months/days; the stored form must not.
        if key.0 != trimmed {
            return Err(DayKeyError(trimmed.to_string()));
        }
        Ok(key)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(DAY_KEY_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DayKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DayKey {
    type Error = DayKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DayKey> for String {
    fn from(value: DayKey) -> Self {
        value.0
    }
}

/// Rejected day-key input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayKeyError(pub String);

impl Display for DayKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid day key `{}`; expected YYYY-MM-DD", self.0)
    }
}

impl Error for DayKeyError {}

/// Origin of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Estimated by the vision model from a meal photo.
    Ai,
    /// Typed in by the user.
    Manual,
}

impl EntrySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Manual => "manual",
        }
    }
}

/// Insertion input: everything except the store-stamped fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub name: String,
    pub kcal: f64,
    pub qty_g: Option<f64>,
    pub source: EntrySource,
}

impl NewEntry {
    /// Builds a manual entry without portion information.
    pub fn manual(name: impl Into<String>, kcal: f64) -> Self {
        Self {
            name: name.into(),
            kcal,
            qty_g: None,
            source: EntrySource::Manual,
        }
    }

    /// Builds a model-estimated entry.
    pub fn ai(name: impl Into<String>, kcal: f64, qty_g: Option<f64>) -> Self {
        Self {
            name: name.into(),
            kcal,
            qty_g,
            source: EntrySource::Ai,
        }
    }

    #[must_use]
    pub fn with_qty_g(mut self, qty_g: f64) -> Self {
        self.qty_g = Some(qty_g);
        self
    }

    /// Validates numeric bounds and trims the display name in place.
    ///
    /// # Errors
    /// - `EmptyName` when the trimmed name is empty.
    /// - `InvalidKcal` / `InvalidQty` for negative or non-finite numbers.
    pub fn normalize(&mut self) -> Result<(), EntryValidationError> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            return Err(EntryValidationError::EmptyName);
        }
        if trimmed.len() != self.name.len() {
            self.name = trimmed.to_string();
        }
        check_amount(self.kcal).map_err(EntryValidationError::InvalidKcal)?;
        if let Some(qty) = self.qty_g {
            check_amount(qty).map_err(EntryValidationError::InvalidQty)?;
        }
        Ok(())
    }
}

/// Canonical persisted calorie record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalorieEntry {
    pub id: EntryId,
    pub name: String,
    pub kcal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty_g: Option<f64>,
    pub source: EntrySource,
    /// Unix epoch milliseconds at insertion.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    pub date: DayKey,
}

impl CalorieEntry {
    /// Stamps a validated partial with identity, audit time and ledger day.
    pub(crate) fn stamp(partial: NewEntry, id: EntryId, created_at: i64, date: DayKey) -> Self {
        Self {
            id,
            name: partial.name,
            kcal: partial.kcal,
            qty_g: partial.qty_g,
            source: partial.source,
            created_at,
            date,
        }
    }

    /// Re-checks invariants on data coming back from storage.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntryValidationError::EmptyName);
        }
        check_amount(self.kcal).map_err(EntryValidationError::InvalidKcal)?;
        if let Some(qty) = self.qty_g {
            check_amount(qty).map_err(EntryValidationError::InvalidQty)?;
        }
        Ok(())
    }
}

/// Validation errors for entry content.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValidationError {
    EmptyName,
    InvalidKcal(f64),
    InvalidQty(f64),
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "entry name must not be empty"),
            Self::InvalidKcal(value) => {
                write!(f, "kcal must be a finite non-negative number, got {value}")
            }
            Self::InvalidQty(value) => {
                write!(f, "qty_g must be a finite non-negative number, got {value}")
            }
        }
    }
}

impl Error for EntryValidationError {}

fn check_amount(value: f64) -> Result<(), f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{DayKey, EntryValidationError, NewEntry};

    #[test]
    fn day_key_accepts_padded_dates_only() {
        assert_eq!(DayKey::parse("2024-01-05").unwrap().as_str(), "2024-01-05");
        assert!(DayKey::parse("2024-1-5").is_err());
        assert!(DayKey::parse("2024-02-30").is_err());
        assert!(DayKey::parse("yesterday").is_err());
    }

    #[test]
    fn day_key_orders_chronologically() {
        let older = DayKey::parse("2023-12-31").unwrap();
        let newer = DayKey::parse("2024-01-01").unwrap();
        assert!(older < newer);
    }

    #[test]
    fn normalize_trims_name_and_rejects_bad_numbers() {
        let mut entry = NewEntry::manual("  Rice ", 200.0);
        entry.normalize().unwrap();
        assert_eq!(entry.name, "Rice");

        let mut blank = NewEntry::manual("   ", 10.0);
        assert_eq!(blank.normalize(), Err(EntryValidationError::EmptyName));

        let mut negative = NewEntry::manual("Soup", -1.0);
        assert!(matches!(
            negative.normalize(),
            Err(EntryValidationError::InvalidKcal(_))
        ));

        let mut nan_qty = NewEntry::manual("Soup", 1.0).with_qty_g(f64::NAN);
        assert!(matches!(
            nan_qty.normalize(),
            Err(EntryValidationError::InvalidQty(_))
        ));
    }
}
