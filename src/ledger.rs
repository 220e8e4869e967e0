//! # Food Ledger Module
//!
//! The per-session, ordered list of food entries produced by image analysis and
//! edited by the user before it is saved as a named food record.
//!
//! Positions in the ledger double as button payloads (`adjust_2`, `remove_0`).
//! They are only meaningful for the render they were produced by: every removal
//! shifts later entries down, so callers must re-validate an index right before
//! using it and never cache one across a mutation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{BotError, ValidationError};

/// Round a calorie figure to two decimal places
pub fn round_calories(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A single ingredient line of the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    /// Ingredient name as reported by analysis or typed by the user
    pub ingredient: String,
    /// Quantity in grams, always greater than zero
    pub quantity: f64,
    /// Energy in kcal, never negative, stored with two decimal precision
    pub calories: f64,
}

impl FoodEntry {
    /// Build a validated entry, rounding calories to two decimals
    pub fn new(
        ingredient: impl Into<String>,
        quantity: f64,
        calories: f64,
    ) -> Result<Self, ValidationError> {
        let ingredient = ingredient.into().trim().to_string();
        if ingredient.is_empty() {
            return Err(ValidationError::Empty);
        }
        validate_amounts(quantity, calories)?;
        Ok(Self {
            ingredient,
            quantity,
            calories: round_calories(calories),
        })
    }

    /// Calories for one gram of this entry
    pub fn calories_per_gram(&self) -> f64 {
        self.calories / self.quantity
    }
}

fn validate_amounts(quantity: f64, calories: f64) -> Result<(), ValidationError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ValidationError::NonPositiveQuantity);
    }
    if !calories.is_finite() || calories < 0.0 {
        return Err(ValidationError::NegativeCalories);
    }
    Ok(())
}

/// Errors raised by ledger mutations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("index {index} is out of range (ledger has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl From<LedgerError> for BotError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::IndexOutOfRange { index, len } => BotError::IndexOutOfRange { index, len },
            LedgerError::Invalid(e) => BotError::Validation(e),
        }
    }
}

/// Ordered list of food entries for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FoodLedger {
    entries: Vec<FoodEntry>,
}

impl FoodLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FoodEntry>) -> Self {
        Self { entries }
    }

    /// Discard every entry and take the given ones, e.g. after a fresh analysis
    pub fn replace_all(&mut self, entries: Vec<FoodEntry>) {
        self.entries = entries;
    }

    /// Append an entry after re-checking its amounts
    pub fn append(&mut self, entry: FoodEntry) -> Result<(), LedgerError> {
        validate_amounts(entry.quantity, entry.calories)?;
        self.entries.push(FoodEntry {
            calories: round_calories(entry.calories),
            ..entry
        });
        Ok(())
    }

    /// Overwrite quantity and calories of the entry at `index`
    pub fn update_at(
        &mut self,
        index: usize,
        quantity: f64,
        calories: f64,
    ) -> Result<&FoodEntry, LedgerError> {
        self.check_index(index)?;
        validate_amounts(quantity, calories)?;
        let entry = &mut self.entries[index];
        entry.quantity = quantity;
        entry.calories = round_calories(calories);
        Ok(entry)
    }

    /// Change the quantity of the entry at `index`, scaling calories proportionally
    pub fn rescale_at(&mut self, index: usize, quantity: f64) -> Result<&FoodEntry, LedgerError> {
        self.check_index(index)?;
        let calories = self.entries[index].calories_per_gram() * quantity;
        self.update_at(index, quantity, calories)
    }

    /// Remove and return the entry at `index`; later entries shift down by one
    pub fn remove_at(&mut self, index: usize) -> Result<FoodEntry, LedgerError> {
        self.check_index(index)?;
        Ok(self.entries.remove(index))
    }

    /// Sum of all calories, rounded to two decimals
    pub fn total_calories(&self) -> f64 {
        round_calories(self.entries.iter().map(|entry| entry.calories).sum())
    }

    pub fn get(&self, index: usize) -> Option<&FoodEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FoodEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn check_index(&self, index: usize) -> Result<(), LedgerError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(LedgerError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ledger() -> FoodLedger {
        FoodLedger::from_entries(vec![
            FoodEntry::new("rice", 100.0, 130.0).unwrap(),
            FoodEntry::new("chicken", 150.0, 247.5).unwrap(),
            FoodEntry::new("broccoli", 80.0, 27.2).unwrap(),
        ])
    }

    #[test]
    fn test_entry_validation() {
        assert!(FoodEntry::new("apple", 150.0, 95.0).is_ok());
        assert_eq!(
            FoodEntry::new("apple", 0.0, 95.0),
            Err(ValidationError::NonPositiveQuantity)
        );
        assert_eq!(
            FoodEntry::new("apple", 10.0, -1.0),
            Err(ValidationError::NegativeCalories)
        );
        assert_eq!(
            FoodEntry::new("apple", f64::NAN, 1.0),
            Err(ValidationError::NonPositiveQuantity)
        );
        assert_eq!(FoodEntry::new("   ", 10.0, 1.0), Err(ValidationError::Empty));
    }

    #[test]
    fn test_calories_are_rounded() {
        let entry = FoodEntry::new("oil", 10.0, 88.4449).unwrap();
        assert_eq!(entry.calories, 88.44);
    }

    #[test]
    fn test_total_calories() {
        let ledger = sample_ledger();
        assert_eq!(ledger.total_calories(), 404.7);
        assert_eq!(FoodLedger::new().total_calories(), 0.0);
    }

    #[test]
    fn test_append_rejects_invalid_amounts() {
        let mut ledger = sample_ledger();
        let bad = FoodEntry {
            ingredient: "ghost".to_string(),
            quantity: -5.0,
            calories: 10.0,
        };
        assert!(matches!(ledger.append(bad), Err(LedgerError::Invalid(_))));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_update_at_explicit() {
        let mut ledger = sample_ledger();
        let updated = ledger.update_at(2, 200.0, 150.0).unwrap().clone();
        assert_eq!(updated.quantity, 200.0);
        assert_eq!(updated.calories, 150.0);
        assert_eq!(ledger.total_calories(), 527.5);
    }

    #[test]
    fn test_rescale_at_keeps_ratio() {
        let mut ledger = sample_ledger();
        ledger.rescale_at(1, 300.0).unwrap();
        assert_eq!(ledger.get(1).unwrap().calories, 495.0);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut ledger = sample_ledger();
        assert_eq!(
            ledger.update_at(3, 1.0, 1.0).unwrap_err(),
            LedgerError::IndexOutOfRange { index: 3, len: 3 }
        );
        assert!(ledger.remove_at(7).is_err());
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_remove_shifts_indices() {
        let mut ledger = sample_ledger();
        let removed = ledger.remove_at(0).unwrap();
        assert_eq!(removed.ingredient, "rice");
        assert_eq!(ledger.get(0).unwrap().ingredient, "chicken");
        assert_eq!(ledger.total_calories(), 274.7);
    }

    #[test]
    fn test_ledger_serializes_as_list() {
        let ledger = sample_ledger();
        let json = serde_json::to_value(&ledger).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["ingredient"], "rice");
    }
}
