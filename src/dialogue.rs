//! Food dialogue module: the conversation state of one chat.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Maximum length of a saved food name
pub const MAX_FOOD_NAME_LEN: usize = 255;

/// Represents where a chat currently is in the conversation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueState {
    #[default]
    MainMenu,
    AwaitingPhoto,
    ReviewingLedger,
    AwaitingAdjustmentInput {
        index: usize,
    },
    AwaitingNewIngredientInput,
    AwaitingSaveName,
    AwaitingLogDate,
    AwaitingLogTypeChoice {
        date: NaiveDate,
    },
    SelectingWorkoutToLog {
        date: NaiveDate,
    },
    SelectingFoodToLog {
        date: NaiveDate,
    },
}

impl DialogueState {
    /// Whether the state is waiting for typed text rather than a button
    pub fn expects_text(&self) -> bool {
        matches!(
            self,
            DialogueState::AwaitingAdjustmentInput { .. }
                | DialogueState::AwaitingNewIngredientInput
                | DialogueState::AwaitingSaveName
                | DialogueState::AwaitingLogDate
        )
    }
}

/// Per-chat dialog context
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub state: DialogueState,
}

impl SessionContext {
    /// Ledger position being adjusted, only while adjusting
    pub fn selected_index(&self) -> Option<usize> {
        match self.state {
            DialogueState::AwaitingAdjustmentInput { index } => Some(index),
            _ => None,
        }
    }

    /// Date chosen for daily logging, only while a logging flow is active
    pub fn selected_date(&self) -> Option<NaiveDate> {
        match self.state {
            DialogueState::AwaitingLogTypeChoice { date }
            | DialogueState::SelectingWorkoutToLog { date }
            | DialogueState::SelectingFoodToLog { date } => Some(date),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_initial(&self) -> bool {
        self.state == DialogueState::MainMenu
    }
}

/// Validates a food name before saving
pub fn validate_food_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    if trimmed.chars().count() > MAX_FOOD_NAME_LEN {
        return Err(ValidationError::TooLong {
            max: MAX_FOOD_NAME_LEN,
        });
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_food_name_validation() {
        // Valid names
        assert!(validate_food_name("Chicken Rice Bowl").is_ok());
        assert!(validate_food_name("  Mom's Lasagna  ").is_ok());

        // Invalid names
        assert_eq!(validate_food_name(""), Err(ValidationError::Empty));
        assert_eq!(validate_food_name("   "), Err(ValidationError::Empty));
        assert!(validate_food_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_food_name_trimming() {
        let result = validate_food_name("  Breakfast  ");
        assert_eq!(result.unwrap(), "Breakfast");
    }

    #[test]
    fn test_context_accessors() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut ctx = SessionContext {
            state: DialogueState::SelectingFoodToLog { date },
        };
        assert_eq!(ctx.selected_date(), Some(date));
        assert_eq!(ctx.selected_index(), None);

        ctx.state = DialogueState::AwaitingAdjustmentInput { index: 2 };
        assert_eq!(ctx.selected_index(), Some(2));
        assert_eq!(ctx.selected_date(), None);

        ctx.reset();
        assert!(ctx.is_initial());
    }
}
