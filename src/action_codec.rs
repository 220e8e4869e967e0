//! # Action Codec Module
//!
//! Inline keyboard buttons carry their intent as a short ASCII string:
//! either a bare `verb` or `verb_payload`, where the payload is a ledger index
//! or an opaque record id. This module encodes and decodes that protocol,
//! maps it onto the typed [`Action`] vocabulary, and validates the free-text
//! inputs the dialog asks for.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use thiserror::Error;

use crate::errors::ValidationError;
use crate::ledger::FoodEntry;

const SEPARATOR: char = '_';

/// Maximum length of an ingredient name typed by the user
pub const MAX_INGREDIENT_NAME_LEN: usize = 100;

lazy_static! {
    static ref NUMBER_REGEX: Regex =
        Regex::new(r"^-?\d+(?:\.\d+)?$").expect("number pattern should be valid");
    static ref DATE_REGEX: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern should be valid");
}

/// Payload part of an encoded action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Index(u64),
    Id(String),
}

impl Payload {
    /// The payload as a ledger position, if it is numeric
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Payload::Index(i) => usize::try_from(*i).ok(),
            Payload::Id(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Index(i) => write!(f, "{i}"),
            Payload::Id(id) => f.write_str(id),
        }
    }
}

/// Result of splitting a raw action string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAction {
    pub verb: String,
    pub payload: Option<Payload>,
}

/// Join a verb and an optional payload into the wire form
pub fn encode(verb: &str, payload: Option<&Payload>) -> String {
    match payload {
        Some(payload) => format!("{verb}{SEPARATOR}{payload}"),
        None => verb.to_string(),
    }
}

/// Split a wire action on its first separator
pub fn decode(raw: &str) -> DecodedAction {
    match raw.split_once(SEPARATOR) {
        Some((verb, payload)) => {
            let payload = match payload.parse::<u64>() {
                Ok(index) if payload.bytes().all(|b| b.is_ascii_digit()) => Payload::Index(index),
                _ => Payload::Id(payload.to_string()),
            };
            DecodedAction {
                verb: verb.to_string(),
                payload: Some(payload),
            }
        }
        None => DecodedAction {
            verb: raw.to_string(),
            payload: None,
        },
    }
}

/// Why a raw action could not be mapped to an [`Action`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unrecognized action '{0}'")]
    Unrecognized(String),
    #[error("action '{verb}' has an unusable payload '{payload}'")]
    MalformedPayload { verb: String, payload: String },
}

/// Everything a button can ask the router to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FoodAnalysis,
    NewImage,
    ShowWorkouts,
    DailyLogging,
    AddIngredient,
    SaveFood,
    LogWorkout,
    LogFood,
    Reset,
    Adjust(usize),
    Remove(usize),
    ViewWorkout(String),
    LogWorkoutRecord(String),
    LogFoodRecord(String),
}

const WIRE_FOOD_ANALYSIS: &str = "food_analysis";
const WIRE_NEW_IMAGE: &str = "new_image";
const WIRE_SHOW_WORKOUTS: &str = "show_workouts";
const WIRE_DAILY_LOGGING: &str = "daily_logging";
const WIRE_ADD_INGREDIENT: &str = "add_ingredient";
const WIRE_SAVE_FOOD: &str = "save_food";
const WIRE_LOG_WORKOUT: &str = "log_workout";
const WIRE_LOG_FOOD: &str = "log_food";
const WIRE_RESET: &str = "reset";

const VERB_ADJUST: &str = "adjust";
const VERB_REMOVE: &str = "remove";
const VERB_VIEW_WORKOUT: &str = "viewworkout";
const VERB_WORKOUT: &str = "workout";
const VERB_FOOD: &str = "food";

impl Action {
    /// Parse a raw callback string.
    ///
    /// Fixed actions are matched on the whole string before the payload verbs,
    /// so `food_analysis` never reads as `food` with payload `analysis`.
    pub fn from_wire(raw: &str) -> Result<Self, CodecError> {
        let fixed = match raw {
            WIRE_FOOD_ANALYSIS => Some(Action::FoodAnalysis),
            WIRE_NEW_IMAGE => Some(Action::NewImage),
            WIRE_SHOW_WORKOUTS => Some(Action::ShowWorkouts),
            WIRE_DAILY_LOGGING => Some(Action::DailyLogging),
            WIRE_ADD_INGREDIENT => Some(Action::AddIngredient),
            WIRE_SAVE_FOOD => Some(Action::SaveFood),
            WIRE_LOG_WORKOUT => Some(Action::LogWorkout),
            WIRE_LOG_FOOD => Some(Action::LogFood),
            WIRE_RESET => Some(Action::Reset),
            _ => None,
        };
        if let Some(action) = fixed {
            return Ok(action);
        }

        let decoded = decode(raw);
        let Some(payload) = decoded.payload else {
            return Err(CodecError::Unrecognized(raw.to_string()));
        };
        // Record ids are opaque: keep the exact text, "007" must not become "7".
        let record_id = || {
            raw.split_once(SEPARATOR)
                .map(|(_, id)| id.to_string())
                .unwrap_or_default()
        };
        let malformed = || CodecError::MalformedPayload {
            verb: decoded.verb.clone(),
            payload: payload.to_string(),
        };

        match decoded.verb.as_str() {
            VERB_ADJUST => payload.as_index().map(Action::Adjust).ok_or_else(malformed),
            VERB_REMOVE => payload.as_index().map(Action::Remove).ok_or_else(malformed),
            VERB_VIEW_WORKOUT => Ok(Action::ViewWorkout(record_id())),
            VERB_WORKOUT => Ok(Action::LogWorkoutRecord(record_id())),
            VERB_FOOD => Ok(Action::LogFoodRecord(record_id())),
            _ => Err(CodecError::Unrecognized(raw.to_string())),
        }
    }

    /// Render the action in its wire form
    pub fn to_wire(&self) -> String {
        match self {
            Action::FoodAnalysis => WIRE_FOOD_ANALYSIS.to_string(),
            Action::NewImage => WIRE_NEW_IMAGE.to_string(),
            Action::ShowWorkouts => WIRE_SHOW_WORKOUTS.to_string(),
            Action::DailyLogging => WIRE_DAILY_LOGGING.to_string(),
            Action::AddIngredient => WIRE_ADD_INGREDIENT.to_string(),
            Action::SaveFood => WIRE_SAVE_FOOD.to_string(),
            Action::LogWorkout => WIRE_LOG_WORKOUT.to_string(),
            Action::LogFood => WIRE_LOG_FOOD.to_string(),
            Action::Reset => WIRE_RESET.to_string(),
            Action::Adjust(i) => encode(VERB_ADJUST, Some(&Payload::Index(*i as u64))),
            Action::Remove(i) => encode(VERB_REMOVE, Some(&Payload::Index(*i as u64))),
            Action::ViewWorkout(id) => encode(VERB_VIEW_WORKOUT, Some(&Payload::Id(id.clone()))),
            Action::LogWorkoutRecord(id) => encode(VERB_WORKOUT, Some(&Payload::Id(id.clone()))),
            Action::LogFoodRecord(id) => encode(VERB_FOOD, Some(&Payload::Id(id.clone()))),
        }
    }
}

/// What the user typed while adjusting an entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdjustmentInput {
    /// `quantity, calories`
    Explicit { quantity: f64, calories: f64 },
    /// `quantity` alone, calories follow proportionally
    Proportional { quantity: f64 },
}

fn parse_number(field: &str) -> Result<f64, ValidationError> {
    let field = field.trim();
    if field.is_empty() {
        return Err(ValidationError::BadFormat);
    }
    if !NUMBER_REGEX.is_match(field) {
        return Err(ValidationError::NotANumber(field.to_string()));
    }
    field
        .parse::<f64>()
        .map_err(|_| ValidationError::NotANumber(field.to_string()))
}

fn check_quantity(quantity: f64) -> Result<f64, ValidationError> {
    if quantity > 0.0 {
        Ok(quantity)
    } else {
        Err(ValidationError::NonPositiveQuantity)
    }
}

fn check_calories(calories: f64) -> Result<f64, ValidationError> {
    if calories >= 0.0 {
        Ok(calories)
    } else {
        Err(ValidationError::NegativeCalories)
    }
}

/// Parse `"quantity, calories"` or a lone `"quantity"`
pub fn parse_adjustment(input: &str) -> Result<AdjustmentInput, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let fields: Vec<&str> = trimmed.split(',').collect();
    match fields.as_slice() {
        [quantity] => Ok(AdjustmentInput::Proportional {
            quantity: check_quantity(parse_number(quantity)?)?,
        }),
        [quantity, calories] => Ok(AdjustmentInput::Explicit {
            quantity: check_quantity(parse_number(quantity)?)?,
            calories: check_calories(parse_number(calories)?)?,
        }),
        _ => Err(ValidationError::BadFormat),
    }
}

/// Parse `"name, quantity, calories"` into a validated entry.
///
/// The last two fields are numbers, everything before them is the name, so
/// names may contain commas ("Mac, cheese, 200, 310").
pub fn parse_new_ingredient(input: &str) -> Result<FoodEntry, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut fields = trimmed.rsplitn(3, ',');
    let (Some(calories), Some(quantity), Some(name)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(ValidationError::BadFormat);
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::BadFormat);
    }
    if name.chars().count() > MAX_INGREDIENT_NAME_LEN {
        return Err(ValidationError::TooLong {
            max: MAX_INGREDIENT_NAME_LEN,
        });
    }

    let quantity = check_quantity(parse_number(quantity)?)?;
    let calories = check_calories(parse_number(calories)?)?;
    FoodEntry::new(name, quantity, calories)
}

/// Parse a `YYYY-MM-DD` date that also exists on the calendar
pub fn parse_log_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    if !DATE_REGEX.is_match(trimmed) {
        return Err(ValidationError::MalformedDate);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidCalendarDate(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_splits_on_first_separator() {
        let decoded = decode("viewworkout_abc_def");
        assert_eq!(decoded.verb, "viewworkout");
        assert_eq!(decoded.payload, Some(Payload::Id("abc_def".to_string())));

        let decoded = decode("remove_3");
        assert_eq!(decoded.payload, Some(Payload::Index(3)));

        let decoded = decode("reset");
        assert_eq!(decoded.verb, "reset");
        assert_eq!(decoded.payload, None);
    }

    #[test]
    fn test_numeric_record_ids_keep_their_text() {
        assert_eq!(
            Action::from_wire("food_007"),
            Ok(Action::LogFoodRecord("007".to_string()))
        );
        assert_eq!(
            Action::from_wire("viewworkout_0"),
            Ok(Action::ViewWorkout("0".to_string()))
        );
        assert_eq!(
            Action::from_wire("workout_00042"),
            Ok(Action::LogWorkoutRecord("00042".to_string()))
        );
        let action = Action::LogFoodRecord("0100".to_string());
        assert_eq!(Action::from_wire(&action.to_wire()), Ok(action));
    }

    #[test]
    fn test_signed_payload_stays_opaque() {
        assert_eq!(decode("adjust_-1").payload, Some(Payload::Id("-1".to_string())));
        assert_eq!(
            Action::from_wire("adjust_-1"),
            Err(CodecError::MalformedPayload {
                verb: "adjust".to_string(),
                payload: "-1".to_string()
            })
        );
    }

    #[test]
    fn test_fixed_actions_win_over_payload_verbs() {
        assert_eq!(Action::from_wire("food_analysis"), Ok(Action::FoodAnalysis));
        assert_eq!(Action::from_wire("log_food"), Ok(Action::LogFood));
        assert_eq!(
            Action::from_wire("food_42"),
            Ok(Action::LogFoodRecord("42".to_string()))
        );
    }

    #[test]
    fn test_unknown_verbs() {
        assert_eq!(
            Action::from_wire("dance"),
            Err(CodecError::Unrecognized("dance".to_string()))
        );
        assert_eq!(
            Action::from_wire("dance_3"),
            Err(CodecError::Unrecognized("dance_3".to_string()))
        );
        assert!(Action::from_wire("").is_err());
    }

    #[test]
    fn test_parse_adjustment() {
        assert_eq!(
            parse_adjustment("200, 150"),
            Ok(AdjustmentInput::Explicit {
                quantity: 200.0,
                calories: 150.0
            })
        );
        assert_eq!(
            parse_adjustment(" 75.5 "),
            Ok(AdjustmentInput::Proportional { quantity: 75.5 })
        );
        assert_eq!(
            parse_adjustment("200g, 150"),
            Err(ValidationError::NotANumber("200g".to_string()))
        );
        assert_eq!(parse_adjustment("1, 2, 3"), Err(ValidationError::BadFormat));
        assert_eq!(parse_adjustment("0, 10"), Err(ValidationError::NonPositiveQuantity));
        assert_eq!(parse_adjustment("10, -1"), Err(ValidationError::NegativeCalories));
        assert_eq!(parse_adjustment(""), Err(ValidationError::Empty));
        assert_eq!(
            parse_adjustment("inf, 2"),
            Err(ValidationError::NotANumber("inf".to_string()))
        );
    }

    #[test]
    fn test_parse_new_ingredient() {
        let entry = parse_new_ingredient("Apple, 150, 95").unwrap();
        assert_eq!(entry.ingredient, "Apple");
        assert_eq!(entry.quantity, 150.0);
        assert_eq!(entry.calories, 95.0);

        let entry = parse_new_ingredient("Mac, cheese, 200, 310.456").unwrap();
        assert_eq!(entry.ingredient, "Mac, cheese");
        assert_eq!(entry.calories, 310.46);

        assert_eq!(parse_new_ingredient("Apple, 150"), Err(ValidationError::BadFormat));
        assert_eq!(parse_new_ingredient(", 150, 95"), Err(ValidationError::BadFormat));
        assert_eq!(
            parse_new_ingredient("Apple, many, 95"),
            Err(ValidationError::NotANumber("many".to_string()))
        );
        assert!(matches!(
            parse_new_ingredient(&format!("{}, 1, 1", "a".repeat(101))),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_log_date() {
        assert_eq!(
            parse_log_date("2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(parse_log_date("24-1-1"), Err(ValidationError::MalformedDate));
        assert_eq!(parse_log_date("yesterday"), Err(ValidationError::MalformedDate));
        assert_eq!(
            parse_log_date("2024-13-01"),
            Err(ValidationError::InvalidCalendarDate("2024-13-01".to_string()))
        );
        assert_eq!(
            parse_log_date("2023-02-29"),
            Err(ValidationError::InvalidCalendarDate("2023-02-29".to_string()))
        );
    }
}
