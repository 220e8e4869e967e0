//! UI Builder module for creating keyboards and formatting messages
//!
//! Everything here is a pure function of the current ledger or record list, so
//! buttons are regenerated on every render and never carry a stale position.

use crate::action_codec::Action;
use crate::ledger::FoodLedger;
use crate::localization::{t, t_args};
use crate::records::{FoodRecord, WorkoutRecord};

/// One inline button: a label and the action it triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Rows of buttons, independent of the chat transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Every action reachable from this keyboard, in display order
    pub fn actions(&self) -> Vec<&Action> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(|button| &button.action))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.is_empty())
    }
}

fn reset_row() -> Vec<Button> {
    vec![Button::new(t("button-reset"), Action::Reset)]
}

/// Create the main menu keyboard
pub fn main_menu_keyboard() -> Keyboard {
    Keyboard::new(vec![
        vec![Button::new(t("menu-food-analysis"), Action::FoodAnalysis)],
        vec![Button::new(t("menu-workouts"), Action::ShowWorkouts)],
        vec![Button::new(t("menu-daily-logging"), Action::DailyLogging)],
    ])
}

/// Create the review keyboard: an adjust/remove pair per entry, then the ledger actions
pub fn ledger_keyboard(ledger: &FoodLedger) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = ledger
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let args = [("ingredient", entry.ingredient.as_str())];
            vec![
                Button::new(t_args("button-adjust", &args), Action::Adjust(i)),
                Button::new(t_args("button-remove", &args), Action::Remove(i)),
            ]
        })
        .collect();

    rows.push(vec![Button::new(t("button-add-ingredient"), Action::AddIngredient)]);
    rows.push(vec![Button::new(t("button-save-food"), Action::SaveFood)]);
    rows.push(reset_row());
    rows.push(vec![Button::new(t("button-new-image"), Action::NewImage)]);

    Keyboard::new(rows)
}

fn record_keyboard<T>(
    records: &[T],
    label: impl Fn(&T) -> String,
    action: impl Fn(&T) -> Action,
) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = records
        .iter()
        .map(|record| vec![Button::new(label(record), action(record))])
        .collect();
    rows.push(reset_row());
    Keyboard::new(rows)
}

/// Workouts as read-only detail buttons
pub fn workout_browser_keyboard(workouts: &[WorkoutRecord]) -> Keyboard {
    record_keyboard(
        workouts,
        |w| w.name.clone(),
        |w| Action::ViewWorkout(w.id.clone()),
    )
}

/// Workouts as buttons that log them for the chosen date
pub fn workout_log_keyboard(workouts: &[WorkoutRecord]) -> Keyboard {
    record_keyboard(
        workouts,
        |w| w.name.clone(),
        |w| Action::LogWorkoutRecord(w.id.clone()),
    )
}

/// Saved foods as buttons that log them for the chosen date
pub fn food_log_keyboard(foods: &[FoodRecord]) -> Keyboard {
    record_keyboard(
        foods,
        |f| f.food_name.clone(),
        |f| Action::LogFoodRecord(f.id.clone()),
    )
}

pub fn log_type_keyboard() -> Keyboard {
    Keyboard::new(vec![
        vec![Button::new(t("button-log-workout"), Action::LogWorkout)],
        vec![Button::new(t("button-log-food"), Action::LogFood)],
        reset_row(),
    ])
}

/// Format the ledger as a summary: total first, then numbered details
pub fn format_ledger(ledger: &FoodLedger) -> String {
    let total = format!("{:.2}", ledger.total_calories());
    let mut result = format!(
        "{}\n\n{}",
        t_args("ledger-total", &[("total", &total)]),
        t("ledger-details")
    );

    if ledger.is_empty() {
        result.push('\n');
        result.push_str(&t("ledger-empty"));
        return result;
    }

    for (i, entry) in ledger.entries().iter().enumerate() {
        let position = (i + 1).to_string();
        let quantity = format_amount(entry.quantity);
        let calories = format!("{:.2}", entry.calories);
        result.push('\n');
        result.push_str(&t_args(
            "ledger-line",
            &[
                ("position", &position),
                ("ingredient", &entry.ingredient),
                ("quantity", &quantity),
                ("calories", &calories),
            ],
        ));
    }

    result
}

/// Format a workout for the read-only detail view
pub fn format_workout_details(workout: &WorkoutRecord) -> String {
    let calories = format_amount(workout.calories_burned);
    let mut result = format!(
        "{}\n{}\n\n{}",
        t_args("workout-details-title", &[("name", &workout.name)]),
        t_args("workout-details-calories", &[("calories", &calories)]),
        t("workout-details-exercises")
    );

    for (i, exercise) in workout.exercises.iter().enumerate() {
        let position = (i + 1).to_string();
        let reps = exercise.reps.to_string();
        let sets = exercise.sets.to_string();
        result.push('\n');
        result.push_str(&t_args(
            "workout-details-exercise",
            &[
                ("position", &position),
                ("name", &exercise.name),
                ("reps", &reps),
                ("sets", &sets),
            ],
        ));
    }

    result
}

/// Whole numbers without a fractional part, everything else with two decimals
fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FoodEntry;
    use crate::records::Exercise;

    fn ledger() -> FoodLedger {
        FoodLedger::from_entries(vec![
            FoodEntry::new("rice", 100.0, 130.0).unwrap(),
            FoodEntry::new("egg", 50.5, 77.5).unwrap(),
        ])
    }

    #[test]
    fn test_ledger_keyboard_layout() {
        let keyboard = ledger_keyboard(&ledger());
        assert_eq!(keyboard.rows.len(), 6);
        assert_eq!(keyboard.rows[0][0].action, Action::Adjust(0));
        assert_eq!(keyboard.rows[1][1].action, Action::Remove(1));
        assert_eq!(keyboard.rows[0][0].label, "Adjust rice");
        assert_eq!(keyboard.rows[5][0].action, Action::NewImage);
    }

    #[test]
    fn test_format_ledger() {
        let text = format_ledger(&ledger());
        assert!(text.starts_with("Total Calories: 207.50"));
        assert!(text.contains("1. rice - 100g: 130.00 calories"));
        assert!(text.contains("2. egg - 50.50g: 77.50 calories"));
    }

    #[test]
    fn test_format_empty_ledger() {
        let text = format_ledger(&FoodLedger::new());
        assert!(text.contains("Total Calories: 0.00"));
        assert!(text.contains("No ingredients yet."));
    }

    #[test]
    fn test_record_keyboards_end_with_reset() {
        let workouts = vec![WorkoutRecord {
            id: "w1".to_string(),
            name: "Legs".to_string(),
            calories_burned: 300.0,
            exercises: vec![],
        }];
        let browse = workout_browser_keyboard(&workouts);
        assert_eq!(browse.rows[0][0].action, Action::ViewWorkout("w1".to_string()));
        assert_eq!(browse.rows.last().unwrap()[0].action, Action::Reset);

        let log = workout_log_keyboard(&workouts);
        assert_eq!(log.rows[0][0].action.to_wire(), "workout_w1");
    }

    #[test]
    fn test_workout_details() {
        let workout = WorkoutRecord {
            id: "w1".to_string(),
            name: "Push day".to_string(),
            calories_burned: 250.0,
            exercises: vec![Exercise {
                name: "Bench press".to_string(),
                reps: 8,
                sets: 4,
            }],
        };
        let text = format_workout_details(&workout);
        assert!(text.contains("Push day"));
        assert!(text.contains("250"));
        assert!(text.contains("1. Bench press - Reps: 8, Sets: 4"));
    }
}
