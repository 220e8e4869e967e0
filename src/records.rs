//! Records owned by the persistence collaborator.
//!
//! The bot reads workouts and foods, writes named foods, and appends summaries
//! to daily progress. Field names on the wire follow the web front-end
//! (`caloriesBurned`, `foodName`, `totalCalories`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::FoodEntry;

/// Identifier of a persisted user account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub reps: u32,
    pub sets: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRecord {
    pub id: String,
    pub name: String,
    pub calories_burned: f64,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodRecord {
    pub id: String,
    pub food_name: String,
    pub total_calories: f64,
    #[serde(default)]
    pub results: Vec<FoodEntry>,
}

/// A food about to be saved from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFood {
    pub food_name: String,
    pub total_calories: f64,
    pub results: Vec<FoodEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSummary {
    pub name: String,
    pub calories_burned: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodSummary {
    pub food_name: String,
    pub total_calories: f64,
}

/// One line appended to a day's progress
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEntry {
    Workout(WorkoutSummary),
    Food(FoodSummary),
}

impl From<&WorkoutRecord> for ProgressEntry {
    fn from(workout: &WorkoutRecord) -> Self {
        ProgressEntry::Workout(WorkoutSummary {
            name: workout.name.clone(),
            calories_burned: workout.calories_burned,
        })
    }
}

impl From<&FoodRecord> for ProgressEntry {
    fn from(food: &FoodRecord) -> Self {
        ProgressEntry::Food(FoodSummary {
            food_name: food.food_name.clone(),
            total_calories: food.total_calories,
        })
    }
}

/// Everything logged for one account on one date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyProgress {
    #[serde(default)]
    pub workouts: Vec<WorkoutSummary>,
    #[serde(default)]
    pub foods: Vec<FoodSummary>,
}

impl DailyProgress {
    /// Merge-append an entry. Exact duplicates are skipped; returns whether it was added.
    pub fn append(&mut self, entry: ProgressEntry) -> bool {
        match entry {
            ProgressEntry::Workout(summary) => push_unique(&mut self.workouts, summary),
            ProgressEntry::Food(summary) => push_unique(&mut self.foods, summary),
        }
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        false
    } else {
        items.push(item);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_append_is_merge_not_overwrite() {
        let mut progress = DailyProgress::default();
        let run = ProgressEntry::Workout(WorkoutSummary {
            name: "Run".to_string(),
            calories_burned: 300.0,
        });
        let lunch = ProgressEntry::Food(FoodSummary {
            food_name: "Lunch".to_string(),
            total_calories: 640.5,
        });

        assert!(progress.append(run.clone()));
        assert!(progress.append(lunch));
        assert!(!progress.append(run));

        assert_eq!(progress.workouts.len(), 1);
        assert_eq!(progress.foods.len(), 1);
    }

    #[test]
    fn test_workout_wire_names() {
        let json = serde_json::json!({
            "id": "w1",
            "name": "Legs",
            "caloriesBurned": 420.0,
            "exercises": [{"name": "Squat", "reps": 10, "sets": 4}]
        });
        let workout: WorkoutRecord = serde_json::from_value(json).unwrap();
        assert_eq!(workout.calories_burned, 420.0);
        assert_eq!(workout.exercises[0].sets, 4);
    }
}
