//! Callback Handler module for processing inline keyboard presses

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::action_codec::Action;
use crate::dialogue::DialogueState;
use crate::errors::BotError;
use crate::localization::{t, t_args};
use crate::records::ProgressEntry;
use crate::session_store::{Session, SessionId};

use super::dialogue_manager::{after_commit, DialogRouter, HandlerResult};
use super::ui_builder::{
    food_log_keyboard, format_workout_details, workout_browser_keyboard, workout_log_keyboard,
};

impl DialogRouter {
    pub(super) async fn handle_callback(
        &self,
        id: SessionId,
        session: &mut Session,
        data: &str,
    ) -> HandlerResult {
        let action = Action::from_wire(data).map_err(|e| {
            debug!(session_id = %id, error = %e, "Undecodable callback data");
            BotError::UnrecognizedAction(data.to_string())
        })?;
        debug!(session_id = %id, action = ?action, state = ?session.context.state, "Dispatching callback");

        match action {
            Action::FoodAnalysis | Action::NewImage => {
                session.context.state = DialogueState::AwaitingPhoto;
                self.send(id, &t("photo-prompt"), None).await
            }
            Action::ShowWorkouts => self.show_workouts(id).await,
            Action::ViewWorkout(workout_id) => self.view_workout(id, &workout_id).await,
            Action::DailyLogging => {
                session.context.state = DialogueState::AwaitingLogDate;
                self.send(id, &t("log-date-prompt"), None).await
            }
            Action::AddIngredient => {
                session.context.state = DialogueState::AwaitingNewIngredientInput;
                self.send(id, &t("add-prompt"), None).await
            }
            Action::Adjust(index) => self.prompt_adjustment(id, session, index).await,
            Action::Remove(index) => self.remove_entry(id, session, index).await,
            Action::SaveFood => self.start_save(id, session).await,
            Action::LogWorkout => match session.context.selected_date() {
                Some(date) => self.offer_workouts_for_logging(id, session, date).await,
                None => self.expire_logging(id, session).await,
            },
            Action::LogFood => match session.context.selected_date() {
                Some(date) => self.offer_foods_for_logging(id, session, date).await,
                None => self.expire_logging(id, session).await,
            },
            Action::LogWorkoutRecord(workout_id) => match session.context.selected_date() {
                Some(date) => self.log_workout(id, session, date, &workout_id).await,
                None => self.expire_logging(id, session).await,
            },
            Action::LogFoodRecord(food_id) => match session.context.selected_date() {
                Some(date) => self.log_food(id, session, date, &food_id).await,
                None => self.expire_logging(id, session).await,
            },
            Action::Reset => self.show_main_menu(id, session, None).await,
        }
    }

    async fn prompt_adjustment(&self, id: SessionId, session: &mut Session, index: usize) -> HandlerResult {
        let Some(entry) = session.ledger.get(index) else {
            return Err(BotError::IndexOutOfRange {
                index,
                len: session.ledger.len(),
            });
        };
        let prompt = t_args("adjust-prompt", &[("ingredient", &entry.ingredient)]);
        session.context.state = DialogueState::AwaitingAdjustmentInput { index };
        self.send(id, &prompt, None).await
    }

    async fn remove_entry(&self, id: SessionId, session: &mut Session, index: usize) -> HandlerResult {
        let removed = session.ledger.remove_at(index)?;
        debug!(session_id = %id, index, ingredient = %removed.ingredient, "Ingredient removed");

        session.context.state = DialogueState::ReviewingLedger;
        self.persist_ledger(id, session).await;
        let header = t_args("remove-done", &[("ingredient", &removed.ingredient)]);
        after_commit(self.present_ledger(id, session, Some(header)).await)
    }

    async fn start_save(&self, id: SessionId, session: &mut Session) -> HandlerResult {
        if session.ledger.is_empty() {
            return self.send(id, &t("save-empty"), None).await;
        }
        self.linked_account(id).await?;
        session.context.state = DialogueState::AwaitingSaveName;
        self.send(id, &t("save-name-prompt"), None).await
    }

    async fn expire_logging(&self, id: SessionId, session: &mut Session) -> HandlerResult {
        info!(session_id = %id, "Logging action without a selected date");
        self.show_main_menu(id, session, Some(t("log-session-expired")))
            .await
    }

    async fn show_workouts(&self, id: SessionId) -> HandlerResult {
        let account = self.linked_account(id).await?;
        let workouts = self.persistence.list_workouts(&account).await?;
        if workouts.is_empty() {
            return self.send(id, &t("no-workouts"), None).await;
        }
        self.send(
            id,
            &t("workout-select-view"),
            Some(&workout_browser_keyboard(&workouts)),
        )
        .await
    }

    async fn view_workout(&self, id: SessionId, workout_id: &str) -> HandlerResult {
        let account = self.linked_account(id).await?;
        match self.persistence.get_workout(&account, workout_id).await? {
            Some(workout) => self.send(id, &format_workout_details(&workout), None).await?,
            None => self.send(id, &t("workout-missing"), None).await?,
        }
        self.show_workouts(id).await
    }

    /// List workouts as logging buttons; also used to re-prompt when text arrives instead
    pub(super) async fn offer_workouts_for_logging(
        &self,
        id: SessionId,
        session: &mut Session,
        date: NaiveDate,
    ) -> HandlerResult {
        let account = self.linked_account(id).await?;
        let workouts = self.persistence.list_workouts(&account).await?;
        if workouts.is_empty() {
            return self.send(id, &t("no-workouts"), None).await;
        }
        session.context.state = DialogueState::SelectingWorkoutToLog { date };
        self.send(id, &t("workout-select-log"), Some(&workout_log_keyboard(&workouts)))
            .await
    }

    pub(super) async fn offer_foods_for_logging(
        &self,
        id: SessionId,
        session: &mut Session,
        date: NaiveDate,
    ) -> HandlerResult {
        let account = self.linked_account(id).await?;
        let foods = self.persistence.list_foods(&account).await?;
        if foods.is_empty() {
            return self.send(id, &t("no-foods"), None).await;
        }
        session.context.state = DialogueState::SelectingFoodToLog { date };
        self.send(id, &t("food-select-log"), Some(&food_log_keyboard(&foods)))
            .await
    }

    async fn log_workout(
        &self,
        id: SessionId,
        session: &mut Session,
        date: NaiveDate,
        workout_id: &str,
    ) -> HandlerResult {
        let account = self.linked_account(id).await?;
        let Some(workout) = self.persistence.get_workout(&account, workout_id).await? else {
            self.send(id, &t("workout-missing"), None).await?;
            return self.offer_workouts_for_logging(id, session, date).await;
        };

        let appended = self
            .persistence
            .append_progress(&account, date, ProgressEntry::from(&workout))
            .await?;
        info!(session_id = %id, account = %account, %date, appended, "Workout logged");

        let key = if appended { "workout-logged" } else { "already-logged" };
        let date = date.to_string();
        let notice = t_args(key, &[("name", &workout.name), ("date", &date)]);
        after_commit(self.show_main_menu(id, session, Some(notice)).await)
    }

    async fn log_food(
        &self,
        id: SessionId,
        session: &mut Session,
        date: NaiveDate,
        food_id: &str,
    ) -> HandlerResult {
        let account = self.linked_account(id).await?;
        let Some(food) = self.persistence.get_food(&account, food_id).await? else {
            self.send(id, &t("food-missing"), None).await?;
            return self.offer_foods_for_logging(id, session, date).await;
        };

        let appended = self
            .persistence
            .append_progress(&account, date, ProgressEntry::from(&food))
            .await?;
        info!(session_id = %id, account = %account, %date, appended, "Food logged");

        let key = if appended { "food-logged" } else { "already-logged" };
        let date = date.to_string();
        let notice = t_args(key, &[("name", &food.food_name), ("date", &date)]);
        after_commit(self.show_main_menu(id, session, Some(notice)).await)
    }
}
