//! Message Handler module for processing typed text and photos

use tracing::{debug, error, info};

use crate::action_codec::{parse_adjustment, parse_log_date, parse_new_ingredient, AdjustmentInput};
use crate::adapters::{AdapterResult, AnalysisReport};
use crate::dialogue::{validate_food_name, DialogueState};
use crate::errors::AdapterError;
use crate::localization::{t, t_args};
use crate::records::NewFood;
use crate::session_store::{Session, SessionId};

use super::dialogue_manager::{after_commit, DialogRouter, HandlerResult};
use super::ui_builder::log_type_keyboard;

const CANCEL_WORDS: [&str; 3] = ["cancel", "stop", "back"];

/// Extract the command name from `/command@botname args`
fn parse_command(text: &str) -> Option<String> {
    let command = text.strip_prefix('/')?.split_whitespace().next()?;
    let command = command.split('@').next().unwrap_or(command);
    Some(command.to_ascii_lowercase())
}

fn is_cancel_word(text: &str) -> bool {
    CANCEL_WORDS.iter().any(|word| text.eq_ignore_ascii_case(word))
}

impl DialogRouter {
    pub(super) async fn handle_text(
        &self,
        id: SessionId,
        session: &mut Session,
        text: &str,
    ) -> HandlerResult {
        let text = text.trim();

        if let Some(command) = parse_command(text) {
            debug!(session_id = %id, command = %command, "Received command");
            return match command.as_str() {
                "start" | "menu" | "reset" => self.show_main_menu(id, session, None).await,
                _ => self.send(id, &t("help-text"), None).await,
            };
        }

        if session.context.state.expects_text() && is_cancel_word(text) {
            return self.cancel_input(id, session).await;
        }

        match session.context.state.clone() {
            DialogueState::AwaitingAdjustmentInput { index } => {
                self.apply_adjustment(id, session, index, text).await
            }
            DialogueState::AwaitingNewIngredientInput => self.add_ingredient(id, session, text).await,
            DialogueState::AwaitingSaveName => self.save_food(id, session, text).await,
            DialogueState::AwaitingLogDate => self.accept_log_date(id, session, text).await,
            DialogueState::MainMenu => self.show_main_menu(id, session, None).await,
            DialogueState::AwaitingPhoto => self.send(id, &t("photo-expected"), None).await,
            DialogueState::ReviewingLedger => {
                self.present_ledger(id, session, Some(t("review-use-buttons")))
                    .await
            }
            DialogueState::AwaitingLogTypeChoice { date } => {
                let text = format!(
                    "{}\n\n{}",
                    t("choose-from-buttons"),
                    t_args("log-type-prompt", &[("date", &date.to_string())])
                );
                self.send(id, &text, Some(&log_type_keyboard())).await
            }
            DialogueState::SelectingWorkoutToLog { date } => {
                self.offer_workouts_for_logging(id, session, date).await
            }
            DialogueState::SelectingFoodToLog { date } => {
                self.offer_foods_for_logging(id, session, date).await
            }
        }
    }

    async fn cancel_input(&self, id: SessionId, session: &mut Session) -> HandlerResult {
        debug!(session_id = %id, state = ?session.context.state, "Input cancelled");
        match session.context.state {
            DialogueState::AwaitingAdjustmentInput { .. }
            | DialogueState::AwaitingNewIngredientInput
            | DialogueState::AwaitingSaveName => {
                session.context.state = DialogueState::ReviewingLedger;
                self.present_ledger(id, session, Some(t("input-cancelled")))
                    .await
            }
            _ => self.show_main_menu(id, session, Some(t("input-cancelled"))).await,
        }
    }

    async fn apply_adjustment(
        &self,
        id: SessionId,
        session: &mut Session,
        index: usize,
        text: &str,
    ) -> HandlerResult {
        let input = parse_adjustment(text)?;
        let updated = match input {
            AdjustmentInput::Explicit { quantity, calories } => {
                session.ledger.update_at(index, quantity, calories)?
            }
            AdjustmentInput::Proportional { quantity } => session.ledger.rescale_at(index, quantity)?,
        };
        let ingredient = updated.ingredient.clone();
        debug!(session_id = %id, index, input = ?input, "Ledger entry adjusted");

        session.context.state = DialogueState::ReviewingLedger;
        self.persist_ledger(id, session).await;
        let header = t_args("adjust-done", &[("ingredient", &ingredient)]);
        after_commit(self.present_ledger(id, session, Some(header)).await)
    }

    async fn add_ingredient(&self, id: SessionId, session: &mut Session, text: &str) -> HandlerResult {
        let entry = parse_new_ingredient(text)?;
        let ingredient = entry.ingredient.clone();
        session.ledger.append(entry)?;
        debug!(session_id = %id, ingredient = %ingredient, "Ingredient added");

        session.context.state = DialogueState::ReviewingLedger;
        self.persist_ledger(id, session).await;
        let header = t_args("add-done", &[("ingredient", &ingredient)]);
        after_commit(self.present_ledger(id, session, Some(header)).await)
    }

    async fn save_food(&self, id: SessionId, session: &mut Session, text: &str) -> HandlerResult {
        let food_name = validate_food_name(text)?;

        if session.ledger.is_empty() {
            session.context.state = DialogueState::ReviewingLedger;
            return self.present_ledger(id, session, Some(t("save-empty"))).await;
        }

        let account = self.linked_account(id).await?;
        let food = NewFood {
            food_name,
            total_calories: session.ledger.total_calories(),
            results: session.ledger.entries().to_vec(),
        };
        let food_id = self.persistence.save_food(&account, &food).await?;
        info!(session_id = %id, account = %account, food_id = %food_id, "Food saved");

        session.ledger.clear();
        self.persist_ledger(id, session).await;

        let total = format!("{:.2}", food.total_calories);
        let notice = t_args("food-saved", &[("name", &food.food_name), ("total", &total)]);
        after_commit(self.show_main_menu(id, session, Some(notice)).await)
    }

    async fn accept_log_date(&self, id: SessionId, session: &mut Session, text: &str) -> HandlerResult {
        let date = parse_log_date(text)?;
        session.context.state = DialogueState::AwaitingLogTypeChoice { date };

        let prompt = t_args("log-type-prompt", &[("date", &date.to_string())]);
        self.send(id, &prompt, Some(&log_type_keyboard())).await
    }

    /// Analyze a photo and replace the ledger with the result.
    ///
    /// Failures are answered here: the ledger stays untouched and the chat
    /// returns to the main menu.
    pub(super) async fn handle_photo(
        &self,
        id: SessionId,
        session: &mut Session,
        file_ref: &str,
    ) -> HandlerResult {
        self.send(id, &t("analysis-in-progress"), None).await?;

        match self.analyze_photo(file_ref).await {
            Ok(report) => {
                info!(session_id = %id, entries = report.entries.len(), "Photo analyzed");
                session.ledger.replace_all(report.entries);
                session.context.state = DialogueState::ReviewingLedger;
                self.persist_ledger(id, session).await;

                let header = if session.ledger.is_empty() {
                    t("analysis-empty")
                } else {
                    t("analysis-complete")
                };
                after_commit(self.present_ledger(id, session, Some(header)).await)
            }
            Err(e) => {
                error!(session_id = %id, error = %e, "Photo analysis failed");
                let key = match e {
                    AdapterError::Transport(_)
                    | AdapterError::Analysis(_)
                    | AdapterError::Persistence(_) => "analysis-failed",
                    _ => e.message_key(),
                };
                self.show_main_menu(id, session, Some(t(key))).await
            }
        }
    }

    async fn analyze_photo(&self, file_ref: &str) -> AdapterResult<AnalysisReport> {
        let url = self.transport.get_file_url(file_ref).await?;
        let image = self.transport.download_file(&url).await?;
        debug!(bytes = image.len(), "Photo downloaded");
        self.analyzer.analyze(image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("start".to_string()));
        assert_eq!(parse_command("/Menu@telefit_bot now"), Some("menu".to_string()));
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn test_cancel_words() {
        assert!(is_cancel_word("Cancel"));
        assert!(is_cancel_word("back"));
        assert!(!is_cancel_word("cancel please"));
    }
}
