//! Dialogue Manager module: the entry point of the dialog state machine
//!
//! Every inbound event goes through [`DialogRouter::handle_event`]:
//! 1. lock the session (events of one chat are handled one at a time)
//! 2. load the stored ledger snapshot the first time the session is touched
//! 3. take a checkpoint of the session
//! 4. dispatch on the event kind and the current dialog state
//! 5. turn a handler error into a notice, restoring the checkpoint when an
//!    adapter failed before anything was stored
//!
//! The per-kind handlers live in `message_handler` and `callback_handler`.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{EventKind, ImageAnalyzer, InboundEvent, Persistence, Transport};
use crate::dialogue::DialogueState;
use crate::errors::BotError;
use crate::ledger::FoodEntry;
use crate::localization::t;
use crate::records::AccountId;
use crate::session_store::{Session, SessionId, SessionStore};

use super::ui_builder::{format_ledger, ledger_keyboard, main_menu_keyboard, Keyboard};

pub(super) type HandlerResult = Result<(), BotError>;

/// Routes chat events to handlers and owns the collaborators they use
pub struct DialogRouter {
    pub(super) transport: Arc<dyn Transport>,
    pub(super) analyzer: Arc<dyn ImageAnalyzer>,
    pub(super) persistence: Arc<dyn Persistence>,
    pub(super) sessions: Arc<SessionStore>,
}

impl DialogRouter {
    pub fn new(
        transport: Arc<dyn Transport>,
        analyzer: Arc<dyn ImageAnalyzer>,
        persistence: Arc<dyn Persistence>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            transport,
            analyzer,
            persistence,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound event. Never fails: errors become user notices and
    /// the session is always left usable.
    #[instrument(skip_all, fields(session_id = %event.session_id))]
    pub async fn handle_event(&self, event: InboundEvent) {
        let id = event.session_id;
        let mut session = self.sessions.lock(id).await;
        self.hydrate(id, &mut session).await;

        let checkpoint = session.clone();
        let result = match event.kind {
            EventKind::Text(text) => self.handle_text(id, &mut session, &text).await,
            EventKind::Callback { data } => self.handle_callback(id, &mut session, &data).await,
            EventKind::Photo { file_ref } => self.handle_photo(id, &mut session, &file_ref).await,
            EventKind::Unsupported => self.send(id, &t("unsupported-message"), None).await,
        };

        if let Err(err) = result {
            self.recover(id, &mut session, checkpoint, err).await;
        }
    }

    async fn hydrate(&self, id: SessionId, session: &mut Session) {
        if !session.needs_hydration() {
            return;
        }
        match self.persistence.load_food_items(id).await {
            Ok(entries) => {
                if session.ledger.is_empty() {
                    let entries: Vec<FoodEntry> = entries
                        .into_iter()
                        .filter_map(|e| FoodEntry::new(e.ingredient, e.quantity, e.calories).ok())
                        .collect();
                    debug!(session_id = %id, entries = entries.len(), "Ledger snapshot loaded");
                    session.ledger.replace_all(entries);
                }
                session.mark_hydrated();
            }
            Err(e) => {
                // Retried on the next event.
                warn!(session_id = %id, error = %e, "Failed to load ledger snapshot");
            }
        }
    }

    async fn recover(&self, id: SessionId, session: &mut Session, checkpoint: Session, err: BotError) {
        match err {
            BotError::Validation(e) => {
                debug!(session_id = %id, error = %e, "Rejected input");
                let mut notice = t(e.message_key());
                if let Some(key) = retry_prompt_key(&session.context.state) {
                    notice.push('\n');
                    notice.push_str(&t(key));
                }
                self.notify_quietly(id, &notice, None).await;
            }
            BotError::IndexOutOfRange { index, len } => {
                warn!(session_id = %id, index, len, "Stale ledger position");
                session.context.state = DialogueState::ReviewingLedger;
                if let Err(e) = self.present_ledger(id, session, Some(t("stale-entry"))).await {
                    warn!(session_id = %id, error = %e, "Failed to re-render ledger");
                }
            }
            BotError::AccountNotLinked => {
                info!(session_id = %id, "Chat has no linked account");
                session.context.reset();
                self.notify_quietly(id, &t("account-required"), Some(&main_menu_keyboard()))
                    .await;
            }
            BotError::Adapter(e) => {
                error!(session_id = %id, error = %e, "Adapter failure, rolling back session");
                *session = checkpoint;
                self.notify_quietly(id, &t(e.message_key()), None).await;
            }
            BotError::Undelivered(e) => {
                // The store already holds the new state, so the session keeps it too.
                warn!(session_id = %id, error = %e, state = ?session.context.state, "Reply lost after committed change");
                self.notify_quietly(id, &t(e.message_key()), None).await;
            }
            BotError::UnrecognizedAction(raw) => {
                debug!(session_id = %id, action = %raw, "Ignoring unrecognized action");
                *session = checkpoint;
            }
        }
    }

    pub(super) async fn send(
        &self,
        id: SessionId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> HandlerResult {
        self.transport.send_message(id, text, keyboard).await?;
        Ok(())
    }

    async fn notify_quietly(&self, id: SessionId, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(e) = self.transport.send_message(id, text, keyboard).await {
            warn!(session_id = %id, error = %e, "Failed to deliver notice");
        }
    }

    /// Reset the dialog and show the main menu, optionally after a notice
    pub(super) async fn show_main_menu(
        &self,
        id: SessionId,
        session: &mut Session,
        notice: Option<String>,
    ) -> HandlerResult {
        session.context.reset();
        let text = with_header(notice, t("main-menu-prompt"));
        self.send(id, &text, Some(&main_menu_keyboard())).await
    }

    /// Render the current ledger with its keyboard
    pub(super) async fn present_ledger(
        &self,
        id: SessionId,
        session: &Session,
        header: Option<String>,
    ) -> HandlerResult {
        let text = with_header(header, format_ledger(&session.ledger));
        self.send(id, &text, Some(&ledger_keyboard(&session.ledger))).await
    }

    /// Store the working ledger so it survives a restart
    pub(super) async fn persist_ledger(&self, id: SessionId, session: &Session) {
        if let Err(e) = self
            .persistence
            .save_food_items(id, session.ledger.entries())
            .await
        {
            warn!(session_id = %id, error = %e, "Failed to snapshot ledger");
        }
    }

    pub(super) async fn linked_account(&self, id: SessionId) -> Result<AccountId, BotError> {
        self.persistence
            .get_linked_account(id)
            .await?
            .ok_or(BotError::AccountNotLinked)
    }
}

/// Mark the remaining part of a handler as running after a committed write.
///
/// Adapter failures past this point must not restore the checkpoint.
pub(super) fn after_commit(result: HandlerResult) -> HandlerResult {
    result.map_err(|err| match err {
        BotError::Adapter(e) => BotError::Undelivered(e),
        other => other,
    })
}

fn with_header(header: Option<String>, body: String) -> String {
    match header {
        Some(header) => format!("{header}\n\n{body}"),
        None => body,
    }
}

fn retry_prompt_key(state: &DialogueState) -> Option<&'static str> {
    match state {
        DialogueState::AwaitingAdjustmentInput { .. } => Some("adjust-retry"),
        DialogueState::AwaitingNewIngredientInput => Some("add-retry"),
        DialogueState::AwaitingSaveName => Some("save-name-prompt"),
        DialogueState::AwaitingLogDate => Some("log-date-retry"),
        _ => None,
    }
}
