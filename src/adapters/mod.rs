//! Boundaries to the outside world
//!
//! The dialog router only talks to these traits:
//! - `Transport`: sends replies and fetches uploaded files
//! - `ImageAnalyzer`: turns a food photo into ingredient lines
//! - `Persistence`: accounts, saved records, daily progress and ledger snapshots
//!
//! Implementations live in the submodules (`telegram`, `analysis`, `memory`)
//! and in `crate::db` for PostgreSQL.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::bot::ui_builder::Keyboard;
use crate::errors::AdapterError;
use crate::ledger::FoodEntry;
use crate::records::{AccountId, FoodRecord, NewFood, ProgressEntry, WorkoutRecord};
use crate::session_store::SessionId;

pub mod analysis;
pub mod memory;
pub mod telegram;

pub use analysis::HttpImageAnalyzer;
pub use memory::InMemoryPersistence;
pub use telegram::TelegramTransport;

pub type AdapterResult<T> = Result<T, AdapterError>;

/// What happened in a chat
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Text(String),
    Callback { data: String },
    /// A photo (or image document); `file_ref` is the transport's file handle
    Photo { file_ref: String },
    /// Stickers, voice notes and everything else the bot cannot read
    Unsupported,
}

/// One inbound chat event
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub session_id: SessionId,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(session_id: SessionId, kind: EventKind) -> Self {
        Self { session_id, kind }
    }

    pub fn text(session_id: SessionId, text: impl Into<String>) -> Self {
        Self::new(session_id, EventKind::Text(text.into()))
    }

    pub fn callback(session_id: SessionId, data: impl Into<String>) -> Self {
        Self::new(session_id, EventKind::Callback { data: data.into() })
    }

    pub fn photo(session_id: SessionId, file_ref: impl Into<String>) -> Self {
        Self::new(
            session_id,
            EventKind::Photo {
                file_ref: file_ref.into(),
            },
        )
    }
}

/// Outcome of one image analysis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub entries: Vec<FoodEntry>,
    /// Total as reported by the service; the ledger recomputes its own
    pub total_calories: f64,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        session: SessionId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> AdapterResult<()>;

    /// Resolve a transport file handle to a downloadable URL
    async fn get_file_url(&self, file_ref: &str) -> AdapterResult<String>;

    async fn download_file(&self, url: &str) -> AdapterResult<Vec<u8>>;
}

#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image: Vec<u8>) -> AdapterResult<AnalysisReport>;
}

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Account linked to this chat, if any
    async fn get_linked_account(&self, session: SessionId) -> AdapterResult<Option<AccountId>>;

    /// Last saved working ledger of a chat
    async fn load_food_items(&self, session: SessionId) -> AdapterResult<Vec<FoodEntry>>;

    async fn save_food_items(&self, session: SessionId, entries: &[FoodEntry]) -> AdapterResult<()>;

    /// Store a named food, returning its id
    async fn save_food(&self, account: &AccountId, food: &NewFood) -> AdapterResult<String>;

    async fn list_workouts(&self, account: &AccountId) -> AdapterResult<Vec<WorkoutRecord>>;

    async fn list_foods(&self, account: &AccountId) -> AdapterResult<Vec<FoodRecord>>;

    async fn get_workout(&self, account: &AccountId, id: &str)
        -> AdapterResult<Option<WorkoutRecord>>;

    async fn get_food(&self, account: &AccountId, id: &str) -> AdapterResult<Option<FoodRecord>>;

    /// Merge-append a summary to a day's progress. Returns `false` when the
    /// identical line was already logged for that date.
    async fn append_progress(
        &self,
        account: &AccountId,
        date: NaiveDate,
        entry: ProgressEntry,
    ) -> AdapterResult<bool>;
}
