//! In-memory `Persistence`, used when no database is configured and in tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{AdapterResult, Persistence};
use crate::errors::AdapterError;
use crate::ledger::FoodEntry;
use crate::records::{AccountId, DailyProgress, FoodRecord, NewFood, ProgressEntry, WorkoutRecord};
use crate::session_store::SessionId;

#[derive(Default)]
struct Inner {
    accounts: HashMap<SessionId, AccountId>,
    workouts: HashMap<AccountId, Vec<WorkoutRecord>>,
    foods: HashMap<AccountId, Vec<FoodRecord>>,
    progress: HashMap<(AccountId, NaiveDate), DailyProgress>,
    food_items: HashMap<SessionId, Vec<FoodEntry>>,
}

#[derive(Default)]
pub struct InMemoryPersistence {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a chat with an account
    pub async fn link_account(&self, session: SessionId, account: AccountId) {
        self.inner.write().await.accounts.insert(session, account);
    }

    pub async fn add_workout(&self, account: &AccountId, workout: WorkoutRecord) {
        self.inner
            .write()
            .await
            .workouts
            .entry(account.clone())
            .or_default()
            .push(workout);
    }

    pub async fn add_food(&self, account: &AccountId, food: FoodRecord) {
        self.inner
            .write()
            .await
            .foods
            .entry(account.clone())
            .or_default()
            .push(food);
    }

    pub async fn progress_for(&self, account: &AccountId, date: NaiveDate) -> DailyProgress {
        self.inner
            .read()
            .await
            .progress
            .get(&(account.clone(), date))
            .cloned()
            .unwrap_or_default()
    }

    /// Last ledger snapshot written for a chat
    pub async fn snapshot_for(&self, session: SessionId) -> Option<Vec<FoodEntry>> {
        self.inner.read().await.food_items.get(&session).cloned()
    }

    /// Make every call fail, simulating a store outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> AdapterResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AdapterError::Persistence("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn get_linked_account(&self, session: SessionId) -> AdapterResult<Option<AccountId>> {
        self.check_available()?;
        Ok(self.inner.read().await.accounts.get(&session).cloned())
    }

    async fn load_food_items(&self, session: SessionId) -> AdapterResult<Vec<FoodEntry>> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .await
            .food_items
            .get(&session)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_food_items(&self, session: SessionId, entries: &[FoodEntry]) -> AdapterResult<()> {
        self.check_available()?;
        self.inner
            .write()
            .await
            .food_items
            .insert(session, entries.to_vec());
        Ok(())
    }

    async fn save_food(&self, account: &AccountId, food: &NewFood) -> AdapterResult<String> {
        self.check_available()?;
        let id = format!("f{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = FoodRecord {
            id: id.clone(),
            food_name: food.food_name.clone(),
            total_calories: food.total_calories,
            results: food.results.clone(),
        };
        self.add_food(account, record).await;
        Ok(id)
    }

    async fn list_workouts(&self, account: &AccountId) -> AdapterResult<Vec<WorkoutRecord>> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .await
            .workouts
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_foods(&self, account: &AccountId) -> AdapterResult<Vec<FoodRecord>> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .await
            .foods
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_workout(
        &self,
        account: &AccountId,
        id: &str,
    ) -> AdapterResult<Option<WorkoutRecord>> {
        Ok(self
            .list_workouts(account)
            .await?
            .into_iter()
            .find(|w| w.id == id))
    }

    async fn get_food(&self, account: &AccountId, id: &str) -> AdapterResult<Option<FoodRecord>> {
        Ok(self
            .list_foods(account)
            .await?
            .into_iter()
            .find(|f| f.id == id))
    }

    async fn append_progress(
        &self,
        account: &AccountId,
        date: NaiveDate,
        entry: ProgressEntry,
    ) -> AdapterResult<bool> {
        self.check_available()?;
        Ok(self
            .inner
            .write()
            .await
            .progress
            .entry((account.clone(), date))
            .or_default()
            .append(entry))
    }
}
