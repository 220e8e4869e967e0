//! PostgreSQL persistence
//!
//! Records are stored with JSONB columns for the nested lists (exercises,
//! food lines, progress summaries). Daily progress is one row per account and
//! date; appends use JSONB concatenation guarded by a containment check so the
//! same summary is never logged twice for a day.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info};

use crate::adapters::{AdapterResult, Persistence};
use crate::errors::AdapterError;
use crate::ledger::FoodEntry;
use crate::records::{
    AccountId, Exercise, FoodRecord, NewFood, ProgressEntry, WorkoutRecord,
};
use crate::session_store::SessionId;

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            account_id TEXT PRIMARY KEY,
            telegram_id BIGINT UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS workouts (
            id BIGSERIAL PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES users(account_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            calories_burned DOUBLE PRECISION NOT NULL DEFAULT 0,
            exercises JSONB NOT NULL DEFAULT '[]'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create workouts table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS foods (
            id BIGSERIAL PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES users(account_id) ON DELETE CASCADE,
            food_name TEXT NOT NULL,
            total_calories DOUBLE PRECISION NOT NULL,
            results JSONB NOT NULL DEFAULT '[]'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create foods table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS progress (
            account_id TEXT NOT NULL REFERENCES users(account_id) ON DELETE CASCADE,
            log_date DATE NOT NULL,
            workouts JSONB NOT NULL DEFAULT '[]'::jsonb,
            foods JSONB NOT NULL DEFAULT '[]'::jsonb,
            PRIMARY KEY (account_id, log_date)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create progress table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chat_food_items (
            chat_id BIGINT PRIMARY KEY,
            entries JSONB NOT NULL DEFAULT '[]'::jsonb,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create chat_food_items table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS workouts_account_idx ON workouts (account_id)")
        .execute(pool)
        .await
        .context("Failed to create workouts index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS foods_account_idx ON foods (account_id)")
        .execute(pool)
        .await
        .context("Failed to create foods index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

#[derive(FromRow)]
struct WorkoutRow {
    id: i64,
    name: String,
    calories_burned: f64,
    exercises: Json<Vec<Exercise>>,
}

impl From<WorkoutRow> for WorkoutRecord {
    fn from(row: WorkoutRow) -> Self {
        WorkoutRecord {
            id: row.id.to_string(),
            name: row.name,
            calories_burned: row.calories_burned,
            exercises: row.exercises.0,
        }
    }
}

#[derive(FromRow)]
struct FoodRow {
    id: i64,
    food_name: String,
    total_calories: f64,
    results: Json<Vec<FoodEntry>>,
}

impl From<FoodRow> for FoodRecord {
    fn from(row: FoodRow) -> Self {
        FoodRecord {
            id: row.id.to_string(),
            food_name: row.food_name,
            total_calories: row.total_calories,
            results: row.results.0,
        }
    }
}

fn persistence_error(e: sqlx::Error) -> AdapterError {
    AdapterError::Persistence(e.to_string())
}

/// Record ids are generated by the database; anything non-numeric cannot exist
fn parse_record_id(id: &str) -> Option<i64> {
    id.parse().ok()
}

/// `Persistence` backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgPersistence {
    pool: PgPool,
}

impl PgPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bootstrap the schema
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        init_database_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the account if needed and link it to a chat
    pub async fn link_account(&self, account: &AccountId, session: SessionId) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (account_id, telegram_id) VALUES ($1, $2)
             ON CONFLICT (account_id) DO UPDATE SET telegram_id = EXCLUDED.telegram_id",
        )
        .bind(&account.0)
        .bind(session.0)
        .execute(&self.pool)
        .await
        .context("Failed to link account")?;
        Ok(())
    }

    pub async fn create_workout(
        &self,
        account: &AccountId,
        name: &str,
        calories_burned: f64,
        exercises: &[Exercise],
    ) -> Result<String> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO workouts (account_id, name, calories_burned, exercises)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&account.0)
        .bind(name)
        .bind(calories_burned)
        .bind(Json(exercises))
        .fetch_one(&self.pool)
        .await
        .context("Failed to create workout")?;
        Ok(id.to_string())
    }
}

#[async_trait]
impl Persistence for PgPersistence {
    async fn get_linked_account(&self, session: SessionId) -> AdapterResult<Option<AccountId>> {
        let account: Option<String> =
            sqlx::query_scalar("SELECT account_id FROM users WHERE telegram_id = $1")
                .bind(session.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(persistence_error)?;
        Ok(account.map(AccountId))
    }

    async fn load_food_items(&self, session: SessionId) -> AdapterResult<Vec<FoodEntry>> {
        let entries: Option<Json<Vec<FoodEntry>>> =
            sqlx::query_scalar("SELECT entries FROM chat_food_items WHERE chat_id = $1")
                .bind(session.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(persistence_error)?;
        Ok(entries.map(|json| json.0).unwrap_or_default())
    }

    async fn save_food_items(&self, session: SessionId, entries: &[FoodEntry]) -> AdapterResult<()> {
        sqlx::query(
            "INSERT INTO chat_food_items (chat_id, entries, updated_at) VALUES ($1, $2, NOW())
             ON CONFLICT (chat_id) DO UPDATE SET entries = EXCLUDED.entries, updated_at = NOW()",
        )
        .bind(session.0)
        .bind(Json(entries))
        .execute(&self.pool)
        .await
        .map_err(persistence_error)?;
        debug!(session_id = %session, entries = entries.len(), "Ledger snapshot stored");
        Ok(())
    }

    async fn save_food(&self, account: &AccountId, food: &NewFood) -> AdapterResult<String> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO foods (account_id, food_name, total_calories, results)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&account.0)
        .bind(&food.food_name)
        .bind(food.total_calories)
        .bind(Json(&food.results))
        .fetch_one(&self.pool)
        .await
        .map_err(persistence_error)?;
        Ok(id.to_string())
    }

    async fn list_workouts(&self, account: &AccountId) -> AdapterResult<Vec<WorkoutRecord>> {
        let rows = sqlx::query_as::<_, WorkoutRow>(
            "SELECT id, name, calories_burned, exercises FROM workouts
             WHERE account_id = $1 ORDER BY created_at, id",
        )
        .bind(&account.0)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_error)?;
        Ok(rows.into_iter().map(WorkoutRecord::from).collect())
    }

    async fn list_foods(&self, account: &AccountId) -> AdapterResult<Vec<FoodRecord>> {
        let rows = sqlx::query_as::<_, FoodRow>(
            "SELECT id, food_name, total_calories, results FROM foods
             WHERE account_id = $1 ORDER BY created_at, id",
        )
        .bind(&account.0)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_error)?;
        Ok(rows.into_iter().map(FoodRecord::from).collect())
    }

    async fn get_workout(
        &self,
        account: &AccountId,
        id: &str,
    ) -> AdapterResult<Option<WorkoutRecord>> {
        let Some(id) = parse_record_id(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, WorkoutRow>(
            "SELECT id, name, calories_burned, exercises FROM workouts
             WHERE account_id = $1 AND id = $2",
        )
        .bind(&account.0)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_error)?;
        Ok(row.map(WorkoutRecord::from))
    }

    async fn get_food(&self, account: &AccountId, id: &str) -> AdapterResult<Option<FoodRecord>> {
        let Some(id) = parse_record_id(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, FoodRow>(
            "SELECT id, food_name, total_calories, results FROM foods
             WHERE account_id = $1 AND id = $2",
        )
        .bind(&account.0)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_error)?;
        Ok(row.map(FoodRecord::from))
    }

    async fn append_progress(
        &self,
        account: &AccountId,
        date: NaiveDate,
        entry: ProgressEntry,
    ) -> AdapterResult<bool> {
        let mut tx = self.pool.begin().await.map_err(persistence_error)?;

        sqlx::query(
            "INSERT INTO progress (account_id, log_date) VALUES ($1, $2)
             ON CONFLICT (account_id, log_date) DO NOTHING",
        )
        .bind(&account.0)
        .bind(date)
        .execute(&mut *tx)
        .await
        .map_err(persistence_error)?;

        // One-element arrays: `||` appends, `@>` detects an identical line.
        let (sql, line) = match entry {
            ProgressEntry::Workout(summary) => (
                "UPDATE progress SET workouts = workouts || $3
                 WHERE account_id = $1 AND log_date = $2 AND NOT workouts @> $3",
                serde_json::json!([summary]),
            ),
            ProgressEntry::Food(summary) => (
                "UPDATE progress SET foods = foods || $3
                 WHERE account_id = $1 AND log_date = $2 AND NOT foods @> $3",
                serde_json::json!([summary]),
            ),
        };

        let result = sqlx::query(sql)
            .bind(&account.0)
            .bind(date)
            .bind(Json(line))
            .execute(&mut *tx)
            .await
            .map_err(persistence_error)?;

        tx.commit().await.map_err(persistence_error)?;
        Ok(result.rows_affected() == 1)
    }
}
