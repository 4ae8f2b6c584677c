//! PostgreSQL quota store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::quota::{QuotaAction, QuotaStore, UsageKey, UsageRecord};
use crate::domain::DomainError;

const UNIQUE_VIOLATION: &str = "23505";
const UNDEFINED_FUNCTION: &str = "42883";

const RECORD_COLUMNS: &str = "user_id, action, year, month, count, created_at, updated_at";

/// How the store performs an indivisible create-and-increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtomicIncrementStrategy {
    /// Single `INSERT ... ON CONFLICT DO UPDATE` statement
    #[default]
    Upsert,
    /// Server-side `increment_resume_usage` function
    Procedure,
    /// No atomic operation; callers fall back to read-modify-write
    Unsupported,
}

impl AtomicIncrementStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upsert" => Some(Self::Upsert),
            "procedure" | "rpc" | "function" => Some(Self::Procedure),
            "none" | "unsupported" | "disabled" => Some(Self::Unsupported),
            _ => None,
        }
    }
}

/// Quota store backed by the `resume_usage` table
#[derive(Debug, Clone)]
pub struct PostgresQuotaStore {
    pool: PgPool,
    strategy: AtomicIncrementStrategy,
}

impl PostgresQuotaStore {
    pub fn new(pool: PgPool, strategy: AtomicIncrementStrategy) -> Self {
        Self { pool, strategy }
    }
}

#[async_trait]
impl QuotaStore for PostgresQuotaStore {
    async fn find_record(&self, key: &UsageKey) -> Result<Option<UsageRecord>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM resume_usage \
             WHERE user_id = $1 AND action = $2 AND year = $3 AND month = $4 \
             LIMIT 1",
            RECORD_COLUMNS
        ))
        .bind(&key.user_id)
        .bind(key.action.as_str())
        .bind(key.period.year)
        .bind(key.period.month as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Usage select failed", e))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn insert_record(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        let row = sqlx::query(&format!(
            "INSERT INTO resume_usage (user_id, action, year, month, count) \
             VALUES ($1, $2, $3, $4, 0) \
             RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(&key.user_id)
        .bind(key.action.as_str())
        .bind(key.period.year)
        .bind(key.period.month as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Usage insert failed", e))?;

        row_to_record(&row)
    }

    async fn update_count(&self, key: &UsageKey, count: u32) -> Result<UsageRecord, DomainError> {
        let count = i32::try_from(count)
            .map_err(|_| DomainError::validation(format!("Usage count {} out of range", count)))?;

        let row = sqlx::query(&format!(
            "UPDATE resume_usage SET count = $5, updated_at = NOW() \
             WHERE user_id = $1 AND action = $2 AND year = $3 AND month = $4 \
             RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(&key.user_id)
        .bind(key.action.as_str())
        .bind(key.period.year)
        .bind(key.period.month as i32)
        .bind(count)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Usage update failed", e))?;

        match row {
            Some(row) => row_to_record(&row),
            None => Err(DomainError::not_found(format!(
                "Usage record '{}' not found",
                key
            ))),
        }
    }

    async fn atomic_increment(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        let sql = match self.strategy {
            AtomicIncrementStrategy::Upsert => format!(
                "INSERT INTO resume_usage (user_id, action, year, month, count) \
                 VALUES ($1, $2, $3, $4, 1) \
                 ON CONFLICT (user_id, action, year, month) \
                 DO UPDATE SET count = resume_usage.count + 1, updated_at = NOW() \
                 RETURNING {}",
                RECORD_COLUMNS
            ),
            AtomicIncrementStrategy::Procedure => format!(
                "SELECT {} FROM increment_resume_usage($1, $2, $3, $4)",
                RECORD_COLUMNS
            ),
            AtomicIncrementStrategy::Unsupported => {
                return Err(DomainError::procedure_not_found(
                    "Atomic increment is disabled for this store",
                ));
            }
        };

        let row = sqlx::query(&sql)
            .bind(&key.user_id)
            .bind(key.action.as_str())
            .bind(key.period.year)
            .bind(key.period.month as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Atomic usage increment failed", e))?;

        row_to_record(&row)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<UsageRecord>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM resume_usage WHERE user_id = $1 \
             ORDER BY year DESC, month DESC, action ASC",
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Usage list failed", e))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Ping failed", e))?;

        Ok(())
    }
}

/// Translate driver errors into the quota error taxonomy
fn map_sqlx_error(context: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return DomainError::unique_violation(format!("{}: {}", context, db_err));
            }
            Some(UNDEFINED_FUNCTION) => {
                return DomainError::procedure_not_found(format!("{}: {}", context, db_err));
            }
            _ => {}
        }
    }

    DomainError::store_unavailable(format!("{}: {}", context, err))
}

fn row_to_record(row: &PgRow) -> Result<UsageRecord, DomainError> {
    let decode = |e: sqlx::Error| DomainError::internal(format!("Failed to decode usage row: {}", e));

    let action: String = row.try_get("action").map_err(decode)?;
    let month: i32 = row.try_get("month").map_err(decode)?;
    let count: i32 = row.try_get("count").map_err(decode)?;

    Ok(UsageRecord {
        user_id: row.try_get("user_id").map_err(decode)?,
        action: action.parse::<QuotaAction>()?,
        year: row.try_get("year").map_err(decode)?,
        month: u32::try_from(month)
            .map_err(|_| DomainError::internal(format!("Invalid stored month {}", month)))?,
        count: u32::try_from(count)
            .map_err(|_| DomainError::internal(format!("Negative stored count {}", count)))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode)?,
    })
}
