use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::application::{AppError, AppResult, SignalQuery, SignalStore};
use crate::domain::SignalRecord;

pub struct SqliteSignalStore {
    pool: SqlitePool,
}

impl SqliteSignalStore {
    /// db_url examples
    /// - "sqlite:/data/signals.db" (docker volume)
    /// - "sqlite:./signals.db"
    /// - "sqlite::memory:"
    pub async fn new(db_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(|e| AppError::Storage(e.to_string()))?
            .create_if_missing(true);

        // an in-memory database lives and dies with its single connection
        let in_memory = db_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> AppResult<()> {
        // seen: idempotency keys of dispatched signals
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen (
              signal_id TEXT PRIMARY KEY,
              seen_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signal_log (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              signal_id TEXT NOT NULL,
              symbol TEXT NOT NULL,
              outcome TEXT NOT NULL,
              decided_at INTEGER NOT NULL,
              payload TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_signal_log_symbol ON signal_log(symbol, decided_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl SignalStore for SqliteSignalStore {
    async fn has_seen(&self, signal_id: &str) -> AppResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT signal_id FROM seen WHERE signal_id = ? LIMIT 1")
                .bind(signal_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn mark_seen(&self, signal_id: &str) -> AppResult<()> {
        sqlx::query("INSERT OR IGNORE INTO seen(signal_id, seen_at) VALUES(?, ?)")
            .bind(signal_id)
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn append_record(&self, record: &SignalRecord) -> AppResult<()> {
        let payload =
            serde_json::to_string(record).map_err(|e| AppError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO signal_log(signal_id, symbol, outcome, decided_at, payload)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.signal.signal_id)
        .bind(record.signal.symbol.as_str())
        .bind(record.outcome.kind().as_str())
        .bind(record.decided_at)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn list_records(&self, query: SignalQuery) -> AppResult<Vec<SignalRecord>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT payload FROM signal_log WHERE 1 = 1");
        if let Some(since) = query.since {
            qb.push(" AND decided_at >= ").push_bind(since);
        }
        if let Some(symbol) = &query.symbol {
            qb.push(" AND symbol = ").push_bind(symbol.as_str().to_string());
        }
        if let Some(kind) = query.outcome {
            qb.push(" AND outcome = ").push_bind(kind.as_str());
        }
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(i64::from(query.limit));

        let rows: Vec<(String,)> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|(payload,)| {
                serde_json::from_str(&payload).map_err(|e| AppError::Storage(e.to_string()))
            })
            .collect()
    }
}
