use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::{NewAccessLog, NewShortUrl, ShortUrl, ShortUrlChanges, ShortUrlStats};

type Result<T> = std::result::Result<T, RepositoryError>;

/// Lookups by origin URL are split into slices of this size.
const ORIGIN_LOOKUP_SLICE: usize = 10_000;

const SHORT_URL_COLUMNS: &str =
    "short_code, origin_url, click_count, last_click_at, expired_at, created_at, updated_at";

/// Postgres caps one statement at 65535 bind parameters and every inserted
/// row binds three.
pub const MAX_INSERT_ROWS: usize = u16::MAX as usize / 3;

/// Result of a bulk insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Every record was written
    Committed(u64),
    /// Nothing was written; these codes from the batch already exist
    UniqueViolation(Vec<String>),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepositoryTrait: Send + Sync {
    /// Finds a short URL by its code
    ///
    /// ### Returns
    /// * `Result<Option<ShortUrl>>` - The record if found, or `None` if not found
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>>;

    /// Finds the oldest short URL pointing at `origin_url`
    async fn find_by_origin_url(&self, origin_url: &str) -> Result<Option<ShortUrl>>;

    /// Finds the oldest short URL for each of `origin_urls` that has one
    async fn find_by_origin_urls(&self, origin_urls: &[String]) -> Result<Vec<ShortUrl>>;

    /// Returns the subset of `codes` that already exist
    async fn find_existing_codes(&self, codes: &[String]) -> Result<Vec<String>>;

    /// Inserts all records in one transaction
    ///
    /// ### Returns
    /// * `InsertOutcome::Committed` - every record was written
    /// * `InsertOutcome::UniqueViolation` - the transaction was rolled back; carries the
    ///   codes that were already taken
    ///
    /// ### Errors
    /// * `RepositoryError::Database` - If a database error occurs
    async fn insert_batch(&self, records: &[NewShortUrl]) -> Result<InsertOutcome>;

    /// Counts one resolution of `code` and appends its access log entry, atomically.
    ///
    /// Only a record that is not expired at `now` is counted.
    ///
    /// ### Returns
    /// * `Result<Option<ShortUrl>>` - The record after the increment, or `None` when the
    ///   code does not exist or has expired
    async fn record_click(
        &self,
        code: &str,
        access: &NewAccessLog,
        now: DateTime<Utc>,
    ) -> Result<Option<ShortUrl>>;

    /// Newest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ShortUrl>>;

    async fn count(&self) -> Result<i64>;

    async fn stats(&self) -> Result<ShortUrlStats>;

    /// Applies `changes`, returning the updated record or `None` when the code is unknown
    async fn update(
        &self,
        code: &str,
        changes: &ShortUrlChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<ShortUrl>>;

    /// Deletes a short URL, returning whether a row was removed
    async fn delete(&self, code: &str) -> Result<bool>;
}

// Implementation using actual database
pub struct PgShortUrlRepository {
    pool: PgPool,
}

impl PgShortUrlRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.get_pool().clone(),
        }
    }

    // Helper method for transactions
    async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start database transaction: {}", e);
            RepositoryError::Database(e)
        })
    }
}

#[async_trait]
impl ShortUrlRepositoryTrait for PgShortUrlRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>> {
        let sql = format!("SELECT {} FROM short_urls WHERE short_code = $1", SHORT_URL_COLUMNS);
        sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::Database)
    }

    async fn find_by_origin_url(&self, origin_url: &str) -> Result<Option<ShortUrl>> {
        let sql = format!(
            "SELECT {} FROM short_urls WHERE origin_url = $1 ORDER BY created_at ASC LIMIT 1",
            SHORT_URL_COLUMNS
        );
        sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(origin_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::Database)
    }

    async fn find_by_origin_urls(&self, origin_urls: &[String]) -> Result<Vec<ShortUrl>> {
        let sql = format!(
            "SELECT DISTINCT ON (origin_url) {} FROM short_urls \
             WHERE origin_url = ANY($1) ORDER BY origin_url, created_at ASC",
            SHORT_URL_COLUMNS
        );

        let mut found = Vec::new();
        for slice in origin_urls.chunks(ORIGIN_LOOKUP_SLICE) {
            let rows = sqlx::query_as::<_, ShortUrl>(&sql)
                .bind(slice)
                .fetch_all(&self.pool)
                .await?;
            found.extend(rows);
        }

        debug!(
            "Found {} existing short URLs for {} origin URLs",
            found.len(),
            origin_urls.len()
        );
        Ok(found)
    }

    async fn find_existing_codes(&self, codes: &[String]) -> Result<Vec<String>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_scalar::<_, String>(
            "SELECT short_code FROM short_urls WHERE short_code = ANY($1)",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::Database)
    }

    async fn insert_batch(&self, records: &[NewShortUrl]) -> Result<InsertOutcome> {
        if records.is_empty() {
            return Ok(InsertOutcome::Committed(0));
        }

        let mut tx = self.begin_transaction().await?;

        let mut builder =
            QueryBuilder::<Postgres>::new("INSERT INTO short_urls (short_code, origin_url, expired_at) ");
        builder.push_values(records, |mut row, record| {
            row.push_bind(record.short_code.clone())
                .push_bind(record.origin_url.clone())
                .push_bind(record.expired_at);
        });

        match builder.build().execute(&mut *tx).await {
            Ok(result) => {
                tx.commit().await.map_err(|e| {
                    error!("Failed to commit transaction: {}", e);
                    RepositoryError::Database(e)
                })?;
                Ok(InsertOutcome::Committed(result.rows_affected()))
            }
            Err(e) => {
                let err = RepositoryError::from(e);
                tx.rollback().await.map_err(RepositoryError::Database)?;

                if !err.is_conflict() {
                    error!("Failed to insert short URLs: {}", err);
                    return Err(err);
                }

                let codes: Vec<String> = records.iter().map(|r| r.short_code.clone()).collect();
                let conflicting = self.find_existing_codes(&codes).await?;
                debug!(
                    "Insert of {} short URLs rolled back, {} codes already taken",
                    records.len(),
                    conflicting.len()
                );
                Ok(InsertOutcome::UniqueViolation(conflicting))
            }
        }
    }

    async fn record_click(
        &self,
        code: &str,
        access: &NewAccessLog,
        now: DateTime<Utc>,
    ) -> Result<Option<ShortUrl>> {
        let mut tx = self.begin_transaction().await?;

        // The conditional UPDATE is both the eligibility check and the increment,
        // so concurrent resolutions serialize on the row lock.
        let sql = format!(
            "UPDATE short_urls \
             SET click_count = click_count + 1, last_click_at = $2, updated_at = $2 \
             WHERE short_code = $1 AND (expired_at IS NULL OR expired_at > $2) \
             RETURNING {}",
            SHORT_URL_COLUMNS
        );
        let updated = sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(code)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(record) = updated else {
            tx.rollback().await.map_err(RepositoryError::Database)?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO access_logs (short_code, ip_address, user_agent, accessed_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&access.short_code)
        .bind(&access.ip_address)
        .bind(&access.user_agent)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit click for '{}': {}", code, e);
            RepositoryError::Database(e)
        })?;

        Ok(Some(record))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ShortUrl>> {
        let sql = format!(
            "SELECT {} FROM short_urls ORDER BY created_at DESC, short_code LIMIT $1 OFFSET $2",
            SHORT_URL_COLUMNS
        );
        let rows = sqlx::query_as::<_, ShortUrl>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM short_urls")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn stats(&self) -> Result<ShortUrlStats> {
        let (total_urls, total_clicks) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(click_count), 0)::BIGINT FROM short_urls",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ShortUrlStats {
            total_urls,
            total_clicks,
        })
    }

    async fn update(
        &self,
        code: &str,
        changes: &ShortUrlChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<ShortUrl>> {
        debug!("Updating short URL '{}' with {:?}", code, changes);

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE short_urls SET ");
        let mut separated = builder.separated(", ");

        if let Some(url) = &changes.origin_url {
            separated.push("origin_url = ").push_bind_unseparated(url.clone());
        }

        if let Some(expired_at) = changes.expired_at {
            separated.push("expired_at = ").push_bind_unseparated(expired_at);
        }

        separated.push("updated_at = ").push_bind_unseparated(now);

        builder.push(" WHERE short_code = ").push_bind(code.to_string());
        builder.push(" RETURNING ").push(SHORT_URL_COLUMNS);

        let updated = builder
            .build_query_as::<ShortUrl>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(updated)
    }

    async fn delete(&self, code: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM short_urls WHERE short_code = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
