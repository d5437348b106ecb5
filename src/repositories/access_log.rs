use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::AccessLog;

type Result<T> = std::result::Result<T, RepositoryError>;

/// Read side of the access log. Entries are written by
/// [`ShortUrlRepositoryTrait::record_click`](super::ShortUrlRepositoryTrait::record_click).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessLogRepositoryTrait: Send + Sync {
    /// Newest first, optionally restricted to one short code
    async fn list(&self, short_code: Option<String>, limit: i64, offset: i64)
        -> Result<Vec<AccessLog>>;

    async fn count(&self, short_code: Option<String>) -> Result<i64>;

    /// Number of distinct client addresses that resolved `short_code`
    async fn count_unique_visitors(&self, short_code: &str) -> Result<i64>;
}

pub struct PgAccessLogRepository {
    pool: PgPool,
}

impl PgAccessLogRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.get_pool().clone(),
        }
    }
}

fn push_code_filter(builder: &mut QueryBuilder<'_, Postgres>, short_code: Option<String>) {
    if let Some(code) = short_code {
        builder.push(" WHERE short_code = ").push_bind(code);
    }
}

#[async_trait]
impl AccessLogRepositoryTrait for PgAccessLogRepository {
    async fn list(
        &self,
        short_code: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AccessLog>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, short_code, ip_address, user_agent, accessed_at FROM access_logs",
        );
        push_code_filter(&mut builder, short_code);
        builder
            .push(" ORDER BY accessed_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<AccessLog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count(&self, short_code: Option<String>) -> Result<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM access_logs");
        push_code_filter(&mut builder, short_code);

        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn count_unique_visitors(&self, short_code: &str) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT ip_address) FROM access_logs WHERE short_code = $1",
        )
        .bind(short_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
