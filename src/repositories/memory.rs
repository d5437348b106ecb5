//! In-process store with the same uniqueness and atomicity rules as the
//! Postgres repositories. Used by service and route tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{AccessLogRepositoryTrait, InsertOutcome, ShortUrlRepositoryTrait};
use crate::errors::RepositoryError;
use crate::models::{AccessLog, NewAccessLog, NewShortUrl, ShortUrl, ShortUrlChanges, ShortUrlStats};

type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Default)]
struct Tables {
    // Insertion order doubles as creation order.
    short_urls: Vec<ShortUrl>,
    access_logs: Vec<AccessLog>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    insert_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record directly, bypassing allocation.
    pub fn seed(&self, origin_url: &str, short_code: &str, expired_at: Option<DateTime<Utc>>) {
        let now = Utc::now();
        self.tables.lock().short_urls.push(ShortUrl {
            short_code: short_code.to_string(),
            origin_url: origin_url.to_string(),
            click_count: 0,
            last_click_at: None,
            expired_at,
            created_at: now,
            updated_at: now,
        });
    }

    /// Number of `insert_batch` calls, including rolled back ones
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn short_url_count(&self) -> usize {
        self.tables.lock().short_urls.len()
    }

    pub fn access_log_count(&self) -> usize {
        self.tables.lock().access_logs.len()
    }

    pub fn get(&self, code: &str) -> Option<ShortUrl> {
        self.tables
            .lock()
            .short_urls
            .iter()
            .find(|u| u.short_code == code)
            .cloned()
    }
}

#[async_trait]
impl ShortUrlRepositoryTrait for InMemoryRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>> {
        Ok(self.get(code))
    }

    async fn find_by_origin_url(&self, origin_url: &str) -> Result<Option<ShortUrl>> {
        Ok(self
            .tables
            .lock()
            .short_urls
            .iter()
            .find(|u| u.origin_url == origin_url)
            .cloned())
    }

    async fn find_by_origin_urls(&self, origin_urls: &[String]) -> Result<Vec<ShortUrl>> {
        let wanted: HashSet<&str> = origin_urls.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();

        Ok(self
            .tables
            .lock()
            .short_urls
            .iter()
            .filter(|u| wanted.contains(u.origin_url.as_str()))
            .filter(|u| seen.insert(u.origin_url.clone()))
            .cloned()
            .collect())
    }

    async fn find_existing_codes(&self, codes: &[String]) -> Result<Vec<String>> {
        let tables = self.tables.lock();
        Ok(codes
            .iter()
            .filter(|c| tables.short_urls.iter().any(|u| &u.short_code == *c))
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, records: &[NewShortUrl]) -> Result<InsertOutcome> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();

        let existing: HashSet<&str> = tables
            .short_urls
            .iter()
            .map(|u| u.short_code.as_str())
            .collect();
        let mut conflicting: Vec<String> = records
            .iter()
            .filter(|r| existing.contains(r.short_code.as_str()))
            .map(|r| r.short_code.clone())
            .collect();

        if !conflicting.is_empty() {
            conflicting.dedup();
            return Ok(InsertOutcome::UniqueViolation(conflicting));
        }

        let mut in_batch = HashSet::new();
        if records.iter().any(|r| !in_batch.insert(r.short_code.as_str())) {
            // Duplicate within the statement: nothing pre-existing to report.
            return Ok(InsertOutcome::UniqueViolation(Vec::new()));
        }

        let now = Utc::now();
        tables.short_urls.extend(records.iter().map(|r| ShortUrl {
            short_code: r.short_code.clone(),
            origin_url: r.origin_url.clone(),
            click_count: 0,
            last_click_at: None,
            expired_at: r.expired_at,
            created_at: now,
            updated_at: now,
        }));

        Ok(InsertOutcome::Committed(records.len() as u64))
    }

    async fn record_click(
        &self,
        code: &str,
        access: &NewAccessLog,
        now: DateTime<Utc>,
    ) -> Result<Option<ShortUrl>> {
        let mut tables = self.tables.lock();

        let Some(url) = tables
            .short_urls
            .iter_mut()
            .find(|u| u.short_code == code && u.is_active_at(now))
        else {
            return Ok(None);
        };

        url.click_count += 1;
        url.last_click_at = Some(now);
        url.updated_at = now;
        let updated = url.clone();

        let id = tables.access_logs.len() as i64 + 1;
        tables.access_logs.push(AccessLog {
            id,
            short_code: access.short_code.clone(),
            ip_address: access.ip_address.clone(),
            user_agent: access.user_agent.clone(),
            accessed_at: now,
        });

        Ok(Some(updated))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ShortUrl>> {
        Ok(self
            .tables
            .lock()
            .short_urls
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tables.lock().short_urls.len() as i64)
    }

    async fn stats(&self) -> Result<ShortUrlStats> {
        let tables = self.tables.lock();
        Ok(ShortUrlStats {
            total_urls: tables.short_urls.len() as i64,
            total_clicks: tables.short_urls.iter().map(|u| u.click_count).sum(),
        })
    }

    async fn update(
        &self,
        code: &str,
        changes: &ShortUrlChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<ShortUrl>> {
        let mut tables = self.tables.lock();
        let Some(url) = tables.short_urls.iter_mut().find(|u| u.short_code == code) else {
            return Ok(None);
        };

        if let Some(origin_url) = &changes.origin_url {
            url.origin_url = origin_url.clone();
        }
        if let Some(expired_at) = changes.expired_at {
            url.expired_at = Some(expired_at);
        }
        url.updated_at = now;

        Ok(Some(url.clone()))
    }

    async fn delete(&self, code: &str) -> Result<bool> {
        let mut tables = self.tables.lock();
        let before = tables.short_urls.len();
        tables.short_urls.retain(|u| u.short_code != code);
        Ok(tables.short_urls.len() < before)
    }
}

#[async_trait]
impl AccessLogRepositoryTrait for InMemoryRepository {
    async fn list(
        &self,
        short_code: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AccessLog>> {
        Ok(self
            .tables
            .lock()
            .access_logs
            .iter()
            .rev()
            .filter(|log| short_code.as_ref().map_or(true, |c| &log.short_code == c))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, short_code: Option<String>) -> Result<i64> {
        Ok(self
            .tables
            .lock()
            .access_logs
            .iter()
            .filter(|log| short_code.as_ref().map_or(true, |c| &log.short_code == c))
            .count() as i64)
    }

    async fn count_unique_visitors(&self, short_code: &str) -> Result<i64> {
        let tables = self.tables.lock();
        let visitors: HashSet<&str> = tables
            .access_logs
            .iter()
            .filter(|log| log.short_code == short_code)
            .map(|log| log.ip_address.as_str())
            .collect();
        Ok(visitors.len() as i64)
    }
}
