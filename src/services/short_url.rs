use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use super::allocator::ShortCodeAllocator;
use super::batch::{BatchOutcome, BatchPersistenceCoordinator};
use crate::clock::Clock;
use crate::config::AllocatorConfig;
use crate::errors::{flatten_validation_errors, ServiceError};
use crate::models::{
    BatchShortenDto, BatchShortenResult, BatchStatus, CreateShortUrlDto, CreatedShortUrl,
    ListResponse,
    NewShortUrl, PageParams, ShortUrlChanges, ShortUrlResponseDto, ShortUrlStats,
    UpdateShortUrlDto, UrlMapping, Visitor,
};
use crate::repositories::ShortUrlRepositoryTrait;
use crate::utils::base62;
use crate::utils::id_generator::IdGenerator;
use crate::validations::{validate_future_date, validate_url};

type Result<T> = std::result::Result<T, ServiceError>;

#[async_trait]
pub trait ShortUrlServiceTrait: Send + Sync {
    /// Returns the existing code for `origin_url` or mints a new one.
    async fn create_short_code(&self, dto: CreateShortUrlDto) -> Result<CreatedShortUrl>;

    /// Shortens every URL of the batch, reusing stored codes.
    ///
    /// A batch that stops early still returns what was committed.
    async fn shorten_batch(&self, dto: BatchShortenDto) -> Result<BatchShortenResult>;

    /// Origin URL for `code`, counting the visit
    async fn resolve(&self, code: &str, visitor: &Visitor) -> Result<String>;

    async fn get_by_code(&self, code: &str) -> Result<ShortUrlResponseDto>;
    async fn list(&self, params: PageParams) -> Result<ListResponse<ShortUrlResponseDto>>;
    async fn update(&self, code: &str, dto: UpdateShortUrlDto) -> Result<ShortUrlResponseDto>;
    async fn delete(&self, code: &str) -> Result<()>;
    async fn stats(&self) -> Result<ShortUrlStats>;
}

pub struct ShortUrlService<R: ShortUrlRepositoryTrait> {
    repository: Arc<R>,
    allocator: ShortCodeAllocator,
    coordinator: BatchPersistenceCoordinator<R>,
    clock: Arc<dyn Clock>,
    max_batch_urls: usize,
    batch_timeout: Option<Duration>,
}

impl<R: ShortUrlRepositoryTrait> ShortUrlService<R> {
    pub fn new(
        repository: Arc<R>,
        generator: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        settings: &AllocatorConfig,
    ) -> Self {
        Self {
            coordinator: BatchPersistenceCoordinator::new(
                repository.clone(),
                settings.chunk_size,
                settings.max_chunk_attempts,
            ),
            allocator: ShortCodeAllocator::new(generator, settings.max_attempts),
            repository,
            clock,
            max_batch_urls: settings.max_batch_urls,
            batch_timeout: settings.batch_timeout(),
        }
    }

    /// [`ShortUrlServiceTrait::shorten_batch`] driven by a caller-owned token.
    pub async fn shorten_batch_with_cancel(
        &self,
        dto: BatchShortenDto,
        cancel: &CancellationToken,
    ) -> Result<BatchShortenResult> {
        let urls = self.validate_batch(dto)?;

        let mut lookup: Vec<String> = urls.clone();
        lookup.sort_unstable();
        lookup.dedup();

        let existing: HashMap<String, String> = self
            .repository
            .find_by_origin_urls(&lookup)
            .await?
            .into_iter()
            .map(|u| (u.origin_url, u.short_code))
            .collect();

        let mut known = HashSet::new();
        let allocations = self.allocator.allocate_batch(&urls, &existing, &mut known)?;

        let records: Vec<NewShortUrl> = allocations
            .iter()
            .filter(|a| a.is_new)
            .map(|a| NewShortUrl::new(a.origin_url.clone(), a.short_code.clone()))
            .collect();
        info!(
            "Batch of {} URLs: {} already shortened, {} to persist",
            urls.len(),
            allocations
                .iter()
                .filter(|a| existing.contains_key(&a.origin_url))
                .count(),
            records.len()
        );

        let report = self
            .coordinator
            .persist(&self.allocator, records, &mut known, cancel)
            .await;

        let (status, error) = match report.outcome {
            BatchOutcome::Completed => (BatchStatus::Completed, None),
            BatchOutcome::Cancelled => (BatchStatus::Cancelled, None),
            BatchOutcome::Failed(e) if report.committed.is_empty() => return Err(e),
            BatchOutcome::Failed(e) => {
                error!(
                    "Batch stopped after {} committed records: {}",
                    report.committed.len(),
                    e
                );
                (BatchStatus::Failed, Some(e.to_string()))
            }
        };

        let committed: HashMap<&str, &str> = report
            .committed
            .iter()
            .map(|r| (r.origin_url.as_str(), r.short_code.as_str()))
            .collect();

        let mut mappings = Vec::with_capacity(allocations.len());
        let mut pending = Vec::new();
        for allocation in &allocations {
            let url = allocation.origin_url.as_str();
            if let Some(code) = existing.get(url) {
                mappings.push(UrlMapping {
                    origin_url: url.to_string(),
                    short_code: code.clone(),
                    created: false,
                });
            } else if let Some(code) = committed.get(url) {
                mappings.push(UrlMapping {
                    origin_url: url.to_string(),
                    short_code: code.to_string(),
                    created: true,
                });
            } else {
                pending.push(url.to_string());
            }
        }

        Ok(BatchShortenResult {
            status,
            mappings,
            pending,
            chunks: report.chunks,
            error,
        })
    }

    /// Every row must carry a valid origin URL; nothing is allocated otherwise.
    fn validate_batch(&self, dto: BatchShortenDto) -> Result<Vec<String>> {
        if dto.urls.is_empty() {
            return Err(ServiceError::MalformedInput("Batch contains no URLs".into()));
        }

        if dto.urls.len() > self.max_batch_urls {
            return Err(ServiceError::MalformedInput(format!(
                "Batch of {} URLs exceeds the limit of {}",
                dto.urls.len(),
                self.max_batch_urls
            )));
        }

        dto.urls
            .into_iter()
            .enumerate()
            .map(|(row, item)| {
                let url = item.origin_url.ok_or_else(|| {
                    ServiceError::MalformedInput(format!("Row {}: missing origin_url", row))
                })?;
                validate_url(&url).map_err(|e| {
                    ServiceError::MalformedInput(format!("Row {}: {}", row, e))
                })?;
                Ok(url)
            })
            .collect()
    }
}

#[async_trait]
impl<R: ShortUrlRepositoryTrait + 'static> ShortUrlServiceTrait for ShortUrlService<R> {
    async fn create_short_code(&self, dto: CreateShortUrlDto) -> Result<CreatedShortUrl> {
        dto.validate()
            .map_err(|e| ServiceError::MalformedInput(flatten_validation_errors(&e)))?;

        if let Some(expired_at) = &dto.expired_at {
            validate_future_date(expired_at, self.clock.now()).map_err(|e| {
                ServiceError::MalformedInput(format!("expired_at: {}", e))
            })?;
        }

        if let Some(existing) = self.repository.find_by_origin_url(&dto.origin_url).await? {
            debug!(
                "'{}' already shortened as '{}'",
                dto.origin_url, existing.short_code
            );
            return Ok(CreatedShortUrl {
                url: existing.into(),
                created: false,
            });
        }

        let mut known = HashSet::new();
        let code = self.allocator.allocate_one(&mut known)?;
        let record = NewShortUrl::new(dto.origin_url, code).expiring_at(dto.expired_at);

        let report = self
            .coordinator
            .persist(&self.allocator, vec![record], &mut known, &CancellationToken::new())
            .await;

        if let BatchOutcome::Failed(e) = report.outcome {
            return Err(e);
        }

        let code = report
            .committed
            .first()
            .map(|r| r.short_code.clone())
            .ok_or_else(|| ServiceError::Internal("Short code was not committed".into()))?;

        let created = self
            .repository
            .find_by_code(&code)
            .await?
            .ok_or_else(|| ServiceError::Internal(format!("Short code '{}' vanished", code)))?;

        info!("Created short code '{}' for '{}'", created.short_code, created.origin_url);
        Ok(CreatedShortUrl {
            url: created.into(),
            created: true,
        })
    }

    async fn shorten_batch(&self, dto: BatchShortenDto) -> Result<BatchShortenResult> {
        let cancel = CancellationToken::new();

        let timer = self.batch_timeout.map(|timeout| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!("Batch exceeded {:?}, cancelling remaining chunks", timeout);
                token.cancel();
            })
        });

        let result = self.shorten_batch_with_cancel(dto, &cancel).await;

        if let Some(timer) = timer {
            timer.abort();
        }

        result
    }

    async fn resolve(&self, code: &str, visitor: &Visitor) -> Result<String> {
        if !base62::is_valid_code(code) {
            debug!("Rejected malformed short code '{}'", code);
            return Err(ServiceError::NotFoundOrExpired);
        }

        let access = visitor.access_to(code);
        match self
            .repository
            .record_click(code, &access, self.clock.now())
            .await?
        {
            Some(url) => {
                info!("Resolved '{}' (click {})", code, url.click_count);
                Ok(url.origin_url)
            }
            None => {
                debug!("Short code '{}' not found or expired", code);
                Err(ServiceError::NotFoundOrExpired)
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<ShortUrlResponseDto> {
        self.repository
            .find_by_code(code)
            .await?
            .map(ShortUrlResponseDto::from)
            .ok_or_else(|| ServiceError::NotFound(format!("Short URL '{}' not found", code)))
    }

    async fn list(&self, params: PageParams) -> Result<ListResponse<ShortUrlResponseDto>> {
        let list = self
            .repository
            .list(params.limit(), params.offset())
            .await?;
        let total = self.repository.count().await?;

        Ok(ListResponse::new(list, total, &params).map(ShortUrlResponseDto::from))
    }

    async fn update(&self, code: &str, dto: UpdateShortUrlDto) -> Result<ShortUrlResponseDto> {
        dto.validate()
            .map_err(|e| ServiceError::MalformedInput(flatten_validation_errors(&e)))?;

        let changes = ShortUrlChanges::from(dto);
        if changes.is_empty() {
            return Err(ServiceError::MalformedInput("Nothing to update".into()));
        }

        let updated = self
            .repository
            .update(code, &changes, self.clock.now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Short URL '{}' not found", code)))?;

        info!("Updated short URL '{}'", code);
        Ok(updated.into())
    }

    async fn delete(&self, code: &str) -> Result<()> {
        if !self.repository.delete(code).await? {
            return Err(ServiceError::NotFound(format!(
                "Short URL '{}' not found",
                code
            )));
        }

        info!("Deleted short URL '{}'", code);
        Ok(())
    }

    async fn stats(&self) -> Result<ShortUrlStats> {
        Ok(self.repository.stats().await?)
    }
}
