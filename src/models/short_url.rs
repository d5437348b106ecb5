use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::validations::validate_url;

/// A persisted short URL.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ShortUrl {
    /// Six base62 symbols; the primary key and never changed after insert
    pub short_code: String,

    /// The original, long URL
    pub origin_url: String,

    /// Number of successful resolutions
    pub click_count: i64,

    pub last_click_at: Option<DateTime<Utc>>,

    /// Resolution stops at this instant (None means it never expires)
    pub expired_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortUrl {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expired_at, Some(expiry) if expiry <= now)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }
}

/// The fields a caller may choose for a new record. Counters and timestamps
/// are owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortUrl {
    pub short_code: String,
    pub origin_url: String,
    pub expired_at: Option<DateTime<Utc>>,
}

impl NewShortUrl {
    pub fn new(origin_url: impl Into<String>, short_code: impl Into<String>) -> Self {
        Self {
            short_code: short_code.into(),
            origin_url: origin_url.into(),
            expired_at: None,
        }
    }

    pub fn expiring_at(mut self, expired_at: Option<DateTime<Utc>>) -> Self {
        self.expired_at = expired_at;
        self
    }
}

/// Changes accepted by an update. `None` leaves the column alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortUrlChanges {
    pub origin_url: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl ShortUrlChanges {
    pub fn is_empty(&self) -> bool {
        self.origin_url.is_none() && self.expired_at.is_none()
    }
}

// DTO for creating a new short URL
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateShortUrlDto {
    #[validate(custom(function = "validate_url"))]
    pub origin_url: String,

    pub expired_at: Option<DateTime<Utc>>,
}

// DTO for updating a short URL, only the target and the expiry can change
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateShortUrlDto {
    #[validate(custom(function = "validate_url"))]
    pub origin_url: Option<String>,

    pub expired_at: Option<DateTime<Utc>>,
}

impl From<UpdateShortUrlDto> for ShortUrlChanges {
    fn from(dto: UpdateShortUrlDto) -> Self {
        Self {
            origin_url: dto.origin_url,
            expired_at: dto.expired_at,
        }
    }
}

/// One row of a batch request. `origin_url` is optional here so a missing
/// column is reported as malformed input instead of a body parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRowDto {
    pub origin_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchShortenDto {
    pub urls: Vec<BatchRowDto>,
}

impl BatchShortenDto {
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls
                .into_iter()
                .map(|url| BatchRowDto {
                    origin_url: Some(url.into()),
                })
                .collect(),
        }
    }
}

// DTO for response with short URL details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortUrlResponseDto {
    pub short_code: String,
    pub origin_url: String,
    pub click_count: i64,
    pub last_click_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShortUrl> for ShortUrlResponseDto {
    fn from(url: ShortUrl) -> Self {
        ShortUrlResponseDto {
            short_code: url.short_code,
            origin_url: url.origin_url,
            click_count: url.click_count,
            last_click_at: url.last_click_at,
            expired_at: url.expired_at,
            created_at: url.created_at,
            updated_at: url.updated_at,
        }
    }
}

/// Outcome of a single create; `created` is false when the URL was already shortened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedShortUrl {
    #[serde(flatten)]
    pub url: ShortUrlResponseDto,
    pub created: bool,
}

/// Final code for one batch input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMapping {
    pub origin_url: String,
    pub short_code: String,
    /// False when the URL already had a code before this batch
    pub created: bool,
}

/// Progress of one persistence chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub index: usize,
    pub committed: usize,
    /// Records of the batch still waiting after this chunk
    pub pending: usize,
    /// Attempts that hit a uniqueness violation before the chunk committed
    pub retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Completed,
    Cancelled,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchShortenResult {
    pub status: BatchStatus,
    /// One entry per input URL that has a committed code, in input order
    pub mappings: Vec<UrlMapping>,
    /// Input URLs left without a code because the batch stopped early
    pub pending: Vec<String>,
    pub chunks: Vec<ChunkReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrlStats {
    pub total_urls: i64,
    pub total_clicks: i64,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(expired_at: Option<DateTime<Utc>>) -> ShortUrl {
        let now = Utc::now();
        ShortUrl {
            short_code: "AbC123".into(),
            origin_url: "https://a.example".into(),
            click_count: 0,
            last_click_at: None,
            expired_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();

        assert!(record(None).is_active_at(now));
        assert!(record(Some(now + Duration::hours(1))).is_active_at(now));
        assert!(record(Some(now - Duration::hours(1))).is_expired_at(now));
        assert!(record(Some(now)).is_expired_at(now));
    }

    #[test]
    fn test_create_dto_validation() {
        let ok = CreateShortUrlDto {
            origin_url: "https://a.example/path".into(),
            expired_at: None,
        };
        assert!(ok.validate().is_ok());

        let bad = CreateShortUrlDto {
            origin_url: "javascript:alert(1)".into(),
            expired_at: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_update_dto_skips_missing_url() {
        let dto = UpdateShortUrlDto {
            origin_url: None,
            expired_at: Some(Utc::now()),
        };
        assert!(dto.validate().is_ok());
        assert!(!ShortUrlChanges::from(dto).is_empty());
    }

    #[test]
    fn test_batch_row_missing_column_deserializes() {
        let dto: BatchShortenDto =
            serde_json::from_str(r#"{"urls":[{"origin_url":"https://a.example"},{}]}"#).unwrap();
        assert_eq!(dto.urls.len(), 2);
        assert!(dto.urls[1].origin_url.is_none());
    }
}
