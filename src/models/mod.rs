mod access_log;
mod pagination;
mod short_url;

pub use access_log::{AccessLog, AccessLogQueryParams, NewAccessLog, UniqueVisitorsDto, Visitor};
pub use pagination::{ListResponse, PageParams};
pub use short_url::{
    BatchRowDto, BatchShortenDto, BatchShortenResult, BatchStatus, ChunkReport,
    CreateShortUrlDto, CreatedShortUrl, NewShortUrl, ShortUrl, ShortUrlChanges,
    ShortUrlResponseDto, ShortUrlStats, UpdateShortUrlDto, UrlMapping,
};
