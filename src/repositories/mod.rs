mod access_log;
#[cfg(test)]
pub mod memory;
mod short_url;

pub use access_log::{AccessLogRepositoryTrait, PgAccessLogRepository};
pub use short_url::{
    InsertOutcome, PgShortUrlRepository, ShortUrlRepositoryTrait, MAX_INSERT_ROWS,
};

#[cfg(test)]
pub use access_log::MockAccessLogRepositoryTrait;
#[cfg(test)]
pub use short_url::MockShortUrlRepositoryTrait;
