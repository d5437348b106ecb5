use std::sync::Arc;

use actix_web::web;
use log::info;

mod access_log;
mod allocator;
mod batch;
mod short_url;

pub use access_log::{AccessLogService, AccessLogServiceTrait};
pub use allocator::{Allocation, ShortCodeAllocator};
pub use batch::{BatchOutcome, BatchPersistenceCoordinator, BatchReport};
pub use short_url::{ShortUrlService, ShortUrlServiceTrait};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Database;
use crate::errors::GeneratorError;
use crate::repositories::{PgAccessLogRepository, PgShortUrlRepository};
use crate::utils::id_generator::{IdGenerator, Snowflake};

pub type ShortUrlServiceType = ShortUrlService<PgShortUrlRepository>;
pub type AccessLogServiceType = AccessLogService<PgAccessLogRepository>;

/// Services shared by every HTTP worker.
#[derive(Clone)]
pub struct Services {
    pub short_url: web::Data<ShortUrlServiceType>,
    pub access_log: web::Data<AccessLogServiceType>,
}

impl Services {
    /// Builds the process-wide generator and the services on top of it.
    ///
    /// Must run once, outside the per-worker app factory.
    pub fn build(db: &Database, config: &Config) -> Result<Self, GeneratorError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let generator: Arc<dyn IdGenerator> =
            Arc::new(Snowflake::new(SystemClock, config.snowflake.epoch)?);
        info!("Snowflake generator ready, epoch {}", config.snowflake.epoch);

        let short_url_repository = Arc::new(PgShortUrlRepository::new(db));
        let access_log_repository = Arc::new(PgAccessLogRepository::new(db));

        Ok(Self {
            short_url: web::Data::new(ShortUrlService::new(
                short_url_repository,
                generator,
                clock,
                &config.allocator,
            )),
            access_log: web::Data::new(AccessLogService::new(access_log_repository)),
        })
    }

    /// Service Register
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.short_url.clone());
        cfg.app_data(self.access_log.clone());
    }
}
