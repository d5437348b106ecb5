use actix_web::web;

use crate::{
    handlers::{access_log, short_url},
    services::{AccessLogServiceTrait, ShortUrlServiceTrait},
};

// Uploaded CSV batches may carry up to `BATCH_MAX_URLS` rows
const CSV_PAYLOAD_LIMIT: usize = 16 * 1024 * 1024;

// Configure admin and redirect routes for the given service types.
// The catch-all redirect must be registered after everything else.
pub fn configure_routes<S, A>(cfg: &mut web::ServiceConfig)
where
    S: ShortUrlServiceTrait + 'static,
    A: AccessLogServiceTrait + 'static,
{
    cfg.service(
        web::scope("/api/v1/admin")
            .route("/shorten", web::post().to(short_url::create_handler::<S>))
            .route("/shorten/batch", web::post().to(short_url::batch_handler::<S>))
            .service(
                web::resource("/shorten/batch/csv")
                    .app_data(web::PayloadConfig::new(CSV_PAYLOAD_LIMIT))
                    .route(web::post().to(short_url::batch_csv_handler::<S>)),
            )
            .route("/short_url/list", web::get().to(short_url::list_handler::<S>))
            .route("/short_url/{code}", web::get().to(short_url::get_by_code_handler::<S>))
            .route("/short_url/{code}", web::put().to(short_url::update_handler::<S>))
            .route("/short_url/{code}", web::delete().to(short_url::delete_handler::<S>))
            .route("/stats", web::get().to(short_url::stats_handler::<S>))
            .route("/access_log/list", web::get().to(access_log::list_handler::<A>))
            .route(
                "/access_log/{code}/unique_visitors",
                web::get().to(access_log::unique_visitors_handler::<A>),
            ),
    );
    cfg.route("/{code}", web::get().to(short_url::redirect_handler::<S>));
}
