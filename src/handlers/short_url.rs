use actix_web::{
    http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, LOCATION, USER_AGENT},
    web, HttpRequest, HttpResponse, Responder,
};
use log::{debug, warn};
use serde_json::json;

use crate::{
    models::{
        BatchShortenDto, BatchStatus, CreateShortUrlDto, PageParams, UpdateShortUrlDto, Visitor,
    },
    services::ShortUrlServiceTrait,
    types::Result,
    utils::batch_csv,
};

pub const BATCH_STATUS_HEADER: &str = "x-batch-status";
pub const BATCH_PENDING_HEADER: &str = "x-batch-pending";

/// Create short URL route handler
pub async fn create_handler<S: ShortUrlServiceTrait + 'static>(
    dto: web::Json<CreateShortUrlDto>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let result = service.create_short_code(dto.into_inner()).await?;

    let (mut response, message) = if result.created {
        (HttpResponse::Created(), "Successfully created short URL")
    } else {
        (HttpResponse::Ok(), "URL already shortened")
    };
    Ok(response.json(json!({
        "data": result,
        "message": message,
    })))
}

/// Batch shorten route handler
pub async fn batch_handler<S: ShortUrlServiceTrait + 'static>(
    dto: web::Json<BatchShortenDto>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let result = service.shorten_batch(dto.into_inner()).await?;

    let message = match result.status {
        BatchStatus::Completed => format!("Successfully shortened {} URLs", result.mappings.len()),
        BatchStatus::Cancelled | BatchStatus::Failed => format!(
            "Batch stopped early: {} URLs shortened, {} pending",
            result.mappings.len(),
            result.pending.len()
        ),
    };

    Ok(HttpResponse::Ok().json(json!({
        "data": result,
        "message": message,
    })))
}

/// CSV batch route handler: an `origin_url` column in, a `result.csv` of
/// `short_code,origin_url` rows out
pub async fn batch_csv_handler<S: ShortUrlServiceTrait + 'static>(
    body: web::Bytes,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let dto = batch_csv::read_batch(&body)?;
    let result = service.shorten_batch(dto).await?;

    if result.status != BatchStatus::Completed {
        warn!(
            "CSV batch {}: {} URLs left pending",
            result.status.as_str(),
            result.pending.len()
        );
    }

    let csv = batch_csv::write_mappings(&result.mappings)?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((CONTENT_DISPOSITION, "attachment; filename=result.csv"))
        .insert_header((BATCH_STATUS_HEADER, result.status.as_str()))
        .insert_header((BATCH_PENDING_HEADER, result.pending.len().to_string()))
        .body(csv))
}

/// List short URLs route handler
pub async fn list_handler<S: ShortUrlServiceTrait + 'static>(
    query: web::Query<PageParams>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let page = service.list(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": page,
        "message": "Successfully retrieved short URLs",
    })))
}

/// Get short URL by code route handler
pub async fn get_by_code_handler<S: ShortUrlServiceTrait + 'static>(
    code: web::Path<String>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let url = service.get_by_code(&code.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": url,
        "message": "Successfully retrieved short URL",
    })))
}

/// Update short URL route handler
pub async fn update_handler<S: ShortUrlServiceTrait + 'static>(
    code: web::Path<String>,
    dto: web::Json<UpdateShortUrlDto>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let url = service.update(&code.into_inner(), dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": url,
        "message": "Successfully updated short URL",
    })))
}

/// Delete short URL route handler
pub async fn delete_handler<S: ShortUrlServiceTrait + 'static>(
    code: web::Path<String>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let code = code.into_inner();
    service.delete(&code).await?;
    Ok(HttpResponse::Ok().json(json!({
        "deleted_code": &code,
        "message": format!("Successfully deleted short URL '{}'", code),
    })))
}

/// Stats route handler
pub async fn stats_handler<S: ShortUrlServiceTrait + 'static>(
    service: web::Data<S>,
) -> Result<impl Responder> {
    let stats = service.stats().await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": stats,
        "message": "Successfully retrieved stats",
    })))
}

/// Redirect route handler
pub async fn redirect_handler<S: ShortUrlServiceTrait + 'static>(
    req: HttpRequest,
    path: web::Path<String>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let short_code = path.into_inner();
    debug!("Redirect requested for code: {}", short_code);

    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("Unknown");
    let visitor = Visitor::new(ip_address, user_agent);

    let origin_url = service.resolve(&short_code, &visitor).await?;

    Ok(HttpResponse::Found()
        .insert_header((LOCATION, origin_url))
        .insert_header((CACHE_CONTROL, "no-store"))
        .finish())
}
