use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::{models::AccessLogQueryParams, services::AccessLogServiceTrait, types::Result};

/// List access logs route handler
pub async fn list_handler<S: AccessLogServiceTrait + 'static>(
    query: web::Query<AccessLogQueryParams>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let page = service.list(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": page,
        "message": "Successfully retrieved access logs",
    })))
}

/// Unique visitors route handler
pub async fn unique_visitors_handler<S: AccessLogServiceTrait + 'static>(
    code: web::Path<String>,
    service: web::Data<S>,
) -> Result<impl Responder> {
    let visitors = service.unique_visitors(&code.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": visitors,
        "message": "Successfully retrieved unique visitors",
    })))
}
