use actix_web::{HttpResponse, post, web};
use uppe_service::RawPing;

use crate::AppState;
use crate::error::ApiError;

macros_utils::routes! {
    route ingest_route,
}

/// Accept a ping from an external checker.
///
/// The body is decoded by hand so that malformed JSON gets the same `{ error, field }`
/// shape as a failed validation.
#[post("/api/v0/ping")]
pub async fn ingest_route(body: web::Bytes, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let raw: RawPing = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest { field: None, message: e.to_string() })?;

    let receipt = state.ingestor.ingest(raw).await?;
    Ok(HttpResponse::Created().json(receipt))
}
