use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;
use tracing::warn;

use crate::AppState;

macros_utils::routes! {
    route health_route,
    route ping_route,
    route storage_route,
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

#[get("/ping")]
pub async fn ping_route() -> impl Responder {
    HttpResponse::Ok().json(json!({ "ping": "pong" }))
}

/// Storage reachability.
#[get("/api/v0/ping")]
pub async fn storage_route(state: web::Data<AppState>) -> impl Responder {
    match state.database.health_check().await {
        Ok(()) => HttpResponse::Ok().body("OK"),
        Err(e) => {
            warn!("Storage health check failed: {}", e);
            HttpResponse::InternalServerError().body("Error")
        }
    }
}
