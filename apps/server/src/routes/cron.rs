use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Responder, get, web};
use uppe_service::monitoring::Periodicity;
use uppe_service::orchestrator::Caller;

use crate::AppState;

macros_utils::routes! {
    route cron_route,
}

/// Scheduler entry point. Answers `{ "success": true }` for every known periodicity,
/// whether or not the caller was allowed to start a cycle.
#[get("/api/checker/cron/{periodicity}")]
pub async fn cron_route(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> impl Responder {
    let Ok(periodicity) = path.parse::<Periodicity>() else {
        return HttpResponse::NotFound().finish();
    };

    HttpResponse::Ok().json(state.trigger.fire(&caller(&req), periodicity))
}

/// Identity comes from the bearer token and the TCP peer; client-chosen headers such as
/// `Host` or `X-Forwarded-For` are never trusted.
fn caller(req: &HttpRequest) -> Caller {
    Caller::Remote {
        bearer_token: req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string()),
        peer: req.peer_addr().map(|addr| addr.ip()),
    }
}
