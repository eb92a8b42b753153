use actix_web::{HttpResponse, get, web};
use serde::Deserialize;
use uppe_service::aggregation::DEFAULT_LIMIT;
use uppe_service::monitoring::Region;
use uppe_service::responses::ResponseQuery;

use crate::AppState;
use crate::error::ApiError;

macros_utils::routes! {
    route pings_route,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingsParams {
    region: Option<String>,
    from_date: Option<i64>,
    to_date: Option<i64>,
    cron_timestamp: Option<i64>,
    limit: Option<usize>,
}

impl PingsParams {
    fn into_query(self, monitor_id: String) -> Result<ResponseQuery, ApiError> {
        let region = self
            .region
            .as_deref()
            .map(str::parse::<Region>)
            .transpose()
            .map_err(|e| ApiError::bad_request("region", e))?;

        Ok(ResponseQuery {
            monitor_id,
            region,
            from: self.from_date.unwrap_or(0),
            to: self.to_date,
            cron_timestamp: self.cron_timestamp,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
        })
    }
}

/// Recorded pings for one monitor, oldest first, metadata as an object.
#[get("/api/v0/monitors/{monitor_id}/pings")]
pub async fn pings_route(
    path: web::Path<String>,
    params: web::Query<PingsParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let query = params.into_inner().into_query(path.into_inner())?;
    Ok(HttpResponse::Ok().json(state.responses.list(&query).await?))
}
