use actix_web::{HttpResponse, get, web};
use serde::{Deserialize, Serialize};
use uppe_service::aggregation::{Bucket, BucketQuery, DEFAULT_LIMIT, GroupBy, UptimeStatus};
use uppe_service::monitoring::Region;

use crate::AppState;
use crate::error::ApiError;

macros_utils::routes! {
    route stats_route,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    group_by: Option<String>,
    region: Option<String>,
    from_date: Option<i64>,
    to_date: Option<i64>,
    cron_timestamp: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BucketView {
    #[serde(flatten)]
    bucket: Bucket,
    uptime: f64,
    status: UptimeStatus,
}

impl From<Bucket> for BucketView {
    fn from(bucket: Bucket) -> Self {
        Self { uptime: bucket.uptime_ratio(), status: bucket.status(), bucket }
    }
}

impl StatsParams {
    fn into_query(self, monitor_id: String) -> Result<BucketQuery, ApiError> {
        let group_by = match self.group_by.as_deref() {
            None => GroupBy::default(),
            Some(raw) => raw.parse().map_err(|e| ApiError::bad_request("groupBy", e))?,
        };
        let region = self
            .region
            .as_deref()
            .map(str::parse::<Region>)
            .transpose()
            .map_err(|e| ApiError::bad_request("region", e))?;

        Ok(BucketQuery {
            monitor_id,
            group_by,
            region,
            from: self.from_date.unwrap_or(0),
            to: self.to_date,
            cron_timestamp: self.cron_timestamp,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
        })
    }
}

/// Uptime buckets for one monitor, oldest first.
#[get("/api/v0/monitors/{monitor_id}/stats")]
pub async fn stats_route(
    path: web::Path<String>,
    params: web::Query<StatsParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let query = params.into_inner().into_query(path.into_inner())?;
    let buckets = state.aggregator.buckets(&query).await?;

    Ok(HttpResponse::Ok().json(buckets.into_iter().map(BucketView::from).collect::<Vec<_>>()))
}
