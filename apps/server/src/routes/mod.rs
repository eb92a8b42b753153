use actix_web::web::{QueryConfig, ServiceConfig};

use crate::error::ApiError;

mod cron;
mod health;
mod ping;
mod pings;
mod stats;

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.app_data(
        QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest { field: None, message: err.to_string() }.into()),
    );

    health::routes(cfg);
    cron::routes(cfg);
    ping::routes(cfg);
    pings::routes(cfg);
    stats::routes(cfg);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use uppe_service::database::{AppendOutcome, Ping, PingRange, PingStore};
    use uppe_service::{Bucket, Config, GroupBy, Ingestor, PipelineEvent, Services, StoreError};

    use super::*;

    async fn services(configure: impl FnOnce(&mut Config)) -> (Services, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("server.db");
        configure(&mut config);

        (Services::start(&config).await.unwrap(), dir)
    }

    async fn state() -> (web::Data<Services>, TempDir) {
        let (services, dir) = services(|config| config.trigger.secret = Some("cron-secret".to_string())).await;
        (web::Data::new(services), dir)
    }

    /// Every storage call fails as if the pool were exhausted.
    struct Unavailable;

    #[async_trait::async_trait]
    impl PingStore for Unavailable {
        async fn append(&self, _ping: &Ping) -> Result<AppendOutcome, StoreError> {
            Err(StoreError::Pool("timed out waiting for a connection".into()))
        }

        async fn range(&self, _range: &PingRange) -> Result<Vec<Ping>, StoreError> {
            Err(StoreError::Pool("timed out waiting for a connection".into()))
        }

        async fn buckets(&self, _range: &PingRange, _group_by: GroupBy, _limit: usize) -> Result<Vec<Bucket>, StoreError> {
            Err(StoreError::Pool("timed out waiting for a connection".into()))
        }
    }

    fn ping_body(region: &str) -> Value {
        json!({
            "id": "external-1",
            "workspaceId": "1",
            "pageId": "2",
            "monitorId": "31",
            "timestamp": 1_700_000_000_500_i64,
            "statusCode": 200,
            "latency": 140,
            "cronTimestamp": 1_700_000_000_000_i64,
            "url": "https://status.example.com",
            "metadata": { "source": "external" },
            "region": region
        })
    }

    #[actix_web::test]
    async fn test_health_routes() {
        let (data, _dir) = state().await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(body, json!({ "ping": "pong" }));

        let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/api/v0/ping").to_request()).await;
        assert_eq!(body, "OK");
    }

    #[actix_web::test]
    async fn test_cron_acks_without_running_unauthorized_cycles() {
        let (data, _dir) = state().await;
        let mut events = data.bus.subscribe();
        let app = test::init_service(App::new().app_data(data.clone()).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/checker/cron/1m")
            .insert_header(("Authorization", "Bearer wrong"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "success": true }));
        assert!(tokio::time::timeout(Duration::from_millis(200), events.recv()).await.is_err());

        let unknown = test::TestRequest::get().uri("/api/checker/cron/2m").to_request();
        assert_eq!(test::call_service(&app, unknown).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_ingest_then_stats() {
        let (data, _dir) = state().await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let rejected = test::TestRequest::post().uri("/api/v0/ping").set_json(ping_body("mars1")).to_request();
        let res = test::call_service(&app, rejected).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["field"], "region");

        let accepted = test::TestRequest::post().uri("/api/v0/ping").set_json(ping_body("fra1")).to_request();
        let res = test::call_service(&app, accepted).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let receipt: Value = test::read_body_json(res).await;
        assert_eq!(receipt["id"], "external-1");
        assert_eq!(receipt["duplicate"], false);

        let req = test::TestRequest::get()
            .uri("/api/v0/monitors/31/stats?groupBy=cron&cronTimestamp=1700000000000")
            .to_request();
        let buckets: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            buckets,
            json!([{
                "timestamp": 1_700_000_000_000_i64,
                "count": 1,
                "ok": 1,
                "avgLatency": 140,
                "uptime": 1.0,
                "status": "operational"
            }])
        );

        let req = test::TestRequest::get().uri("/api/v0/monitors/31/stats?region=auto").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_malformed_body_is_bad_request() {
        let (data, _dir) = state().await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v0/ping")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["field"], Value::Null);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_cron_authorizes_the_connection_not_the_host_header() {
        let (services, _dir) = services(|config| config.trigger.allowed_sources = vec!["10.0.0.0/8".into()]).await;
        let data = web::Data::new(services);
        let mut events = data.bus.subscribe();
        let app = test::init_service(App::new().app_data(data.clone()).configure(routes)).await;

        let spoofed = test::TestRequest::get()
            .uri("/api/checker/cron/1m")
            .insert_header(("Host", "cron.internal"))
            .insert_header(("X-Forwarded-For", "10.0.0.5"))
            .peer_addr("203.0.113.9:4000".parse().unwrap())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, spoofed).await;
        assert_eq!(body, json!({ "success": true }));
        assert!(tokio::time::timeout(Duration::from_millis(200), events.recv()).await.is_err());

        let internal = test::TestRequest::get()
            .uri("/api/checker/cron/1m")
            .peer_addr("10.0.0.5:4000".parse().unwrap())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, internal).await;
        assert_eq!(body, json!({ "success": true }));

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, PipelineEvent::CycleStarted { jobs: 0, .. }));
    }

    #[actix_web::test]
    async fn test_ping_list_returns_parsed_metadata() {
        let (data, _dir) = state().await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let accepted = test::TestRequest::post().uri("/api/v0/ping").set_json(ping_body("fra1")).to_request();
        assert_eq!(test::call_service(&app, accepted).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/api/v0/monitors/31/pings?region=fra1&limit=10").to_request();
        let pings: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            pings,
            json!([{
                "id": "external-1",
                "workspaceId": "1",
                "pageId": "2",
                "monitorId": "31",
                "timestamp": 1_700_000_000_500_i64,
                "statusCode": 200,
                "latency": 140,
                "cronTimestamp": 1_700_000_000_000_i64,
                "url": "https://status.example.com",
                "metadata": { "source": "external" },
                "region": "fra1"
            }])
        );

        let req = test::TestRequest::get().uri("/api/v0/monitors/31/pings?region=sin1").to_request();
        let pings: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pings, json!([]));

        let req = test::TestRequest::get().uri("/api/v0/monitors/31/pings?region=auto").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["field"], "region");
    }

    #[actix_web::test]
    async fn test_storage_failure_is_service_unavailable() {
        let (services, _dir) = services(|_| {}).await;
        let store = Arc::new(Unavailable);
        let data = web::Data::new(Services { ingestor: Arc::new(Ingestor::new(store)), ..services });
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/v0/ping").set_json(ping_body("fra1")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["field"], Value::Null);
        assert!(body["error"].as_str().unwrap().starts_with("storage unavailable"));
    }

    #[actix_web::test]
    async fn test_malformed_query_is_json_bad_request() {
        let (data, _dir) = state().await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        for uri in ["/api/v0/monitors/31/stats?limit=abc", "/api/v0/monitors/31/pings?fromDate=yesterday"] {
            let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");

            let body: Value = test::read_body_json(res).await;
            assert_eq!(body["field"], Value::Null);
            assert!(body["error"].is_string());
        }
    }
}
