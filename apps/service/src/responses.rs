//! Individual check responses as recorded, for drilling below the uptime buckets.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::aggregation::DEFAULT_LIMIT;
use crate::database::{Ping, PingRange, PingStore};
use crate::error::StoreError;
use crate::monitoring::types::Region;

/// One stored ping with its metadata decoded back into an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub id: String,
    pub workspace_id: String,
    pub page_id: String,
    pub monitor_id: String,
    pub timestamp: i64,
    pub status_code: u16,
    pub latency: u64,
    pub cron_timestamp: i64,
    pub url: String,
    pub metadata: Map<String, Value>,
    pub region: Region,
}

impl TryFrom<Ping> for PingResponse {
    type Error = StoreError;

    fn try_from(ping: Ping) -> Result<Self, Self::Error> {
        let metadata = match serde_json::from_str::<Value>(&ping.metadata) {
            Ok(Value::Object(map)) => map,
            Ok(other) => return Err(StoreError::decode("pings", format!("metadata is not an object: {other}"))),
            Err(e) => return Err(StoreError::decode("pings", e)),
        };

        Ok(Self {
            id: ping.id,
            workspace_id: ping.workspace_id,
            page_id: ping.page_id,
            monitor_id: ping.monitor_id,
            timestamp: ping.timestamp,
            status_code: ping.status_code,
            latency: ping.latency,
            cron_timestamp: ping.cron_timestamp,
            url: ping.url,
            metadata,
            region: ping.region,
        })
    }
}

/// Parameters of a response list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseQuery {
    pub monitor_id: String,
    pub region: Option<Region>,
    pub from: i64,
    pub to: Option<i64>,
    pub cron_timestamp: Option<i64>,
    /// Most recent pings to return
    pub limit: usize,
}

impl ResponseQuery {
    pub fn new(monitor_id: impl Into<String>) -> Self {
        Self { monitor_id: monitor_id.into(), region: None, from: 0, to: None, cron_timestamp: None, limit: DEFAULT_LIMIT }
    }
}

pub struct ResponseLog {
    store: Arc<dyn PingStore>,
}

impl ResponseLog {
    pub fn new(store: Arc<dyn PingStore>) -> Self {
        Self { store }
    }

    /// The `limit` most recent pings matching `query`, oldest first.
    pub async fn list(&self, query: &ResponseQuery) -> Result<Vec<PingResponse>, StoreError> {
        let range = PingRange {
            monitor_id: query.monitor_id.clone(),
            from: query.from,
            to: query.to,
            region: query.region,
            cron_timestamp: query.cron_timestamp,
            limit: Some(query.limit),
        };

        self.store.range(&range).await?.into_iter().map(PingResponse::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::test_support::temp_database;

    fn ping(id: &str, timestamp: i64, region: Region, metadata: &str) -> Ping {
        Ping {
            id: id.to_string(),
            workspace_id: "1".to_string(),
            page_id: "2".to_string(),
            monitor_id: "12".to_string(),
            timestamp,
            status_code: 200,
            latency: 80,
            cron_timestamp: timestamp - timestamp % 60_000,
            url: "https://example.com".to_string(),
            metadata: metadata.to_string(),
            region,
        }
    }

    #[tokio::test]
    async fn test_list_keeps_most_recent_with_parsed_metadata() {
        let (db, _dir) = temp_database().await;
        let db = Arc::new(db);
        db.append(&ping("a", 60_010, Region::Fra1, "{}")).await.unwrap();
        db.append(&ping("b", 120_010, Region::Sin1, r#"{"server":"nginx"}"#)).await.unwrap();
        db.append(&ping("c", 180_010, Region::Fra1, r#"{"error":"timeout","attempt":2}"#)).await.unwrap();

        let log = ResponseLog::new(db.clone());

        let latest = log.list(&ResponseQuery { limit: 2, ..ResponseQuery::new("12") }).await.unwrap();
        let ids: Vec<&str> = latest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(Value::Object(latest[1].metadata.clone()), json!({"error": "timeout", "attempt": 2}));

        let fra = log.list(&ResponseQuery { region: Some(Region::Fra1), ..ResponseQuery::new("12") }).await.unwrap();
        assert_eq!(fra.len(), 2);

        let cron = log.list(&ResponseQuery { cron_timestamp: Some(120_000), ..ResponseQuery::new("12") }).await.unwrap();
        assert_eq!(cron.len(), 1);
        assert_eq!(cron[0].metadata.get("server"), Some(&json!("nginx")));

        assert!(log.list(&ResponseQuery::new("13")).await.unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_metadata_is_a_decode_error() {
        let err = PingResponse::try_from(ping("x", 0, Region::Fra1, "[1]")).unwrap_err();
        assert!(matches!(err, StoreError::Decode { table: "pings", .. }));
    }
}
