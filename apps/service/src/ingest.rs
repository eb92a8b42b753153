use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::database::{AppendOutcome, PingStore};
use crate::error::IngestError;
use crate::validation::{RawPing, validate_ping};

/// What happened to an accepted ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub id: String,
    pub cron_timestamp: i64,
    /// A record with this id was already stored; nothing was written.
    pub duplicate: bool,
}

/// Validator in front of the ping store.
pub struct Ingestor {
    store: Arc<dyn PingStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn PingStore>) -> Self {
        Self { store }
    }

    /// Validate `raw` and append it. Validation errors are final, store errors retryable.
    pub async fn ingest(&self, raw: RawPing) -> Result<IngestReceipt, IngestError> {
        let ping = validate_ping(raw, chrono::Utc::now().timestamp_millis())?;
        let outcome = self.store.append(&ping).await?;

        debug!(
            monitor_id = %ping.monitor_id,
            region = %ping.region,
            cron_timestamp = ping.cron_timestamp,
            status_code = ping.status_code,
            "Ingested ping {} ({:?})",
            ping.id,
            outcome
        );

        Ok(IngestReceipt {
            id: ping.id,
            cron_timestamp: ping.cron_timestamp,
            duplicate: outcome == AppendOutcome::Duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::PingRange;
    use crate::database::test_support::temp_database;

    fn raw(region: &str) -> RawPing {
        serde_json::from_value(json!({
            "id": "ping-1",
            "workspaceId": "1",
            "pageId": "",
            "monitorId": "5",
            "timestamp": 1_000,
            "statusCode": 204,
            "latency": 12,
            "cronTimestamp": 1_000,
            "url": "https://status.example.com",
            "region": region
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_acknowledged_not_stored() {
        let (db, _dir) = temp_database().await;
        let db = Arc::new(db);
        let ingestor = Ingestor::new(db.clone());

        let first = ingestor.ingest(raw("hkg1")).await.unwrap();
        let second = ingestor.ingest(raw("hkg1")).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.id, second.id);
        assert_eq!(db.range(&PingRange::for_monitor("5")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_ping_is_not_stored() {
        let (db, _dir) = temp_database().await;
        let db = Arc::new(db);
        let ingestor = Ingestor::new(db.clone());

        let err = ingestor.ingest(raw("zz99")).await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(ref v) if v.field == "region"));
        assert!(db.range(&PingRange::for_monitor("5")).await.unwrap().is_empty());
    }
}
