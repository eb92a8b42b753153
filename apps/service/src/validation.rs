//! Ingestion validation.
//!
//! Every ping, whether produced by a dispatch cycle or posted by an external
//! checker, passes through [`validate_ping`] before it can touch storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;
use uuid::Uuid;

use crate::database::Ping;
use crate::error::ValidationError;
use crate::monitoring::types::{CheckJob, CheckOutcome, Region};

/// Longest caller supplied id accepted as an idempotency key
const MAX_ID_LEN: usize = 128;
const MAX_URL_LEN: usize = 2048;

/// Untrusted ping exactly as received; nothing here has been checked yet.
///
/// Every field defaults to `null` so that a missing field is reported by name by
/// [`validate_ping`] rather than by the JSON decoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPing {
    /// Optional idempotency key; a fresh id is assigned when absent
    pub id: Value,
    pub workspace_id: Value,
    pub page_id: Value,
    pub monitor_id: Value,
    pub timestamp: Value,
    pub status_code: Value,
    /// Milliseconds
    pub latency: Value,
    /// Defaults to the ingestion time when absent
    pub cron_timestamp: Value,
    pub url: Value,
    pub metadata: Value,
    pub region: Value,
}

impl RawPing {
    /// Raw ping for the outcome of a scheduled check.
    pub fn from_check(job: &CheckJob, outcome: &CheckOutcome) -> Self {
        Self {
            id: Value::Null,
            workspace_id: json!(job.workspace_id),
            page_id: json!(job.page_id),
            monitor_id: json!(job.monitor_id.to_string()),
            timestamp: json!(outcome.timestamp),
            status_code: json!(outcome.status_code),
            latency: json!(outcome.latency_ms),
            cron_timestamp: json!(job.cron_timestamp.as_millis()),
            url: json!(job.url),
            metadata: Value::Object(outcome.metadata.clone()),
            region: json!(job.region.code()),
        }
    }
}

/// Validate and canonicalize `raw` into a storable [`Ping`].
///
/// `now_ms` stands in for a missing `cronTimestamp`.
pub fn validate_ping(raw: RawPing, now_ms: i64) -> Result<Ping, ValidationError> {
    let id = match &raw.id {
        Value::Null => Uuid::new_v4().to_string(),
        Value::String(id) if id.is_empty() => return Err(ValidationError::new("id", "must not be empty")),
        Value::String(id) if id.len() > MAX_ID_LEN => {
            return Err(ValidationError::new("id", format!("longer than {MAX_ID_LEN} characters")));
        }
        Value::String(id) => id.clone(),
        other => return Err(type_error("id", "a string", other)),
    };

    let workspace_id = required_string("workspaceId", &raw.workspace_id)?;
    let page_id = required_string("pageId", &raw.page_id)?;
    let monitor_id = required_string("monitorId", &raw.monitor_id)?;
    if monitor_id.is_empty() {
        return Err(ValidationError::new("monitorId", "must not be empty"));
    }

    let timestamp = required_integer("timestamp", &raw.timestamp)?;
    if timestamp < 0 {
        return Err(ValidationError::new("timestamp", "must not be negative"));
    }

    let status_code = required_integer("statusCode", &raw.status_code)?;
    let status_code = match u16::try_from(status_code) {
        Ok(code) if code == 0 || (100..=999).contains(&code) => code,
        _ => {
            return Err(ValidationError::new(
                "statusCode",
                format!("{status_code} is neither 0 nor an HTTP status"),
            ));
        }
    };

    let latency = required_integer("latency", &raw.latency)?;
    let latency =
        u64::try_from(latency).map_err(|_| ValidationError::new("latency", "must not be negative"))?;

    let cron_timestamp = match &raw.cron_timestamp {
        Value::Null => now_ms,
        value => required_integer("cronTimestamp", value)?,
    };
    if cron_timestamp < 0 {
        return Err(ValidationError::new("cronTimestamp", "must not be negative"));
    }

    let url = required_string("url", &raw.url)?;
    validate_http_endpoint(&url).map_err(|reason| ValidationError::new("url", reason))?;

    let metadata = match &raw.metadata {
        Value::Null => "{}".to_string(),
        Value::Object(map) => serialize_flat_metadata(map)?,
        other => return Err(type_error("metadata", "an object", other)),
    };

    let region = required_string("region", &raw.region)?;
    let region = region
        .parse::<Region>()
        .map_err(|_| ValidationError::new("region", format!("{region:?} is not a known region code")))?;

    Ok(Ping {
        id,
        workspace_id,
        page_id,
        monitor_id,
        timestamp,
        status_code,
        latency,
        cron_timestamp,
        url,
        metadata,
        region,
    })
}

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> Result<(), String> {
    if target.trim().is_empty() {
        return Err("Target cannot be empty".to_string());
    }

    if target.len() > MAX_URL_LEN {
        return Err(format!("URL too long (max {MAX_URL_LEN} characters)"));
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(format!("Invalid scheme '{scheme}'. Must be http or https"));
            }

            if url.host_str().is_none() {
                return Err("URL must have a valid host".to_string());
            }

            Ok(())
        }
        Err(e) => {
            if !target.contains("://") {
                Err("URL must include scheme (http:// or https://)".to_string())
            } else {
                Err(format!("Invalid URL: {e}"))
            }
        }
    }
}

fn serialize_flat_metadata(map: &Map<String, Value>) -> Result<String, ValidationError> {
    if let Some((key, _)) = map.iter().find(|(_, v)| matches!(v, Value::Object(_) | Value::Array(_))) {
        return Err(ValidationError::new("metadata", format!("value for {key:?} is not a scalar")));
    }
    serde_json::to_string(map).map_err(|e| ValidationError::new("metadata", e.to_string()))
}

fn required_string(field: &'static str, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Err(ValidationError::new(field, "is required")),
        other => Err(type_error(field, "a string", other)),
    }
}

fn required_integer(field: &'static str, value: &Value) -> Result<i64, ValidationError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| ValidationError::new(field, format!("{n} is not an integer"))),
        Value::Null => Err(ValidationError::new(field, "is required")),
        other => Err(type_error(field, "an integer", other)),
    }
}

fn type_error(field: &'static str, expected: &str, found: &Value) -> ValidationError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    ValidationError::new(field, format!("expected {expected}, found {found}"))
}
