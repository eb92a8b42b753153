use std::collections::HashMap;

use thiserror::Error;

use super::types::{ProbeFailure, Region};

/// Header naming the region a probe claims to run from.
pub const REGION_HEADER: &str = "x-uppe-region";

/// Response headers copied into a ping's metadata.
const RECORDED_HEADERS: [&str; 7] =
    ["content-type", "content-length", "server", "cache-control", "date", "last-modified", "etag"];

/// What a probe saw when the target answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
}

/// A probe that got no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed reading body: {0}")]
    Body(String),
}

impl ProbeError {
    pub fn kind(&self) -> ProbeFailure {
        match self {
            ProbeError::Timeout => ProbeFailure::Timeout,
            ProbeError::Connect(_) => ProbeFailure::Connect,
            ProbeError::Request(_) => ProbeFailure::Request,
            ProbeError::Body(_) => ProbeFailure::Body,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_connect() {
            ProbeError::Connect(err.to_string())
        } else {
            ProbeError::Request(err.to_string())
        }
    }
}

/// Performs one HTTP GET against a target from a region.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, url: &str, region: Region) -> Result<ProbeResponse, ProbeError>;
}

/// reqwest backed checker, with an optional egress proxy per region.
pub struct HttpChecker {
    client: reqwest::Client,
    regional: HashMap<Region, reqwest::Client>,
}

impl HttpChecker {
    pub fn new(proxies: &HashMap<Region, String>) -> Result<Self, reqwest::Error> {
        let mut regional = HashMap::with_capacity(proxies.len());
        for (region, proxy) in proxies {
            let client = Self::builder().proxy(reqwest::Proxy::all(proxy.as_str())?).build()?;
            regional.insert(*region, client);
        }

        Ok(Self { client: Self::builder().build()?, regional })
    }

    fn builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder().user_agent(concat!("uppe/", env!("CARGO_PKG_VERSION")))
    }

    fn client_for(&self, region: Region) -> &reqwest::Client {
        self.regional.get(&region).unwrap_or(&self.client)
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, url: &str, region: Region) -> Result<ProbeResponse, ProbeError> {
        let mut response = self
            .client_for(region)
            .get(url)
            .header(REGION_HEADER, region.code())
            .send()
            .await
            .map_err(ProbeError::from_reqwest)?;

        let status_code = response.status().as_u16();
        let headers = extract_response_headers(&response);

        // The check only counts once the whole body has arrived. Chunks are dropped as they come.
        while response
            .chunk()
            .await
            .map_err(|e| if e.is_timeout() { ProbeError::Timeout } else { ProbeError::Body(e.to_string()) })?
            .is_some()
        {}

        Ok(ProbeResponse { status_code, headers })
    }
}

fn extract_response_headers(response: &reqwest::Response) -> Vec<(String, String)> {
    RECORDED_HEADERS
        .iter()
        .filter_map(|name| {
            let value = response.headers().get(*name)?.to_str().ok()?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ProbeError::Timeout.kind(), ProbeFailure::Timeout);
        assert_eq!(ProbeError::Connect("refused".into()).kind(), ProbeFailure::Connect);
        assert_eq!(ProbeError::Body("reset".into()).kind(), ProbeFailure::Body);
    }

    #[test]
    fn test_proxy_clients_are_built_per_region() {
        let proxies = HashMap::from([(Region::Syd1, "http://127.0.0.1:3128".to_string())]);
        let checker = HttpChecker::new(&proxies).unwrap();
        assert!(checker.regional.contains_key(&Region::Syd1));
        assert!(!checker.regional.contains_key(&Region::Fra1));
    }
}
