//! Entry point of a dispatch cycle.
//!
//! The acknowledgment returned to a caller never depends on what the cycle does; outcomes
//! travel over the [`EventBus`](crate::bus::EventBus) and the logs instead.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CycleReport, Orchestrator};
use crate::monitoring::types::Periodicity;

/// Who is asking for a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// The in-process clock or the CLI
    Internal,
    /// `peer` is the address of the connection itself, never a header value.
    Remote { bearer_token: Option<String>, peer: Option<IpAddr> },
}

/// Always `{ "success": true }`, authorized or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerAck {
    pub success: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid source range: {0}")]
pub struct InvalidSourceRange(String);

/// A single address or a CIDR block, e.g. `10.0.0.0/8` or `fd00::/8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRange {
    network: IpAddr,
    prefix: u8,
}

impl SourceRange {
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, canonical(addr)) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for SourceRange {
    type Err = InvalidSourceRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSourceRange(s.to_string());
        let (addr, prefix) = match s.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix.parse::<u8>().map_err(|_| invalid())?)),
            None => (s.trim(), None),
        };
        let network = canonical(addr.parse::<IpAddr>().map_err(|_| invalid())?);
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = prefix.unwrap_or(max);
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { network, prefix })
    }
}

/// IPv4-mapped IPv6 peers (`::ffff:a.b.c.d`) compare as IPv4.
fn canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
        v4 => v4,
    }
}

/// Decides whether a remote caller is a legitimate scheduling source.
#[derive(Debug, Clone, Default)]
pub struct TriggerAuth {
    secret_digest: Option<[u8; 32]>,
    allowed_sources: Vec<SourceRange>,
}

impl TriggerAuth {
    pub fn new(secret: Option<&str>, allowed_sources: Vec<SourceRange>) -> Self {
        Self { secret_digest: secret.filter(|s| !s.is_empty()).map(digest), allowed_sources }
    }

    /// False when neither a secret nor any source is configured, so no remote caller can pass.
    pub fn is_configured(&self) -> bool {
        self.secret_digest.is_some() || !self.allowed_sources.is_empty()
    }

    pub fn authorize(&self, caller: &Caller) -> bool {
        let (bearer_token, peer) = match caller {
            Caller::Internal => return true,
            Caller::Remote { bearer_token, peer } => (bearer_token.as_deref(), *peer),
        };

        if let (Some(expected), Some(token)) = (&self.secret_digest, bearer_token) {
            if digest(token) == *expected {
                return true;
            }
        }

        peer.is_some_and(|peer| self.allowed_sources.iter().any(|range| range.contains(peer)))
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

/// Authorizes callers and starts dispatch cycles without waiting for them.
pub struct SchedulerTrigger {
    auth: TriggerAuth,
    orchestrator: Arc<Orchestrator>,
}

impl SchedulerTrigger {
    pub fn new(auth: TriggerAuth, orchestrator: Arc<Orchestrator>) -> Self {
        if !auth.is_configured() {
            warn!("No trigger secret or allowed sources configured, remote triggers will be ignored");
        }
        Self { auth, orchestrator }
    }

    /// Start one cycle for `periodicity` if `caller` is authorized, then acknowledge.
    pub fn fire(&self, caller: &Caller, periodicity: Periodicity) -> TriggerAck {
        if self.auth.authorize(caller) {
            info!(%periodicity, "Trigger accepted");
            drop(self.start_cycle(periodicity));
        } else {
            let (has_token, peer) = match caller {
                Caller::Internal => (false, None),
                Caller::Remote { bearer_token, peer } => (bearer_token.is_some(), *peer),
            };
            debug!(%periodicity, has_token, ?peer, "Ignoring unauthorized trigger");
        }
        TriggerAck { success: true }
    }

    /// Run one cycle in the background; the handle may be awaited or dropped.
    pub fn start_cycle(&self, periodicity: Periodicity) -> JoinHandle<CycleReport> {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_cycle(periodicity).await })
    }
}
