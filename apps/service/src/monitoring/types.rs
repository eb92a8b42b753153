use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown region code: {0:?}")]
pub struct UnknownRegion(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown periodicity: {0:?}")]
pub struct UnknownPeriodicity(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job type: {0:?}")]
pub struct UnknownJobType(pub String);

macro_rules! regions {
    ($($variant:ident => $code:literal),* $(,)?) => {
        /// Execution location a check is performed from.
        ///
        /// The wire form is the four character code (`"fra1"`), the set is closed.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Region {
            $( #[serde(rename = $code)] $variant, )*
        }

        impl Region {
            /// Every region a check can run from, in code order.
            pub const ALL: &'static [Region] = &[$(Region::$variant),*];

            pub const fn code(self) -> &'static str {
                match self {
                    $( Region::$variant => $code, )*
                }
            }
        }

        impl FromStr for Region {
            type Err = UnknownRegion;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $code => Ok(Region::$variant), )*
                    other => Err(UnknownRegion(other.to_string())),
                }
            }
        }
    };
}

regions! {
    Arn1 => "arn1",
    Bom1 => "bom1",
    Cdg1 => "cdg1",
    Cle1 => "cle1",
    Cpt1 => "cpt1",
    Dub1 => "dub1",
    Fra1 => "fra1",
    Gru1 => "gru1",
    Hkg1 => "hkg1",
    Hnd1 => "hnd1",
    Iad1 => "iad1",
    Icn1 => "icn1",
    Kix1 => "kix1",
    Lhr1 => "lhr1",
    Pdx1 => "pdx1",
    Sfo1 => "sfo1",
    Sin1 => "sin1",
    Syd1 => "syd1",
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Sentinel accepted in a monitor's region list meaning "pick one for me".
pub const AUTO_REGION: &str = "auto";

/// Regions a monitor asked to be checked from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelection {
    /// One region drawn at random on every run.
    Auto,
    /// One check per listed region, deduplicated, in configured order.
    Explicit(Vec<Region>),
}

impl RegionSelection {
    /// Parse the comma separated column value stored by the management layer.
    ///
    /// An empty list and any list mentioning `auto` both resolve to [`RegionSelection::Auto`].
    pub fn parse(raw: &str) -> Result<Self, UnknownRegion> {
        let codes: Vec<&str> =
            raw.split(',').map(str::trim).filter(|code| !code.is_empty()).collect();

        if codes.is_empty() || codes.contains(&AUTO_REGION) {
            return Ok(Self::Auto);
        }

        let mut regions = Vec::with_capacity(codes.len());
        for code in codes {
            let region = code.parse::<Region>()?;
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
        Ok(Self::Explicit(regions))
    }
}

impl fmt::Display for RegionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str(AUTO_REGION),
            Self::Explicit(regions) => {
                let codes: Vec<&str> = regions.iter().map(|r| r.code()).collect();
                f.write_str(&codes.join(","))
            }
        }
    }
}

/// How often a monitor is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Periodicity {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "10m")]
    TenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "other")]
    Other,
}

impl Periodicity {
    pub const ALL: [Periodicity; 6] = [
        Periodicity::OneMinute,
        Periodicity::FiveMinutes,
        Periodicity::TenMinutes,
        Periodicity::ThirtyMinutes,
        Periodicity::OneHour,
        Periodicity::Other,
    ];

    pub const fn tag(self) -> &'static str {
        match self {
            Periodicity::OneMinute => "1m",
            Periodicity::FiveMinutes => "5m",
            Periodicity::TenMinutes => "10m",
            Periodicity::ThirtyMinutes => "30m",
            Periodicity::OneHour => "1h",
            Periodicity::Other => "other",
        }
    }

    /// Wall clock period, `None` for monitors scheduled outside the fixed set.
    pub const fn interval(self) -> Option<Duration> {
        match self {
            Periodicity::OneMinute => Some(Duration::from_secs(60)),
            Periodicity::FiveMinutes => Some(Duration::from_secs(5 * 60)),
            Periodicity::TenMinutes => Some(Duration::from_secs(10 * 60)),
            Periodicity::ThirtyMinutes => Some(Duration::from_secs(30 * 60)),
            Periodicity::OneHour => Some(Duration::from_secs(60 * 60)),
            Periodicity::Other => None,
        }
    }
}

impl FromStr for Periodicity {
    type Err = UnknownPeriodicity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Periodicity::ALL
            .into_iter()
            .find(|p| p.tag() == s)
            .ok_or_else(|| UnknownPeriodicity(s.to_string()))
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classification carried by the monitor, not interpreted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Website,
    Cron,
    Other,
}

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "website" => Ok(JobType::Website),
            "cron" => Ok(JobType::Cron),
            "other" => Ok(JobType::Other),
            other => Err(UnknownJobType(other.to_string())),
        }
    }
}

/// Milliseconds since the epoch shared by every check of one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CronTimestamp(i64);

impl CronTimestamp {
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CronTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (monitor, region) probe scheduled by a dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckJob {
    pub monitor_id: i64,
    pub workspace_id: String,
    pub page_id: String,
    pub url: String,
    pub region: Region,
    pub cron_timestamp: CronTimestamp,
}

/// Status code recorded when no HTTP response was received at all.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Why a probe produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeFailure {
    Timeout,
    Connect,
    Request,
    Body,
}

impl ProbeFailure {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProbeFailure::Timeout => "timeout",
            ProbeFailure::Connect => "connect",
            ProbeFailure::Request => "request",
            ProbeFailure::Body => "body",
        }
    }
}

/// Observation produced by the executor for one job.
///
/// Network failures are ordinary values here: `status_code` is
/// [`NO_RESPONSE_STATUS`] and `failure` says what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// Milliseconds since the epoch when the request was started
    pub timestamp: i64,
    pub status_code: u16,
    pub latency_ms: u64,
    pub failure: Option<ProbeFailure>,
    pub metadata: Map<String, Value>,
}

impl CheckOutcome {
    pub fn responded(&self) -> bool {
        self.failure.is_none()
    }
}
