use std::collections::{BTreeMap, HashMap};
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::types::Region;
use crate::orchestrator::SourceRange;

/// Overrides `[trigger] secret`
pub const CRON_SECRET_ENV: &str = "UPPE_CRON_SECRET";
/// Overrides `[database] path`
pub const DATABASE_PATH_ENV: &str = "UPPE_DATABASE_PATH";

/// Bounds on `[dispatch] timeout_seconds`
const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=30;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file: {0}")]
    ReadFailed(String),

    #[error("failed to write config file: {0}")]
    WriteFailed(String),

    #[error("failed to parse config file: {0}")]
    ParseFailed(String),

    #[error("no config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: Database,
    pub dispatch: Dispatch,
    pub trigger: Trigger,
    pub server: Server,
    /// Execution context per region code, e.g. `[regions.syd1]`
    pub regions: BTreeMap<String, RegionContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub path: path::PathBuf,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dispatch {
    /// Probes in flight at once, across all cycles
    pub max_concurrency: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trigger {
    /// Bearer token accepted from the external scheduler
    pub secret: Option<String>,
    /// Connection source addresses allowed to trigger without a token, e.g. `10.0.0.0/8`
    pub allowed_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionContext {
    /// Proxy URL requests for this region egress through
    pub proxy: Option<String>,
}

impl Default for Database {
    fn default() -> Self {
        Self { path: path::PathBuf::from("uppe.db"), max_connections: 16 }
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self { max_concurrency: 64, timeout_seconds: 10 }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self { bind: "127.0.0.1".into(), port: 8080 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Database::default(),
            dispatch: Dispatch::default(),
            trigger: Trigger::default(),
            server: Server::default(),
            regions: BTreeMap::new(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Max Connections", &self.database.max_connections)?;

        write_title_1(f, "Dispatch")?;
        write_1(f, "Max Concurrency", &self.dispatch.max_concurrency)?;
        write_1(f, "Timeout (s)", &self.dispatch.timeout_seconds)?;

        write_title_1(f, "Trigger")?;
        write_1(f, "Secret", &if self.trigger.secret.is_some() { "<set>" } else { "<unset>" })?;
        write_1(f, "Allowed Sources", &self.trigger.allowed_sources.join(", "))?;

        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;

        if !self.regions.is_empty() {
            write_title_1(f, "Regions")?;
            for (code, context) in &self.regions {
                write_1(f, code, &"")?;
                write_2(f, "Proxy", &context.proxy.as_deref().unwrap_or("-"))?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// Environment overrides are applied and the result is validated.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string =
                fs::read_to_string(&config_path).map_err(|err| Error::ReadFailed(err.to_string()))?;
            Self::from_toml(&raw_string)?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        toml::from_str(raw).map_err(|err| Error::ParseFailed(err.to_string()))
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String =
            toml::to_string_pretty(self).map_err(|err| Error::ParseFailed(err.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(err.to_string()))?;
        }

        std::fs::write(path, config_str).map_err(|err| Error::WriteFailed(err.to_string()))
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env::var(CRON_SECRET_ENV).ok(), env::var(DATABASE_PATH_ENV).ok())
    }

    fn with_overrides(mut self, secret: Option<String>, database_path: Option<String>) -> Self {
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            self.trigger.secret = Some(secret);
        }
        if let Some(path) = database_path.filter(|p| !p.is_empty()) {
            self.database.path = path::PathBuf::from(path);
        }
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !TIMEOUT_RANGE.contains(&self.dispatch.timeout_seconds) {
            return Err(Error::Invalid(format!(
                "dispatch.timeout_seconds must be within {}..={}, got {}",
                TIMEOUT_RANGE.start(),
                TIMEOUT_RANGE.end(),
                self.dispatch.timeout_seconds
            )));
        }
        if self.dispatch.max_concurrency == 0 {
            return Err(Error::Invalid("dispatch.max_concurrency must be at least 1".into()));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Invalid("database.max_connections must be at least 1".into()));
        }
        self.trigger_sources()?;
        self.region_proxies().map(|_| ())
    }

    pub fn trigger_sources(&self) -> Result<Vec<SourceRange>, Error> {
        self.trigger
            .allowed_sources
            .iter()
            .map(|source| {
                source.parse::<SourceRange>().map_err(|e| Error::Invalid(format!("trigger.allowed_sources: {e}")))
            })
            .collect()
    }

    /// Configured proxies keyed by region; unknown region codes are an error.
    pub fn region_proxies(&self) -> Result<HashMap<Region, String>, Error> {
        let mut proxies = HashMap::new();
        for (code, context) in &self.regions {
            let region = code.parse::<Region>().map_err(|e| Error::Invalid(format!("regions: {e}")))?;
            if let Some(proxy) = &context.proxy {
                proxies.insert(region, proxy.clone());
            }
        }
        Ok(proxies)
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dispatch.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [dispatch]
            timeout_seconds = 5

            [trigger]
            allowed_sources = ["10.0.0.0/8"]

            [regions.syd1]
            proxy = "http://10.0.0.2:3128"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.timeout_seconds, 5);
        assert_eq!(config.dispatch.max_concurrency, 64);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.trigger.secret, None);
        assert_eq!(config.trigger_sources().unwrap(), vec!["10.0.0.0/8".parse().unwrap()]);
        assert_eq!(
            config.region_proxies().unwrap().get(&Region::Syd1).map(String::as_str),
            Some("http://10.0.0.2:3128")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = Config::default();
        config.dispatch.timeout_seconds = 31;
        assert!(matches!(config.validate(), Err(Error::Invalid(_))));

        config.dispatch.timeout_seconds = 30;
        config.dispatch.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.regions.insert("mars1".into(), RegionContext::default());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.trigger.allowed_sources = vec!["cron.internal".into()];
        assert!(matches!(config.validate(), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let config = Config::default()
            .with_overrides(Some("s3cret".into()), Some("/var/lib/uppe/pings.db".into()));
        assert_eq!(config.trigger.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.database.path, path::PathBuf::from("/var/lib/uppe/pings.db"));

        let untouched = Config::default().with_overrides(Some(String::new()), None);
        assert_eq!(untouched, Config::default());
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config");

        Config::from_config(Some(&path)).unwrap();

        let written = fs::read_to_string(dir.path().join("nested/config.toml")).unwrap();
        assert_eq!(Config::from_toml(&written).unwrap().dispatch, Dispatch::default());
    }
}
