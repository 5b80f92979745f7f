//! Configuration management.
//!
//! Values are layered lowest precedence first: built-in defaults, a TOML
//! file, environment variables, then command-line flags (applied by the
//! CLI). [`MonitorConfig::validate`] runs once every layer is in.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked for in the working directory
pub const LOCAL_CONFIG_FILE: &str = "dnsbl-monitor.toml";

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// An environment variable held an unusable value
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
        /// What was wrong with it
        reason: String,
    },

    /// The merged configuration breaks a constraint
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Complete monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Log intended changes instead of writing them
    pub dry_run: bool,

    /// DNS probing
    pub dns: DnsConfig,

    /// Priorities applied on listing and recovery
    pub priority: PriorityPolicy,

    /// IP store location
    pub store: StoreConfig,

    /// Jira ticketing, disabled when absent
    pub jira: Option<JiraConfig>,

    /// Report output
    pub report: ReportConfig,
}

/// DNS probing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// DNSBL zones to query
    pub zones: Vec<String>,

    /// Per-query timeout in seconds (1-60)
    pub timeout_secs: u64,

    /// Probes in flight per IP (1-100)
    pub concurrency: usize,

    /// Check public resolvers before declaring a network issue
    pub network_check: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            timeout_secs: 5,
            concurrency: 10,
            network_check: true,
        }
    }
}

impl DnsConfig {
    /// Per-query timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Priorities written by the store on listing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityPolicy {
    /// Priority given to a newly listed IP
    pub listed_priority: u8,

    /// Priority restored on recovery when no backup was kept
    pub clean_fallback_priority: u8,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            listed_priority: 0,
            clean_fallback_priority: 50,
        }
    }
}

impl PriorityPolicy {
    /// Both priorities within 0-100 and listed strictly below fallback
    pub fn validate(&self) -> Result<()> {
        if self.listed_priority > 100 || self.clean_fallback_priority > 100 {
            return Err(ConfigError::Invalid(
                "priorities must be between 0 and 100".into(),
            ));
        }
        if self.listed_priority >= self.clean_fallback_priority {
            return Err(ConfigError::Invalid(format!(
                "listed_priority ({}) must be lower than clean_fallback_priority ({})",
                self.listed_priority, self.clean_fallback_priority
            )));
        }
        Ok(())
    }
}

/// IP store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the IP rows
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ip_addresses.json"),
        }
    }
}

/// Jira connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Server base URL (HTTPS)
    pub server: String,
    /// Account name or email
    pub user: String,
    /// API token
    pub api_token: String,
    /// Project key
    pub project: String,
    /// Issue type for listing issues
    pub issue_type: String,
    /// Issue type for DNS failure issues
    pub dns_failure_issue_type: String,
    /// Statuses treated as closed
    pub excluded_statuses: Vec<String>,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            user: String::new(),
            api_token: String::new(),
            project: String::new(),
            issue_type: "Task".into(),
            dns_failure_issue_type: "Incident".into(),
            excluded_statuses: vec!["Done".into(), "Closed".into(), "Resolved".into()],
        }
    }
}

/// Report settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory for report files; stdout when unset
    pub output_dir: Option<PathBuf>,
}

impl MonitorConfig {
    /// Default per-user config path
    #[must_use]
    pub fn user_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dnsbl-monitor").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Config file to read: the explicit path, else `./dnsbl-monitor.toml`,
    /// else the per-user file, whichever exists first.
    #[must_use]
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        Self::user_path().filter(|p| p.exists())
    }

    /// Defaults, then the config file, then the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment variables read through `lookup`. Empty values
    /// count as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(zones) = var("DNSBL_ZONES") {
            self.dns.zones = split_list(&zones);
        }
        if let Some(v) = var("DNS_TIMEOUT") {
            self.dns.timeout_secs = parse_number("DNS_TIMEOUT", &v)?;
        }
        if let Some(v) = var("DNS_CONCURRENCY") {
            self.dns.concurrency = parse_number("DNS_CONCURRENCY", &v)?;
        }
        if let Some(v) = var("ENABLE_NETWORK_CONNECTIVITY_CHECK") {
            self.dns.network_check = parse_bool("ENABLE_NETWORK_CONNECTIVITY_CHECK", &v)?;
        }
        if let Some(v) = var("LISTED_PRIORITY") {
            self.priority.listed_priority = parse_number("LISTED_PRIORITY", &v)?;
        }
        if let Some(v) = var("CLEAN_FALLBACK_PRIORITY") {
            self.priority.clean_fallback_priority = parse_number("CLEAN_FALLBACK_PRIORITY", &v)?;
        }
        if let Some(v) = var("DRY_RUN") {
            self.dry_run = parse_bool("DRY_RUN", &v)?;
        }
        if let Some(v) = var("STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = var("REPORT_DIR") {
            self.report.output_dir = Some(PathBuf::from(v));
        }

        let jira_vars = [
            "JIRA_SERVER",
            "JIRA_USER",
            "JIRA_API_TOKEN",
            "JIRA_PROJECT",
            "JIRA_ISSUE_TYPE",
            "JIRA_DNS_FAILURE_ISSUE_TYPE",
            "JIRA_EXCLUDED_STATUSES",
        ];
        if jira_vars.iter().any(|key| var(key).is_some()) {
            let jira = self.jira.get_or_insert_with(JiraConfig::default);
            if let Some(v) = var("JIRA_SERVER") {
                jira.server = v;
            }
            if let Some(v) = var("JIRA_USER") {
                jira.user = v;
            }
            if let Some(v) = var("JIRA_API_TOKEN") {
                jira.api_token = v;
            }
            if let Some(v) = var("JIRA_PROJECT") {
                jira.project = v;
            }
            if let Some(v) = var("JIRA_ISSUE_TYPE") {
                jira.issue_type = v;
            }
            if let Some(v) = var("JIRA_DNS_FAILURE_ISSUE_TYPE") {
                jira.dns_failure_issue_type = v;
            }
            if let Some(v) = var("JIRA_EXCLUDED_STATUSES") {
                jira.excluded_statuses = split_list(&v);
            }
        }

        Ok(())
    }

    /// Check every cross-field constraint. Zone names are trimmed and
    /// lower-cased first; blank entries and repeats are dropped.
    pub fn validate(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        self.dns.zones = self
            .dns
            .zones
            .iter()
            .map(|z| z.trim().to_ascii_lowercase())
            .filter(|z| !z.is_empty() && seen.insert(z.clone()))
            .collect();
        if self.dns.zones.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one DNSBL zone is required (set DNSBL_ZONES or [dns].zones)".into(),
            ));
        }
        if !(1..=60).contains(&self.dns.timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "DNS timeout must be between 1 and 60 seconds, got {}",
                self.dns.timeout_secs
            )));
        }
        if !(1..=100).contains(&self.dns.concurrency) {
            return Err(ConfigError::Invalid(format!(
                "DNS concurrency must be between 1 and 100, got {}",
                self.dns.concurrency
            )));
        }
        self.priority.validate()?;

        if let Some(jira) = &self.jira {
            if !jira.server.starts_with("https://") {
                return Err(ConfigError::Invalid("Jira server must be an HTTPS URL".into()));
            }
            for (name, value) in [
                ("user", &jira.user),
                ("api_token", &jira.api_token),
                ("project", &jira.project),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("Jira {name} is required")));
                }
            }
        }
        Ok(())
    }

    /// Copy suitable for display, with secrets masked
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(jira) = copy.jira.as_mut() {
            if !jira.api_token.is_empty() {
                jira.api_token = "********".into();
            }
        }
        copy
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
        reason: e.to_string(),
    })
}

/// Accepts `true/1/yes` and `false/0/no`, case-insensitively.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: "expected true/false, 1/0 or yes/no".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.dns.zones = vec!["zen.spamhaus.org".into()];
        config
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.dns.timeout_secs, 5);
        assert_eq!(config.dns.concurrency, 10);
        assert!(config.dns.network_check);
        assert_eq!(config.priority.listed_priority, 0);
        assert_eq!(config.priority.clean_fallback_priority, 50);
        assert!(!config.dry_run);
        assert!(config.jira.is_none());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = MonitorConfig::default();
        config
            .apply_env_from(env(&[
                ("DNSBL_ZONES", " zen.spamhaus.org , b.barracudacentral.org,,"),
                ("DNS_TIMEOUT", "8"),
                ("DNS_CONCURRENCY", "20"),
                ("DRY_RUN", "YES"),
                ("ENABLE_NETWORK_CONNECTIVITY_CHECK", "0"),
                ("LISTED_PRIORITY", "5"),
                ("REPORT_DIR", "/tmp/reports"),
            ]))
            .unwrap();

        assert_eq!(config.dns.zones, vec!["zen.spamhaus.org", "b.barracudacentral.org"]);
        assert_eq!(config.dns.timeout_secs, 8);
        assert_eq!(config.dns.concurrency, 20);
        assert!(config.dry_run);
        assert!(!config.dns.network_check);
        assert_eq!(config.priority.listed_priority, 5);
        assert_eq!(config.report.output_dir, Some(PathBuf::from("/tmp/reports")));
        assert!(config.jira.is_none());
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = MonitorConfig::default();
        let err = config
            .apply_env_from(env(&[("DNS_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DNS_TIMEOUT"));

        let err = config.apply_env_from(env(&[("DRY_RUN", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_jira_from_env() {
        let mut config = MonitorConfig::default();
        config
            .apply_env_from(env(&[
                ("JIRA_SERVER", "https://jira.example.com"),
                ("JIRA_USER", "bot@example.com"),
                ("JIRA_API_TOKEN", "t0ken"),
                ("JIRA_PROJECT", "OPS"),
                ("JIRA_EXCLUDED_STATUSES", "Done, Won't Fix"),
            ]))
            .unwrap();
        let jira = config.jira.as_ref().unwrap();
        assert_eq!(jira.project, "OPS");
        assert_eq!(jira.issue_type, "Task");
        assert_eq!(jira.excluded_statuses, vec!["Done", "Won't Fix"]);
        assert_eq!(config.redacted().jira.unwrap().api_token, "********");
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
dry_run = true

[dns]
zones = ["a.example", "b.example"]
timeout_secs = 3

[store]
path = "/var/lib/dnsbl/ips.json"
"#
        )
        .unwrap();

        let mut config = MonitorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dns.zones.len(), 2);
        assert_eq!(config.dns.timeout_secs, 3);
        assert_eq!(config.dns.concurrency, 10);
        assert!(config.dry_run);

        config.apply_env_from(env(&[("DNS_TIMEOUT", "9")])).unwrap();
        assert_eq!(config.dns.timeout_secs, 9);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/dnsbl/ips.json"));
    }

    #[test]
    fn test_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dns]\ntimeout_secs = \"five\"").unwrap();
        assert!(matches!(
            MonitorConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        let mut blank = valid();
        blank.dns.zones = vec!["  ".into()];
        assert!(blank.validate().is_err());

        let mut slow = valid();
        slow.dns.timeout_secs = 61;
        assert!(slow.validate().is_err());

        let mut wide = valid();
        wide.dns.concurrency = 0;
        assert!(wide.validate().is_err());

        let mut inverted = valid();
        inverted.priority.listed_priority = 50;
        assert!(inverted.validate().is_err());

        let mut plain_http = valid();
        plain_http.jira = Some(JiraConfig {
            server: "http://jira.example.com".into(),
            user: "u".into(),
            api_token: "t".into(),
            project: "OPS".into(),
            ..JiraConfig::default()
        });
        assert!(plain_http.validate().is_err());
    }

    #[test]
    fn test_validate_trims_zones() {
        let mut config = valid();
        config.dns.zones = vec![" a.example ".into(), String::new()];
        config.validate().unwrap();
        assert_eq!(config.dns.zones, vec!["a.example"]);
    }

    #[test]
    fn test_validate_folds_zone_case() {
        let mut config = valid();
        config.dns.zones = vec![
            "ZEN.example".into(),
            "zen.example ".into(),
            "B.Example".into(),
        ];
        config.validate().unwrap();
        assert_eq!(config.dns.zones, vec!["zen.example", "b.example"]);
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = toml::to_string_pretty(&valid()).unwrap();
        let back: MonitorConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, valid());
    }
}
