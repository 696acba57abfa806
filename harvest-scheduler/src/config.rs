//! Scheduler configuration
//!
//! Defines all configurable parameters of the scheduler: where sites and
//! crawled data live, batch pacing, polling and the daily trigger plan.

use harvest_core::domain::schedule::TimeOfDay;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::service::DispatchSettings;

/// Scheduler configuration
///
/// Delays and limits are configurable so load tests can tune batch pacing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Site file (YAML mapping of site id to site configuration)
    pub sites_path: PathBuf,

    /// Root directory of the JSON-lines file sink
    pub output_dir: PathBuf,

    /// Connection URL of the database sink, disabled when unset
    pub database_url: Option<String>,

    /// Directory of the log file, stdout only when unset
    pub log_dir: Option<PathBuf>,

    /// Page limit for sites without their own `max_pages`
    pub max_pages: u32,

    /// Run the whole batch once before entering the polling loop
    pub run_on_start: bool,

    /// Pause between two launches of a batch
    pub launch_delay: Duration,

    /// How often the recurrence rules are evaluated
    pub poll_interval: Duration,

    /// Max handlers executing at the same time
    pub max_concurrent_jobs: usize,

    /// Hour of the first per-site trigger; site `i` fires at `base + i`
    pub site_base_hour: u32,

    /// Daily trigger of the whole batch
    pub batch_time: TimeOfDay,

    /// HTTP timeout of page fetches
    pub request_timeout: Duration,

    /// Bind address of the status API, disabled when unset
    pub status_addr: Option<SocketAddr>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(sites_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            sites_path,
            output_dir,
            database_url: None,
            log_dir: None,
            max_pages: 3,
            run_on_start: true,
            launch_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            max_concurrent_jobs: 4,
            site_base_hour: 8,
            batch_time: TimeOfDay { hour: 2, minute: 0 },
            request_timeout: Duration::from_secs(30),
            status_addr: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional, but a malformed value is an error:
    /// - HARVEST_SITES (default: config/sites.yml)
    /// - HARVEST_OUTPUT_DIR (default: data)
    /// - HARVEST_DATABASE_URL (e.g. postgres://..., default: no database sink)
    /// - HARVEST_LOG_DIR (default: stdout only)
    /// - HARVEST_MAX_PAGES (default: 3)
    /// - HARVEST_RUN_ON_START (default: true)
    /// - HARVEST_LAUNCH_DELAY (seconds, default: 5)
    /// - HARVEST_POLL_INTERVAL (seconds, default: 1)
    /// - HARVEST_MAX_CONCURRENT_JOBS (default: 4)
    /// - HARVEST_SITE_BASE_HOUR (default: 8)
    /// - HARVEST_BATCH_TIME (HH:MM, default: 02:00)
    /// - HARVEST_REQUEST_TIMEOUT (seconds, default: 30)
    /// - HARVEST_STATUS_ADDR (e.g. 127.0.0.1:8090, default: disabled)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from a variable lookup, falling back to defaults
    /// for unset or blank variables
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let defaults = Self::default();

        let run_on_start = match var("HARVEST_RUN_ON_START") {
            Some(s) => parse_bool(&s)
                .ok_or_else(|| anyhow::anyhow!("HARVEST_RUN_ON_START: invalid boolean '{}'", s))?,
            None => defaults.run_on_start,
        };

        Ok(Self {
            sites_path: var("HARVEST_SITES")
                .map(PathBuf::from)
                .unwrap_or(defaults.sites_path),
            output_dir: var("HARVEST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            database_url: var("HARVEST_DATABASE_URL"),
            log_dir: var("HARVEST_LOG_DIR").map(PathBuf::from),
            max_pages: parse_var(&var, "HARVEST_MAX_PAGES")?.unwrap_or(defaults.max_pages),
            run_on_start,
            launch_delay: parse_var(&var, "HARVEST_LAUNCH_DELAY")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.launch_delay),
            poll_interval: parse_var(&var, "HARVEST_POLL_INTERVAL")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_concurrent_jobs: parse_var(&var, "HARVEST_MAX_CONCURRENT_JOBS")?
                .unwrap_or(defaults.max_concurrent_jobs),
            site_base_hour: parse_var(&var, "HARVEST_SITE_BASE_HOUR")?
                .unwrap_or(defaults.site_base_hour),
            batch_time: parse_var(&var, "HARVEST_BATCH_TIME")?.unwrap_or(defaults.batch_time),
            request_timeout: parse_var(&var, "HARVEST_REQUEST_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            status_addr: parse_var(&var, "HARVEST_STATUS_ADDR")?,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sites_path.as_os_str().is_empty() {
            anyhow::bail!("sites_path cannot be empty");
        }

        if self.output_dir.as_os_str().is_empty() {
            anyhow::bail!("output_dir cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }

        if self.site_base_hour > 23 {
            anyhow::bail!("site_base_hour must be between 0 and 23");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Settings handed to the dispatcher
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            default_page_limit: self.max_pages,
            launch_delay: self.launch_delay,
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("config/sites.yml"), PathBuf::from("data"))
    }
}

/// Parses an optional variable, rejecting malformed values
fn parse_var<T>(var: impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}: invalid value '{}': {}", key, s, e))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_pages, 3);
        assert!(config.run_on_start);
        assert_eq!(config.launch_delay, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_time.to_string(), "02:00");
        assert_eq!(config.site_base_hour, 8);
        assert!(config.status_addr.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.poll_interval = Duration::from_secs(1);

        config.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
        config.max_concurrent_jobs = 1;

        config.site_base_hour = 24;
        assert!(config.validate().is_err());
        config.site_base_hour = 23;

        // A zero launch delay is allowed: it disables staggering
        config.launch_delay = Duration::ZERO;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dispatch_settings() {
        let mut config = Config::default();
        config.max_pages = 10;
        config.max_concurrent_jobs = 2;

        let settings = config.dispatch_settings();
        assert_eq!(settings.default_page_limit, 10);
        assert_eq!(settings.max_concurrent_jobs, 2);
        assert_eq!(settings.launch_delay, Duration::from_secs(5));
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("HARVEST_SITES", "/srv/custom-sites.yml"),
            ("HARVEST_DATABASE_URL", "sqlite::memory:"),
            ("HARVEST_MAX_CONCURRENT_JOBS", "9"),
            ("HARVEST_BATCH_TIME", "03:30"),
            ("HARVEST_RUN_ON_START", "no"),
            ("HARVEST_STATUS_ADDR", "127.0.0.1:8090"),
            ("HARVEST_LAUNCH_DELAY", " "),
        ]))
        .unwrap();

        assert_eq!(config.sites_path, PathBuf::from("/srv/custom-sites.yml"));
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.max_concurrent_jobs, 9);
        assert_eq!(config.batch_time.to_string(), "03:30");
        assert!(!config.run_on_start);
        assert_eq!(config.status_addr, Some("127.0.0.1:8090".parse().unwrap()));
        // Blank counts as unset
        assert_eq!(config.launch_delay, Duration::from_secs(5));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_malformed_variable_is_an_error() {
        let err = Config::from_lookup(lookup(&[
            ("HARVEST_SITES", "/srv/custom-sites.yml"),
            ("HARVEST_MAX_CONCURRENT_JOBS", "9"),
            ("HARVEST_BATCH_TIME", "25:00"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("HARVEST_BATCH_TIME"));

        for (key, value) in [
            ("HARVEST_MAX_PAGES", "three"),
            ("HARVEST_POLL_INTERVAL", "-1"),
            ("HARVEST_RUN_ON_START", "maybe"),
            ("HARVEST_STATUS_ADDR", "localhost"),
        ] {
            let err = Config::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
