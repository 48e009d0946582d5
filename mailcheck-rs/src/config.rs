use crate::error::{MailCheckError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsConfig {
    /// "system", "google", "cloudflare" or "quad9"
    #[serde(default = "default_nameservers")]
    pub nameservers: String,
    /// Per-query timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
    /// DKIM selector queried for every domain
    #[serde(default = "default_dkim_selector")]
    pub dkim_selector: String,
    /// Maximum domains resolved at once within a job
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Number of log lines kept in a status snapshot
    #[serde(default = "default_log_tail")]
    pub log_tail: usize,
    /// Seconds a finished job stays queryable
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
    #[serde(default = "default_max_emails")]
    pub max_emails: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CleanerConfig {
    /// Added to the built-in disposable domain list
    #[serde(default)]
    pub extra_disposable_domains: Vec<String>,
    /// Added to the built-in role-based local parts
    #[serde(default)]
    pub extra_role_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_nameservers() -> String {
    "system".to_string()
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_dkim_selector() -> String {
    "default".to_string()
}

fn default_concurrency() -> usize {
    5
}

fn default_log_tail() -> usize {
    50
}

fn default_job_ttl_secs() -> u64 {
    3600
}

fn default_max_emails() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            nameservers: default_nameservers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            dkim_selector: default_dkim_selector(),
            concurrency: default_concurrency(),
            log_tail: default_log_tail(),
            job_ttl_secs: default_job_ttl_secs(),
            max_emails: default_max_emails(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailCheckError::Config(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| MailCheckError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.verification.concurrency == 0 {
            return Err(MailCheckError::Config(
                "verification.concurrency must be at least 1".to_string(),
            ));
        }
        if self.verification.dkim_selector.trim().is_empty() {
            return Err(MailCheckError::Config(
                "verification.dkim_selector cannot be empty".to_string(),
            ));
        }
        if self.dns.timeout_secs == 0 {
            return Err(MailCheckError::Config(
                "dns.timeout_secs must be at least 1".to_string(),
            ));
        }
        match self.dns.nameservers.as_str() {
            "system" | "google" | "cloudflare" | "quad9" => Ok(()),
            other => Err(MailCheckError::Config(format!(
                "unknown dns.nameservers value: {}",
                other
            ))),
        }
    }
}
