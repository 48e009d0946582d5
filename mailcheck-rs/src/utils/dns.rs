//! DNS lookup abstraction
//!
//! The verification pipeline and the list cleaner only talk to DNS through
//! the [`DnsResolver`] trait, so jobs can run against a real resolver in
//! production and against [`MockResolver`] in tests.
//!
//! # Example
//! ```no_run
//! use mailcheck_rs::config::DnsConfig;
//! use mailcheck_rs::utils::dns::{DnsResolver, TrustDnsResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = TrustDnsResolver::from_config(&DnsConfig::default())?;
//! let records = resolver.query_txt("_dmarc.gmail.com").await?;
//! println!("DMARC: {:?}", records);
//! # Ok(())
//! # }
//! ```

use crate::config::DnsConfig;
use crate::error::{MailCheckError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::{Name, TokioAsyncResolver};

/// Failure of a single DNS query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    /// NXDOMAIN or an empty answer
    #[error("no records found")]
    NotFound,
    #[error("query timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

/// Resolver seam used by the fetcher and the list cleaner
pub trait DnsResolver: Clone + Send + Sync + 'static {
    /// TXT records for `name`, each record's strings concatenated
    fn query_txt(&self, name: &str) -> impl Future<Output = std::result::Result<Vec<String>, DnsError>> + Send;

    /// MX exchanges for `name` as `(preference, host)`
    fn query_mx(&self, name: &str) -> impl Future<Output = std::result::Result<Vec<(u16, String)>, DnsError>> + Send;
}

/// trust-dns backed resolver
///
/// Configured for a single attempt per query and no answer caching.
/// Names are always queried as absolute, so resolv.conf search domains
/// never add extra queries.
#[derive(Clone)]
pub struct TrustDnsResolver {
    resolver: TokioAsyncResolver,
}

impl TrustDnsResolver {
    /// Build a resolver from the `[dns]` config section
    pub fn from_config(config: &DnsConfig) -> Result<Self> {
        let (resolver_config, mut opts) = match config.nameservers.as_str() {
            "system" => trust_dns_resolver::system_conf::read_system_conf()
                .map_err(|e| MailCheckError::DnsLookup(format!("Failed to read system DNS config: {}", e)))?,
            "google" => (ResolverConfig::google(), ResolverOpts::default()),
            "cloudflare" => (ResolverConfig::cloudflare(), ResolverOpts::default()),
            "quad9" => (ResolverConfig::quad9(), ResolverOpts::default()),
            other => {
                return Err(MailCheckError::Config(format!(
                    "unknown nameservers: {}",
                    other
                )))
            }
        };

        info!(
            "DNS resolver initialized - nameservers: {}, timeout: {}s",
            config.nameservers, config.timeout_secs
        );

        Ok(Self::new(
            resolver_config,
            opts,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    /// Build a resolver for explicit nameservers
    pub fn new(resolver_config: ResolverConfig, mut opts: ResolverOpts, timeout: Duration) -> Self {
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.cache_size = 0;

        Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        }
    }

    fn classify_error(e: &ResolveError) -> DnsError {
        match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => DnsError::NotFound,
            ResolveErrorKind::Timeout => DnsError::Timeout,
            _ => DnsError::Other(e.to_string()),
        }
    }
}

/// Parse `name` as a fully qualified domain name
fn absolute_name(name: &str) -> std::result::Result<Name, DnsError> {
    let mut fqdn = Name::from_str(name)
        .map_err(|e| DnsError::Other(format!("invalid name {}: {}", name, e)))?;
    fqdn.set_fqdn(true);
    Ok(fqdn)
}

impl DnsResolver for TrustDnsResolver {
    async fn query_txt(&self, name: &str) -> std::result::Result<Vec<String>, DnsError> {
        debug!("TXT lookup: {}", name);
        match self.resolver.txt_lookup(absolute_name(name)?).await {
            Ok(lookup) => Ok(lookup.iter().map(|txt| txt.to_string()).collect()),
            Err(e) => Err(Self::classify_error(&e)),
        }
    }

    async fn query_mx(&self, name: &str) -> std::result::Result<Vec<(u16, String)>, DnsError> {
        debug!("MX lookup: {}", name);
        match self.resolver.mx_lookup(absolute_name(name)?).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| {
                    (
                        mx.preference(),
                        mx.exchange().to_string().trim_end_matches('.').to_string(),
                    )
                })
                .collect()),
            Err(e) => Err(Self::classify_error(&e)),
        }
    }
}

/// In-memory resolver for tests and offline runs
///
/// Unknown names answer [`DnsError::NotFound`]. Every query name is
/// recorded so callers can assert how many lookups were issued.
#[derive(Clone, Default)]
pub struct MockResolver {
    txt_records: Arc<Mutex<HashMap<String, Vec<String>>>>,
    mx_records: Arc<Mutex<HashMap<String, Vec<(u16, String)>>>>,
    failures: Arc<Mutex<HashMap<String, DnsError>>>,
    queries: Arc<Mutex<Vec<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_txt(&self, name: &str, records: Vec<String>) {
        self.txt_records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), records);
    }

    pub fn add_mx(&self, name: &str, records: Vec<(u16, String)>) {
        self.mx_records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), records);
    }

    /// Make every query for `name` fail with `error`
    pub fn set_failure(&self, name: &str, error: DnsError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), error);
    }

    /// Delay every answer
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Names queried so far, in query order
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn begin_query(&self, name: &str) -> std::result::Result<String, DnsError> {
        let name = name.to_lowercase();
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.clone());

        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned();
        match failure {
            Some(e) => Err(e),
            None => Ok(name),
        }
    }
}

impl DnsResolver for MockResolver {
    async fn query_txt(&self, name: &str) -> std::result::Result<Vec<String>, DnsError> {
        let name = self.begin_query(name).await?;
        self.txt_records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
            .ok_or(DnsError::NotFound)
    }

    async fn query_mx(&self, name: &str) -> std::result::Result<Vec<(u16, String)>, DnsError> {
        let name = self.begin_query(name).await?;
        self.mx_records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
            .ok_or(DnsError::NotFound)
    }
}
