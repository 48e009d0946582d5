//! Domain record fetcher
//!
//! Issues the three TXT lookups for a domain (SPF at the domain, DKIM at
//! the configured selector, DMARC at `_dmarc`) and reports each as an
//! explicit [`LookupOutcome`]. The lookups run concurrently and never abort
//! each other.

use tracing::{debug, warn};

use super::dkim::dkim_record_name;
use super::dmarc::{dmarc_record_name, is_dmarc_record};
use super::spf::is_spf_record;
use super::types::{DomainRecords, LookupFailure, LookupOutcome, Mechanism};
use crate::utils::dns::{DnsError, DnsResolver};

/// Fetches raw SPF/DKIM/DMARC records for a domain
#[derive(Clone)]
pub struct RecordFetcher<R: DnsResolver> {
    resolver: R,
    dkim_selector: String,
}

impl<R: DnsResolver> RecordFetcher<R> {
    pub fn new(resolver: R, dkim_selector: impl Into<String>) -> Self {
        Self {
            resolver,
            dkim_selector: dkim_selector.into(),
        }
    }

    pub fn dkim_selector(&self) -> &str {
        &self.dkim_selector
    }

    /// Fetch all three records; one DNS attempt each
    pub async fn fetch(&self, domain: &str) -> DomainRecords {
        debug!("Fetching authentication records for {}", domain);

        let spf_name = domain.to_string();
        let dkim_name = dkim_record_name(&self.dkim_selector, domain);
        let dmarc_name = dmarc_record_name(domain);

        let (spf, dkim, dmarc) = tokio::join!(
            self.lookup(&spf_name, Mechanism::Spf, is_spf_record),
            self.lookup(&dkim_name, Mechanism::Dkim, |_| true),
            self.lookup(&dmarc_name, Mechanism::Dmarc, is_dmarc_record),
        );

        DomainRecords { spf, dkim, dmarc }
    }

    /// Query TXT at `name` and keep the first record accepted by `matches`
    async fn lookup(&self, name: &str, mechanism: Mechanism, matches: fn(&str) -> bool) -> LookupOutcome {
        match self.resolver.query_txt(name).await {
            Ok(records) => {
                let mut candidates = records.into_iter().filter(|r| matches(r));
                match candidates.next() {
                    Some(first) => {
                        if candidates.next().is_some() {
                            warn!(
                                "Multiple {} records at {}, using the first one",
                                mechanism, name
                            );
                        }
                        debug!("Found {} record at {}: {}", mechanism, name, first);
                        LookupOutcome::Found(first.trim().to_string())
                    }
                    None => {
                        debug!("No {} record at {}", mechanism, name);
                        LookupOutcome::Absent
                    }
                }
            }
            Err(DnsError::NotFound) => {
                debug!("No {} record at {} (no answer)", mechanism, name);
                LookupOutcome::Absent
            }
            Err(DnsError::Timeout) => {
                warn!("{} lookup timed out for {}", mechanism, name);
                LookupOutcome::Failed(LookupFailure::Timeout)
            }
            Err(DnsError::Other(msg)) => {
                warn!("{} lookup failed for {}: {}", mechanism, name, msg);
                LookupOutcome::Failed(LookupFailure::Failure(msg))
            }
        }
    }
}
