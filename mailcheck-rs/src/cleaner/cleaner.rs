//! Email list cleaner
//!
//! Steps, in order:
//! 1. trim, lowercase, drop blanks and `nan`
//! 2. drop duplicates, keeping the first occurrence
//! 3. drop addresses failing the format check
//! 4. drop disposable domains
//! 5. drop role-based local parts
//! 6. optionally drop domains without MX records

use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::types::{CleanResult, CleaningStats, DomainCount};
use crate::config::CleanerConfig;
use crate::error::{MailCheckError, Result};
use crate::utils::dns::DnsResolver;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// MX lookups in flight at once
const MX_CONCURRENCY: usize = 5;

const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "tempmail.org",
    "guerrillamail.com",
    "mailinator.com",
    "temp-mail.org",
    "throwaway.email",
    "yopmail.com",
    "maildrop.cc",
    "tempm.com",
    "getnada.com",
    "33mail.com",
    "emailondeck.com",
];

const ROLE_PREFIXES: &[&str] = &[
    "admin",
    "administrator",
    "support",
    "help",
    "info",
    "contact",
    "sales",
    "marketing",
    "webmaster",
    "noreply",
    "no-reply",
    "postmaster",
    "hostmaster",
    "listmaster",
    "abuse",
    "security",
];

pub struct EmailListCleaner {
    email_pattern: Regex,
    disposable_domains: HashSet<String>,
    role_prefixes: HashSet<String>,
}

impl EmailListCleaner {
    pub fn new(config: &CleanerConfig) -> Result<Self> {
        let email_pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| MailCheckError::Config(format!("email pattern: {}", e)))?;

        let disposable_domains = DISPOSABLE_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .chain(config.extra_disposable_domains.iter().map(|d| d.trim().to_lowercase()))
            .collect();
        let role_prefixes = ROLE_PREFIXES
            .iter()
            .map(|p| p.to_string())
            .chain(config.extra_role_prefixes.iter().map(|p| p.trim().to_lowercase()))
            .collect();

        Ok(Self {
            email_pattern,
            disposable_domains,
            role_prefixes,
        })
    }

    pub fn is_disposable(&self, domain: &str) -> bool {
        self.disposable_domains.contains(domain)
    }

    pub fn is_role_based(&self, local_part: &str) -> bool {
        self.role_prefixes.contains(local_part)
    }

    /// Run the offline cleaning steps
    pub fn clean(&self, emails: &[String]) -> CleanResult {
        let mut stats = CleaningStats {
            original_count: emails.len(),
            ..CleaningStats::default()
        };

        let normalized: Vec<String> = emails
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty() && e != "nan")
            .collect();
        stats.empty_removed = emails.len() - normalized.len();

        let mut seen = HashSet::new();
        let unique: Vec<String> = normalized
            .into_iter()
            .filter(|e| seen.insert(e.clone()))
            .collect();
        stats.duplicates_removed = emails.len() - stats.empty_removed - unique.len();

        let mut kept = Vec::with_capacity(unique.len());
        for email in unique {
            if !self.email_pattern.is_match(&email) {
                stats.invalid_format += 1;
                continue;
            }
            // The pattern guarantees exactly one '@'
            let (local, domain) = email.split_once('@').unwrap_or((email.as_str(), ""));
            if self.is_disposable(domain) {
                stats.disposable_emails += 1;
                continue;
            }
            if self.is_role_based(local) {
                stats.role_based_emails += 1;
                continue;
            }
            kept.push(email);
        }

        stats.final_count = kept.len();
        CleanResult { emails: kept, stats }
    }

    /// Clean, then drop addresses whose domain publishes no MX record
    ///
    /// Each unique domain is looked up once; a lookup error counts as
    /// no MX.
    pub async fn clean_with_mx<R: DnsResolver>(&self, emails: &[String], resolver: &R) -> CleanResult {
        let mut result = self.clean(emails);

        let mut seen = HashSet::new();
        let domains: Vec<String> = result
            .emails
            .iter()
            .map(|email| email_domain(email))
            .filter(|domain| seen.insert(*domain))
            .map(str::to_string)
            .collect();
        info!("Checking MX records for {} domains", domains.len());

        let valid: HashSet<String> = stream::iter(domains)
            .map(|domain| async move {
                let has_mx = matches!(resolver.query_mx(&domain).await, Ok(ref mx) if !mx.is_empty());
                if !has_mx {
                    debug!("No MX for {}", domain);
                }
                (domain, has_mx)
            })
            .buffer_unordered(MX_CONCURRENCY)
            .filter_map(|(domain, has_mx)| async move { has_mx.then_some(domain) })
            .collect()
            .await;

        let before = result.emails.len();
        result.emails.retain(|e| valid.contains(email_domain(e)));
        result.stats.invalid_domains = before - result.emails.len();
        result.stats.final_count = result.emails.len();

        result
    }
}

/// Log the cleaning summary
pub fn log_summary(stats: &CleaningStats) {
    info!(
        "Cleaned {} emails: {} duplicates, {} invalid format, {} disposable, {} role-based, {} invalid domains; {} kept ({:.1}%)",
        stats.original_count,
        stats.duplicates_removed,
        stats.invalid_format,
        stats.disposable_emails,
        stats.role_based_emails,
        stats.invalid_domains,
        stats.final_count,
        stats.retention_rate()
    );
}

/// Most common domains, highest count first, ties by name
pub fn domain_breakdown(emails: &[String], limit: usize) -> Vec<DomainCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for email in emails {
        if let Some((_, domain)) = email.rsplit_once('@') {
            *counts.entry(domain).or_insert(0) += 1;
        }
    }

    let mut breakdown: Vec<DomainCount> = counts
        .into_iter()
        .map(|(domain, count)| DomainCount {
            domain: domain.to_string(),
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    breakdown.truncate(limit);
    breakdown
}

fn email_domain(email: &str) -> &str {
    email.rsplit_once('@').map(|(_, d)| d).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dns::{DnsError, MockResolver};

    fn list(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn cleaner() -> EmailListCleaner {
        EmailListCleaner::new(&CleanerConfig::default()).unwrap()
    }

    #[test]
    fn test_clean_pipeline() {
        let input = list(&[
            "  Alice@Example.com ",
            "alice@example.com",
            "",
            "nan",
            "not-an-email",
            "bob@mailinator.com",
            "support@example.com",
            "carol@example.org",
        ]);
        let result = cleaner().clean(&input);

        assert_eq!(result.emails, vec!["alice@example.com", "carol@example.org"]);
        let stats = result.stats;
        assert_eq!(stats.original_count, 8);
        assert_eq!(stats.empty_removed, 2);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.invalid_format, 1);
        assert_eq!(stats.disposable_emails, 1);
        assert_eq!(stats.role_based_emails, 1);
        assert_eq!(stats.invalid_domains, 0);
        assert_eq!(stats.final_count, 2);
        assert!((stats.retention_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_extends_lists() {
        let config = CleanerConfig {
            extra_disposable_domains: vec!["Burner.IO".to_string()],
            extra_role_prefixes: vec!["billing".to_string()],
        };
        let cleaner = EmailListCleaner::new(&config).unwrap();
        let result = cleaner.clean(&list(&["a@burner.io", "billing@example.com", "ok@example.com"]));

        assert_eq!(result.emails, vec!["ok@example.com"]);
        assert_eq!(result.stats.disposable_emails, 1);
        assert_eq!(result.stats.role_based_emails, 1);
    }

    #[test]
    fn test_empty_list() {
        let result = cleaner().clean(&[]);
        assert!(result.emails.is_empty());
        assert_eq!(result.stats.retention_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_clean_with_mx() {
        let resolver = MockResolver::new();
        resolver.add_mx("example.com", vec![(10, "mx.example.com".to_string())]);
        resolver.set_failure("flaky.com", DnsError::Timeout);

        let input = list(&["a@example.com", "b@example.com", "c@nomx.com", "d@flaky.com"]);
        let result = cleaner().clean_with_mx(&input, &resolver).await;

        assert_eq!(result.emails, vec!["a@example.com", "b@example.com"]);
        assert_eq!(result.stats.invalid_domains, 2);
        assert_eq!(result.stats.final_count, 2);
        assert_eq!(resolver.query_count(), 3);
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_clean_with_mx_future_is_send() {
        let resolver = MockResolver::new();
        let cleaner = cleaner();
        let input = list(&["a@example.com"]);

        // Axum handlers and spawned tasks need this
        assert_send(cleaner.clean_with_mx(&input, &resolver));
    }

    #[test]
    fn test_domain_breakdown() {
        let emails = list(&["a@b.com", "c@a.com", "d@b.com", "e@c.com", "f@a.com", "g@d.com"]);
        let top = domain_breakdown(&emails, 3);

        assert_eq!(top.len(), 3);
        assert_eq!((top[0].domain.as_str(), top[0].count), ("a.com", 2));
        assert_eq!((top[1].domain.as_str(), top[1].count), ("b.com", 2));
        assert_eq!((top[2].domain.as_str(), top[2].count), ("c.com", 1));
    }
}
