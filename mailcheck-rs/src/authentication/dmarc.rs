//! DMARC (Domain-based Message Authentication, Reporting & Conformance)
//!
//! Parses the policy a domain publishes at `_dmarc.{domain}` (RFC 7489
//! section 6.3). Policy strictness feeds the composite score.
//!
//! # Example
//! ```
//! use mailcheck_rs::authentication::dmarc::{parse_dmarc, DmarcPolicy};
//!
//! let record = parse_dmarc("v=DMARC1; p=reject; rua=mailto:dmarc@example.com").unwrap();
//! assert_eq!(record.policy, DmarcPolicy::Reject);
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::dkim::{parse_tag_list, DkimParseError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DmarcParseError {
    #[error("record does not start with v=DMARC1")]
    NotDmarc,
    #[error("missing policy (p=)")]
    MissingPolicy,
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),
    #[error("{0}")]
    Tags(#[from] DkimParseError),
}

/// DMARC policy actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcPolicy {
    /// No action (monitoring mode)
    None,
    /// Mark as spam but deliver
    Quarantine,
    /// Reject the message
    Reject,
}

impl FromStr for DmarcPolicy {
    type Err = DmarcParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(DmarcPolicy::None),
            "quarantine" => Ok(DmarcPolicy::Quarantine),
            "reject" => Ok(DmarcPolicy::Reject),
            _ => Err(DmarcParseError::UnknownPolicy(s.to_string())),
        }
    }
}

impl std::fmt::Display for DmarcPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DmarcPolicy::None => write!(f, "none"),
            DmarcPolicy::Quarantine => write!(f, "quarantine"),
            DmarcPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// DMARC alignment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmarcAlignment {
    /// Relaxed alignment (subdomains allowed)
    Relaxed,
    /// Strict alignment (exact match required)
    Strict,
}

/// DMARC record from DNS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmarcRecord {
    /// Policy for domain emails (p= parameter)
    pub policy: DmarcPolicy,
    /// Policy for subdomain emails (sp= parameter)
    pub subdomain_policy: Option<DmarcPolicy>,
    /// SPF alignment mode (aspf= parameter)
    pub spf_alignment: DmarcAlignment,
    /// DKIM alignment mode (adkim= parameter)
    pub dkim_alignment: DmarcAlignment,
    /// Percentage of emails to apply policy to (pct= parameter)
    pub percentage: u8,
    /// Reporting URI for aggregate reports (rua= parameter)
    pub aggregate_report_uri: Option<String>,
    /// Reporting URI for forensic reports (ruf= parameter)
    pub forensic_report_uri: Option<String>,
}

/// True when a TXT record starts with `v=DMARC1`
pub fn is_dmarc_record(txt: &str) -> bool {
    txt.trim_start()
        .get(..8)
        .map(|prefix| prefix.eq_ignore_ascii_case("v=DMARC1"))
        .unwrap_or(false)
}

/// Location of the DMARC record for a domain
pub fn dmarc_record_name(domain: &str) -> String {
    format!("_dmarc.{}", domain)
}

/// Parse a DMARC record
///
/// `v=DMARC1` must be the first tag and `p=` must name a known policy.
/// A malformed `sp=` or `pct=` is ignored, as receivers are told to do.
pub fn parse_dmarc(record: &str) -> Result<DmarcRecord, DmarcParseError> {
    let tags = parse_tag_list(record)?;

    match tags.first() {
        Some((name, value)) if name == "v" && value.eq_ignore_ascii_case("DMARC1") => {}
        _ => return Err(DmarcParseError::NotDmarc),
    }

    let mut policy = None;
    let mut dmarc = DmarcRecord {
        policy: DmarcPolicy::None,
        subdomain_policy: None,
        spf_alignment: DmarcAlignment::Relaxed,
        dkim_alignment: DmarcAlignment::Relaxed,
        percentage: 100,
        aggregate_report_uri: None,
        forensic_report_uri: None,
    };

    for (key, value) in tags.iter().skip(1) {
        match key.as_str() {
            "p" => policy = Some(value.parse::<DmarcPolicy>()?),
            "sp" => dmarc.subdomain_policy = value.parse().ok(),
            "aspf" => dmarc.spf_alignment = parse_alignment(value),
            "adkim" => dmarc.dkim_alignment = parse_alignment(value),
            "pct" => {
                if let Ok(pct) = value.parse::<u8>() {
                    dmarc.percentage = pct.min(100);
                }
            }
            "rua" => dmarc.aggregate_report_uri = Some(value.clone()),
            "ruf" => dmarc.forensic_report_uri = Some(value.clone()),
            _ => {} // Ignore unknown tags
        }
    }

    dmarc.policy = policy.ok_or(DmarcParseError::MissingPolicy)?;
    Ok(dmarc)
}

fn parse_alignment(value: &str) -> DmarcAlignment {
    if value.eq_ignore_ascii_case("s") {
        DmarcAlignment::Strict
    } else {
        DmarcAlignment::Relaxed
    }
}
