//! SPF (Sender Policy Framework) record parsing
//!
//! Checks that a published TXT record is a syntactically valid SPF policy
//! according to RFC 7208 section 4.6. Nothing here evaluates a sender IP
//! against the policy; a domain passes when it publishes a usable record.
//!
//! # Example
//! ```
//! use mailcheck_rs::authentication::spf::{parse_spf, Qualifier};
//!
//! let record = parse_spf("v=spf1 include:_spf.google.com ~all").unwrap();
//! assert_eq!(record.mechanism_count(), 2);
//! assert_eq!(record.all_qualifier(), Some(Qualifier::SoftFail));
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// SPF parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpfParseError {
    #[error("record does not start with v=spf1")]
    NotSpf,
    #[error("record has no mechanisms")]
    NoMechanisms,
    #[error("unknown mechanism: {0}")]
    UnknownMechanism(String),
    #[error("invalid mechanism: {0}")]
    InvalidMechanism(String),
    #[error("invalid modifier: {0}")]
    InvalidModifier(String),
}

/// Mechanism qualifier: + (pass), - (fail), ~ (softfail), ? (neutral)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Pass,
    Fail,
    SoftFail,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismKind {
    All,
    Include,
    A,
    Mx,
    Ptr,
    Ip4,
    Ip6,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpfTerm {
    Mechanism {
        qualifier: Qualifier,
        kind: MechanismKind,
        value: Option<String>,
    },
    Modifier {
        name: String,
        value: String,
    },
}

/// Parsed SPF record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpfRecord {
    pub terms: Vec<SpfTerm>,
}

impl SpfRecord {
    pub fn mechanism_count(&self) -> usize {
        self.terms
            .iter()
            .filter(|t| matches!(t, SpfTerm::Mechanism { .. }))
            .count()
    }

    /// Qualifier on the `all` mechanism, if the record has one
    pub fn all_qualifier(&self) -> Option<Qualifier> {
        self.terms.iter().find_map(|t| match t {
            SpfTerm::Mechanism {
                qualifier,
                kind: MechanismKind::All,
                ..
            } => Some(*qualifier),
            _ => None,
        })
    }

    pub fn redirect(&self) -> Option<&str> {
        self.terms.iter().find_map(|t| match t {
            SpfTerm::Modifier { name, value } if name == "redirect" => Some(value.as_str()),
            _ => None,
        })
    }
}

/// True when the first token of a TXT record is `v=spf1`
pub fn is_spf_record(txt: &str) -> bool {
    txt.split_whitespace()
        .next()
        .map(|v| v.eq_ignore_ascii_case("v=spf1"))
        .unwrap_or(false)
}

/// Parse an SPF record
///
/// A valid record is `v=spf1` followed by at least one mechanism or a
/// `redirect=` modifier. Unknown mechanisms make the record invalid;
/// unknown modifiers are ignored.
pub fn parse_spf(record: &str) -> Result<SpfRecord, SpfParseError> {
    if !is_spf_record(record) {
        return Err(SpfParseError::NotSpf);
    }

    let terms = record
        .split_whitespace()
        .skip(1)
        .map(parse_term)
        .collect::<Result<Vec<_>, _>>()?;

    let spf = SpfRecord { terms };
    if spf.mechanism_count() == 0 && spf.redirect().is_none() {
        return Err(SpfParseError::NoMechanisms);
    }

    Ok(spf)
}

fn parse_term(term: &str) -> Result<SpfTerm, SpfParseError> {
    // name=value is a modifier unless ':' or '/' comes first
    if let Some(eq) = term.find('=') {
        let delimiter = term.find([':', '/']).unwrap_or(usize::MAX);
        if eq < delimiter {
            return parse_modifier(term, eq);
        }
    }

    let (qualifier, rest) = match term.chars().next() {
        Some('+') => (Qualifier::Pass, &term[1..]),
        Some('-') => (Qualifier::Fail, &term[1..]),
        Some('~') => (Qualifier::SoftFail, &term[1..]),
        Some('?') => (Qualifier::Neutral, &term[1..]),
        _ => (Qualifier::Pass, term),
    };

    let split = rest.find([':', '/']).unwrap_or(rest.len());
    let name = rest[..split].to_lowercase();
    let tail = &rest[split..];

    let kind = match name.as_str() {
        "all" => MechanismKind::All,
        "include" => MechanismKind::Include,
        "a" => MechanismKind::A,
        "mx" => MechanismKind::Mx,
        "ptr" => MechanismKind::Ptr,
        "ip4" => MechanismKind::Ip4,
        "ip6" => MechanismKind::Ip6,
        "exists" => MechanismKind::Exists,
        _ => return Err(SpfParseError::UnknownMechanism(term.to_string())),
    };

    let invalid = || SpfParseError::InvalidMechanism(term.to_string());

    let value = match kind {
        MechanismKind::All => {
            if !tail.is_empty() {
                return Err(invalid());
            }
            None
        }
        MechanismKind::Include | MechanismKind::Exists => {
            let domain = tail.strip_prefix(':').ok_or_else(invalid)?;
            if domain.is_empty() {
                return Err(invalid());
            }
            Some(domain.to_string())
        }
        MechanismKind::Ptr => match tail.strip_prefix(':') {
            Some(domain) if !domain.is_empty() => Some(domain.to_string()),
            Some(_) => return Err(invalid()),
            None if tail.is_empty() => None,
            None => return Err(invalid()),
        },
        MechanismKind::A | MechanismKind::Mx => {
            if tail.is_empty() {
                None
            } else {
                if !valid_domain_and_cidr(tail) {
                    return Err(invalid());
                }
                Some(tail.trim_start_matches(':').to_string())
            }
        }
        MechanismKind::Ip4 => {
            let value = tail.strip_prefix(':').ok_or_else(invalid)?;
            let (addr, prefix) = split_cidr(value);
            if addr.parse::<Ipv4Addr>().is_err() || !valid_prefix(prefix, 32) {
                return Err(invalid());
            }
            Some(value.to_string())
        }
        MechanismKind::Ip6 => {
            let value = tail.strip_prefix(':').ok_or_else(invalid)?;
            let (addr, prefix) = split_cidr(value);
            if addr.parse::<Ipv6Addr>().is_err() || !valid_prefix(prefix, 128) {
                return Err(invalid());
            }
            Some(value.to_string())
        }
    };

    Ok(SpfTerm::Mechanism {
        qualifier,
        kind,
        value,
    })
}

fn parse_modifier(term: &str, eq: usize) -> Result<SpfTerm, SpfParseError> {
    let name = term[..eq].to_lowercase();
    let value = &term[eq + 1..];

    let name_ok = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !name_ok {
        return Err(SpfParseError::InvalidModifier(term.to_string()));
    }

    if matches!(name.as_str(), "redirect" | "exp") && value.is_empty() {
        return Err(SpfParseError::InvalidModifier(term.to_string()));
    }

    Ok(SpfTerm::Modifier {
        name,
        value: value.to_string(),
    })
}

/// `[":" domain] [ip4-cidr] ["/" ip6-cidr]` as used by `a` and `mx`
fn valid_domain_and_cidr(tail: &str) -> bool {
    let (domain, cidrs) = match tail.strip_prefix(':') {
        Some(rest) => match rest.find('/') {
            Some(pos) => (Some(&rest[..pos]), &rest[pos..]),
            None => (Some(rest), ""),
        },
        None => (None, tail),
    };

    if domain == Some("") {
        return false;
    }

    if cidrs.is_empty() {
        return true;
    }

    // "/24", "//64" or "/24//64"
    let (v4, v6) = match cidrs.find("//") {
        Some(pos) => (&cidrs[..pos], Some(&cidrs[pos + 2..])),
        None => (cidrs, None),
    };
    let v4_ok = v4.is_empty() || valid_prefix(v4.strip_prefix('/'), 32);
    let v6_ok = v6.map(|p| valid_prefix(Some(p), 128)).unwrap_or(true);
    v4_ok && v6_ok
}

fn split_cidr(value: &str) -> (&str, Option<&str>) {
    match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    }
}

fn valid_prefix(prefix: Option<&str>, max: u8) -> bool {
    match prefix {
        None => true,
        Some(p) => p.parse::<u8>().map(|n| n <= max).unwrap_or(false),
    }
}
