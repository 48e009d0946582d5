use serde::{Deserialize, Serialize};

use super::dmarc::DmarcPolicy;

/// Why a DNS lookup produced no usable answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum LookupFailure {
    /// Query did not complete within the resolver timeout
    Timeout,
    /// Resolver or transport error
    Failure(String),
}

impl std::fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupFailure::Timeout => write!(f, "lookup timed out"),
            LookupFailure::Failure(msg) => write!(f, "lookup failed: {}", msg),
        }
    }
}

/// Result of fetching one mechanism's record
///
/// `Absent` means the name resolved but held no matching record (or did
/// not exist). `Failed` is a transient fault. Both score as a fail, but
/// only `Failed` is reported as a lookup error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "value")]
pub enum LookupOutcome {
    Found(String),
    Absent,
    Failed(LookupFailure),
}

impl LookupOutcome {
    /// Raw record text when one was found
    pub fn text(&self) -> Option<&str> {
        match self {
            LookupOutcome::Found(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&LookupFailure> {
        match self {
            LookupOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Raw lookups for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecords {
    pub spf: LookupOutcome,
    pub dkim: LookupOutcome,
    pub dmarc: LookupOutcome,
}

impl DomainRecords {
    /// All three lookups came back empty
    pub fn absent() -> Self {
        Self {
            spf: LookupOutcome::Absent,
            dkim: LookupOutcome::Absent,
            dmarc: LookupOutcome::Absent,
        }
    }

    /// Lookup errors as `(mechanism, failure)` pairs
    pub fn failures(&self) -> Vec<(Mechanism, &LookupFailure)> {
        [
            (Mechanism::Spf, &self.spf),
            (Mechanism::Dkim, &self.dkim),
            (Mechanism::Dmarc, &self.dmarc),
        ]
        .into_iter()
        .filter_map(|(mechanism, outcome)| outcome.failure().map(|f| (mechanism, f)))
        .collect()
    }
}

/// Authentication mechanism checked per domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    Spf,
    Dkim,
    Dmarc,
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mechanism::Spf => write!(f, "spf"),
            Mechanism::Dkim => write!(f, "dkim"),
            Mechanism::Dmarc => write!(f, "dmarc"),
        }
    }
}

/// Verdict for a single mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Nothing found where we looked, which does not prove absence
    /// (DKIM at a selector that was not queried)
    Unknown,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "pass"),
            CheckStatus::Fail => write!(f, "fail"),
            CheckStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Composite authentication score in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthScore(u8);

impl AuthScore {
    pub const MIN: AuthScore = AuthScore(0);
    pub const MAX: AuthScore = AuthScore(100);

    /// Clip `value` into range
    pub fn new(value: u32) -> Self {
        AuthScore(value.min(100) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for AuthScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authentication state of one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub domain: String,
    /// DKIM selector that was queried
    pub dkim_selector: String,
    /// Raw SPF record
    pub spf: Option<String>,
    /// Raw DKIM key record at the queried selector
    pub dkim: Option<String>,
    /// Raw DMARC record
    pub dmarc: Option<String>,
    pub spf_status: CheckStatus,
    pub dkim_status: CheckStatus,
    pub dmarc_status: CheckStatus,
    pub spf_pass: bool,
    pub dkim_pass: bool,
    pub dmarc_pass: bool,
    /// Published DMARC policy (`p=`) when the record parsed
    pub dmarc_policy: Option<DmarcPolicy>,
    pub score: AuthScore,
    /// Parse failures and record remarks
    pub notes: Vec<String>,
    /// Transient lookup errors
    pub lookup_errors: Vec<String>,
}

impl AuthRecord {
    /// At least one lookup hit a timeout or resolver error
    pub fn has_lookup_errors(&self) -> bool {
        !self.lookup_errors.is_empty()
    }
}
