//! Email domain authentication (SPF, DKIM, DMARC)
//!
//! Fetches the published records for a domain and scores how well the
//! domain is protected against spoofing.

pub mod dkim;
pub mod dmarc;
pub mod fetcher;
pub mod scorer;
pub mod spf;
pub mod types;

pub use dmarc::DmarcPolicy;
pub use fetcher::RecordFetcher;
pub use scorer::{evaluate, score_texts};
pub use types::{AuthRecord, AuthScore, CheckStatus, DomainRecords, LookupFailure, LookupOutcome};
