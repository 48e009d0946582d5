//! Email list cleaning
//!
//! Normalizes and filters address lists: duplicates, malformed entries,
//! disposable providers, role accounts and, optionally, domains without MX.

#[allow(clippy::module_inception)]
pub mod cleaner;
pub mod types;

pub use cleaner::{domain_breakdown, log_summary, EmailListCleaner};
pub use types::{CleanResult, CleaningStats, DomainCount};
