//! Cleaner statistics and results

use serde::{Deserialize, Serialize};

/// Counters collected while cleaning a list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub original_count: usize,
    /// Blank and `nan` entries dropped before deduplication
    pub empty_removed: usize,
    pub duplicates_removed: usize,
    pub invalid_format: usize,
    pub disposable_emails: usize,
    pub role_based_emails: usize,
    /// Removed by the MX check (zero when it did not run)
    pub invalid_domains: usize,
    pub final_count: usize,
}

impl CleaningStats {
    /// Share of the original list kept, in percent
    pub fn retention_rate(&self) -> f64 {
        if self.original_count == 0 {
            return 0.0;
        }
        self.final_count as f64 * 100.0 / self.original_count as f64
    }
}

/// Address count for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

/// Cleaned list plus what was removed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanResult {
    /// Surviving addresses, normalized, in first-seen order
    pub emails: Vec<String>,
    pub stats: CleaningStats,
}
