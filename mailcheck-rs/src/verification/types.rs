//! Verification job types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::authentication::{AuthRecord, AuthScore};

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Submitted, not yet started
    Pending,
    /// Resolving domains
    Running,
    /// Report available
    Completed,
    /// No processable input
    Failed,
    /// Stopped by the caller, no report
    Cancelled,
}

impl JobState {
    /// Terminal states never change again
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
            JobState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Read-only view of a job, as served to pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub state: JobState,
    /// Unique domains resolved so far
    pub processed: usize,
    /// Unique domains in the input
    pub total: usize,
    /// Most recent log lines, oldest first
    pub log_tail: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn new(job_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            state: JobState::Pending,
            processed: 0,
            total: 0,
            log_tail: Vec::new(),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Completion percentage for display
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return if self.state == JobState::Completed { 100 } else { 0 };
        }
        ((self.processed.min(self.total) * 100) / self.total) as u8
    }
}

/// Row-level outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// SPF, DKIM and DMARC all pass
    Pass,
    /// Some mechanisms pass
    Partial,
    /// No mechanism passes
    Fail,
    /// Malformed address, nothing looked up
    Invalid,
}

impl Verdict {
    pub fn from_record(record: &AuthRecord) -> Self {
        match [record.spf_pass, record.dkim_pass, record.dmarc_pass]
            .iter()
            .filter(|p| **p)
            .count()
        {
            3 => Verdict::Pass,
            0 => Verdict::Fail,
            _ => Verdict::Partial,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::Partial => write!(f, "partial"),
            Verdict::Fail => write!(f, "fail"),
            Verdict::Invalid => write!(f, "invalid"),
        }
    }
}

/// One line of the final report, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub email: String,
    pub domain: Option<String>,
    pub spf_pass: bool,
    pub dkim_pass: bool,
    pub dmarc_pass: bool,
    /// Absent for invalid rows
    pub score: Option<AuthScore>,
    pub verdict: Verdict,
}

impl ReportRow {
    pub fn from_record(email: &str, record: &AuthRecord) -> Self {
        Self {
            email: email.to_string(),
            domain: Some(record.domain.clone()),
            spf_pass: record.spf_pass,
            dkim_pass: record.dkim_pass,
            dmarc_pass: record.dmarc_pass,
            score: Some(record.score),
            verdict: Verdict::from_record(record),
        }
    }

    pub fn invalid(email: &str) -> Self {
        Self {
            email: email.to_string(),
            domain: None,
            spf_pass: false,
            dkim_pass: false,
            dmarc_pass: false,
            score: None,
            verdict: Verdict::Invalid,
        }
    }
}

/// Finished verification output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub job_id: String,
    /// One row per input email, in input order
    pub rows: Vec<ReportRow>,
    /// Per-domain detail, in first-seen order
    pub domains: Vec<AuthRecord>,
    pub completed_at: DateTime<Utc>,
}

const CSV_HEADER: &str = "email,domain,spf_pass,dkim_pass,dmarc_pass,score,verdict";

impl VerificationReport {
    /// Render the rows as CSV with a header line
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(64 * (self.rows.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');

        for row in &self.rows {
            let score = row.score.map(|s| s.to_string()).unwrap_or_default();
            let fields = [
                csv_field(&row.email),
                csv_field(row.domain.as_deref().unwrap_or("")),
                row.spf_pass.to_string(),
                row.dkim_pass.to_string(),
                row.dmarc_pass.to_string(),
                score,
                row.verdict.to_string(),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }

        out
    }

    /// Row count per verdict
    pub fn verdict_counts(&self) -> HashMap<Verdict, usize> {
        let mut counts = HashMap::new();
        for row in &self.rows {
            *counts.entry(row.verdict).or_insert(0) += 1;
        }
        counts
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// In-flight batch, owned by the runner for its whole run
#[derive(Debug)]
pub struct VerificationJob {
    pub id: String,
    /// Input emails as submitted
    pub emails: Vec<String>,
    /// Unique domains in first-seen order
    pub domains: Vec<String>,
    /// Input indices for each domain
    pub domain_rows: HashMap<String, Vec<usize>>,
    /// Computed once per domain
    pub records: HashMap<String, AuthRecord>,
    /// Filled as domains resolve; `None` until then
    pub rows: Vec<Option<ReportRow>>,
    pub processed: usize,
    pub log: Vec<String>,
}

impl VerificationJob {
    /// Index the input: malformed rows are marked invalid up front
    pub fn new(id: impl Into<String>, emails: Vec<String>) -> Self {
        let mut domains = Vec::new();
        let mut domain_rows: HashMap<String, Vec<usize>> = HashMap::new();
        let mut rows = vec![None; emails.len()];

        for (index, email) in emails.iter().enumerate() {
            match crate::utils::extract_domain(email) {
                Ok(domain) => {
                    let indices = domain_rows.entry(domain.clone()).or_default();
                    if indices.is_empty() {
                        domains.push(domain);
                    }
                    indices.push(index);
                }
                Err(_) => rows[index] = Some(ReportRow::invalid(email)),
            }
        }

        Self {
            id: id.into(),
            emails,
            domains,
            domain_rows,
            records: HashMap::new(),
            rows,
            processed: 0,
            log: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.domains.len()
    }

    /// Inputs that failed the address check
    pub fn invalid_emails(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .zip(&self.emails)
            .filter(|(row, _)| row.is_some())
            .map(|(_, email)| email.as_str())
    }

    /// Store a domain's record and fill every row sharing it
    pub fn record_domain(&mut self, record: AuthRecord) {
        if let Some(indices) = self.domain_rows.get(&record.domain) {
            for &index in indices {
                self.rows[index] = Some(ReportRow::from_record(&self.emails[index], &record));
            }
        }
        self.records.insert(record.domain.clone(), record);
        self.processed += 1;
    }

    /// Consume the job into its report; `None` while domains are pending
    pub fn into_report(self) -> Option<VerificationReport> {
        let rows = self.rows.into_iter().collect::<Option<Vec<_>>>()?;
        let mut records = self.records;
        let domains = self
            .domains
            .iter()
            .filter_map(|d| records.remove(d))
            .collect();

        Some(VerificationReport {
            job_id: self.id,
            rows,
            domains,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::scorer::evaluate;
    use crate::authentication::types::{DomainRecords, LookupOutcome};

    fn record(domain: &str, spf: Option<&str>) -> AuthRecord {
        let records = DomainRecords {
            spf: spf.map(|s| LookupOutcome::Found(s.to_string())).unwrap_or(LookupOutcome::Absent),
            dkim: LookupOutcome::Absent,
            dmarc: LookupOutcome::Absent,
        };
        evaluate(domain, "default", &records)
    }

    #[test]
    fn test_job_indexes_domains_in_first_seen_order() {
        let emails = vec![
            "a@y.com".to_string(),
            "b@X.com".to_string(),
            "not-an-email".to_string(),
            "c@y.com".to_string(),
        ];
        let job = VerificationJob::new("job", emails);

        assert_eq!(job.domains, vec!["y.com", "x.com"]);
        assert_eq!(job.domain_rows["y.com"], vec![0, 3]);
        assert_eq!(job.total(), 2);
        assert_eq!(job.invalid_emails().collect::<Vec<_>>(), vec!["not-an-email"]);
        assert_eq!(job.rows[2], Some(ReportRow::invalid("not-an-email")));
    }

    #[test]
    fn test_report_needs_every_domain() {
        let mut job = VerificationJob::new("job", vec!["a@x.com".into(), "b@y.com".into()]);
        job.record_domain(record("x.com", Some("v=spf1 -all")));
        assert_eq!(job.processed, 1);
        assert!(job.into_report().is_none());
    }

    #[test]
    fn test_report_rows_follow_input() {
        let mut job = VerificationJob::new(
            "job",
            vec!["a@x.com".into(), "bad".into(), "b@x.com".into()],
        );
        job.record_domain(record("x.com", Some("v=spf1 -all")));
        let report = job.into_report().unwrap();

        let emails: Vec<_> = report.rows.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.com", "bad", "b@x.com"]);
        assert_eq!(report.rows[0].verdict, Verdict::Partial);
        assert_eq!(report.rows[1].verdict, Verdict::Invalid);
        assert_eq!(report.rows[0].score, report.rows[2].score);
        assert_eq!(report.domains.len(), 1);
    }

    #[test]
    fn test_csv_output() {
        let mut job = VerificationJob::new("job", vec!["a@x.com".into(), "\"odd,one\"".into()]);
        job.record_domain(record("x.com", None));
        let csv = job.into_report().unwrap().to_csv();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "a@x.com,x.com,false,false,false,0,fail");
        assert_eq!(lines[2], "\"\"\"odd,one\"\"\",,false,false,false,,invalid");
    }

    #[test]
    fn test_snapshot_percent() {
        let mut snapshot = JobSnapshot::new("job");
        assert_eq!(snapshot.percent(), 0);
        snapshot.total = 4;
        snapshot.processed = 1;
        assert_eq!(snapshot.percent(), 25);
        assert!(!snapshot.state.is_finished());
        assert!(JobState::Cancelled.is_finished());
    }
}
