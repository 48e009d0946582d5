//! Progress/status store
//!
//! Keyed by job id. Each entry is an immutable [`JobSnapshot`] behind an
//! `Arc`; writers build the next snapshot and swap it in, readers clone the
//! `Arc`. A poll therefore always sees a fully committed snapshot and the
//! lock is only held for the swap.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{JobSnapshot, JobState, VerificationReport};

/// Shared store of job snapshots
#[derive(Clone)]
pub struct ProgressStore {
    jobs: Arc<RwLock<HashMap<String, Arc<JobSnapshot>>>>,
    /// Log lines kept per snapshot
    log_tail: usize,
}

impl ProgressStore {
    pub fn new(log_tail: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            log_tail: log_tail.max(1),
        }
    }

    /// Register a new pending job
    pub async fn create(&self, job_id: &str) -> Arc<JobSnapshot> {
        let snapshot = Arc::new(JobSnapshot::new(job_id));
        let mut jobs = self.jobs.write().await;
        jobs.insert(job_id.to_string(), snapshot.clone());
        snapshot
    }

    /// Latest committed snapshot
    pub async fn get(&self, job_id: &str) -> Option<Arc<JobSnapshot>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).cloned()
    }

    /// All snapshots, oldest first
    pub async fn list(&self) -> Vec<Arc<JobSnapshot>> {
        let jobs = self.jobs.read().await;
        let mut snapshots: Vec<_> = jobs.values().cloned().collect();
        snapshots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        snapshots
    }

    /// Replace a job's snapshot with an edited copy
    ///
    /// Finished jobs are frozen and `processed` never goes backwards.
    /// Returns the committed snapshot, or `None` when the job is unknown
    /// or already finished.
    pub async fn update<F>(&self, job_id: &str, edit: F) -> Option<Arc<JobSnapshot>>
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get(job_id)?;
        if current.state.is_finished() {
            return None;
        }

        let mut next = JobSnapshot::clone(current);
        edit(&mut next);
        next.processed = next.processed.max(current.processed);
        if next.log_tail.len() > self.log_tail {
            let excess = next.log_tail.len() - self.log_tail;
            next.log_tail.drain(..excess);
        }
        next.updated_at = Utc::now();

        let next = Arc::new(next);
        jobs.insert(job_id.to_string(), next.clone());
        Some(next)
    }

    /// Move to RUNNING with the domain count known
    pub async fn start(&self, job_id: &str, total: usize) -> Option<Arc<JobSnapshot>> {
        self.update(job_id, |s| {
            s.state = JobState::Running;
            s.total = total;
        })
        .await
    }

    /// Append a log line without touching counters
    pub async fn log(&self, job_id: &str, line: String) -> Option<Arc<JobSnapshot>> {
        self.update(job_id, |s| s.log_tail.push(line)).await
    }

    /// Publish a resolved domain together with its log line
    pub async fn advance(&self, job_id: &str, processed: usize, line: String) -> Option<Arc<JobSnapshot>> {
        self.update(job_id, |s| {
            s.processed = processed;
            s.log_tail.push(line);
        })
        .await
    }

    /// Enter a terminal state; only a RUNNING job can finish
    pub async fn finish(
        &self,
        job_id: &str,
        state: JobState,
        error: Option<String>,
    ) -> Option<Arc<JobSnapshot>> {
        let current = self.get(job_id).await?;
        if current.state != JobState::Running {
            warn!(
                "Job {} cannot move from {} to {}",
                job_id, current.state, state
            );
            return None;
        }

        self.update(job_id, |s| {
            if state == JobState::Completed {
                s.processed = s.total;
            }
            s.state = state;
            s.error = error;
        })
        .await
    }

    pub async fn remove(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        jobs.remove(job_id).is_some()
    }

    /// Drop finished jobs last updated more than `ttl` ago
    pub async fn remove_expired(&self, ttl: Duration) -> Vec<String> {
        let cutoff = match chrono::Duration::from_std(ttl) {
            Ok(ttl) => Utc::now() - ttl,
            Err(_) => return Vec::new(),
        };

        let mut jobs = self.jobs.write().await;
        let expired: Vec<String> = jobs
            .values()
            .filter(|s| s.state.is_finished() && s.updated_at < cutoff)
            .map(|s| s.job_id.clone())
            .collect();

        for job_id in &expired {
            jobs.remove(job_id);
            debug!("Removed expired job {}", job_id);
        }

        expired
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

/// Finished reports, kept apart from snapshots so polling stays cheap
#[derive(Clone, Default)]
pub struct ReportStore {
    reports: Arc<RwLock<HashMap<String, Arc<VerificationReport>>>>,
}

impl ReportStore {
    pub async fn insert(&self, report: Arc<VerificationReport>) {
        let mut reports = self.reports.write().await;
        reports.insert(report.job_id.clone(), report);
    }

    pub async fn get(&self, job_id: &str) -> Option<Arc<VerificationReport>> {
        self.reports.read().await.get(job_id).cloned()
    }

    pub async fn remove(&self, job_id: &str) -> Option<Arc<VerificationReport>> {
        self.reports.write().await.remove(job_id)
    }
}
