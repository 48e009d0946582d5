//! Batch verification runner
//!
//! Resolves each unique domain of a batch once, fills every row sharing
//! that domain, and publishes progress after each domain. Domains are
//! resolved with bounded concurrency; rows keep input order whatever the
//! completion order.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::progress::{ProgressStore, ReportStore};
use super::types::{JobState, VerificationJob, VerificationReport};
use crate::authentication::{evaluate, AuthRecord, RecordFetcher};
use crate::config::VerificationConfig;
use crate::error::{MailCheckError, Result};
use crate::utils::dns::DnsResolver;

/// How a run ended when it did not fail
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Arc<VerificationReport>),
    /// Stopped early; no report is kept
    Cancelled { processed: usize, total: usize },
}

/// Runs verification jobs against a resolver
#[derive(Clone)]
pub struct BatchRunner<R: DnsResolver> {
    fetcher: RecordFetcher<R>,
    progress: ProgressStore,
    reports: ReportStore,
    concurrency: usize,
}

impl<R: DnsResolver> BatchRunner<R> {
    pub fn new(resolver: R, progress: ProgressStore, config: &VerificationConfig) -> Self {
        Self {
            fetcher: RecordFetcher::new(resolver, config.dkim_selector.clone()),
            progress,
            reports: ReportStore::default(),
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Reports of completed jobs
    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    /// Run a job already registered in the progress store
    ///
    /// An empty batch fails the job with [`MailCheckError::FatalJob`]. Any
    /// other input completes, with malformed addresses reported as
    /// invalid rows.
    pub async fn run(
        &self,
        job_id: &str,
        emails: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        if emails.is_empty() {
            let reason = "no emails to verify".to_string();
            warn!("Job {} failed: {}", job_id, reason);
            self.progress.start(job_id, 0).await;
            self.progress
                .finish(job_id, JobState::Failed, Some(reason.clone()))
                .await;
            return Err(MailCheckError::FatalJob(reason));
        }

        let mut job = VerificationJob::new(job_id, emails);
        let total = job.total();
        info!(
            "Job {} started: {} emails, {} unique domains",
            job_id,
            job.emails.len(),
            total
        );
        self.progress.start(job_id, total).await;

        let invalid: Vec<String> = job
            .invalid_emails()
            .map(|email| format!("Skipped malformed email '{}'", email))
            .collect();
        for line in invalid {
            job.log.push(line.clone());
            self.progress.log(job_id, line).await;
        }

        let selector = self.fetcher.dkim_selector().to_string();
        let results = stream::iter(job.domains.clone())
            .map(|domain| {
                let fetcher = &self.fetcher;
                let selector = selector.as_str();
                async move {
                    let records = fetcher.fetch(&domain).await;
                    evaluate(&domain, selector, &records)
                }
            })
            .buffer_unordered(self.concurrency)
            .take_until(cancel.cancelled());
        futures::pin_mut!(results);

        let mut final_line = None;
        while let Some(record) = results.next().await {
            let line = log_line(&record);
            info!("Job {}: {}", job_id, line);
            job.record_domain(record);
            job.log.push(line.clone());

            if job.processed < total {
                self.progress.advance(job_id, job.processed, line).await;
            } else {
                final_line = Some(line);
            }
        }

        if job.processed < total {
            info!(
                "Job {} cancelled after {}/{} domains",
                job_id, job.processed, total
            );
            self.progress
                .log(job_id, format!("Cancelled after {}/{} domains", job.processed, total))
                .await;
            self.progress.finish(job_id, JobState::Cancelled, None).await;
            return Ok(RunOutcome::Cancelled {
                processed: job.processed,
                total,
            });
        }

        let report = match job.into_report() {
            Some(report) => Arc::new(report),
            None => {
                let reason = "report has unfilled rows".to_string();
                self.progress
                    .finish(job_id, JobState::Failed, Some(reason.clone()))
                    .await;
                return Err(MailCheckError::FatalJob(reason));
            }
        };

        // Report first, so a poller that sees COMPLETED can fetch it
        self.reports.insert(report.clone()).await;
        self.progress
            .update(job_id, |s| {
                s.processed = total;
                s.log_tail.extend(final_line);
                s.state = JobState::Completed;
            })
            .await;
        info!("Job {} completed: {} rows", job_id, report.rows.len());

        Ok(RunOutcome::Completed(report))
    }
}

/// Human-readable progress line for a resolved domain
pub fn log_line(record: &AuthRecord) -> String {
    let mut line = if record.has_lookup_errors() {
        format!(
            "Domain {} failed: {} (score={})",
            record.domain,
            record.lookup_errors.join("; "),
            record.score
        )
    } else {
        format!("Verified domain {}: score={}", record.domain, record.score)
    };

    if !record.notes.is_empty() {
        line.push_str(&format!(" [{}]", record.notes.join("; ")));
    }

    line
}
