//! Verification manager
//!
//! Accepts batches, runs each one on its own background task and answers
//! status, report and cancel requests by job id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::progress::ProgressStore;
use super::runner::{BatchRunner, RunOutcome};
use super::types::{JobSnapshot, JobState, VerificationReport};
use crate::config::VerificationConfig;
use crate::error::{MailCheckError, Result};
use crate::utils::dns::DnsResolver;

/// Verification job manager
#[derive(Clone)]
pub struct VerificationManager<R: DnsResolver> {
    runner: BatchRunner<R>,
    /// Cancellation handles of jobs still running
    tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
    job_ttl: Duration,
    max_emails: usize,
}

impl<R: DnsResolver> VerificationManager<R> {
    pub fn new(resolver: R, config: &VerificationConfig) -> Self {
        let progress = ProgressStore::new(config.log_tail);
        Self {
            runner: BatchRunner::new(resolver, progress, config),
            tokens: Arc::new(RwLock::new(HashMap::new())),
            job_ttl: Duration::from_secs(config.job_ttl_secs),
            max_emails: config.max_emails,
        }
    }

    pub fn max_emails(&self) -> usize {
        self.max_emails
    }

    /// Start a verification job in the background
    ///
    /// Returns the PENDING snapshot. An empty batch is accepted here and
    /// fails inside the job.
    pub async fn submit(&self, emails: Vec<String>) -> Result<Arc<JobSnapshot>> {
        if emails.len() > self.max_emails {
            return Err(MailCheckError::TooManyEmails {
                count: emails.len(),
                limit: self.max_emails,
            });
        }

        let job_id = Uuid::new_v4().to_string();
        let snapshot = self.runner.progress().create(&job_id).await;
        let token = CancellationToken::new();

        {
            let mut tokens = self.tokens.write().await;
            tokens.insert(job_id.clone(), token.clone());
        }

        info!("Submitted job {} with {} emails", job_id, emails.len());

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_job(&job_id, emails, token).await;
        });

        Ok(snapshot)
    }

    async fn run_job(&self, job_id: &str, emails: Vec<String>, token: CancellationToken) {
        match self.runner.run(job_id, emails, token).await {
            Ok(RunOutcome::Completed(report)) => {
                debug!("Job {} stored report with {} rows", job_id, report.rows.len());
            }
            Ok(RunOutcome::Cancelled { processed, total }) => {
                debug!("Job {} cancelled at {}/{}", job_id, processed, total);
            }
            Err(e) => warn!("Job {} failed: {}", job_id, e),
        }

        let mut tokens = self.tokens.write().await;
        tokens.remove(job_id);
    }

    /// Latest snapshot of a job
    pub async fn status(&self, job_id: &str) -> Result<Arc<JobSnapshot>> {
        self.runner
            .progress()
            .get(job_id)
            .await
            .ok_or_else(|| MailCheckError::JobNotFound(job_id.to_string()))
    }

    pub async fn list(&self) -> Vec<Arc<JobSnapshot>> {
        self.runner.progress().list().await
    }

    /// Report of a completed job
    pub async fn report(&self, job_id: &str) -> Result<Arc<VerificationReport>> {
        let snapshot = self.status(job_id).await?;
        if snapshot.state != JobState::Completed {
            return Err(MailCheckError::JobNotFinished(format!(
                "{} is {}",
                job_id, snapshot.state
            )));
        }

        self.runner
            .reports()
            .get(job_id)
            .await
            .ok_or_else(|| MailCheckError::JobNotFound(job_id.to_string()))
    }

    /// Ask a running job to stop
    ///
    /// The job moves to CANCELLED once its runner notices, which happens
    /// before any further domain is started.
    pub async fn cancel(&self, job_id: &str) -> Result<Arc<JobSnapshot>> {
        let snapshot = self.status(job_id).await?;
        if snapshot.state.is_finished() {
            return Err(MailCheckError::JobAlreadyFinished(format!(
                "{} is {}",
                job_id, snapshot.state
            )));
        }

        let tokens = self.tokens.read().await;
        match tokens.get(job_id) {
            Some(token) => {
                info!("Cancelling job {}", job_id);
                token.cancel();
                Ok(snapshot)
            }
            None => Err(MailCheckError::JobAlreadyFinished(job_id.to_string())),
        }
    }

    /// Wait for a job to reach a terminal state
    pub async fn wait(&self, job_id: &str, poll: Duration) -> Result<Arc<JobSnapshot>> {
        loop {
            let snapshot = self.status(job_id).await?;
            if snapshot.state.is_finished() {
                return Ok(snapshot);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Forget finished jobs older than the configured TTL
    pub async fn sweep_expired(&self) -> usize {
        let expired = self.runner.progress().remove_expired(self.job_ttl).await;
        for job_id in &expired {
            self.runner.reports().remove(job_id).await;
        }
        if !expired.is_empty() {
            info!("Removed {} expired jobs", expired.len());
        }
        expired.len()
    }

    /// Run [`Self::sweep_expired`] periodically until `shutdown` fires
    pub fn spawn_sweeper(&self, every: Duration, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        manager.sweep_expired().await;
                    }
                }
            }
            debug!("Job sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dns::MockResolver;

    const POLL: Duration = Duration::from_millis(5);

    fn manager(resolver: MockResolver) -> VerificationManager<MockResolver> {
        let config = VerificationConfig {
            max_emails: 3,
            ..VerificationConfig::default()
        };
        VerificationManager::new(resolver, &config)
    }

    #[tokio::test]
    async fn test_submit_and_fetch_report() {
        let resolver = MockResolver::new();
        resolver.add_txt("x.com", vec!["v=spf1 -all".to_string()]);
        let manager = manager(resolver);

        let snapshot = manager.submit(vec!["a@x.com".to_string()]).await.unwrap();
        assert_eq!(snapshot.state, JobState::Pending);

        let done = manager.wait(&snapshot.job_id, POLL).await.unwrap();
        assert_eq!(done.state, JobState::Completed);

        let report = manager.report(&snapshot.job_id).await.unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].score.unwrap().value(), 34);
    }

    #[tokio::test]
    async fn test_limit_and_unknown_jobs() {
        let manager = manager(MockResolver::new());
        let too_many = vec!["a@x.com".to_string(); 4];
        assert!(matches!(
            manager.submit(too_many).await,
            Err(MailCheckError::TooManyEmails { count: 4, limit: 3 })
        ));

        assert!(matches!(
            manager.status("nope").await,
            Err(MailCheckError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.cancel("nope").await,
            Err(MailCheckError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_job_has_no_report() {
        let manager = manager(MockResolver::new());
        let snapshot = manager.submit(Vec::new()).await.unwrap();

        let done = manager.wait(&snapshot.job_id, POLL).await.unwrap();
        assert_eq!(done.state, JobState::Failed);
        assert!(matches!(
            manager.report(&snapshot.job_id).await,
            Err(MailCheckError::JobNotFinished(_))
        ));
        assert!(matches!(
            manager.cancel(&snapshot.job_id).await,
            Err(MailCheckError::JobAlreadyFinished(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let resolver = MockResolver::new();
        resolver.set_delay(Duration::from_millis(100));
        let manager = manager(resolver);

        let snapshot = manager
            .submit(vec!["a@one.com".to_string(), "b@two.com".to_string()])
            .await
            .unwrap();
        manager.cancel(&snapshot.job_id).await.unwrap();

        let done = manager.wait(&snapshot.job_id, POLL).await.unwrap();
        assert_eq!(done.state, JobState::Cancelled);
        assert!(manager.report(&snapshot.job_id).await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let config = VerificationConfig {
            job_ttl_secs: 0,
            ..VerificationConfig::default()
        };
        let manager = VerificationManager::new(MockResolver::new(), &config);
        let snapshot = manager.submit(vec!["bad".to_string()]).await.unwrap();
        manager.wait(&snapshot.job_id, POLL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.sweep_expired().await, 1);
        assert!(manager.list().await.is_empty());
    }
}
