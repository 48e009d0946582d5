//! Integration tests for batch verification

use mailcheck_rs::authentication::scorer::score_texts;
use mailcheck_rs::config::VerificationConfig;
use mailcheck_rs::utils::{DnsError, MockResolver};
use mailcheck_rs::verification::{
    BatchRunner, JobState, ProgressStore, RunOutcome, Verdict, VerificationManager,
    VerificationReport,
};
use mailcheck_rs::MailCheckError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(5);

fn emails(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// x.com publishes everything, y.com nothing
fn scenario_resolver() -> MockResolver {
    let resolver = MockResolver::new();
    resolver.add_txt("x.com", emails(&["v=spf1 include:_spf.x.com -all"]));
    resolver.add_txt(
        "default._domainkey.x.com",
        emails(&["v=DKIM1; k=rsa; p=MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQ"]),
    );
    resolver.add_txt("_dmarc.x.com", emails(&["v=DMARC1; p=reject"]));
    resolver
}

async fn run(resolver: MockResolver, input: Vec<String>, concurrency: usize) -> Arc<VerificationReport> {
    let config = VerificationConfig {
        concurrency,
        ..VerificationConfig::default()
    };
    let progress = ProgressStore::new(50);
    progress.create("job").await;
    let runner = BatchRunner::new(resolver, progress, &config);

    match runner.run("job", input, CancellationToken::new()).await.unwrap() {
        RunOutcome::Completed(report) => report,
        other => panic!("job did not complete: {:?}", other),
    }
}

#[tokio::test]
async fn test_two_domain_scenario() {
    let resolver = scenario_resolver();
    let manager = VerificationManager::new(resolver.clone(), &VerificationConfig::default());

    let job = manager
        .submit(emails(&["a@x.com", "b@x.com", "c@y.com"]))
        .await
        .unwrap();
    let done = manager.wait(&job.job_id, POLL).await.unwrap();

    assert_eq!(done.state, JobState::Completed);
    assert_eq!((done.processed, done.total), (2, 2));

    let report = manager.report(&job.job_id).await.unwrap();
    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.rows[0].score.unwrap().value(), 100);
    assert_eq!(report.rows[1].score.unwrap().value(), 100);
    assert_eq!(report.rows[2].score.unwrap().value(), 0);
    assert_eq!(report.rows[0].verdict, Verdict::Pass);
    assert_eq!(report.rows[2].verdict, Verdict::Fail);

    // Two unique domains, three lookups each
    assert_eq!(resolver.query_count(), 6);
}

#[tokio::test]
async fn test_lookups_scale_with_unique_domains() {
    let resolver = MockResolver::new();
    let input: Vec<String> = (0..30)
        .map(|i| format!("user{}@domain{}.com", i, i % 4))
        .collect();

    let report = run(resolver.clone(), input, 3).await;

    assert_eq!(report.rows.len(), 30);
    assert_eq!(report.domains.len(), 4);
    assert_eq!(resolver.query_count(), 4 * 3);
}

#[tokio::test]
async fn test_rows_sharing_a_domain_are_identical() {
    let report = run(
        scenario_resolver(),
        emails(&["a@x.com", "c@y.com", "b@X.com", "d@y.com"]),
        2,
    )
    .await;

    let strip = |i: usize| {
        let mut row = report.rows[i].clone();
        row.email.clear();
        serde_json::to_string(&row).unwrap()
    };
    assert_eq!(strip(0), strip(2));
    assert_eq!(strip(1), strip(3));
    assert_ne!(strip(0), strip(1));
}

#[tokio::test]
async fn test_report_preserves_input_order() {
    let resolver = scenario_resolver();
    resolver.set_delay(Duration::from_millis(2));
    let input: Vec<String> = (0..20)
        .map(|i| format!("u{}@d{}.example", i, 19 - i))
        .collect();

    let report = run(resolver, input.clone(), 5).await;

    let emails: Vec<String> = report.rows.iter().map(|r| r.email.clone()).collect();
    assert_eq!(emails, input);
}

#[tokio::test]
async fn test_lookup_failure_does_not_affect_other_domains() {
    let input = emails(&["a@x.com", "b@broken.com"]);
    let baseline = run(scenario_resolver(), input.clone(), 2).await;

    let resolver = scenario_resolver();
    resolver.set_failure("broken.com", DnsError::Timeout);
    resolver.set_failure("_dmarc.broken.com", DnsError::Other("SERVFAIL".into()));
    let with_failure = run(resolver, input, 2).await;

    assert_eq!(baseline.rows[0], with_failure.rows[0]);
    assert_eq!(with_failure.rows[0].score.unwrap().value(), 100);
    assert_eq!(with_failure.rows[1].score.unwrap().value(), 0);
    assert!(with_failure.domains[1].has_lookup_errors());
}

#[tokio::test]
async fn test_score_matches_raw_records() {
    let report = run(scenario_resolver(), emails(&["a@x.com"]), 1).await;
    let record = &report.domains[0];

    let rescored = score_texts(
        record.spf.as_deref(),
        record.dkim.as_deref(),
        record.dmarc.as_deref(),
    );
    assert_eq!(rescored, record.score);
    assert_eq!(
        rescored,
        score_texts(
            record.spf.as_deref(),
            record.dkim.as_deref(),
            record.dmarc.as_deref()
        )
    );
}

#[tokio::test]
async fn test_malformed_email_row_is_invalid() {
    let manager = VerificationManager::new(MockResolver::new(), &VerificationConfig::default());
    let job = manager.submit(emails(&["bad-email"])).await.unwrap();
    let done = manager.wait(&job.job_id, POLL).await.unwrap();

    assert_eq!(done.state, JobState::Completed);
    let report = manager.report(&job.job_id).await.unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].verdict, Verdict::Invalid);
    assert!(report.rows[0].score.is_none());
}

#[tokio::test]
async fn test_empty_input_fails_job() {
    let manager = VerificationManager::new(MockResolver::new(), &VerificationConfig::default());
    let job = manager.submit(Vec::new()).await.unwrap();
    let done = manager.wait(&job.job_id, POLL).await.unwrap();

    assert_eq!(done.state, JobState::Failed);
    assert!(done.error.is_some());
    assert!(matches!(
        manager.report(&job.job_id).await,
        Err(MailCheckError::JobNotFinished(_))
    ));
}

#[tokio::test]
async fn test_processed_is_monotonic_until_completion() {
    let resolver = scenario_resolver();
    resolver.set_delay(Duration::from_millis(10));
    let config = VerificationConfig {
        concurrency: 1,
        ..VerificationConfig::default()
    };
    let manager = VerificationManager::new(resolver, &config);
    let input: Vec<String> = (0..6).map(|i| format!("a@site{}.org", i)).collect();
    let job = manager.submit(input).await.unwrap();

    let mut last = 0;
    loop {
        let snapshot = manager.status(&job.job_id).await.unwrap();
        assert!(snapshot.processed >= last);
        assert!(snapshot.processed <= snapshot.total || snapshot.state == JobState::Pending);
        if snapshot.total > 0 && snapshot.processed == snapshot.total {
            assert_eq!(snapshot.state, JobState::Completed);
        }
        last = snapshot.processed;
        if snapshot.state.is_finished() {
            assert_eq!(snapshot.state, JobState::Completed);
            assert_eq!(snapshot.processed, 6);
            break;
        }
        tokio::time::sleep(Duration::from_millis(3)).await;
    }
}

#[tokio::test]
async fn test_concurrent_jobs_are_independent() {
    let manager = VerificationManager::new(scenario_resolver(), &VerificationConfig::default());

    let first = manager.submit(emails(&["a@x.com"])).await.unwrap();
    let second = manager.submit(emails(&["c@y.com", "d@z.com"])).await.unwrap();

    let first_done = manager.wait(&first.job_id, POLL).await.unwrap();
    let second_done = manager.wait(&second.job_id, POLL).await.unwrap();

    assert_eq!(first_done.total, 1);
    assert_eq!(second_done.total, 2);
    assert_eq!(manager.list().await.len(), 2);
    assert_eq!(
        manager.report(&first.job_id).await.unwrap().rows[0].score.unwrap().value(),
        100
    );
}
