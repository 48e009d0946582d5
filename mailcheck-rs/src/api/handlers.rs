//! API request handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::authentication::AuthRecord;
use crate::cleaner::{domain_breakdown, log_summary, CleaningStats, DomainCount, EmailListCleaner};
use crate::error::MailCheckError;
use crate::utils::dns::DnsResolver;
use crate::utils::split_email_list;
use crate::verification::{JobSnapshot, JobState, ReportRow, VerificationManager};

/// Domains listed in a cleaning response
const TOP_DOMAINS: usize = 10;

/// Shared application state
pub struct AppState<R: DnsResolver> {
    pub manager: VerificationManager<R>,
    pub cleaner: EmailListCleaner,
    /// Used for cleaner MX checks
    pub resolver: R,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

impl MailCheckError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MailCheckError::JobNotFound(_) => StatusCode::NOT_FOUND,
            MailCheckError::JobNotFinished(_) | MailCheckError::JobAlreadyFinished(_) => {
                StatusCode::CONFLICT
            }
            MailCheckError::TooManyEmails { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            MailCheckError::InvalidEmail(_) | MailCheckError::Parse(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MailCheckError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(ApiError::new(&self.to_string()))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Verification request body
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub emails: Vec<String>,
}

/// Accepted job
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub state: JobState,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// "json" (default) or "csv"
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportBody<'a> {
    job_id: &'a str,
    rows: &'a [ReportRow],
    domains: &'a [AuthRecord],
}

/// Cleaning request body
#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub emails: Vec<String>,
    #[serde(default)]
    pub check_mx: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanResponse {
    pub emails: Vec<String>,
    pub stats: CleaningStats,
    pub top_domains: Vec<DomainCount>,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/verify - Start a verification job
pub async fn submit_verify<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), MailCheckError> {
    submit(&state, req.emails).await
}

/// POST /api/verify/upload - Start a job from an uploaded list
///
/// Expects a multipart `file` field holding one address per line (commas
/// and semicolons also separate entries).
pub async fn upload_verify<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), MailCheckError> {
    let mut text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MailCheckError::Parse(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| MailCheckError::Parse(format!("failed to read upload: {}", e)))?;
            text = Some(String::from_utf8_lossy(&bytes).into_owned());
        }
    }

    let text = text.ok_or_else(|| MailCheckError::Parse("missing file field".to_string()))?;
    submit(&state, split_email_list(&text)).await
}

pub(crate) async fn submit<R: DnsResolver>(
    state: &AppState<R>,
    emails: Vec<String>,
) -> Result<(StatusCode, Json<SubmitResponse>), MailCheckError> {
    let snapshot = state.manager.submit(emails).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: snapshot.job_id.clone(),
            state: snapshot.state,
        }),
    ))
}

/// GET /api/jobs - All known jobs
pub async fn list_jobs<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<Vec<JobSnapshot>> {
    let jobs = state.manager.list().await;
    Json(jobs.iter().map(|s| JobSnapshot::clone(s)).collect())
}

/// GET /api/jobs/:id/status
pub async fn job_status<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, MailCheckError> {
    let snapshot = state.manager.status(&job_id).await?;
    Ok(Json(JobSnapshot::clone(&snapshot)))
}

/// GET /api/jobs/:id/report[?format=csv]
pub async fn job_report<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    Path(job_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, MailCheckError> {
    let report = state.manager.report(&job_id).await?;

    match query.format.as_deref() {
        Some("csv") => {
            let headers = [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"verification_{}.csv\"", job_id),
                ),
            ];
            Ok((headers, report.to_csv()).into_response())
        }
        Some("json") | None => Ok(Json(ReportBody {
            job_id: &report.job_id,
            rows: &report.rows,
            domains: &report.domains,
        })
        .into_response()),
        Some(other) => Err(MailCheckError::Parse(format!("unknown report format: {}", other))),
    }
}

/// DELETE /api/jobs/:id - Cancel a running job
pub async fn cancel_job<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, MailCheckError> {
    let snapshot = state.manager.cancel(&job_id).await?;
    Ok(Json(JobSnapshot::clone(&snapshot)))
}

/// POST /api/clean - Clean an address list
pub async fn clean<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CleanRequest>,
) -> Result<Json<CleanResponse>, MailCheckError> {
    let limit = state.manager.max_emails();
    if req.emails.len() > limit {
        warn!("Rejected cleaning request with {} emails", req.emails.len());
        return Err(MailCheckError::TooManyEmails {
            count: req.emails.len(),
            limit,
        });
    }

    let result = if req.check_mx {
        state.cleaner.clean_with_mx(&req.emails, &state.resolver).await
    } else {
        state.cleaner.clean(&req.emails)
    };
    log_summary(&result.stats);

    let top_domains = domain_breakdown(&result.emails, TOP_DOMAINS);
    Ok(Json(CleanResponse {
        emails: result.emails,
        stats: result.stats,
        top_domains,
    }))
}
