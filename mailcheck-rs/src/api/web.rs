use askama_axum::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::handlers::AppState;
use crate::utils::dns::DnsResolver;
use crate::utils::split_email_list;
use crate::verification::JobState;

/// Seconds between automatic refreshes of a running job page
const REFRESH_SECS: u32 = 2;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    version: String,
    max_emails: usize,
    error: String,
}

#[derive(Template)]
#[template(path = "job.html")]
struct JobTemplate {
    job_id: String,
    state: String,
    processed: usize,
    total: usize,
    percent: u8,
    log_tail: Vec<String>,
    finished: bool,
    completed: bool,
    error: String,
    refresh_secs: u32,
}

#[derive(Deserialize)]
pub struct VerifyForm {
    emails: String,
}

// Submit form (GET)
pub async fn index_page<R: DnsResolver>(State(state): State<Arc<AppState<R>>>) -> impl IntoResponse {
    IndexTemplate {
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_emails: state.manager.max_emails(),
        error: String::new(),
    }
}

// Form submission (POST), redirects to the job page
pub async fn verify_submit<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    Form(form): Form<VerifyForm>,
) -> Response {
    let emails = split_email_list(&form.emails);

    match state.manager.submit(emails).await {
        Ok(snapshot) => Redirect::to(&format!("/jobs/{}", snapshot.job_id)).into_response(),
        Err(e) => (
            e.status_code(),
            IndexTemplate {
                version: env!("CARGO_PKG_VERSION").to_string(),
                max_emails: state.manager.max_emails(),
                error: e.to_string(),
            },
        )
            .into_response(),
    }
}

// Job progress page
pub async fn job_page<R: DnsResolver>(
    State(state): State<Arc<AppState<R>>>,
    Path(job_id): Path<String>,
) -> Response {
    let snapshot = match state.manager.status(&job_id).await {
        Ok(s) => s,
        Err(_) => return (StatusCode::NOT_FOUND, "Job not found").into_response(),
    };

    JobTemplate {
        job_id: snapshot.job_id.clone(),
        state: snapshot.state.to_string(),
        processed: snapshot.processed,
        total: snapshot.total,
        percent: snapshot.percent(),
        log_tail: snapshot.log_tail.clone(),
        finished: snapshot.state.is_finished(),
        completed: snapshot.state == JobState::Completed,
        error: snapshot.error.clone().unwrap_or_default(),
        refresh_secs: REFRESH_SECS,
    }
    .into_response()
}
