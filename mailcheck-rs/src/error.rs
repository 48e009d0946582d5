use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailCheckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("DNS lookup failed: {0}")]
    DnsLookup(String),

    #[error("Job failed: {0}")]
    FatalJob(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job not finished: {0}")]
    JobNotFinished(String),

    #[error("Job already finished: {0}")]
    JobAlreadyFinished(String),

    #[error("Too many emails: {count} (limit {limit})")]
    TooManyEmails { count: usize, limit: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MailCheckError>;
