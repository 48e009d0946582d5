//! mailcheck-rs: email domain authentication checks
//!
//! Looks up the SPF, DKIM and DMARC records of every domain in a list of
//! addresses, scores how well each domain is protected against spoofing
//! and reports the result per address.
//!
//! # Features
//!
//! - **Record fetching**: one TXT lookup per mechanism per domain, with
//!   absence and lookup failure kept distinct
//! - **Scoring**: deterministic 0-100 score (SPF 34, DKIM 33, DMARC up to 33)
//! - **Batch jobs**: per-domain deduplication, bounded concurrency,
//!   cancellation and pollable progress
//! - **List cleaning**: deduplication, format check, disposable and
//!   role-based filtering, optional MX check
//! - **HTTP API**: JSON endpoints, CSV export and a small web UI
//!
//! # Example
//!
//! ```no_run
//! use mailcheck_rs::config::Config;
//! use mailcheck_rs::utils::TrustDnsResolver;
//! use mailcheck_rs::verification::{JobState, VerificationManager};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let resolver = TrustDnsResolver::from_config(&config.dns)?;
//!     let manager = VerificationManager::new(resolver, &config.verification);
//!
//!     let job = manager.submit(vec!["alice@example.com".to_string()]).await?;
//!     let done = manager.wait(&job.job_id, Duration::from_millis(200)).await?;
//!     if done.state == JobState::Completed {
//!         let report = manager.report(&job.job_id).await?;
//!         println!("{}", report.to_csv());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod authentication;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod utils;
pub mod verification;

pub use config::Config;
pub use error::{MailCheckError, Result};
