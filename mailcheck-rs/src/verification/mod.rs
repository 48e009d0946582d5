//! Batch verification
//!
//! Jobs take an ordered list of addresses, resolve each unique domain once
//! and produce a per-address report. Progress is published as immutable
//! snapshots that pollers read without blocking the job.

pub mod manager;
pub mod progress;
pub mod runner;
pub mod types;

pub use manager::VerificationManager;
pub use progress::{ProgressStore, ReportStore};
pub use runner::{BatchRunner, RunOutcome};
pub use types::{JobSnapshot, JobState, ReportRow, Verdict, VerificationJob, VerificationReport};
