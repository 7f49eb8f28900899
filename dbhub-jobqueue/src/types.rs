//! Row shapes crossing the job-queue boundary (§4.4, §6).

use chrono::{DateTime, Utc};
use dbhub_types::{JobDetails, JobId, ResponseDetails};

/// The "any" sentinel target node (§4.3/§4.4) — used only for `createdb`.
pub const ANY_NODE: &str = "any";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    New,
    InProgress,
    Complete,
}

impl JobState {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JobState::New => "new",
            JobState::InProgress => "in_progress",
            JobState::Complete => "complete",
        }
    }

    pub fn from_sql(s: &str) -> Self {
        match s {
            "in_progress" => JobState::InProgress,
            "complete" => JobState::Complete,
            _ => JobState::New,
        }
    }
}

/// A process-unique random token chosen at startup, used to route
/// responses back to this process after a restart (§4.4, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterInstance(pub String);

impl SubmitterInstance {
    pub fn generate() -> Self {
        use rand::Rng;
        let token: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self(token)
    }
}

impl std::fmt::Display for SubmitterInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job claimed off the queue, ready to be dispatched (§4.3).
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job_id: JobId,
    pub submitter_node: String,
    pub details: JobDetails,
    pub submission_date: DateTime<Utc>,
}

/// An unprocessed response row delivered to this process's checker loop
/// (§4.5).
#[derive(Debug, Clone)]
pub struct ResponseRow {
    pub response_id: i64,
    pub job_id: JobId,
    pub details: ResponseDetails,
    pub response_date: DateTime<Utc>,
}
