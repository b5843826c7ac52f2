//! JobRequest - JobSubmitter に渡す作業単位

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit of work handed to a job submitter.
///
/// `job_type` selects the handler, `options` is passed to it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_type: String,
    #[serde(default)]
    pub options: Value,
}

impl JobRequest {
    pub fn new(job_type: impl Into<String>, options: Value) -> Self {
        Self {
            job_type: job_type.into(),
            options,
        }
    }
}
