//! Errors - weft のエラー型
//!
//! - `WeftError`: wait / then の呼び出し側に返るエラー
//! - `StoreError`: StatusStore / JobSubmitter 実装が返すエラー

use std::time::Duration;

use thiserror::Error;

use crate::domain::JobId;

/// Error returned by a status store or job submitter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum WeftError {
    /// The job (or an ancestor in its chain) reported `Failed`.
    #[error("job {job_id} failed: {message}")]
    JobFailure { job_id: JobId, message: String },

    /// The deadline passed while no unresolved future was `Working`.
    #[error("timed out after {elapsed:?} with {unresolved} unresolved future(s)")]
    Timeout { elapsed: Duration, unresolved: usize },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("continuation failed: {0}")]
    ContinuationFailed(String),

    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WeftError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WeftError::Timeout { .. })
    }

    pub fn is_job_failure(&self) -> bool {
        matches!(self, WeftError::JobFailure { .. })
    }
}
