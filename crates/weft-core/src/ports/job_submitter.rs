//! JobSubmitter port - ジョブ投入（create 相当）
//!
//! 投入とスケジューリングは executor 側の責務。weft が必要とするのは
//! 採番された JobId だけ。

use async_trait::async_trait;

use crate::domain::{JobId, JobRequest};
use crate::error::StoreError;

#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Enqueue a job and return the identifier the store assigned to it.
    async fn create(&self, request: JobRequest) -> Result<JobId, StoreError>;
}
