//! StatusStore port - ジョブ状態の正本（source of truth）
//!
//! weft はジョブを実行しない。状態は外部の StatusStore が管理し、
//! Future はポーリングのたびに `get` でスナップショットを読むだけ。

use async_trait::async_trait;

use crate::domain::{JobId, Status};
use crate::error::StoreError;

/// Read side of an external job status store.
///
/// # 設計原則
/// - Status の生成・更新は store 側だけが行う
/// - `kill` は best-effort（呼び出し側は結果を待たない）
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Current snapshot, or `None` if the store has no record of the job.
    async fn get(&self, job_id: JobId) -> Result<Option<Status>, StoreError>;

    /// Request cancellation of a job.
    async fn kill(&self, job_id: JobId) -> Result<(), StoreError>;
}
