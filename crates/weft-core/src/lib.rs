//! weft-core
//!
//! Futures over jobs that run somewhere else.
//!
//! ジョブの実行と状態管理は外部（`StatusStore` / `JobSubmitter`）に任せ、
//! weft は「投入したジョブの結果を待つ・つなぐ」部分だけを担う。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（JobId, Status, JobRequest, Resolution）
//! - **ports**: 外部システムとの境界（StatusStore, JobSubmitter, Clock, IdGenerator）
//! - **future**: JobFuture, chain resolver, wait_all
//! - **app**: Submitter（投入 → JobFuture）
//! - **impls**: インメモリ backend と worker（開発・テスト用）
//! - **error**: WeftError / StoreError

pub mod app;
pub mod domain;
pub mod error;
pub mod future;
pub mod impls;
pub mod ports;

pub use app::Submitter;
pub use domain::{JobId, JobRequest, JobState, Payload, Resolution, Status};
pub use error::{StoreError, WeftError};
pub use future::{JobFuture, Next, WaitOptions, wait_all};
