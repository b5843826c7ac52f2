//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryJobStore**: StatusStore + JobSubmitter のインメモリ実装
//! - **WorkerGroup / HandlerRegistry**: InMemoryJobStore のジョブを実行する worker

pub mod inmem_store;
pub mod worker;

pub use self::inmem_store::{InMemoryJobStore, KILLED_MESSAGE, StoreCounts};
pub use self::worker::{HandlerRegistry, JobHandler, RegistryError, WorkerGroup};
