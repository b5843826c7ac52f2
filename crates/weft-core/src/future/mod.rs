//! Future - ジョブ結果の future/promise エンジン
//!
//! - **node**: `JobFuture`（then / status / wait）と chain resolver
//! - **wait**: 複数 future をまとめて待つ `wait_all`

pub mod node;
pub mod wait;

pub use self::node::{BoxFuture, JobFuture, Next, Tick};
pub use self::wait::{DEFAULT_INTERVAL, WaitOptions, wait_all};
