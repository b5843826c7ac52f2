//! Ports - 外部システムへの抽象化レイヤー
//!
//! ジョブの実行・状態の永続化は weft の外側にある。
//! ここではその境界だけを trait として定義する。

pub mod clock;
pub mod id_generator;
pub mod job_submitter;
pub mod status_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_submitter::JobSubmitter;
pub use self::status_store::StatusStore;
