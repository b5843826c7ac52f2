//! App - アプリケーション層
//!
//! ports を組み合わせて呼び出し側の API を提供する。
//!
//! # 主要コンポーネント
//! - **Submitter**: ジョブ投入 + JobFuture 生成

pub mod submit;

pub use self::submit::Submitter;
