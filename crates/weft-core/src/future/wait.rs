//! Multi-wait coordinator
//!
//! 複数の future を 1 本のポーリングループでまとめて待つ。
//!
//! # フロー（1 tick）
//! 1. 未解決の future それぞれに `check()`。最初のエラーで全体を中断
//! 2. 1 つでも `Working` の future があれば「進捗あり」
//! 3. 全部解決したら入力順で返す
//! 4. 期限切れ かつ 進捗なし → 未解決ジョブに kill を投げて Timeout
//! 5. それ以外は `interval` だけ sleep して次の tick

use std::time::Duration;

use log::{debug, warn};
use tokio::time::{Instant, sleep};

use super::node::{JobFuture, Tick};
use crate::domain::Resolution;
use crate::error::WeftError;

/// Default poll cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Poll cadence and deadline of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub interval: Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// A zero timeout means "no deadline".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for every future and returns their resolutions in input order.
///
/// Fails with the first `JobFailure` (or other error) any member reports.
/// Fails with `Timeout` only when the deadline has passed and no unresolved
/// member was `Working` on the last tick; a job that is actually running keeps
/// the wait alive past the deadline.
pub async fn wait_all(
    futures: &[JobFuture],
    options: &WaitOptions,
) -> Result<Vec<Resolution>, WeftError> {
    let started = Instant::now();
    let mut results: Vec<Option<Resolution>> = vec![None; futures.len()];
    let mut ticks: u64 = 0;

    loop {
        ticks += 1;
        let mut progressing = false;

        for (slot, future) in results.iter_mut().zip(futures) {
            if slot.is_some() {
                continue;
            }
            match future.check().await? {
                Tick::Done(resolution) => *slot = Some(resolution),
                Tick::Waiting { working } => progressing |= working,
            }
        }

        let unresolved = results.iter().filter(|r| r.is_none()).count();
        if unresolved == 0 {
            debug!("wait_all: {} future(s) resolved after {ticks} tick(s)", futures.len());
            return Ok(results.into_iter().flatten().collect());
        }

        let elapsed = started.elapsed();
        if let Some(timeout) = options.timeout
            && elapsed > timeout
            && !progressing
        {
            warn!("wait_all: no progress after {elapsed:?}, cancelling {unresolved} job(s)");
            for (slot, future) in results.iter().zip(futures) {
                if slot.is_none() {
                    future.kill_active().await;
                }
            }
            return Err(WeftError::Timeout {
                elapsed,
                unresolved,
            });
        }

        debug!("wait_all: tick {ticks}, {unresolved} unresolved, progressing={progressing}");
        sleep(options.interval).await;
    }
}
