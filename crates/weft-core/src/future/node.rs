//! JobFuture - ジョブ結果へのハンドルと chain resolver
//!
//! # ノードの形
//! - `Direct`: JobId を直接ポーリングする
//! - `Pending`: 親 future の完了待ち（continuation を 1 つ保持）
//! - `Follow`: continuation が返した（まだ未解決の）future に追従する
//! - `Done`: 解決済み。以後 store を読まない
//! - `Broken`: continuation 自体がエラーを返した
//!
//! 遷移は一方向: `Pending -> {Direct | Follow | Done | Broken}`,
//! `Direct -> Done`, `Follow -> Done`。
//!
//! # Exactly-once
//! resolver pass 中はノードの Mutex を保持し続ける（continuation の実行中も）。
//! 同じ future を複数の待ち手が共有しても continuation は 1 回しか走らない。
//! 実行中に pass が drop された continuation は再実行せず、ノードは Broken になる。
//!
//! # 循環
//! 親は生成時に決まり、ロックの外（`Node::parent`）に置く。continuation が
//! 自分自身やその子孫を返した場合、ロックを取り直す前に親と Follow をたどって
//! 検出し `ProtocolViolation` にする。

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use tokio::sync::Mutex;

use super::wait::{WaitOptions, wait_all};
use crate::domain::{JobId, JobState, Resolution, Status};
use crate::error::WeftError;
use crate::ports::StatusStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Continuation =
    Box<dyn FnOnce(Resolution) -> BoxFuture<'static, Result<Next, WeftError>> + Send>;

const INTERRUPTED: &str = "continuation was interrupted before it finished";

/// What a continuation produced.
pub enum Next {
    /// A plain value; the future resolves to it.
    Value(Value),
    /// Another future; the chain continues against it.
    Chain(JobFuture),
}

impl Next {
    /// The "no result" value.
    pub fn none() -> Self {
        Next::Value(Value::Null)
    }

    pub fn value(v: impl Into<Value>) -> Self {
        Next::Value(v.into())
    }
}

impl From<JobFuture> for Next {
    fn from(future: JobFuture) -> Self {
        Next::Chain(future)
    }
}

impl From<Value> for Next {
    fn from(v: Value) -> Self {
        Next::Value(v)
    }
}

/// Result of one resolver pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Done(Resolution),
    /// Not finished. `working` is true only if the job being waited on is
    /// `Working`; a queued job is not progress.
    Waiting { working: bool },
}

enum Link {
    Direct(JobId),
    Pending {
        continuation: Option<Continuation>,
    },
    Follow(JobFuture),
    Done {
        job_id: Option<JobId>,
        resolution: Resolution,
    },
    Broken(String),
}

impl Link {
    fn name(&self) -> &'static str {
        match self {
            Link::Direct(_) => "direct",
            Link::Pending { .. } => "pending",
            Link::Follow(_) => "follow",
            Link::Done { .. } => "done",
            Link::Broken(_) => "broken",
        }
    }
}

struct Node {
    link: Mutex<Link>,
    store: Arc<dyn StatusStore>,
    /// `then` で作られたノードの親。生成後は変わらない
    parent: Option<JobFuture>,
}

/// Handle on the eventual result of a job or of a chained continuation.
///
/// Cloning is cheap and clones share the same node.
#[derive(Clone)]
pub struct JobFuture {
    node: Arc<Node>,
}

impl JobFuture {
    /// Wraps an existing job id.
    pub fn direct(job_id: JobId, store: Arc<dyn StatusStore>) -> Self {
        Self::from_link(Link::Direct(job_id), store, None)
    }

    fn from_link(link: Link, store: Arc<dyn StatusStore>, parent: Option<JobFuture>) -> Self {
        Self {
            node: Arc::new(Node {
                link: Mutex::new(link),
                store,
                parent,
            }),
        }
    }

    /// Chains a continuation that runs once this future has resolved.
    ///
    /// Nothing is executed here; the continuation runs during a later `wait`.
    ///
    /// # Example
    /// ```ignore
    /// let f = submitter
    ///     .future("example", json!({ "arg1": "hello" }))
    ///     .await?
    ///     .then(|res| async move {
    ///         let example = res.get("example").and_then(Value::as_str).unwrap_or_default();
    ///         Ok(Next::value(format!("FOUND: {example}")))
    ///     });
    /// ```
    pub fn then<F, Fut>(&self, continuation: F) -> JobFuture
    where
        F: FnOnce(Resolution) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Next, WeftError>> + Send + 'static,
    {
        let continuation: Continuation = Box::new(
            move |res: Resolution| -> BoxFuture<'static, Result<Next, WeftError>> {
                Box::pin(continuation(res))
            },
        );
        Self::from_link(
            Link::Pending {
                continuation: Some(continuation),
            },
            Arc::clone(&self.node.store),
            Some(self.clone()),
        )
    }

    /// Blocks (asynchronously) until this future resolves.
    pub async fn wait(&self, options: &WaitOptions) -> Result<Resolution, WeftError> {
        let mut results = wait_all(std::slice::from_ref(self), options).await?;
        results
            .pop()
            .ok_or_else(|| WeftError::ProtocolViolation("wait_all returned no result".into()))
    }

    /// Current store snapshot of the job behind this future.
    ///
    /// Returns `Ok(None)` while the chain has not reached a concrete job yet.
    pub fn status(&self) -> BoxFuture<'_, Result<Option<Status>, WeftError>> {
        Box::pin(async move {
            let source = {
                let link = self.node.link.lock().await;
                match &*link {
                    Link::Direct(job_id)
                    | Link::Done {
                        job_id: Some(job_id),
                        ..
                    } => Ok(*job_id),
                    Link::Follow(source) => Err(source.clone()),
                    _ => return Ok(None),
                }
            };
            match source {
                Ok(job_id) => Ok(self.node.store.get(job_id).await?),
                Err(followed) => followed.status().await,
            }
        })
    }

    /// The concrete job id this node currently stands for, if any.
    pub async fn job_id(&self) -> Option<JobId> {
        match &*self.node.link.lock().await {
            Link::Direct(job_id) => Some(*job_id),
            Link::Done { job_id, .. } => *job_id,
            _ => None,
        }
    }

    /// Job the chain is currently blocked on.
    ///
    /// Returns `None` once resolved, and also while another waiter holds the
    /// node for a resolver pass.
    pub fn active_job_id(&self) -> Option<JobId> {
        self.active_job().map(|(job_id, _)| job_id)
    }

    fn active_job(&self) -> Option<(JobId, Arc<dyn StatusStore>)> {
        let link = self.node.link.try_lock().ok()?;
        match &*link {
            Link::Direct(job_id) => Some((*job_id, Arc::clone(&self.node.store))),
            Link::Pending { .. } => self.node.parent.as_ref()?.active_job(),
            Link::Follow(source) => source.active_job(),
            Link::Done { .. } | Link::Broken(_) => None,
        }
    }

    /// Best-effort cancellation of the job this chain is blocked on.
    pub(crate) async fn kill_active(&self) {
        let Some((job_id, store)) = self.active_job() else {
            return;
        };
        match store.kill(job_id).await {
            Ok(()) => debug!("kill requested for {job_id}"),
            Err(e) => log::warn!("kill request for {job_id} failed: {e}"),
        }
    }

    fn same_store(&self, other: &JobFuture) -> bool {
        std::ptr::addr_eq(
            Arc::as_ptr(&self.node.store),
            Arc::as_ptr(&other.node.store),
        )
    }

    /// Whether resolving this future would wait on `target`.
    ///
    /// A node locked by a running pass is walked through its parent: only a
    /// node that is still pending can have an unresolved ancestor.
    fn leads_to(&self, target: &Arc<Node>) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(future) = cursor {
            if Arc::ptr_eq(&future.node, target) {
                return true;
            }
            cursor = match future.node.link.try_lock() {
                Ok(link) => match &*link {
                    Link::Pending { .. } => future.node.parent.clone(),
                    Link::Follow(source) => Some(source.clone()),
                    Link::Direct(_) | Link::Done { .. } | Link::Broken(_) => None,
                },
                Err(_) => future.node.parent.clone(),
            };
        }
        false
    }

    /// Shape this node takes after a continuation returned `next`.
    fn adopt(&self, next: &JobFuture) -> Link {
        let Ok(link) = next.node.link.try_lock() else {
            return Link::Follow(next.clone());
        };
        match &*link {
            Link::Direct(job_id) if self.same_store(next) => Link::Direct(*job_id),
            Link::Done { job_id, resolution } => Link::Done {
                job_id: (*job_id).filter(|_| self.same_store(next)),
                resolution: resolution.clone(),
            },
            _ => Link::Follow(next.clone()),
        }
    }

    /// One resolver pass: walks the parent chain and collapses at most the
    /// links whose ancestors have completed.
    pub fn check(&self) -> BoxFuture<'_, Result<Tick, WeftError>> {
        Box::pin(async move {
            let mut link = self.node.link.lock().await;
            loop {
                match &mut *link {
                    Link::Done { resolution, .. } => return Ok(Tick::Done(resolution.clone())),
                    Link::Broken(message) => {
                        return Err(WeftError::ContinuationFailed(message.clone()));
                    }
                    Link::Direct(job_id) => {
                        let job_id = *job_id;
                        let status = self
                            .node
                            .store
                            .get(job_id)
                            .await?
                            .ok_or(WeftError::UnknownJob(job_id))?;
                        return match status.state {
                            JobState::Completed => {
                                let resolution = Resolution::Status(status);
                                *link = Link::Done {
                                    job_id: Some(job_id),
                                    resolution: resolution.clone(),
                                };
                                Ok(Tick::Done(resolution))
                            }
                            JobState::Failed => Err(WeftError::JobFailure {
                                job_id,
                                message: status.message.unwrap_or_else(|| "failed".into()),
                            }),
                            JobState::Working => Ok(Tick::Waiting { working: true }),
                            JobState::Queued => Ok(Tick::Waiting { working: false }),
                        };
                    }
                    Link::Follow(source) => {
                        let source = source.clone();
                        let resolution = match source.check().await? {
                            Tick::Done(resolution) => resolution,
                            waiting => return Ok(waiting),
                        };
                        let job_id = if self.same_store(&source) {
                            source.job_id().await
                        } else {
                            None
                        };
                        *link = Link::Done {
                            job_id,
                            resolution: resolution.clone(),
                        };
                        return Ok(Tick::Done(resolution));
                    }
                    Link::Pending { continuation } => {
                        let Some(parent) = self.node.parent.clone() else {
                            return Err(WeftError::ProtocolViolation(
                                "pending future without a parent".into(),
                            ));
                        };
                        let resolved = match parent.check().await? {
                            Tick::Done(resolution) => resolution,
                            waiting => return Ok(waiting),
                        };
                        let Some(continuation) = continuation.take() else {
                            return Err(WeftError::ProtocolViolation(
                                "continuation already consumed".into(),
                            ));
                        };
                        // 実行中に drop された場合は Broken のまま残る
                        *link = Link::Broken(INTERRUPTED.into());

                        debug!("parent resolved, running continuation");
                        match continuation(resolved).await {
                            Ok(Next::Value(value)) => {
                                *link = Link::Done {
                                    job_id: None,
                                    resolution: Resolution::Value(value),
                                };
                            }
                            Ok(Next::Chain(next)) => {
                                if next.leads_to(&self.node) {
                                    let message = "future chained onto itself or a descendant";
                                    *link = Link::Broken(message.into());
                                    return Err(WeftError::ProtocolViolation(message.into()));
                                }
                                *link = self.adopt(&next);
                                debug!("chain collapsed onto a {} future", link.name());
                            }
                            Err(e) => {
                                *link = Link::Broken(match &e {
                                    WeftError::ContinuationFailed(message) => message.clone(),
                                    other => other.to_string(),
                                });
                                return Err(e);
                            }
                        }
                    }
                }
            }
        })
    }
}

impl fmt::Debug for JobFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.node.link.try_lock() {
            Ok(link) => link.name(),
            Err(_) => "busy",
        };
        f.debug_struct("JobFuture").field("link", &shape).finish()
    }
}
