//! In-process workers for `InMemoryJobStore`.
//!
//! - `JobHandler`: job_type ごとの処理本体
//! - `HandlerRegistry`: job_type -> handler（起動時に組み立て、実行中は不変）
//! - `WorkerGroup`: n 本の worker を spawn。watch channel で停止

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::inmem_store::InMemoryJobStore;
use crate::domain::Payload;

/// Executes one kind of job.
///
/// `Ok(payload)` completes the job with those fields, `Err(message)` fails it.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;

    async fn perform(&self, options: &Value) -> Result<Payload, String>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate handler for job_type={0}")]
    DuplicateHandler(String),
}

/// Registry of handlers (job_type -> handler).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) -> Result<(), RegistryError> {
        let job_type = handler.job_type().to_string();
        if self.handlers.contains_key(&job_type) {
            return Err(RegistryError::DuplicateHandler(job_type));
        }
        self.handlers.insert(job_type, handler);
        Ok(())
    }

    pub fn get(&self, job_type: &str) -> Option<&Arc<dyn JobHandler>> {
        self.handlers.get(job_type)
    }

    /// Job types served by this registry; jobs of other types are never leased.
    pub fn job_types(&self) -> HashSet<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Worker group handle.
/// - `request_shutdown()` で新しい lease を取らなくなる（実行中の handler は止めない）
/// - `shutdown_and_join()` で全 worker の終了を待つ
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, store: Arc<InMemoryJobStore>, registry: Arc<HandlerRegistry>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let store = Arc::clone(&store);
            let registry = Arc::clone(&registry);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, store, registry, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    pub fn request_shutdown(&self) {
        // receiver が全部 drop 済みなら送信エラーになるが無視してよい
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                warn!("worker exited abnormally: {e}");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    store: Arc<InMemoryJobStore>,
    registry: Arc<HandlerRegistry>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let served = registry.job_types();
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は待つ可能性があるので shutdown と競合させる
        let (job_id, request) = tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender が drop された場合も停止扱い
                if changed.is_err() {
                    break;
                }
                continue;
            }
            leased = store.lease(&served) => leased,
        };

        let Some(handler) = registry.get(&request.job_type) else {
            // served に含まれる型しか lease しないので通常ここには来ない
            warn!("[worker-{worker_id}] no handler for {}", request.job_type);
            continue;
        };

        debug!("[worker-{worker_id}] performing {job_id} ({})", request.job_type);
        // handler の panic で worker ごと落ちないよう別 task で実行する
        let handler = Arc::clone(handler);
        let options = request.options;
        let performed = tokio::spawn(async move { handler.perform(&options).await }).await;
        let result = match performed {
            Ok(Ok(payload)) => store.complete(job_id, payload).await,
            Ok(Err(message)) => store.fail(job_id, message).await,
            Err(e) => {
                warn!("[worker-{worker_id}] handler for {job_id} did not finish: {e}");
                store.fail(job_id, format!("handler panicked: {e}")).await
            }
        };
        if let Err(e) = result {
            warn!("[worker-{worker_id}] could not record result of {job_id}: {e}");
        }
    }
}
