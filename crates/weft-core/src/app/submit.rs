//! Submitter - ジョブ投入と JobFuture 生成をつなぐアダプタ
//!
//! `JobSubmitter::create` で採番された JobId を `JobFuture` で包んで返す。
//! future は同じ backend の `StatusStore` をポーリングする。

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{JobId, JobRequest};
use crate::error::WeftError;
use crate::future::JobFuture;
use crate::ports::{JobSubmitter, StatusStore};

/// # 使用例
/// ```ignore
/// let submitter = Submitter::from_backend(Arc::new(InMemoryJobStore::new()));
/// let status = submitter
///     .future("example", json!({ "arg1": "hello" }))
///     .await?
///     .wait(&WaitOptions::default().with_timeout(Duration::from_secs(60)))
///     .await?;
/// ```
#[derive(Clone)]
pub struct Submitter {
    submitter: Arc<dyn JobSubmitter>,
    store: Arc<dyn StatusStore>,
}

impl Submitter {
    pub fn new(submitter: Arc<dyn JobSubmitter>, store: Arc<dyn StatusStore>) -> Self {
        Self { submitter, store }
    }

    /// Uses one backend for both job creation and status reads.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: JobSubmitter + StatusStore + 'static,
    {
        let submitter: Arc<dyn JobSubmitter> = backend.clone();
        Self::new(submitter, backend)
    }

    /// Submits a job and returns a future for its result.
    pub async fn future(
        &self,
        job_type: impl Into<String>,
        options: Value,
    ) -> Result<JobFuture, WeftError> {
        let job_id = self
            .submitter
            .create(JobRequest::new(job_type, options))
            .await?;
        Ok(self.wrap(job_id))
    }

    /// Wraps a job that was submitted some other way.
    pub fn wrap(&self, job_id: JobId) -> JobFuture {
        JobFuture::direct(job_id, Arc::clone(&self.store))
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobState, Payload, Resolution};
    use crate::error::StoreError;
    use crate::future::{Next, WaitOptions, wait_all};
    use crate::impls::{HandlerRegistry, InMemoryJobStore, JobHandler, WorkerGroup};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::time::Duration;

    /// Doubles `arg1`, optionally after a delay.
    struct Example {
        job_type: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl JobHandler for Example {
        fn job_type(&self) -> &'static str {
            self.job_type
        }

        async fn perform(&self, options: &Value) -> Result<Payload, String> {
            let arg1 = options["arg1"].as_str().ok_or("arg1 missing")?;
            tokio::time::sleep(self.delay).await;
            let mut payload = Payload::new();
            payload.insert("example".into(), json!(format!("{arg1}{arg1}")));
            payload.insert("finish_time".into(), json!(Utc::now().to_rfc3339()));
            Ok(payload)
        }
    }

    struct BrokenExample;

    #[async_trait]
    impl JobHandler for BrokenExample {
        fn job_type(&self) -> &'static str {
            "broken_example"
        }

        async fn perform(&self, _options: &Value) -> Result<Payload, String> {
            Err("I'm blowing up".into())
        }
    }

    struct Harness {
        store: Arc<InMemoryJobStore>,
        submitter: Submitter,
        workers: WorkerGroup,
    }

    impl Harness {
        fn start() -> Self {
            let store = Arc::new(InMemoryJobStore::new());
            let mut reg = HandlerRegistry::new();
            reg.register(Arc::new(Example {
                job_type: "example",
                delay: Duration::ZERO,
            }))
            .unwrap();
            reg.register(Arc::new(Example {
                job_type: "slow_example",
                delay: Duration::from_millis(300),
            }))
            .unwrap();
            reg.register(Arc::new(BrokenExample)).unwrap();

            let workers = WorkerGroup::spawn(3, Arc::clone(&store), Arc::new(reg));
            let submitter = Submitter::from_backend(Arc::clone(&store));
            Self {
                store,
                submitter,
                workers,
            }
        }
    }

    fn opts() -> WaitOptions {
        WaitOptions::new()
            .with_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(5))
    }

    fn finish_time(res: &Resolution) -> DateTime<Utc> {
        let raw = res.get("finish_time").and_then(Value::as_str).unwrap();
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn future_starts_the_job() {
        let store = Arc::new(InMemoryJobStore::new());
        let submitter = Submitter::from_backend(Arc::clone(&store));
        let f = submitter
            .future("example", json!({ "arg1": "hello" }))
            .await
            .unwrap();

        let job_id = f.job_id().await.unwrap();
        let st = f.status().await.unwrap().unwrap();
        assert_eq!(st.job_id, job_id);
        assert_eq!(st.state, JobState::Queued);
        assert_eq!(store.counts().await.queued, 1);
    }

    #[tokio::test]
    async fn wait_returns_the_completed_status() {
        let h = Harness::start();
        let res = h
            .submitter
            .future("example", json!({ "arg1": "hello" }))
            .await
            .unwrap()
            .wait(&opts())
            .await
            .unwrap();

        let st = res.as_status().unwrap();
        assert!(st.is_completed());
        assert_eq!(st.get("example"), Some(&json!("hellohello")));
        h.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn then_receives_the_parent_result() {
        let h = Harness::start();
        let f = h
            .submitter
            .future("example", json!({ "arg1": "hello" }))
            .await
            .unwrap()
            .then(|st| async move {
                let example = st.get("example").and_then(Value::as_str).unwrap_or_default();
                Ok(Next::value(format!("FOUND: {example}")))
            });

        assert_eq!(
            f.wait(&opts()).await.unwrap(),
            Resolution::Value(json!("FOUND: hellohello"))
        );
        h.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn then_can_chain_another_job() {
        let h = Harness::start();
        let submitter = h.submitter.clone();
        let f = h
            .submitter
            .future("example", json!({ "arg1": "hello" }))
            .await
            .unwrap()
            .then(move |st| async move {
                let example = st.get("example").and_then(Value::as_str).unwrap_or_default();
                let next = submitter
                    .future("example", json!({ "arg1": format!("{example} world ") }))
                    .await?;
                Ok::<_, WeftError>(Next::from(next))
            })
            .then(|st| async move {
                let example = st.get("example").and_then(Value::as_str).unwrap_or_default();
                Ok(Next::value(format!("Finally: {example}")))
            });

        assert_eq!(
            f.wait(&opts()).await.unwrap(),
            Resolution::Value(json!("Finally: hellohello world hellohello world "))
        );
        h.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn chained_future_resolves_to_the_other_jobs_status() {
        let h = Harness::start();
        let other = h
            .submitter
            .future("example", json!({ "arg1": "other" }))
            .await
            .unwrap();
        let expected = other.clone();
        let f = h
            .submitter
            .future("example", json!({ "arg1": "first" }))
            .await
            .unwrap()
            .then(move |_| async move { Ok(Next::from(other)) });

        let chained = f.wait(&opts()).await.unwrap();
        let direct = expected.wait(&opts()).await.unwrap();
        assert_eq!(chained, direct);
        assert_eq!(chained.get("example"), Some(&json!("otherother")));
        h.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn jobs_completing_out_of_order_keep_input_order() {
        let h = Harness::start();
        let f1 = h
            .submitter
            .future("slow_example", json!({ "arg1": "hello" }))
            .await
            .unwrap();
        let f2 = h
            .submitter
            .future("example", json!({ "arg1": "world" }))
            .await
            .unwrap();

        let results = wait_all(&[f1, f2], &opts()).await.unwrap();
        assert_eq!(results[0].get("example"), Some(&json!("hellohello")));
        assert_eq!(results[1].get("example"), Some(&json!("worldworld")));
        assert!(finish_time(&results[0]) > finish_time(&results[1]));
        h.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn failed_job_surfaces_its_error() {
        let h = Harness::start();
        let err = h
            .submitter
            .future("broken_example", json!({ "arg1": "hello" }))
            .await
            .unwrap()
            .wait(&opts())
            .await
            .unwrap_err();

        assert!(err.is_job_failure());
        assert!(err.to_string().contains("I'm blowing up"));
        h.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn job_nobody_takes_times_out() {
        let h = Harness::start();
        let f = h
            .submitter
            .future("non_taken_example", json!({ "arg1": "hello" }))
            .await
            .unwrap();

        let err = f
            .wait(
                &WaitOptions::new()
                    .with_interval(Duration::from_millis(10))
                    .with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(h.store.counts().await.failed, 1);
        h.workers.shutdown_and_join().await;
    }

    struct UnreachableStore;

    #[async_trait]
    impl JobSubmitter for UnreachableStore {
        async fn create(&self, _request: JobRequest) -> Result<JobId, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl StatusStore for UnreachableStore {
        async fn get(&self, _job_id: JobId) -> Result<Option<crate::domain::Status>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn kill(&self, _job_id: JobId) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_errors_are_propagated() {
        let submitter = Submitter::from_backend(Arc::new(UnreachableStore));
        let err = submitter.future("example", json!({})).await.unwrap_err();
        assert!(matches!(err, WeftError::Store(StoreError::Unavailable(_))));

        let f = submitter.wrap(JobId::from_ulid(ulid::Ulid::new()));
        let err = f.wait(&opts()).await.unwrap_err();
        assert!(matches!(err, WeftError::Store(_)));
    }
}
