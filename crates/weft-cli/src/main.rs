use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};

use weft_core::impls::{HandlerRegistry, InMemoryJobStore, JobHandler, WorkerGroup};
use weft_core::{Next, Payload, Submitter, WaitOptions, WeftError, wait_all};

/// Demo: submit jobs to the in-memory backend and wait on their futures.
#[derive(Debug, Parser)]
#[command(name = "weft", version)]
struct Args {
    /// Name passed to the example jobs.
    #[arg(long, default_value = "weft")]
    name: String,

    /// Number of in-process workers.
    #[arg(long, default_value_t = 3)]
    workers: usize,

    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,

    /// Wait deadline in milliseconds (0 = wait indefinitely).
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// How many times the "flaky" job fails before it succeeds.
    #[arg(long, default_value_t = 0)]
    failures: u32,
}

#[derive(Debug, Deserialize)]
struct ExamplePayload {
    arg1: String,
}

/// Doubles `arg1` after an optional delay.
struct ExampleHandler {
    job_type: &'static str,
    delay: Duration,
}

#[async_trait]
impl JobHandler for ExampleHandler {
    fn job_type(&self) -> &'static str {
        self.job_type
    }

    async fn perform(&self, options: &Value) -> Result<Payload, String> {
        let p: ExamplePayload =
            serde_json::from_value(options.clone()).map_err(|e| format!("json decode: {e}"))?;
        tokio::time::sleep(self.delay).await;

        let mut payload = Payload::new();
        payload.insert("example".into(), json!(format!("{0}{0}", p.arg1)));
        payload.insert("finish_time".into(), json!(Utc::now().to_rfc3339()));
        Ok(payload)
    }
}

/// Fails the first `n` times it runs.
struct FlakyHandler {
    remaining_failures: AtomicU32,
}

#[async_trait]
impl JobHandler for FlakyHandler {
    fn job_type(&self) -> &'static str {
        "flaky"
    }

    async fn perform(&self, _options: &Value) -> Result<Payload, String> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(format!("intentional failure (left={left})"));
        }
        Ok(Payload::new())
    }
}

fn registry(failures: u32) -> Result<HandlerRegistry, Box<dyn std::error::Error>> {
    let mut reg = HandlerRegistry::new();
    reg.register(Arc::new(ExampleHandler {
        job_type: "example",
        delay: Duration::ZERO,
    }))?;
    reg.register(Arc::new(ExampleHandler {
        job_type: "slow_example",
        delay: Duration::from_secs(3),
    }))?;
    reg.register(Arc::new(FlakyHandler {
        remaining_failures: AtomicU32::new(failures),
    }))?;
    Ok(reg)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    // (A) backend と worker を用意
    let store = Arc::new(InMemoryJobStore::new());
    let workers = WorkerGroup::spawn(
        args.workers,
        Arc::clone(&store),
        Arc::new(registry(args.failures)?),
    );
    let submitter = Submitter::from_backend(Arc::clone(&store));
    let opts = WaitOptions::new()
        .with_interval(Duration::from_millis(args.interval_ms))
        .with_timeout(Duration::from_millis(args.timeout_ms));
    info!("waiting with {opts:?}");

    // (B) then でつなぐ: example -> example -> 文字列
    let chained = {
        let first = submitter.future("example", json!({ "arg1": args.name })).await?;
        let submitter = submitter.clone();
        first
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
            })
    };
    println!("chained: {:?}", chained.wait(&opts).await?.into_value());

    // (C) 完了順が逆でも結果は入力順
    let slow = submitter.future("slow_example", json!({ "arg1": "hello" })).await?;
    let quick = submitter.future("example", json!({ "arg1": "world" })).await?;
    for (i, res) in wait_all(&[slow, quick], &opts).await?.into_iter().enumerate() {
        println!("wait_all[{i}]: {}", res.into_value());
    }

    // (D) 失敗は JobFailure として返る
    match submitter.future("flaky", json!({})).await?.wait(&opts).await {
        Ok(_) => println!("flaky: completed"),
        Err(e @ WeftError::JobFailure { .. }) => println!("flaky: {e}"),
        Err(e) => return Err(e.into()),
    }

    println!("counts: {:?}", store.counts().await);
    workers.shutdown_and_join().await;
    Ok(())
}
