#![cfg(feature = "memory")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tradebot_queue::{
    Queue, Worker, WorkerConfig, HandlerRegistry, JobError, JobPriority, Payload,
    backend::memory::MemoryBackend,
};

fn fast_config() -> WorkerConfig {
    WorkerConfig {
        idle_backoff: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timeout waiting for worker");
}

#[tokio::test]
async fn test_worker_processes_jobs_until_shutdown() {
    let queue = Queue::new(MemoryBackend::new());
    let handled = Arc::new(AtomicUsize::new(0));

    let mut registry = HandlerRegistry::new();
    let counter = handled.clone();
    registry
        .register_fn("notify", move |_job| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    for _ in 0..10 {
        queue.enqueue("notify", Payload::new(), JobPriority::Normal).await.unwrap();
    }

    let handle = Worker::new(queue.clone(), registry, fast_config()).spawn();
    wait_until(|| handled.load(Ordering::SeqCst) == 10).await;
    handle.shutdown().await.unwrap();

    assert_eq!(queue.queue_depth().await.unwrap().total(), 0);
    assert_eq!(queue.observability().metrics().jobs_completed(), 10);
}

#[tokio::test]
async fn test_worker_retries_then_succeeds() {
    let queue = Queue::new(MemoryBackend::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut registry = HandlerRegistry::new();
    let counter = calls.clone();
    registry
        .register_fn("execute_order", move |job| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if job.attempts < 2 {
                    Err(JobError::failed("exchange timeout"))
                } else {
                    Ok(())
                }
            }
        })
        .unwrap();

    queue.enqueue("execute_order", Payload::new(), JobPriority::Critical).await.unwrap();

    let handle = Worker::new(queue.clone(), registry, fast_config()).spawn();
    wait_until(|| queue.observability().metrics().jobs_completed() == 1).await;
    handle.shutdown().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(queue.observability().metrics().jobs_retried(), 1);
    assert_eq!(queue.dead_letter_depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_job_type_is_dead_lettered() {
    let queue = Queue::new(MemoryBackend::new());
    queue.enqueue("mystery", Payload::new(), JobPriority::Low).await.unwrap();

    let handle = Worker::new(queue.clone(), HandlerRegistry::new(), fast_config()).spawn();
    wait_until(|| queue.observability().metrics().jobs_dead_lettered() == 1).await;
    handle.shutdown().await.unwrap();

    let records = queue.peek_dead_letter(1).await.unwrap();
    assert_eq!(records[0].error, "No handler registered for job type: mystery");
}

#[tokio::test]
async fn test_idle_worker_shuts_down_promptly() {
    let queue = Queue::new(MemoryBackend::new());
    let config = WorkerConfig {
        idle_backoff: Duration::from_secs(30),
        error_backoff: Duration::from_secs(30),
    };
    let handle = Worker::new(queue, HandlerRegistry::new(), config).spawn();

    tokio::time::sleep(Duration::from_millis(20)).await;
    tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("worker did not stop")
        .unwrap();
}
