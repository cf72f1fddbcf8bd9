//! Runs against a live server; skipped unless `REDIS_URL` is set.
//!
//! ```bash
//! REDIS_URL=redis://127.0.0.1:6379 cargo test --features redis --test redis_backend
//! ```
#![cfg(feature = "redis")]

use std::time::Duration;
use serde_json::json;

use tradebot_queue::{
    Queue, QueueConfig, QueueError, FailOutcome, EnqueueOptions, JobPriority, Payload,
    backend::QueueBackend,
    backend::redis::RedisBackend,
};

/// Fresh queue in a unique namespace so runs never share keys
async fn create_test_queue() -> Option<Queue<RedisBackend>> {
    let url = std::env::var("REDIS_URL").ok()?;
    let namespace = format!("tradebot-test-{}", uuid::Uuid::new_v4());
    let config = QueueConfig::default().with_namespace(namespace).with_redis_url(url);
    Some(Queue::connect(config).await.expect("failed to connect to REDIS_URL"))
}

async fn cleanup(queue: &Queue<RedisBackend>) {
    let keys = queue.keys();
    for priority in JobPriority::all() {
        queue.backend().clear_list(keys.lane(*priority)).await.unwrap();
    }
    queue.backend().clear_list(keys.dead_letter()).await.unwrap();

    let leftovers = queue
        .backend()
        .due_members(keys.scheduled(), chrono::DateTime::<chrono::Utc>::MAX_UTC)
        .await
        .unwrap();
    for member in leftovers {
        queue.backend().remove_scheduled(keys.scheduled(), &member).await.unwrap();
    }
    assert_eq!(queue.scheduled_depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_redis_priority_and_retry_flow() {
    let Some(queue) = create_test_queue().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };

    queue.enqueue("low-job", Payload::new(), JobPriority::Low).await.unwrap();
    queue.enqueue("critical-job", Payload::new(), JobPriority::Critical).await.unwrap();

    let critical = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(critical.job_type, "critical-job");
    assert_eq!(critical.attempts, 1);

    let outcome = queue.fail(critical.clone(), "exchange timeout").await.unwrap();
    assert_eq!(outcome, FailOutcome::Retried { attempts: 1, max_attempts: 3 });

    let retried = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(retried.id, critical.id);
    assert_eq!(retried.last_error(), Some("exchange timeout"));

    assert_eq!(queue.dequeue().await.unwrap().unwrap().job_type, "low-job");
    cleanup(&queue).await;
}

#[tokio::test]
async fn test_redis_scheduled_promotion() {
    let Some(queue) = create_test_queue().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };

    let options = EnqueueOptions::new().schedule_in(Duration::from_millis(100));
    queue
        .enqueue_with_options("scheduled-job", Payload::new(), JobPriority::Normal, options)
        .await
        .unwrap();
    assert!(queue.dequeue().await.unwrap().is_none());

    let job = queue.dequeue_with_timeout(Duration::from_secs(2)).await.unwrap().unwrap();
    assert_eq!(job.job_type, "scheduled-job");
    assert_eq!(queue.scheduled_depth().await.unwrap(), 0);
    cleanup(&queue).await;
}

#[tokio::test]
async fn test_redis_cleanup_removes_pending_scheduled_jobs() {
    let Some(queue) = create_test_queue().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };

    let options = EnqueueOptions::new().schedule_in(Duration::from_secs(3600));
    queue
        .enqueue_with_options("far-future", Payload::new(), JobPriority::Low, options)
        .await
        .unwrap();
    assert_eq!(queue.scheduled_depth().await.unwrap(), 1);

    cleanup(&queue).await;
    assert_eq!(queue.scheduled_depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_redis_dead_letter_replay() {
    let Some(queue) = create_test_queue().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };

    let mut payload = Payload::new();
    payload.insert("data".to_string(), json!("test"));
    let options = EnqueueOptions::new().with_max_attempts(1);
    let job = queue.enqueue_with_options("notify", payload, JobPriority::High, options).await.unwrap();

    let delivered = queue.dequeue().await.unwrap().unwrap();
    assert!(matches!(queue.fail(delivered, "smtp down").await.unwrap(), FailOutcome::DeadLettered { .. }));
    assert_eq!(queue.peek_dead_letter(10).await.unwrap().len(), 1);

    queue.retry_dead_letter(0).await.unwrap();
    assert_eq!(queue.retry_dead_letter(0).await.unwrap_err(), QueueError::DeadLetterNotFound(0));

    let redelivered = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(redelivered.id, job.id);
    assert_eq!(queue.dead_letter_depth().await.unwrap(), 0);
    cleanup(&queue).await;
}

#[tokio::test]
async fn test_connect_without_url_is_configuration_error() {
    let err = Queue::<RedisBackend>::connect(QueueConfig::default()).await.err().unwrap();
    assert!(matches!(err, QueueError::Configuration(_)));
}
