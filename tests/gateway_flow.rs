//! End-to-end tests of the admission/cache/metrics flow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tollgate::admission::{AdmissionConfig, AdmissionController, BatchSettings};
use tollgate::cache::{CacheConfig, ResponseCache};
use tollgate::error::GatewayError;
use tollgate::gateway::Gateway;
use tollgate::metrics::{InMemoryStore, JsonlStore, MetricsCollector};
use tollgate::types::{BackendReply, Message};

fn gateway_with(quota: u64, ceiling: u64, ttl: Duration) -> Gateway {
    Gateway::new(
        AdmissionController::new(
            AdmissionConfig {
                daily_quota: quota,
                per_request_ceiling: ceiling,
            },
            BatchSettings {
                max_batch_size: 10,
                optimal_chunk_size: 3,
                delay: Duration::ZERO,
            },
        ),
        ResponseCache::new(CacheConfig { capacity: 100, ttl }),
        MetricsCollector::new(Arc::new(InMemoryStore::new())),
    )
}

fn reply(tokens: Option<u64>) -> BackendReply {
    BackendReply {
        payload: json!({"text": "response"}),
        tokens_used: tokens,
    }
}

/// A message whose estimate is exactly `tokens` (4 chars per token)
fn message_of(tokens: usize, tag: &str) -> Vec<Message> {
    let mut content = tag.to_string();
    content.push_str(&"x".repeat(tokens * 4 - tag.len()));
    vec![Message::user(content)]
}

#[tokio::test]
async fn quota_worked_example_through_gateway() {
    let gw = gateway_with(100_000, u64::MAX, Duration::from_secs(3600));

    // Two 40000-token requests are admitted
    for i in 0..2 {
        gw.process(
            "caller",
            &message_of(40_000, &format!("req-{i}")),
            None,
            || async { Ok(reply(None)) },
        )
        .await
        .unwrap();
    }

    let usage = gw.usage("caller").await;
    assert_eq!(usage.daily_usage, 80_000);
    assert_eq!(usage.remaining_tokens, 20_000);

    // The third is rejected with the full backoff context
    let err = gw
        .process("caller", &message_of(40_000, "req-2"), None, || async {
            Ok(reply(None))
        })
        .await
        .unwrap_err();

    match err {
        GatewayError::RateLimitExceeded {
            limit,
            estimated,
            remaining,
        } => {
            assert_eq!(limit, 100_000);
            assert_eq!(estimated, 40_000);
            assert_eq!(remaining, 20_000);
        }
        other => panic!("expected rate limit rejection, got {other:?}"),
    }

    // Rejection charged nothing
    assert_eq!(gw.usage("caller").await.daily_usage, 80_000);
}

#[tokio::test]
async fn per_request_ceiling_boundary() {
    let gw = gateway_with(1_000_000, 500, Duration::from_secs(3600));
    let backend_calls = Arc::new(AtomicUsize::new(0));

    // Exactly 500 tokens: admitted to the quota check and the backend
    let calls = backend_calls.clone();
    gw.process("caller", &message_of(500, "at-limit"), None, move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(reply(None)) }
    })
    .await
    .unwrap();
    assert_eq!(backend_calls.load(Ordering::SeqCst), 1);

    // 501 tokens: validation failure before quota or backend interaction
    let calls = backend_calls.clone();
    let err = gw
        .process("caller", &message_of(501, "over-limit"), None, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(reply(None)) }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Validation { estimated: 501, limit: 500 }));
    assert_eq!(backend_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gw.usage("caller").await.daily_usage, 500);
}

#[tokio::test]
async fn cache_idempotence_within_ttl() {
    let gw = gateway_with(1_000_000, u64::MAX, Duration::from_secs(3600));
    let backend_calls = Arc::new(AtomicUsize::new(0));
    let messages = vec![Message::user("what is the airspeed of an unladen swallow")];

    let mut responses = Vec::new();
    for _ in 0..2 {
        let calls = backend_calls.clone();
        let payload = gw
            .process("caller", &messages, None, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(reply(Some(42))) }
            })
            .await
            .unwrap();
        responses.push(payload);
    }

    // Backend invoked exactly once; responses byte-identical
    assert_eq!(backend_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        serde_json::to_vec(&responses[0]).unwrap(),
        serde_json::to_vec(&responses[1]).unwrap()
    );
    // Only the first request was charged
    assert_eq!(gw.usage("caller").await.daily_usage, 42);
}

#[tokio::test]
async fn cache_expiry_after_ttl() {
    let gw = gateway_with(1_000_000, u64::MAX, Duration::from_millis(10));
    let backend_calls = Arc::new(AtomicUsize::new(0));
    let messages = vec![Message::user("ephemeral answer")];

    for _ in 0..2 {
        let calls = backend_calls.clone();
        gw.process("caller", &messages, None, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(reply(None)) }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    assert_eq!(backend_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_senders_and_quota_exactness() {
    let gw = Arc::new(gateway_with(100, u64::MAX, Duration::from_secs(3600)));

    // Four concurrent 25-token requests fit the quota exactly. Distinct
    // message bodies keep the cache out of the picture.
    let mut handles = Vec::new();
    for i in 0..4 {
        let gw = gw.clone();
        handles.push(tokio::spawn(async move {
            gw.process("alice", &message_of(25, &format!("a{i}")), None, || async {
                Ok(reply(None))
            })
            .await
        }));
    }
    // A different sender is unaffected by alice's contention
    let gw2 = gw.clone();
    let other = tokio::spawn(async move {
        gw2.process("bob", &message_of(25, "b0"), None, || async { Ok(reply(None)) })
            .await
    });

    for h in handles {
        h.await.unwrap().unwrap();
    }
    other.await.unwrap().unwrap();

    assert_eq!(gw.usage("alice").await.daily_usage, 100);
    assert_eq!(gw.usage("alice").await.remaining_tokens, 0);
    assert_eq!(gw.usage("bob").await.daily_usage, 25);

    // One more request for alice is rejected and usage never exceeds quota
    let err = gw
        .process("alice", &message_of(25, "a9"), None, || async {
            Ok(reply(None))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::RateLimitExceeded { .. }));
    assert_eq!(gw.usage("alice").await.daily_usage, 100);
}

#[tokio::test]
async fn metrics_persist_through_full_flow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let gw = Gateway::new(
        AdmissionController::new(AdmissionConfig::default(), BatchSettings::default()),
        ResponseCache::new(CacheConfig::default()),
        MetricsCollector::new(Arc::new(JsonlStore::new(&path))),
    );

    gw.process(
        "caller",
        &[Message::user("persist me")],
        Some("smoke".into()),
        || async { Ok(reply(Some(7))) },
    )
    .await
    .unwrap();

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(event["endpoint"], "process");
    assert_eq!(event["tokens"], 7);
    assert_eq!(event["pattern"], "smoke");

    // And the pattern shows up in the recency index
    let patterns = gw.pattern_history("24h").await;
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].pattern, "smoke");
}

#[tokio::test]
async fn settings_update_applies_to_later_batches() {
    let gw = gateway_with(1_000_000, u64::MAX, Duration::from_secs(3600));

    gw.update_settings(BatchSettings {
        max_batch_size: 10,
        optimal_chunk_size: 2,
        delay: Duration::from_millis(25),
    });

    let items = (0..4)
        .map(|_| {
            tollgate::admission::BatchItem::new(1, async { Ok(reply(None)) })
        })
        .collect();

    let start = std::time::Instant::now();
    let results = gw
        .admission()
        .handle_batch("caller", items)
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    // One inter-chunk pause between the two chunks of two
    assert!(start.elapsed() >= Duration::from_millis(25));
}
