//! Stress tests for the background queue under concurrent load
//!
//! These tests verify:
//! - The blocking policy never loses an event, however small the buffer
//! - Drop-on-full accounting stays exact under contention
//! - Per-producer ordering survives batching
//! - Context isolation holds across many concurrent tasks

use logflow::core::diagnostics::silent_handler;
use logflow::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PRODUCERS: usize = 8;
const EVENTS_PER_PRODUCER: usize = 1_000;

#[derive(Default)]
struct Collector {
    events: Mutex<Vec<LogEvent>>,
}

impl LogWriter for Collector {
    fn write(&self, event: &LogEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "collector"
    }
}

/// Counts writes and sleeps a little on each, to keep the buffer full
struct SlowCounter {
    writes: AtomicU64,
    delay: Duration,
}

impl LogWriter for SlowCounter {
    fn write(&self, _event: &LogEvent) -> Result<()> {
        std::thread::sleep(self.delay);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "slow-counter"
    }
}

fn engine_with(writer: Arc<dyn LogWriter>, queue: QueueConfig, policy: OverflowPolicy) -> LoggerEngine {
    LoggerEngine::new(
        LoggerConfig::builder()
            .min_level(LogLevel::Trace)
            .shared_writer(writer)
            .background_queue(queue)
            .overflow_policy(policy)
            .diagnostics(silent_handler())
            .build(),
    )
    .expect("Failed to build engine")
}

/// "p3-17" -> (3, 17)
fn parse_tag(message: &str) -> (usize, usize) {
    let (producer, seq) = message
        .trim_start_matches('p')
        .split_once('-')
        .expect("tagged message");
    (
        producer.parse().expect("producer id"),
        seq.parse().expect("sequence number"),
    )
}

/// Every event from every producer arrives, in per-producer order
#[test]
fn test_block_policy_loses_nothing() {
    let collector = Arc::new(Collector::default());
    let engine = Arc::new(engine_with(
        Arc::clone(&collector) as Arc<dyn LogWriter>,
        QueueConfig::new()
            .with_capacity(16)
            .with_batch_size(8)
            .with_flush_interval(Duration::from_millis(5)),
        OverflowPolicy::Block,
    ));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..EVENTS_PER_PRODUCER {
                    engine.info(format!("p{}-{}", p, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }

    assert!(engine.wait_until_drained(Duration::from_secs(30)));
    assert_eq!(engine.metrics().dropped_count(), 0);

    let events = collector.events.lock();
    assert_eq!(events.len(), PRODUCERS * EVENTS_PER_PRODUCER);

    let mut next: HashMap<usize, usize> = HashMap::new();
    for event in events.iter() {
        let (producer, seq) = parse_tag(event.message());
        let expected = next.entry(producer).or_insert(0);
        assert_eq!(seq, *expected, "producer {} delivered out of order", producer);
        *expected += 1;
    }
}

/// Under sustained overload with drop-on-full, delivered plus dropped
/// accounts for every event exactly once
#[test]
fn test_drop_newest_accounting_under_load() {
    let writer = Arc::new(SlowCounter {
        writes: AtomicU64::new(0),
        delay: Duration::from_micros(200),
    });
    let engine = Arc::new(engine_with(
        Arc::clone(&writer) as Arc<dyn LogWriter>,
        QueueConfig::new()
            .with_capacity(32)
            .with_batch_size(8)
            .with_flush_interval(Duration::from_millis(5)),
        OverflowPolicy::DropNewest,
    ));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..EVENTS_PER_PRODUCER {
                    engine.debug(format!("p{}-{}", p, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }

    assert!(engine.wait_until_drained(Duration::from_secs(30)));

    let total = (PRODUCERS * EVENTS_PER_PRODUCER) as u64;
    let delivered = writer.writes.load(Ordering::Relaxed);
    let metrics = engine.metrics();

    assert!(metrics.dropped_count() > 0, "buffer of 32 should overflow");
    assert_eq!(delivered + metrics.dropped_count(), total);
    assert_eq!(metrics.enqueued(), delivered);
    assert_eq!(metrics.accepted(), total);
}

/// Shutdown with producers still running: nothing accepted is lost and
/// everything after the cut-off is rejected
#[test]
fn test_shutdown_while_producing() {
    let collector = Arc::new(Collector::default());
    let engine = Arc::new(engine_with(
        Arc::clone(&collector) as Arc<dyn LogWriter>,
        QueueConfig::new().with_capacity(64).with_batch_size(16),
        OverflowPolicy::Block,
    ));

    let handles: Vec<_> = (0..4)
        .map(|p| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    engine.info(format!("p{}-{}", p, i));
                }
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(5));
    assert!(engine.shutdown(Duration::from_secs(10)));

    for handle in handles {
        handle.join().expect("producer panicked");
    }

    let metrics = engine.metrics();
    let delivered = collector.events.lock().len() as u64;
    assert_eq!(delivered, metrics.enqueued());
    assert_eq!(delivered + metrics.dropped_count(), 8_000);
}

/// Many tasks on a multi-threaded runtime never observe each other's scopes
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_context_isolation_under_load() {
    let collector = Arc::new(Collector::default());
    let engine = Arc::new(engine_with(
        Arc::clone(&collector) as Arc<dyn LogWriter>,
        QueueConfig::new().with_capacity(128).with_batch_size(32),
        OverflowPolicy::Block,
    ));

    let handles: Vec<_> = (0..200i64)
        .map(|task| {
            let engine = Arc::clone(&engine);
            context::spawn(async move {
                let _owner = context::push("owner", task);
                for step in 0..10 {
                    let _step = context::push("step", step);
                    tokio::task::yield_now().await;
                    engine.info_async(format!("{}", task)).await;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task panicked");
    }

    assert!(engine.wait_until_drained_async(Duration::from_secs(30)).await);

    let events = collector.events.lock();
    assert_eq!(events.len(), 2_000);
    for event in events.iter() {
        let owner: i64 = event.message().parse().expect("numeric owner");
        let context = event.context().expect("every event carries context");
        assert_eq!(context.get("owner"), Some(&FieldValue::Int(owner)));
        assert_eq!(context.len(), 2);
    }
}
