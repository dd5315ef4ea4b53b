//! Integration tests for the logging pipeline
//!
//! These tests verify:
//! - Log injection prevention
//! - Queued delivery, ordering and drain-on-shutdown
//! - Writer failure isolation
//! - Overflow policies
//! - Formatter and filter application
//! - Scoped context propagation across tasks
//! - Timestamp format support
//! - Log sampling

use logflow::prelude::*;
use logflow::core::diagnostics::silent_handler;
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Collects every delivered event
#[derive(Default)]
struct Recording {
    events: Mutex<Vec<LogEvent>>,
}

impl Recording {
    fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.message().to_string())
            .collect()
    }

    fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }
}

impl LogWriter for Recording {
    fn write(&self, event: &LogEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Fails every write
struct Broken;

impl LogWriter for Broken {
    fn write(&self, _event: &LogEvent) -> Result<()> {
        Err(LoggerError::writer("disk on fire"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Panics on every write
struct Exploding;

impl LogWriter for Exploding {
    fn write(&self, _event: &LogEvent) -> Result<()> {
        panic!("writer exploded");
    }

    fn name(&self) -> &str {
        "exploding"
    }
}

fn collecting_diagnostics() -> (DiagnosticHandler, Arc<Mutex<Vec<Diagnostic>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: DiagnosticHandler = Arc::new(move |d: &Diagnostic| sink.lock().push(d.clone()));
    (handler, seen)
}

fn queued_engine(
    writer: Arc<Recording>,
    queue: QueueConfig,
    policy: OverflowPolicy,
) -> LoggerEngine {
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

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("injection.log");

    {
        let engine = LoggerEngine::new(
            LoggerConfig::builder()
                .writer(FileWriter::new(&log_file).expect("Failed to create writer"))
                .build(),
        )
        .expect("Failed to build engine");

        engine.info("User login\n[ERROR] Fake admin access granted");
        engine.info("tab\there\rcarriage");
        engine.flush();
    }

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();

    assert_eq!(lines.len(), 2, "each event must occupy exactly one line");
    assert!(lines[0].contains("User login\\n[ERROR] Fake admin access granted"));
    assert!(lines[1].contains("tab\\there\\rcarriage"));
}

#[test]
fn test_queued_file_logging() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("queued.log");

    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .writer(
                FileWriter::new(&log_file)
                    .expect("Failed to create writer")
                    .with_formatter(|e: &LogEvent| e.message().to_string()),
            )
            .background_queue(QueueConfig::new().with_capacity(64).with_batch_size(8))
            .build(),
    )
    .expect("Failed to build engine");

    for i in 0..50 {
        engine.info(format!("line {}", i));
    }

    assert!(engine.wait_until_drained(DRAIN_TIMEOUT));
    engine.flush();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let expected: Vec<String> = (0..50).map(|i| format!("line {}", i)).collect();
    assert_eq!(content.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn test_failing_writers_do_not_affect_others() {
    let healthy = Arc::new(Recording::default());
    let (handler, diagnostics) = collecting_diagnostics();

    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .writer(Broken)
            .writer(Exploding)
            .shared_writer(Arc::clone(&healthy) as Arc<dyn LogWriter>)
            .diagnostics(handler)
            .build(),
    )
    .expect("Failed to build engine");

    engine.info("first");
    engine.warn("second");

    assert_eq!(healthy.messages(), vec!["first", "second"]);
    assert_eq!(engine.metrics().failed_writes(), 4);
    assert_eq!(engine.metrics().delivered_writes(), 2);

    let diagnostics = diagnostics.lock();
    let failed = diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::WriterFailed { index: 0, .. }))
        .count();
    let panicked = diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::WriterPanicked { index: 1, .. }))
        .count();
    assert_eq!(failed, 2);
    assert_eq!(panicked, 2);
}

#[test]
fn test_failing_writer_behind_queue() {
    let healthy = Arc::new(Recording::default());

    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .writer(Exploding)
            .shared_writer(Arc::clone(&healthy) as Arc<dyn LogWriter>)
            .background_queue(QueueConfig::new().with_batch_size(4))
            .diagnostics(silent_handler())
            .build(),
    )
    .expect("Failed to build engine");

    for i in 0..10 {
        engine.info(format!("event {}", i));
    }

    assert!(engine.wait_until_drained(DRAIN_TIMEOUT));
    assert_eq!(healthy.messages().len(), 10);
}

#[test]
fn test_queue_preserves_order_across_batches() {
    let writer = Arc::new(Recording::default());
    let batch_size = 5;
    let engine = queued_engine(
        Arc::clone(&writer),
        QueueConfig::new().with_batch_size(batch_size),
        OverflowPolicy::Block,
    );

    for i in 0..batch_size * 3 {
        engine.info(format!("{}", i));
    }

    assert!(engine.shutdown(DRAIN_TIMEOUT));
    let messages = writer.messages();
    assert_eq!(messages.len(), batch_size * 3);
    let expected: Vec<String> = (0..batch_size * 3).map(|i| i.to_string()).collect();
    assert_eq!(messages, expected);
    assert_eq!(engine.metrics().dropped_count(), 0);
    assert!(engine.metrics().batches() >= 3);
}

#[test]
fn test_partial_batch_delivered_on_drop() {
    let writer = Arc::new(Recording::default());
    {
        let engine = queued_engine(
            Arc::clone(&writer),
            QueueConfig::new()
                .with_batch_size(100)
                .with_flush_interval(Duration::from_secs(60)),
            OverflowPolicy::Block,
        );
        engine.info("a");
        engine.info("b");
        engine.info("c");
    }

    assert_eq!(writer.messages(), vec!["a", "b", "c"]);
}

#[test]
fn test_blocking_producer_with_small_buffer() {
    let writer = Arc::new(Recording::default());
    let engine = queued_engine(
        Arc::clone(&writer),
        QueueConfig::new()
            .with_capacity(3)
            .with_batch_size(2)
            .with_flush_interval(Duration::from_millis(50)),
        OverflowPolicy::Block,
    );

    for i in 1..=5 {
        engine.info(format!("m{}", i));
    }

    assert!(engine.wait_until_drained(DRAIN_TIMEOUT));
    assert_eq!(writer.messages(), vec!["m1", "m2", "m3", "m4", "m5"]);
    assert_eq!(engine.metrics().dropped_count(), 0);
}

#[test]
fn test_drop_newest_policy_counts_drops() {
    let writer = Arc::new(Recording::default());
    let engine = queued_engine(
        Arc::clone(&writer),
        QueueConfig::new()
            .with_capacity(2)
            .with_batch_size(1)
            .with_flush_interval(Duration::from_millis(10)),
        OverflowPolicy::DropNewest,
    );

    for i in 0..500 {
        engine.info(format!("burst {}", i));
    }

    assert!(engine.wait_until_drained(DRAIN_TIMEOUT));
    let delivered = writer.messages().len() as u64;
    let dropped = engine.metrics().dropped_count();

    assert_eq!(delivered + dropped, 500);
    assert_eq!(engine.metrics().enqueued(), delivered);
}

#[test]
fn test_log_after_shutdown_is_rejected() {
    let writer = Arc::new(Recording::default());
    let (handler, diagnostics) = collecting_diagnostics();
    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
            .background_queue(QueueConfig::default())
            .diagnostics(handler)
            .build(),
    )
    .expect("Failed to build engine");

    engine.info("before");
    assert!(engine.shutdown(DRAIN_TIMEOUT));
    engine.info("after");

    assert_eq!(writer.messages(), vec!["before"]);
    assert_eq!(engine.metrics().dropped_count(), 1);
    assert!(diagnostics
        .lock()
        .iter()
        .any(|d| matches!(d, Diagnostic::QueueRejected { .. })));
}

#[test]
fn test_formatter_keeps_error_and_context() {
    let writer = Arc::new(Recording::default());
    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
            .formatter(|e: &LogEvent| e.message().to_uppercase())
            .build(),
    )
    .expect("Failed to build engine");

    let error = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml missing");
    let _scope = engine.begin_scope("request_id", "r-1");
    engine.log_error(&error, "could not start");

    let events = writer.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.message(), "COULD NOT START");
    assert_eq!(event.level(), LogLevel::Error);

    let info = event.error().expect("error info must survive formatting");
    assert_eq!(info.type_name, "Error");
    assert_eq!(info.message, "config.toml missing");
    assert_eq!(
        event.context().and_then(|c| c.get("request_id")),
        Some(&FieldValue::from("r-1"))
    );
}

#[test]
fn test_filter_rejects_before_formatting() {
    let writer = Arc::new(Recording::default());
    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .min_level(LogLevel::Debug)
            .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
            .filter(|e: &LogEvent| !e.message().starts_with("health"))
            .formatter(|e: &LogEvent| format!("<{}>", e.message()))
            .build(),
    )
    .expect("Failed to build engine");

    engine.trace("too quiet");
    engine.debug("healthcheck ok");
    engine.debug("cache miss");

    assert_eq!(writer.messages(), vec!["<cache miss>"]);
    assert_eq!(engine.metrics().filtered(), 2);
    assert_eq!(engine.metrics().accepted(), 1);
}

#[test]
fn test_nested_scopes_restore_outer_value() {
    let writer = Arc::new(Recording::default());
    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
            .build(),
    )
    .expect("Failed to build engine");

    let outer = engine.begin_scope("A", 1);
    engine.info("outer");
    {
        let _inner = engine.begin_scope("A", 2);
        engine.info("inner");
    }
    engine.info("restored");
    drop(outer);
    engine.info("empty");

    let values: Vec<Option<FieldValue>> = writer
        .events()
        .iter()
        .map(|e| e.context().and_then(|c| c.get("A")).cloned())
        .collect();
    assert_eq!(
        values,
        vec![
            Some(FieldValue::Int(1)),
            Some(FieldValue::Int(2)),
            Some(FieldValue::Int(1)),
            None,
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_context_flows_across_tasks() {
    let writer = Arc::new(Recording::default());
    let engine = Arc::new(
        LoggerEngine::new(
            LoggerConfig::builder()
                .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
                .background_queue(QueueConfig::new().with_flush_interval(Duration::from_millis(10)))
                .build(),
        )
        .expect("Failed to build engine"),
    );

    let handles: Vec<_> = (0..8)
        .map(|task| {
            let engine = Arc::clone(&engine);
            context::spawn(async move {
                let _task = context::push("task", task);
                for step in 0..5 {
                    tokio::task::yield_now().await;
                    engine.info_async(format!("{}:{}", task, step)).await;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("task panicked");
    }
    assert!(engine.wait_until_drained_async(DRAIN_TIMEOUT).await);

    let events = writer.events();
    assert_eq!(events.len(), 40);
    for event in events {
        let owner: i64 = event
            .message()
            .split(':')
            .next()
            .and_then(|t| t.parse().ok())
            .expect("message starts with task id");
        assert_eq!(
            event.context().and_then(|c| c.get("task")),
            Some(&FieldValue::Int(owner)),
            "event {:?} carries another task's context",
            event.message()
        );
    }
}

#[tokio::test]
async fn test_plain_spawned_tasks_log_only_their_own_context() {
    let writer = Arc::new(Recording::default());
    let engine = Arc::new(
        LoggerEngine::new(
            LoggerConfig::builder()
                .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
                .build(),
        )
        .expect("Failed to build engine"),
    );

    let owner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let _user = context::push("user", "alice");
            tokio::time::sleep(Duration::from_millis(50)).await;
            engine.info("owner");
        })
    };
    let sibling = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.info("sibling");
        })
    };
    sibling.await.expect("task panicked");
    owner.await.expect("task panicked");

    let events = writer.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message(), "sibling");
    assert!(events[0].context().is_none());
    assert_eq!(
        events[1].context().and_then(|c| c.get("user")),
        Some(&FieldValue::from("alice"))
    );
}

#[tokio::test]
async fn test_spawned_task_inherits_parent_scope() {
    let _request = context::push("request_id", "parent");

    let child = context::spawn(async {
        let _extra = context::push("step", "child");
        context::snapshot()
    });
    let seen = child.await.expect("task panicked");

    assert_eq!(seen.get("request_id"), Some(&FieldValue::from("parent")));
    assert_eq!(seen.get("step"), Some(&FieldValue::from("child")));
    assert!(context::snapshot().get("step").is_none());
}

#[test]
fn test_json_formatter_to_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("events.jsonl");

    {
        let engine = LoggerEngine::new(
            LoggerConfig::builder()
                .writer(
                    FileWriter::new(&log_file)
                        .expect("Failed to create writer")
                        .with_formatter(JsonFormatter::new()),
                )
                .build(),
        )
        .expect("Failed to build engine");

        let _user = engine.begin_scope("user_id", 7);
        engine.warn("quota \"nearly\" exceeded");
    }

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let value: serde_json::Value =
        serde_json::from_str(content.trim()).expect("line must be valid JSON");
    assert_eq!(value["level"], "WARN");
    assert_eq!(value["message"], "quota \"nearly\" exceeded");
    assert_eq!(value["context"]["user_id"], 7);
}

#[test]
fn test_handle_before_and_after_install() {
    let handle = LogHandle::uninitialized();
    let clone = handle.clone();

    assert!(matches!(
        handle.write(LogLevel::Info, "too early"),
        Err(LoggerError::NotInitialized)
    ));

    let writer = Arc::new(Recording::default());
    handle
        .install(
            LoggerConfig::builder()
                .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
                .build(),
        )
        .expect("first install succeeds");

    clone
        .write(LogLevel::Info, "through the clone")
        .expect("clone sees the installed engine");
    assert_eq!(writer.messages(), vec!["through the clone"]);
    assert!(handle.install(LoggerConfig::default()).is_err());
}

#[test]
fn test_timestamp_formats() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let iso_file = temp_dir.path().join("iso.log");
    let millis_file = temp_dir.path().join("millis.log");

    {
        let engine = LoggerEngine::new(
            LoggerConfig::builder()
                .writer(
                    FileWriter::new(&iso_file)
                        .expect("Failed to create writer")
                        .with_formatter(
                            PlainTextFormatter::new().with_timestamp_format(TimestampFormat::Iso8601),
                        ),
                )
                .writer(
                    FileWriter::new(&millis_file)
                        .expect("Failed to create writer")
                        .with_formatter(
                            JsonFormatter::new().with_timestamp_format(TimestampFormat::UnixMillis),
                        ),
                )
                .build(),
        )
        .expect("Failed to build engine");
        engine.info("stamped");
    }

    let iso = fs::read_to_string(&iso_file).expect("Failed to read log file");
    let stamp = iso
        .trim_start_matches('[')
        .split(']')
        .next()
        .expect("line starts with a timestamp");
    assert!(stamp.contains('T') && stamp.ends_with('Z'), "got {}", stamp);

    let json: serde_json::Value =
        serde_json::from_str(fs::read_to_string(&millis_file).expect("read").trim())
            .expect("valid JSON");
    let millis = json["timestamp"].as_i64().expect("numeric timestamp");
    assert!(millis > 1_700_000_000_000);
}

#[test]
fn test_sampling_keeps_errors() {
    let writer = Arc::new(Recording::default());
    let sampler = Arc::new(SamplingFilter::new(0.0));
    let gate = Arc::clone(&sampler);

    let engine = LoggerEngine::new(
        LoggerConfig::builder()
            .shared_writer(Arc::clone(&writer) as Arc<dyn LogWriter>)
            .filter(move |e: &LogEvent| gate.should_log(e))
            .build(),
    )
    .expect("Failed to build engine");

    for i in 0..20 {
        engine.info(format!("sampled out {}", i));
    }
    engine.error("kept");
    engine.fatal("kept too");

    assert_eq!(writer.messages(), vec!["kept", "kept too"]);
    assert_eq!(sampler.rejected_count(), 20);
    assert_eq!(sampler.sampled_count(), 2);
}
