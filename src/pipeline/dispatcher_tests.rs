//! Tests for batch delivery and retry.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::pipeline::BatchBuilder;
use crate::pipeline::BatchConfig;
use crate::shutdown::ShutdownResult;
use crate::sink::sink_fn;

#[derive(Default)]
struct CollectingReporter {
    failures: Mutex<Vec<DeliveryFailure>>,
}

impl FailureReporter for CollectingReporter {
    fn report(&self, failure: &DeliveryFailure) {
        self.failures.lock().push(failure.clone());
    }
}

fn batch_of(records: usize) -> Arc<Batch> {
    let mut builder = BatchBuilder::new(BatchConfig::default());
    for _ in 0..records {
        builder.push(b"{}".to_vec(), 0, 0);
    }
    Arc::new(builder.take(FlushTrigger::Drain).unwrap().0)
}

fn no_backoff() -> RetryPolicy {
    RetryPolicy { max_attempts: 3, backoff: Duration::ZERO }
}

/// Sink failing its first `failures` calls.
fn flaky_sink(failures: u32, calls: Arc<AtomicU32>) -> impl Sink {
    sink_fn(move |_batch| {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                Err(SinkError::Rejected { status: 503, body: format!("attempt {n}") })
            } else {
                Ok(())
            }
        }
    })
}

#[tokio::test]
async fn succeeds_on_third_attempt_without_report() {
    let calls = Arc::new(AtomicU32::new(0));
    let sink = flaky_sink(2, calls.clone());
    let reporter = CollectingReporter::default();
    let stats = PipelineStats::new();

    let outcome = deliver(&sink, &no_backoff(), &reporter, &stats, batch_of(4)).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(reporter.failures.lock().is_empty());
    assert_eq!(stats.snapshot().batches_delivered, 1);
    assert_eq!(stats.snapshot().records_delivered, 4);
}

#[tokio::test]
async fn exhausted_retries_report_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let sink = flaky_sink(u32::MAX, calls.clone());
    let reporter = CollectingReporter::default();
    let stats = PipelineStats::new();

    let outcome = deliver(&sink, &no_backoff(), &reporter, &stats, batch_of(2)).await;

    assert!(matches!(outcome, DeliveryOutcome::Dropped(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let failures = reporter.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].records, 2);
    assert_eq!(failures[0].attempts, 3);
    assert_eq!(
        failures[0].last_error,
        SinkError::Rejected { status: 503, body: "attempt 3".into() }
    );
    assert_eq!(stats.snapshot().batches_dropped, 1);
}

#[tokio::test]
async fn not_configured_is_silent_and_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let sink = sink_fn(move |_batch| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::NotConfigured)
        }
    });
    let reporter = CollectingReporter::default();
    let stats = PipelineStats::new();

    let outcome = deliver(&sink, &no_backoff(), &reporter, &stats, batch_of(1)).await;

    assert_eq!(outcome, DeliveryOutcome::Discarded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(reporter.failures.lock().is_empty());
    assert_eq!(stats.snapshot().batches_discarded, 1);
}

#[test]
fn backoff_doubles_per_attempt() {
    let retry = RetryPolicy { max_attempts: 4, backoff: Duration::from_millis(100) };
    assert_eq!(retry.delay_before(2), Duration::from_millis(100));
    assert_eq!(retry.delay_before(3), Duration::from_millis(200));
    assert_eq!(retry.delay_before(4), Duration::from_millis(400));
}

#[tokio::test]
async fn dispatch_does_not_wait_for_sink() {
    let release = Arc::new(tokio::sync::Notify::new());
    let gate = release.clone();
    let sink: Arc<dyn Sink> = Arc::new(sink_fn(move |_batch| {
        let gate = gate.clone();
        async move {
            gate.notified().await;
            Ok(())
        }
    }));
    let tracker = Arc::new(DeliveryTracker::new());
    let stats = Arc::new(PipelineStats::new());
    let dispatcher = Dispatcher::new(
        sink,
        no_backoff(),
        Arc::new(LogFailureReporter),
        stats.clone(),
        tracker.clone(),
        CancellationToken::new(),
    );

    let batch = Arc::try_unwrap(batch_of(1)).unwrap();
    dispatcher.dispatch(batch, FlushTrigger::Age);
    assert_eq!(tracker.in_flight_count(), 1);

    // Keep notifying until the blocked task has registered and finished.
    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while tracker.in_flight_count() > 0 {
            release.notify_waiters();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(drained.is_ok());
    assert_eq!(stats.snapshot().batches_delivered, 1);
}

fn stuck_dispatcher(
    reporter: Arc<CollectingReporter>,
    stats: Arc<PipelineStats>,
) -> (Dispatcher, Arc<DeliveryTracker>, CancellationToken) {
    let sink: Arc<dyn Sink> = Arc::new(sink_fn(|_batch| async {
        std::future::pending::<()>().await;
        Ok(())
    }));
    let tracker = Arc::new(DeliveryTracker::new());
    let abandon = CancellationToken::new();
    let dispatcher =
        Dispatcher::new(sink, no_backoff(), reporter, stats, tracker.clone(), abandon.clone());
    (dispatcher, tracker, abandon)
}

#[tokio::test]
async fn abandon_cancels_stuck_delivery() {
    let reporter = Arc::new(CollectingReporter::default());
    let (dispatcher, tracker, abandon) =
        stuck_dispatcher(reporter.clone(), Arc::new(PipelineStats::new()));

    dispatcher.dispatch(Arc::try_unwrap(batch_of(3)).unwrap(), FlushTrigger::Drain);
    tokio::task::yield_now().await;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(20);
    let result = tracker.drain(deadline).await;

    let ShutdownResult::Timeout { abandoned } = result else {
        panic!("expected the stuck delivery to time out");
    };
    assert_eq!(abandoned.len(), 1);
    assert_eq!(abandoned[0].records, 3);
    assert_eq!(abandoned[0].attempts, 1);
    assert_eq!(tracker.in_flight_count(), 0);

    abandon.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    // The claimed batch is shutdown's to report, not the delivery task's.
    assert!(reporter.failures.lock().is_empty());
}

#[tokio::test]
async fn dispatch_after_close_reports_drop() {
    let reporter = Arc::new(CollectingReporter::default());
    let stats = Arc::new(PipelineStats::new());
    let (dispatcher, tracker, _abandon) = stuck_dispatcher(reporter.clone(), stats.clone());

    assert_eq!(tracker.drain(tokio::time::Instant::now()).await, ShutdownResult::Complete);
    dispatcher.dispatch(Arc::try_unwrap(batch_of(2)).unwrap(), FlushTrigger::Drain);

    let failures = reporter.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].records, 2);
    assert_eq!(failures[0].attempts, 0);
    assert_eq!(stats.snapshot().batches_dropped, 1);
}

#[tokio::test]
async fn outcome_claimed_by_shutdown_is_not_recorded_twice() {
    let tracker = DeliveryTracker::new();
    let batch = batch_of(1);
    let guard = tracker.track(&batch).unwrap();

    let result = tracker.drain(tokio::time::Instant::now()).await;
    assert_eq!(result.abandoned_count(), 1);

    let calls = Arc::new(AtomicU32::new(0));
    let reporter = CollectingReporter::default();
    let stats = PipelineStats::new();
    let outcome = deliver_tracked(
        &flaky_sink(u32::MAX, calls.clone()),
        &no_backoff(),
        &reporter,
        &stats,
        batch,
        Some(&guard),
    )
    .await;

    assert_eq!(outcome, DeliveryOutcome::Abandoned);
    assert!(reporter.failures.lock().is_empty());
    assert_eq!(stats.snapshot().batches_dropped, 0);
}
