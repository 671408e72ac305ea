//! Tests for the bounded-concurrency runner.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::sleep;

use crate::ops::{OpError, OpFuture, OpKind, OpOutput, Operation};

use super::Runner;

/// Minimal scripted operation for driving the runner.
struct TestOp {
    label: String,
    delay: Duration,
    fail: bool,
    gauge: Option<Arc<Gauge>>,
}

/// Tracks concurrent executions and the high-water mark.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TestOp {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            delay: Duration::from_millis(1),
            fail: false,
            gauge: None,
        }
    }

    fn failing(label: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(label)
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_gauge(mut self, gauge: Arc<Gauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }
}

impl Operation for TestOp {
    fn kind(&self) -> OpKind {
        OpKind::Add
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn run(self) -> OpFuture {
        Box::pin(async move {
            if let Some(gauge) = &self.gauge {
                gauge.enter();
            }
            sleep(self.delay).await;
            if let Some(gauge) = &self.gauge {
                gauge.exit();
            }
            if self.fail {
                Err(OpError::Aborted(String::from("scripted failure")))
            } else {
                Ok(OpOutput::Destroyed {
                    machine_id: None,
                    instance_id: None,
                })
            }
        })
    }
}

#[tokio::test]
async fn every_operation_is_reported_exactly_once() {
    let mut runner = Runner::new(3);
    for n in 0..5 {
        if n == 2 {
            runner.queue_op(TestOp::failing("op-2"));
        } else {
            runner.queue_op(TestOp::new(&format!("op-{n}")));
        }
    }

    let reports = runner.drain().await;

    assert_eq!(reports.len(), 5, "no operation may go unreported");
    assert_eq!(reports.iter().filter(|report| report.is_success()).count(), 4);
    let failed: Vec<&str> = reports
        .iter()
        .filter(|report| !report.is_success())
        .map(|report| report.label.as_str())
        .collect();
    assert_eq!(failed, vec!["op-2"], "only the scripted failure may fail");
}

#[tokio::test]
async fn parallelism_never_exceeds_the_worker_limit() {
    let gauge = Arc::new(Gauge::default());
    let mut runner = Runner::new(2);
    for n in 0..6 {
        runner.queue_op(
            TestOp::new(&format!("op-{n}"))
                .with_delay(Duration::from_millis(20))
                .with_gauge(Arc::clone(&gauge)),
        );
    }

    let reports = runner.drain().await;

    assert_eq!(reports.len(), 6);
    assert!(
        gauge.peak.load(Ordering::SeqCst) <= 2,
        "peak concurrency {} exceeded the limit",
        gauge.peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn reports_arrive_in_completion_order() {
    let mut runner = Runner::new(2);
    runner.queue_op(TestOp::new("slow").with_delay(Duration::from_millis(50)));
    runner.queue_op(TestOp::new("fast").with_delay(Duration::from_millis(1)));

    let reports = runner.drain().await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].label, "fast");
    assert_eq!(reports[1].label, "slow");
}

#[tokio::test]
async fn next_result_returns_none_when_nothing_is_queued() {
    let mut runner = Runner::new(1);
    assert!(runner.is_empty());
    assert!(runner.next_result().await.is_none());
}

#[tokio::test]
async fn operations_queued_while_draining_are_still_reported() {
    let mut runner = Runner::new(1);
    runner.queue_op(TestOp::new("first"));
    let first = runner.next_result().await.expect("first report expected");
    assert_eq!(first.label, "first");

    runner.queue_op(TestOp::new("second"));
    let second = runner.next_result().await.expect("second report expected");
    assert_eq!(second.label, "second");
    assert!(runner.next_result().await.is_none());
}
