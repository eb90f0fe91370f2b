//! Behavioural tests for the background work engine.

use crossbeam_channel::{Receiver, Sender};
use mk_core::engine::{Step, WorkEngine};
use mk_protocol::config_models::EngineSettings;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn settings() -> EngineSettings {
    EngineSettings {
        tick_interval_ms: 1,
        idle_poll_ms: 1,
    }
}

fn start_engine() -> WorkEngine<u32, u32> {
    let _ = env_logger::builder().is_test(true).try_init();
    WorkEngine::start(&settings()).expect("Failed to start engine")
}

/// Spin until `cond` holds, failing the test after five seconds.
fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Per-tick instructions fed to a gated transform from the test thread.
enum Gate {
    Pending(f64),
    Done(f64),
    Fail(&'static str),
}

/// A transform whose every invocation blocks until the test sends it a
/// [`Gate`] instruction. Lets tests observe the engine between ticks
/// without relying on timing.
fn gated_transform(
    rx: Receiver<Gate>,
    calls: Arc<AtomicUsize>,
) -> impl FnMut(&mut u32) -> Step<u32> + Send {
    move |item| {
        calls.fetch_add(1, Ordering::SeqCst);
        match rx.recv() {
            Ok(Gate::Pending(delta)) => Step::Pending { delta },
            Ok(Gate::Done(delta)) => Step::Done {
                result: *item,
                delta,
            },
            Ok(Gate::Fail(message)) => Step::Failed {
                message: message.to_string(),
            },
            Err(_) => Step::Failed {
                message: "gate closed".to_string(),
            },
        }
    }
}

fn gate() -> (Sender<Gate>, Receiver<Gate>, Arc<AtomicUsize>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (tx, rx, Arc::new(AtomicUsize::new(0)))
}

fn drain(engine: &WorkEngine<u32, u32>) -> Vec<u32> {
    let mut results = Vec::new();
    loop {
        let (result, _) = engine.poll();
        match result {
            Some(value) => results.push(value),
            None => break,
        }
    }
    results
}

#[test]
fn test_fifo_result_order() {
    let engine = start_engine();
    engine.bind_transform(|item: &mut u32| Step::Done {
        result: *item,
        delta: 1.0,
    });

    for item in [1, 2, 3] {
        engine.add_item(item);
    }
    assert!(engine.kick());

    engine.wait_settled();

    // "Working" includes undrained results.
    assert!(engine.is_working());
    assert_eq!(drain(&engine), vec![1, 2, 3]);
    assert!(!engine.is_working());
    assert_eq!(engine.progress(), 1.0);
}

#[test]
fn test_at_most_one_job_set_in_flight() {
    let engine = start_engine();
    let (tx, rx, calls) = gate();
    engine.bind_transform(gated_transform(rx, calls));

    for item in [1, 2, 3] {
        engine.add_item(item);
    }
    assert!(engine.kick());
    assert!(engine.is_working());

    // A second kick is rejected and changes nothing.
    assert!(!engine.kick());
    assert_eq!(engine.pending_len(), 3);
    assert_eq!(engine.progress(), 0.0);

    // Mutating the pending list mid-job-set is ignored.
    engine.add_item(99);
    assert_eq!(engine.pending_len(), 3);

    // Binding a new transform mid-job-set is rejected too.
    assert!(!engine.bind_transform(|_: &mut u32| Step::Pending { delta: 0.0 }));

    for _ in 0..3 {
        tx.send(Gate::Done(1.0)).expect("worker hung up");
    }
    engine.wait_settled();
    assert_eq!(drain(&engine), vec![1, 2, 3]);

    // The same pending list can be kicked again.
    assert!(engine.kick());
    for _ in 0..3 {
        tx.send(Gate::Done(1.0)).expect("worker hung up");
    }
    engine.wait_settled();
    assert_eq!(drain(&engine), vec![1, 2, 3]);
}

#[test]
fn test_chunked_item_advances_only_on_result() {
    let engine = start_engine();
    let (tx, rx, calls) = gate();
    engine.bind_transform(gated_transform(rx, Arc::clone(&calls)));

    engine.add_item(7);
    assert!(engine.kick());

    tx.send(Gate::Pending(0.3)).expect("worker hung up");
    wait_for("first chunk applied", || engine.progress() > 0.25);
    assert!((engine.progress() - 0.3).abs() < 1e-9);
    assert!(engine.poll().0.is_none(), "no result before the item finishes");

    tx.send(Gate::Pending(0.3)).expect("worker hung up");
    wait_for("second chunk applied", || engine.progress() > 0.55);
    assert!((engine.progress() - 0.6).abs() < 1e-9);
    assert!(engine.poll().0.is_none());

    tx.send(Gate::Done(0.4)).expect("worker hung up");
    engine.wait_settled();

    assert_eq!(engine.progress(), 1.0);
    assert_eq!(drain(&engine), vec![7]);
    assert_eq!(calls.load(Ordering::SeqCst), 3, "same item re-invoked each tick");
}

#[test]
fn test_empty_kick_completes_trivially() {
    let engine = start_engine();
    engine.bind_transform(|item: &mut u32| Step::Done {
        result: *item,
        delta: 1.0,
    });

    assert!(engine.kick());
    engine.wait_settled();

    assert_eq!(engine.progress(), 1.0);
    let (result, progress) = engine.poll();
    assert!(result.is_none());
    assert_eq!(progress, 1.0);
    assert!(!engine.is_working());
}

#[test]
fn test_progress_is_monotonic_within_job_set() {
    let engine = start_engine();
    engine.bind_transform(|item: &mut u32| Step::Done {
        result: *item,
        delta: 1.0,
    });

    for item in 0..5 {
        engine.add_item(item);
    }
    assert!(engine.kick());

    let mut samples = Vec::new();
    while engine.is_working() {
        samples.push(engine.poll().1);
    }
    samples.push(engine.progress());

    for window in samples.windows(2) {
        assert!(
            window[1] >= window[0],
            "progress went backwards: {} -> {}",
            window[0],
            window[1]
        );
    }
    assert_eq!(samples.last().copied(), Some(1.0));
}

#[test]
fn test_failed_items_accumulate_error_text() {
    let engine = start_engine();
    engine.bind_transform(|item: &mut u32| {
        if *item == 2 {
            Step::Failed {
                message: format!("item {item} is degenerate"),
            }
        } else {
            Step::Done {
                result: *item,
                delta: 1.0,
            }
        }
    });

    for item in [1, 2, 3] {
        engine.add_item(item);
    }
    assert!(engine.kick());
    engine.wait_settled();

    // The failed item produced no result but did not stall the job set.
    assert_eq!(drain(&engine), vec![1, 3]);
    assert_eq!(engine.progress(), 1.0);

    let errors = engine.take_error_text();
    assert!(errors.contains("item 2 is degenerate"));
    assert!(engine.take_error_text().is_empty(), "error text drains once");
}

#[test]
fn test_clear_does_not_kill_the_worker() {
    let engine = start_engine();
    let (tx, rx, calls) = gate();
    engine.bind_transform(gated_transform(rx, Arc::clone(&calls)));

    for item in [1, 2] {
        engine.add_item(item);
    }
    assert!(engine.kick());
    wait_for("worker picked up the job", || calls.load(Ordering::SeqCst) >= 1);

    // Soft reset while the transform is mid-flight.
    engine.clear();
    assert!(!engine.is_working());
    assert_eq!(engine.pending_len(), 0);

    // Release the stalled transform call; its outcome belongs to the
    // cleared job set and must be discarded.
    tx.send(Gate::Done(1.0)).expect("worker hung up");

    // The worker must still be alive and able to run a fresh job set.
    engine.add_item(10);
    engine.add_item(20);
    assert!(engine.kick(), "kick after clear must succeed");

    tx.send(Gate::Done(1.0)).expect("worker hung up");
    tx.send(Gate::Done(1.0)).expect("worker hung up");
    engine.wait_settled();

    assert_eq!(drain(&engine), vec![10, 20]);
}
