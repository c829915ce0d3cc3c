use super::*;
use crossbeam::channel::{self, Sender};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn config(max_batch_size: usize, timeout_ms: u64) -> ProcessorConfig {
    ProcessorConfig {
        max_batch_size,
        batch_collection_timeout: Duration::from_millis(timeout_ms),
        ..ProcessorConfig::default()
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn record(key: &str, item: &str) -> IncomingRecord {
    IncomingRecord::new(key, json!(item))
}

type Flushed = Receiver<Batch>;

fn dispatcher(
    max_batch_size: usize,
    timeout_ms: u64,
    t0: Instant,
) -> (Dispatcher<impl FnMut(Batch)>, Flushed) {
    let (tx, rx) = channel::unbounded();
    let d = Dispatcher::new(&config(max_batch_size, timeout_ms), t0, move |b| {
        tx.send(b).expect("flush receiver alive");
    });
    (d, rx)
}

fn items(batch: &Batch) -> Vec<&str> {
    batch.items.iter().filter_map(|v| v.as_str()).collect()
}

#[test]
fn undersized_batch_flushes_only_after_its_deadline() {
    let t0 = Instant::now();
    let (mut d, flushed) = dispatcher(3, 500, t0);

    assert!(!d.add(record("A", "A1"), t0));
    assert!(!d.add(record("A", "A2"), t0));
    d.tick(false, t0);
    assert_eq!(d.wait_for(t0), ms(500));

    d.tick(false, t0 + ms(400));
    assert!(flushed.try_recv().is_err(), "nothing due at 400ms");

    // The deadline itself is not yet overdue.
    d.tick(false, t0 + ms(500));
    assert!(flushed.try_recv().is_err());

    d.tick(false, t0 + ms(501));
    let batch = flushed.try_recv().expect("flushed after deadline");
    assert_eq!(batch.category, "A");
    assert_eq!(items(&batch), vec!["A1", "A2"]);
    assert!(d.accumulator().is_empty());
}

#[test]
fn reaching_max_size_flushes_immediately() {
    let t0 = Instant::now();
    let (mut d, flushed) = dispatcher(2, 500, t0);

    assert!(!d.add(record("A", "A1"), t0));
    assert!(d.add(record("A", "A2"), t0));

    let batch = flushed.try_recv().expect("flushed on size");
    assert_eq!(items(&batch), vec!["A1", "A2"]);
    assert!(d.accumulator().get("A").is_none());
}

#[test]
fn open_batches_never_exceed_max_size() {
    let t0 = Instant::now();
    let (mut d, flushed) = dispatcher(3, 500, t0);

    for i in 0..10 {
        let now = t0 + ms(i);
        let was_flushed = d.add(record("A", &format!("A{i}")), now);
        d.tick(was_flushed, now);
        assert!(d.accumulator().get("A").map_or(0, |b| b.len()) < 3);
    }

    let batches: Vec<Batch> = flushed.try_iter().collect();
    assert_eq!(batches.len(), 3);
    assert!(batches.iter().all(|b| b.len() == 3));
    assert_eq!(items(&batches[1]), vec!["A3", "A4", "A5"]);
    assert_eq!(d.accumulator().get("A").map(|b| b.len()), Some(1));
}

#[test]
fn sweep_after_size_flush_tracks_earliest_open_deadline() {
    let t0 = Instant::now();
    let (mut d, flushed) = dispatcher(2, 500, t0);

    d.add(record("B", "B1"), t0 + ms(100));
    d.add(record("A", "A1"), t0 + ms(200));
    let now = t0 + ms(250);
    let was_flushed = d.add(record("A", "A2"), now);
    d.tick(was_flushed, now);

    assert_eq!(flushed.try_iter().count(), 1);
    assert_eq!(d.next_wake(), t0 + ms(600), "B's deadline");
    assert_eq!(d.wait_for(now), ms(350));
}

#[test]
fn keys_keep_independent_deadlines() {
    let t0 = Instant::now();
    let (mut d, flushed) = dispatcher(10, 500, t0);

    d.add(record("A", "A1"), t0);
    d.add(record("B", "B1"), t0 + ms(300));

    let now = t0 + ms(501);
    d.tick(false, now);

    let first: Vec<Batch> = flushed.try_iter().collect();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].category, "A");
    assert_eq!(d.next_wake(), t0 + ms(800));
    assert_eq!(d.wait_for(now), ms(299));

    d.tick(false, t0 + ms(801));
    let second: Vec<Batch> = flushed.try_iter().collect();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].category, "B");
}

#[test]
fn wait_never_drops_below_minimum() {
    let t0 = Instant::now();
    let (d, _flushed) = dispatcher(3, 500, t0);

    let cases = [(0u64, ms(500)), (499, ms(1)), (500, MIN_WAIT), (10_000, MIN_WAIT)];
    for (elapsed, expected) in cases {
        assert_eq!(
            d.wait_for(t0 + ms(elapsed)),
            expected.max(MIN_WAIT),
            "elapsed {elapsed}ms"
        );
    }
}

#[test]
fn shutdown_drains_intake_and_flushes_everything() {
    let t0 = Instant::now();
    let (mut d, flushed) = dispatcher(2, 60_000, t0);
    let (tx, rx): (Sender<IncomingRecord>, _) = channel::unbounded();

    d.add(record("B", "B1"), t0);
    for item in ["A1", "A2", "A3", "C1"] {
        tx.send(record(&item[..1], item)).expect("send");
    }

    d.shutdown(&rx);

    let mut batches: Vec<(String, Vec<String>)> = flushed
        .try_iter()
        .map(|b| {
            let its = items(&b).into_iter().map(String::from).collect();
            (b.category, its)
        })
        .collect();
    batches.sort();

    assert_eq!(
        batches,
        vec![
            ("A".to_string(), vec!["A1".to_string(), "A2".to_string()]),
            ("A".to_string(), vec!["A3".to_string()]),
            ("B".to_string(), vec!["B1".to_string()]),
            ("C".to_string(), vec!["C1".to_string()]),
        ]
    );
    assert!(d.accumulator().is_empty());
    assert!(rx.is_empty());
}

#[test]
fn run_flushes_on_stop_with_real_time() {
    let (intake_tx, intake_rx) = channel::bounded(16);
    let (stop_tx, stop_rx) = channel::bounded::<()>(1);
    let (flush_tx, flushed) = channel::unbounded();

    let d = Dispatcher::new(&config(10, 60_000), Instant::now(), move |b| {
        let _ = flush_tx.send(b);
    });
    let handle = thread::spawn(move || run(d, intake_rx, stop_rx));

    intake_tx.send(record("B", "B1")).expect("send");
    thread::sleep(ms(50));
    assert!(flushed.try_recv().is_err(), "nothing due yet");

    drop(stop_tx);
    handle.join().expect("dispatcher thread");

    let batch = flushed.try_recv().expect("flushed by shutdown");
    assert_eq!(items(&batch), vec!["B1"]);
}

#[test]
fn panic_in_loop_still_runs_shutdown() {
    let (intake_tx, intake_rx) = channel::bounded(16);
    let (_stop_tx, stop_rx) = channel::bounded::<()>(1);
    let (flush_tx, flushed) = channel::unbounded();
    let calls = AtomicUsize::new(0);

    let d = Dispatcher::new(&config(1, 60_000), Instant::now(), move |b| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first flush fails");
        }
        let _ = flush_tx.send(b);
    });

    intake_tx.send(record("A", "A1")).expect("send");
    intake_tx.send(record("A", "A2")).expect("send");

    let handle = thread::spawn(move || run(d, intake_rx, stop_rx));
    handle.join().expect("run must not propagate the panic");

    let batch = flushed.recv_timeout(ms(1000)).expect("second record flushed");
    assert_eq!(items(&batch), vec!["A2"]);
}

#[test]
fn panicking_flush_does_not_lose_other_batches_on_shutdown() {
    let t0 = Instant::now();
    let (flush_tx, flushed) = channel::unbounded();
    let mut d = Dispatcher::new(&config(2, 60_000), t0, move |b: Batch| {
        if b.category == "bad" {
            panic!("flush refuses {b}");
        }
        let _ = flush_tx.send(b);
    });
    let (tx, rx): (Sender<IncomingRecord>, _) = channel::unbounded();

    d.add(record("A", "A1"), t0);
    d.add(record("bad", "x1"), t0);
    d.add(record("C", "C1"), t0);
    for (key, item) in [("bad", "x2"), ("D", "D1")] {
        tx.send(record(key, item)).expect("send");
    }

    d.shutdown(&rx);

    let mut categories: Vec<String> = flushed.try_iter().map(|b| b.category).collect();
    categories.sort();

    assert_eq!(categories, vec!["A", "C", "D"]);
    assert!(d.accumulator().is_empty());
    assert!(rx.is_empty());
}
