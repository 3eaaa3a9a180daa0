//! Contention Tests
//!
//! Many threads running short random transactions over a handful of
//! resources, with deadlocks arising naturally. Checks that:
//! - no two transactions hold a resource at once
//! - committed increments are exactly what ends up in the resources
//! - every thread finishes (deadlocks are always broken)
//! - no transaction ever waits on a resource it owns

use crate::*;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use txnguard::SystemTimeProvider;

const NUM_RESOURCES: usize = 4;
const RESOURCES: [&str; NUM_RESOURCES] = ["R0", "R1", "R2", "R3"];

/// Per-thread tally of committed increments, indexed like `RESOURCES`
type Tally = [i64; NUM_RESOURCES];

/// Run one random transaction, retrying after deadlock aborts
///
/// Returns the increments that were committed (all zero if the transaction
/// chose to roll back).
fn run_one(manager: &Manager, holders: &[Mutex<Option<TxnId>>], rng: &mut StdRng) -> Tally {
    let me = TxnId::current();
    let mut order: Vec<usize> = (0..RESOURCES.len()).collect();
    order.shuffle(rng);
    let touches = rng.gen_range(1..=3);
    let plan: Vec<usize> = (0..touches)
        .map(|_| order[rng.gen_range(0..order.len())])
        .collect();
    let voluntary_rollback = rng.gen_bool(0.2);

    'retry: loop {
        manager.begin().unwrap();
        let mut tally = Tally::default();
        let mut held: Vec<usize> = Vec::new();

        for &r in &plan {
            match manager.operate(&rid(RESOURCES[r]), Inc) {
                Ok(()) => {
                    assert_eq!(manager.owner_of(&rid(RESOURCES[r])), Some(me));
                    if !held.contains(&r) {
                        let previous = holders[r].lock().replace(me);
                        assert_eq!(previous, None, "{} held twice", RESOURCES[r]);
                        held.push(r);
                    }
                    tally[r] += 1;
                }
                Err(e) => {
                    assert!(e.is_abort(), "unexpected error: {}", e);
                    assert!(manager.is_aborted());
                    for &r in &held {
                        holders[r].lock().take();
                    }
                    manager.rollback();
                    assert!(!manager.is_active());
                    thread::yield_now();
                    continue 'retry;
                }
            }
        }

        for &r in &held {
            holders[r].lock().take();
        }
        if voluntary_rollback {
            manager.rollback();
            return Tally::default();
        }
        match manager.commit() {
            Ok(()) => return tally,
            Err(e) => {
                // Aborted as a victim after the last operate returned.
                assert!(e.is_abort(), "unexpected error: {}", e);
                manager.rollback();
                continue 'retry;
            }
        }
    }
}

#[test]
fn test_random_contention_preserves_committed_state() {
    const NUM_THREADS: usize = 8;
    const TXNS_PER_THREAD: usize = 200;

    let manager = create_manager(&RESOURCES, Arc::new(SystemTimeProvider::new()));
    let holders: Arc<Vec<Mutex<Option<TxnId>>>> =
        Arc::new(RESOURCES.iter().map(|_| Mutex::new(None)).collect());
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let holders = Arc::clone(&holders);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(0x5eed + i as u64);
                let mut committed = Tally::default();
                barrier.wait();

                for _ in 0..TXNS_PER_THREAD {
                    let tally = run_one(&manager, &holders, &mut rng);
                    for (total, n) in committed.iter_mut().zip(tally) {
                        *total += n;
                    }
                }
                committed
            })
        })
        .collect();

    let mut expected = Tally::default();
    for h in handles {
        let committed = h.join().unwrap();
        for (total, n) in expected.iter_mut().zip(committed) {
            *total += n;
        }
    }

    for (r, name) in RESOURCES.iter().enumerate() {
        assert_eq!(value(&manager, name), expected[r], "{} lost updates", name);
    }
    assert_eq!(manager.lock_snapshot(), Default::default());

    let metrics = manager.metrics();
    assert_eq!(metrics.active_count, 0);
    assert_eq!(
        metrics.total_committed + metrics.total_rolled_back,
        (NUM_THREADS * TXNS_PER_THREAD) as u64 + metrics.deadlocks_detected,
        "every abort costs exactly one extra rollback"
    );
}

#[test]
fn test_no_transaction_waits_on_what_it_owns() {
    const NUM_THREADS: usize = 6;
    const TXNS_PER_THREAD: usize = 150;

    let manager = create_manager(&RESOURCES, Arc::new(SystemTimeProvider::new()));
    let holders: Arc<Vec<Mutex<Option<TxnId>>>> =
        Arc::new(RESOURCES.iter().map(|_| Mutex::new(None)).collect());
    let done = Arc::new(AtomicBool::new(false));

    let sampler = {
        let manager = Arc::clone(&manager);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let snapshot = manager.lock_snapshot();
                for (waiter, resource) in &snapshot.waits {
                    assert!(
                        !snapshot.owners.contains(&(resource.clone(), *waiter)),
                        "{} waits on {} which it owns",
                        waiter,
                        resource
                    );
                }
                thread::yield_now();
            }
        })
    };

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let holders = Arc::clone(&holders);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(0xdead + i as u64);
                for _ in 0..TXNS_PER_THREAD {
                    run_one(&manager, &holders, &mut rng);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    sampler.join().unwrap();
    assert_eq!(manager.metrics().active_count, 0);
}
