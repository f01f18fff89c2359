//! Property tests for `RefCounted` retain/release accounting.

use nori_raft_rpc::RefCounted;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    /// Retain through the handle at `pick % len`.
    Retain(usize),
    /// Release the handle at `pick % len`.
    Release(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<usize>().prop_map(Op::Retain),
        any::<usize>().prop_map(Op::Release),
    ]
}

fn tracked() -> (RefCounted<Vec<u8>>, Arc<AtomicUsize>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    let handle = RefCounted::with_release(vec![0u8; 16], move |_| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
    });
    (handle, fired)
}

proptest! {
    /// The release action fires exactly once, on the last matching release.
    #[test]
    fn prop_release_fires_once_after_last_unit(ops in prop::collection::vec(arb_op(), 0..200)) {
        let (first, fired) = tracked();
        let mut live = vec![first];

        for op in ops {
            if live.is_empty() {
                break;
            }
            match op {
                Op::Retain(pick) => {
                    let retained = live[pick % live.len()].retain();
                    live.push(retained);
                }
                Op::Release(pick) => {
                    let handle = live.swap_remove(pick % live.len());
                    let was_last = handle.release();
                    prop_assert_eq!(was_last, live.is_empty());
                }
            }

            if let Some(any_handle) = live.first() {
                prop_assert_eq!(any_handle.ref_count(), live.len());
                prop_assert_eq!(fired.load(Ordering::SeqCst), 0);
            }
        }

        for handle in live.drain(..) {
            handle.release();
        }
        prop_assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    /// Cross-thread interleavings still fire the release action exactly once.
    #[test]
    fn prop_concurrent_release_fires_once(per_thread in prop::collection::vec(0usize..50, 1..8)) {
        let (first, fired) = tracked();

        let threads: Vec<_> = per_thread
            .into_iter()
            .map(|extra| {
                let mine = first.retain();
                std::thread::spawn(move || {
                    let retained: Vec<_> = (0..extra).map(|_| mine.retain()).collect();
                    let mut lasts = 0;
                    for handle in retained {
                        if handle.release() {
                            lasts += 1;
                        }
                    }
                    if mine.release() {
                        lasts += 1;
                    }
                    lasts
                })
            })
            .collect();

        let lasts_in_threads: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        prop_assert_eq!(lasts_in_threads, 0);
        prop_assert_eq!(fired.load(Ordering::SeqCst), 0);

        prop_assert!(first.release());
        prop_assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
