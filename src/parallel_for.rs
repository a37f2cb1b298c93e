//! Eager binary splitting over an integer range, built on `cstmt` +
//! `fork2` (spec.md §4.5). Mirrors the source's
//! `loop_by_eager_binary_splitting` + its three `parallel_for`
//! overloads (full signature, complexity-only, and the bare
//! `lo, hi, body` default).

use crate::cmeasure::Cmeasure;
use crate::cstmt::cstmt;
use crate::policy::Policy;

/// Default loop cutoff: `hi - lo <= 10_000`, the source's
/// `default_loop_cutoff` carried verbatim.
pub const DEFAULT_LOOP_CUTOFF: i64 = 10_000;

/// Full form: an explicit loop cutoff predicate and loop complexity
/// function, both taking `(lo, hi)`.
pub fn parallel_for_with<LoopCutoff, LoopComplexity>(
    policy: &Policy,
    loop_cutoff: LoopCutoff,
    loop_complexity: LoopComplexity,
    lo: i64,
    hi: i64,
    body: impl Fn(i64) + Sync,
) where
    LoopCutoff: Fn(i64, i64) -> bool + Sync,
    LoopComplexity: Fn(i64, i64) -> Cmeasure + Sync,
{
    go(policy, &loop_cutoff, &loop_complexity, lo, hi, &body);
}

fn go(
    policy: &Policy,
    loop_cutoff: &(impl Fn(i64, i64) -> bool + Sync),
    loop_complexity: &(impl Fn(i64, i64) -> Cmeasure + Sync),
    lo: i64,
    hi: i64,
    body: &(impl Fn(i64) + Sync),
) {
    if hi - lo < 2 {
        for i in lo..hi {
            body(i);
        }
        return;
    }

    let mid = lo + (hi - lo) / 2;
    let par = || {
        crate::fork_join::fork2(
            || go(policy, loop_cutoff, loop_complexity, lo, mid, body),
            || go(policy, loop_cutoff, loop_complexity, mid, hi, body),
        );
    };
    let seq = || {
        for i in lo..hi {
            body(i);
        }
    };

    cstmt(
        policy,
        Some(|| loop_cutoff(lo, hi)),
        Some(|| loop_complexity(lo, hi)),
        par,
        Some(seq),
    );
}

/// Complexity-only form: no cutoff predicate, so `policy` must be a
/// shape that never consults one (`ByPrediction`) — `ByCmdline` is
/// accepted too but will panic if its selector is ever switched to a
/// cutoff-consuming shape while used this way, exactly as the source's
/// `todo()`-backed stand-in cutoff function would abort if reached.
pub fn parallel_for_by_complexity(
    policy: &Policy,
    loop_complexity: impl Fn(i64, i64) -> Cmeasure + Sync,
    lo: i64,
    hi: i64,
    body: impl Fn(i64) + Sync,
) {
    let no_cutoff = |_lo: i64, _hi: i64| -> bool {
        crate::error::fatal_invariant(
            "parallel_for_by_complexity requires a policy that never consults its cutoff predicate",
        )
    };
    parallel_for_with(policy, no_cutoff, loop_complexity, lo, hi, body);
}

/// Default form: cutoff = `hi - lo <= DEFAULT_LOOP_CUTOFF`, complexity
/// = `hi - lo` (spec.md §4.5's stated defaults).
pub fn parallel_for(policy: &Policy, lo: i64, hi: i64, body: impl Fn(i64) + Sync) {
    parallel_for_with(
        policy,
        |lo, hi| hi - lo <= DEFAULT_LOOP_CUTOFF,
        |lo, hi| Cmeasure::value((hi - lo) as f64),
        lo,
        hi,
        body,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// S1: every index visited exactly once.
    #[test]
    fn s1_every_index_incremented_exactly_once() {
        let registry = Registry::new(4);
        let n = 10_000usize;
        let counters: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
        registry.install(|| {
            let policy = Policy::by_prediction("s1");
            parallel_for_with(
                &policy,
                |lo, hi| hi - lo <= 64,
                |lo, hi| Cmeasure::value((hi - lo) as f64),
                0,
                n as i64,
                |i| {
                    counters[i as usize].fetch_add(1, Ordering::SeqCst);
                },
            );
        });
        registry.shutdown();
        assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    /// S2: under ByCmdline set to by_force_sequential, exactly one
    /// distinct worker id is ever recorded (no fork actually happens).
    #[test]
    fn s2_force_sequential_never_forks() {
        let registry = Registry::new(4);
        let ids = std::sync::Mutex::new(Vec::new());
        registry.install(|| {
            let policy = Policy::by_cmdline("s2");
            if let Policy::ByCmdline(b) = &policy {
                b.set("by_force_sequential").unwrap();
            }
            parallel_for(&policy, 0, 100, |_i| {
                ids.lock().unwrap().push(std::thread::current().id());
            });
        });
        registry.shutdown();
        let ids = ids.into_inner().unwrap();
        let distinct: std::collections::HashSet<_> = ids.into_iter().collect();
        assert_eq!(distinct.len(), 1);
    }

    #[test]
    fn small_range_below_leaf_threshold_runs_directly() {
        let registry = Registry::new(2);
        let seen = std::sync::Mutex::new(Vec::new());
        registry.install(|| {
            let policy = Policy::by_prediction("tiny-range");
            parallel_for(&policy, 5, 6, |i| seen.lock().unwrap().push(i));
        });
        registry.shutdown();
        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }

    #[test]
    fn empty_range_runs_nothing() {
        let registry = Registry::new(2);
        let seen = std::sync::Mutex::new(Vec::new());
        registry.install(|| {
            let policy = Policy::by_prediction("empty-range");
            parallel_for(&policy, 5, 5, |i| seen.lock().unwrap().push(i));
        });
        registry.shutdown();
        assert!(seen.lock().unwrap().is_empty());
    }
}
