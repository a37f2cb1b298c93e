//! S4 (spec.md §8): a deterministic weighted graph relaxed under every
//! policy shape gives the identical distance array — property 4
//! (determinism of result) exercised end-to-end through `launch` +
//! `parallel_for` + `fork2`, rather than as a crate module (graph
//! algorithms are an external collaborator, out of scope per spec.md
//! §1). Self-contained array-based relaxation only, not the source's
//! `adjlist`/`edgelist` types.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use gracore::policy::Policy;
use gracore::registry::Registry;
use gracore::{fork2, parallel_for};

const INF: i64 = i64::MAX / 2;

/// `V=4`, edges `(0→1, 2), (1→2, 3), (2→3, 1), (0→3, 10)`, source 0.
const EDGES: [(usize, usize, i64); 4] = [(0, 1, 2), (1, 2, 3), (2, 3, 1), (0, 3, 10)];
const NUM_VERTICES: usize = 4;
const SOURCE: usize = 0;

fn bellman_ford(policy: &Policy) -> Vec<i64> {
    let dist: Vec<AtomicI64> = (0..NUM_VERTICES)
        .map(|v| AtomicI64::new(if v == SOURCE { 0 } else { INF }))
        .collect();

    // Bellman-Ford needs |V|-1 relaxation rounds to guarantee
    // convergence on a graph with this many vertices.
    for _ in 0..NUM_VERTICES.saturating_sub(1) {
        parallel_for(policy, 0, EDGES.len() as i64, |i| {
            let (u, v, w) = EDGES[i as usize];
            let du = dist[u].load(Ordering::SeqCst);
            if du == INF {
                return;
            }
            let candidate = du + w;
            // Relaxation must be commutative/associative under
            // concurrent visits (spec.md §5): a compare-and-swap loop
            // keeps the minimum regardless of visit order.
            let mut current = dist[v].load(Ordering::SeqCst);
            while candidate < current {
                match dist[v].compare_exchange_weak(current, candidate, Ordering::SeqCst, Ordering::SeqCst) {
                    Ok(_) => break,
                    Err(observed) => current = observed,
                }
            }
        });
    }

    dist.iter().map(|d| d.load(Ordering::SeqCst)).collect()
}

fn run_under(policy: Policy) -> Vec<i64> {
    let registry = Registry::new(4);
    let result = registry.install(|| bellman_ford(&policy));
    registry.shutdown();
    result
}

#[test]
fn s4_bellman_ford_agrees_across_every_policy() {
    let expected = vec![0i64, 2, 5, 6];

    assert_eq!(run_under(Policy::force_sequential()), expected);
    assert_eq!(run_under(Policy::force_parallel()), expected);
    assert_eq!(run_under(Policy::by_prediction("bf")), expected);
    assert_eq!(run_under(Policy::cutoff_without_reporting()), expected);
    assert_eq!(run_under(Policy::cutoff_with_reporting("bf")), expected);

    let by_cmdline = Policy::by_cmdline("bf");
    for name in [
        "by_force_parallel",
        "by_force_sequential",
        "by_cutoff_without_reporting",
        "by_cutoff_with_reporting",
        "by_prediction",
    ] {
        if let Policy::ByCmdline(ref b) = by_cmdline {
            b.set(name).unwrap();
        }
        let registry = Registry::new(4);
        let result = registry.install(|| bellman_ford(&by_cmdline));
        registry.shutdown();
        assert_eq!(result, expected, "mismatch under ByCmdline({name})");
    }
}

/// Property 6: after `fork2` returns, writes from both branches are
/// visible to the caller.
#[test]
fn fork2_completion_makes_both_writes_visible() {
    let registry = Registry::new(2);
    let list: Mutex<Vec<i32>> = Mutex::new(Vec::new());
    registry.install(|| {
        fork2(
            || list.lock().unwrap().push(1),
            || list.lock().unwrap().push(2),
        )
    });
    registry.shutdown();
    let mut items = list.into_inner().unwrap();
    items.sort();
    assert_eq!(items, vec![1, 2]);
}

/// Property 1 (mode-stack balance): deep recursive `fork2` nesting
/// leaves the per-worker mode stack intact — if a push/pop ever leaked,
/// `exec_mode::current()` would drift and this recursive count, run
/// under a fixed `ForceSequential` root, would not match the sequential
/// reference count.
#[test]
fn mode_stack_stays_balanced_through_deep_fork2_recursion() {
    use gracore::exec_mode;

    fn recurse(depth: usize) -> usize {
        if depth == 0 {
            return 0;
        }
        assert_eq!(exec_mode::current(), gracore::ExecMode::ForceSequential);
        let (a, b) = fork2(|| recurse(depth - 1), || recurse(depth - 1));
        a + b + 1
    }

    let registry = Registry::new(4);
    let total = registry.install(|| {
        exec_mode::scoped_push(gracore::ExecMode::ForceSequential, || recurse(12))
    });
    registry.shutdown();
    assert_eq!(total, (1usize << 12) - 1);
}
