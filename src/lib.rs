//! `gracore`: a granularity-adaptive parallel execution core.
//!
//! A controller that decides, at every fork, whether to run a construct
//! in parallel or serially, based on an online cost model; threads a
//! per-worker execution-mode stack through recursive fork/join without
//! locks on the hot path; composes caller-imposed with callee-requested
//! policy; and produces results independent of the parallel decision.
//!
//! # Architecture
//!
//! - [`exec_mode`] — the per-worker execution-mode stack and its
//!   caller/callee combinator.
//! - [`cmeasure`] — the complexity measure passed to decision sites.
//! - [`estimator`] — the online cost estimator (`K · m` predictor).
//! - [`policy`] — the five decision-policy shapes plus the
//!   command-line-selectable multiplexer.
//! - [`cstmt`] — the controlled-statement decision site.
//! - [`fork_join`] — `fork2`, the fork/join primitive.
//! - [`parallel_for`] — eager binary splitting over an integer range.
//! - [`registry`] / [`job`] — the work-stealing worker pool `fork2`
//!   runs on.
//! - [`config`] / [`launch`] — the host entry point: argument parsing,
//!   pool lifecycle, timed `init`/`run`/`output`/`destroy`.
//!
//! # Example
//!
//! ```
//! use gracore::{parallel_for::parallel_for, policy::Policy, registry::Registry};
//!
//! let registry = Registry::new(4);
//! let data = std::sync::Mutex::new(vec![0i32; 1000]);
//! registry.install(|| {
//!     let policy = Policy::by_prediction("example");
//!     parallel_for(&policy, 0, 1000, |i| {
//!         data.lock().unwrap()[i as usize] += 1;
//!     });
//! });
//! registry.shutdown();
//! assert!(data.lock().unwrap().iter().all(|&x| x == 1));
//! ```

pub mod cmeasure;
pub mod config;
pub mod cstmt;
pub mod error;
pub mod estimator;
pub mod exec_mode;
pub mod fork_join;
pub mod job;
pub mod launch;
pub mod parallel_for;
pub mod policy;
pub mod registry;

pub use cmeasure::Cmeasure;
pub use cstmt::cstmt;
pub use exec_mode::ExecMode;
pub use fork_join::fork2;
pub use launch::launch;
pub use parallel_for::parallel_for;
pub use policy::Policy;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use std::sync::Mutex;

    /// S3: `fork2` under `ForceParallel`, each branch appending to a
    /// lock-protected list.
    #[test]
    fn s3_fork2_under_force_parallel_both_append() {
        let registry = Registry::new(2);
        let list: Mutex<Vec<char>> = Mutex::new(Vec::new());
        registry.install(|| {
            exec_mode::scoped_push(ExecMode::ForceParallel, || {
                fork2(
                    || list.lock().unwrap().push('A'),
                    || list.lock().unwrap().push('B'),
                )
            })
        });
        registry.shutdown();
        let mut items = list.into_inner().unwrap();
        items.sort();
        assert_eq!(items, vec!['A', 'B']);
    }

    /// Determinism of result (property 4, spec.md §8): summing a range
    /// in parallel under every policy shape gives the same total.
    #[test]
    fn sum_is_identical_under_every_policy() {
        let n = 2000i64;
        let expected: i64 = (0..n).sum();

        let run = |policy: Policy| {
            let registry = Registry::new(4);
            let total = Mutex::new(0i64);
            registry.install(|| {
                parallel_for(&policy, 0, n, |i| {
                    *total.lock().unwrap() += i;
                });
            });
            registry.shutdown();
            total.into_inner().unwrap()
        };

        assert_eq!(run(Policy::force_sequential()), expected);
        assert_eq!(run(Policy::force_parallel()), expected);
        assert_eq!(run(Policy::by_prediction("sum")), expected);
        assert_eq!(run(Policy::cutoff_without_reporting()), expected);
        assert_eq!(run(Policy::cutoff_with_reporting("sum")), expected);
    }
}
