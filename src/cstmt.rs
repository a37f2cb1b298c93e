//! `cstmt`: the single decision point every granularity-controlled
//! algorithm body passes through (spec.md §4.3).
//!
//! Mirrors the source's `cstmt`/`cstmt_base`/`cstmt_base_with_reporting`
//! trio: where the C++ overloaded on the presence of a `cutoff_fct`,
//! `complexity_measure_fct` and an `estimator` pointer, here
//! [`crate::policy::Policy::kind`] picks the one branch that needs them,
//! matched once.

use std::time::Instant;

use crate::cmeasure::Cmeasure;
use crate::exec_mode::{self, combine, ExecMode};
use crate::policy::{forced_mode, Kind, Policy};

/// Run `par_body` or `seq_body` under `policy`'s decision for this site,
/// combined with the caller's current [`exec_mode`].
///
/// `cutoff` is the caller's cutoff predicate (spec.md's `Cutoff_fct`),
/// consulted by `CutoffWithoutReporting`/`CutoffWithReporting` and
/// ignored by the other three shapes. `complexity` is the caller's
/// complexity measure (spec.md's `Complexity_measure_fct`), consulted by
/// `ByPrediction` unconditionally and by `CutoffWithReporting` only once
/// the cutoff predicate has committed to a sequential decision — the
/// ordering spec.md §4.3 requires ("cutoff predicate always evaluated
/// before the complexity function"). `seq_body` defaults to `par_body`
/// when `None`.
///
/// Under [`crate::config::sequential_baseline`] every policy
/// short-circuits straight to the sequential body with no mode
/// manipulation at all (spec.md §4.3's `SEQUENTIAL_BASELINE` toggle).
pub fn cstmt<R>(
    policy: &Policy,
    cutoff: Option<impl FnOnce() -> bool>,
    complexity: Option<impl FnOnce() -> Cmeasure>,
    par_body: impl FnOnce() -> R,
    seq_body: Option<impl FnOnce() -> R>,
) -> R {
    if crate::config::sequential_baseline() {
        return match seq_body {
            Some(seq) => seq(),
            None => par_body(),
        };
    }

    let kind = policy.kind();

    if let Some(mode) = forced_mode(kind) {
        let run_seq = matches!(mode, ExecMode::ForceSequential);
        return run_under(mode, run_seq, seq_body, par_body);
    }

    match kind {
        Kind::CutoffWithoutReporting => {
            let sequential = cutoff.expect("CutoffWithoutReporting requires a cutoff predicate")();
            let mode = combine(exec_mode::current(), if sequential { ExecMode::Sequential } else { ExecMode::Parallel });
            run_under(mode, sequential, seq_body, par_body)
        }
        Kind::CutoffWithReporting => {
            let sequential = cutoff.expect("CutoffWithReporting requires a cutoff predicate")();
            if sequential {
                let m = complexity.expect("CutoffWithReporting requires a complexity function")();
                let mode = combine(exec_mode::current(), ExecMode::Sequential);
                run_sequential_with_reporting(mode, policy, m, seq_body, par_body)
            } else {
                let mode = combine(exec_mode::current(), ExecMode::Parallel);
                run_under(mode, false, None::<fn() -> R>, par_body)
            }
        }
        Kind::ByPrediction => {
            let m = complexity.expect("ByPrediction requires a complexity function")();
            // `requested` (pre-combine) is this site's own decision and is
            // what picks the body and drives reporting; `mode` (post-combine)
            // only controls what descendants observe via `exec_mode::current`.
            // A `Sequential` ancestor can downgrade `mode` to `Sequential`
            // even when `requested` is `Parallel` (nested divide-and-conquer
            // under an outer sequential leaf) — the parallel body still runs
            // at this site, just with descendants locked sequential.
            let requested = decide_by_prediction(m, policy);
            let mode = combine(exec_mode::current(), requested);
            match requested {
                ExecMode::Sequential => run_sequential_with_reporting(mode, policy, m, seq_body, par_body),
                ExecMode::Parallel => run_under(mode, false, None::<fn() -> R>, par_body),
                ExecMode::ForceParallel | ExecMode::ForceSequential => {
                    unreachable!("decide_by_prediction never requests a Force* mode")
                }
            }
        }
        Kind::ForceParallel | Kind::ForceSequential => unreachable!("handled by forced_mode above"),
    }
}

fn decide_by_prediction(m: Cmeasure, policy: &Policy) -> ExecMode {
    match m {
        Cmeasure::Tiny => ExecMode::Sequential,
        Cmeasure::Undefined => ExecMode::Parallel,
        Cmeasure::Value(v) => {
            let predicted = policy
                .estimator()
                .expect("ByPrediction policy always has an estimator")
                .predict(v);
            if predicted <= crate::config::kappa_secs() {
                ExecMode::Sequential
            } else {
                ExecMode::Parallel
            }
        }
    }
}

/// Push `mode` for the benefit of descendants, then run `seq_body` (falling
/// back to `par_body` when absent) if `run_seq` is true, else `par_body`.
///
/// `run_seq` is deliberately the *site's own* pre-combine decision, not
/// derived from `mode`: `mode` may differ from what this site decided (a
/// `Sequential` ancestor downgrades it) without retroactively changing which
/// body this call executes — only what nested decision sites observe.
fn run_under<R>(
    mode: ExecMode,
    run_seq: bool,
    seq_body: Option<impl FnOnce() -> R>,
    par_body: impl FnOnce() -> R,
) -> R {
    exec_mode::scoped_push(mode, || {
        if run_seq {
            match seq_body {
                Some(seq) => seq(),
                None => par_body(),
            }
        } else {
            par_body()
        }
    })
}

/// Time the sequential branch and report `(m, elapsed)` to `policy`'s
/// estimator afterward — `cstmt_base_with_reporting` in the source.
/// Pushes `Sequential`/`ForceSequential` directly rather than
/// re-combining: by this point the combinator has already run (matches
/// the source, which calls `execmode.mine().block(Sequential, ...)`
/// unconditionally inside `cstmt_base_with_reporting` regardless of how
/// the caller arrived at a sequential decision).
fn run_sequential_with_reporting<R>(
    mode: ExecMode,
    policy: &Policy,
    m: Cmeasure,
    seq_body: Option<impl FnOnce() -> R>,
    par_body: impl FnOnce() -> R,
) -> R {
    exec_mode::scoped_push(mode, || {
        let start = Instant::now();
        let result = match seq_body {
            Some(seq) => seq(),
            None => par_body(),
        };
        let elapsed = start.elapsed().as_secs_f64();
        if let Some(estimator) = policy.estimator() {
            estimator.report(m, elapsed);
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_cutoff() -> Option<fn() -> bool> {
        None
    }
    fn no_complexity() -> Option<fn() -> Cmeasure> {
        None
    }

    #[test]
    fn force_parallel_always_takes_par_body() {
        let result = cstmt(&Policy::force_parallel(), no_cutoff(), no_complexity(), || "par", Some(|| "seq"));
        assert_eq!(result, "par");
    }

    #[test]
    fn force_sequential_always_takes_seq_body() {
        let result = cstmt(&Policy::force_sequential(), no_cutoff(), no_complexity(), || "par", Some(|| "seq"));
        assert_eq!(result, "seq");
    }

    #[test]
    fn missing_seq_body_falls_back_to_par_body() {
        let result: i32 = cstmt(
            &Policy::force_sequential(),
            no_cutoff(),
            no_complexity(),
            || 99,
            None::<fn() -> i32>,
        );
        assert_eq!(result, 99);
    }

    #[test]
    fn cutoff_without_reporting_true_runs_sequential() {
        let result = cstmt(
            &Policy::cutoff_without_reporting(),
            Some(|| true),
            no_complexity(),
            || "par",
            Some(|| "seq"),
        );
        assert_eq!(result, "seq");
    }

    #[test]
    fn cutoff_without_reporting_false_runs_parallel() {
        let result = cstmt(
            &Policy::cutoff_without_reporting(),
            Some(|| false),
            no_complexity(),
            || "par",
            Some(|| "seq"),
        );
        assert_eq!(result, "par");
    }

    /// Same class of fix as `by_prediction_parallel_request_runs_par_body_under_sequential_ancestor`:
    /// a cutoff predicate that answers "false" (go parallel) must still run
    /// the parallel body at this site even when an ambient `Sequential`
    /// ancestor downgrades what descendants observe.
    #[test]
    fn cutoff_without_reporting_false_runs_parallel_under_sequential_ancestor() {
        let observed = exec_mode::scoped_push(ExecMode::Sequential, || {
            cstmt(
                &Policy::cutoff_without_reporting(),
                Some(|| false),
                no_complexity(),
                || exec_mode::current(),
                Some(|| unreachable!("cutoff answered false; seq_body must not run")),
            )
        });
        assert_eq!(observed, ExecMode::Sequential);
    }

    /// S5: cutoff = (depth > 20) at depth 25 — sequential body runs,
    /// estimator (there is none here) unchanged.
    #[test]
    fn s5_cutoff_predicate_independent_of_complexity() {
        let depth = 25;
        let result = cstmt(
            &Policy::cutoff_without_reporting(),
            Some(|| depth > 20),
            no_complexity(),
            || "par",
            Some(|| "seq"),
        );
        assert_eq!(result, "seq");
    }

    #[test]
    fn cutoff_with_reporting_feeds_estimator_only_on_sequential_path() {
        let policy = Policy::cutoff_with_reporting("t");
        let result = cstmt(
            &policy,
            Some(|| true),
            Some(|| Cmeasure::value(10.0)),
            || unreachable!(),
            Some(|| "seq"),
        );
        assert_eq!(result, "seq");
        assert!(policy.estimator().unwrap().is_initialized());
    }

    #[test]
    fn cutoff_with_reporting_skips_complexity_on_parallel_path() {
        let policy = Policy::cutoff_with_reporting("t");
        let result = cstmt(
            &policy,
            Some(|| false),
            no_complexity(),
            || "par",
            Some(|| unreachable!()),
        );
        assert_eq!(result, "par");
        assert!(!policy.estimator().unwrap().is_initialized());
    }

    #[test]
    fn sequential_mode_propagates_to_nested_cstmt() {
        let outer = Policy::force_sequential();
        let inner = Policy::force_parallel();
        let observed = cstmt(
            &outer,
            no_cutoff(),
            no_complexity(),
            || unreachable!("force_sequential never takes par_body"),
            Some(|| {
                cstmt(
                    &inner,
                    no_cutoff(),
                    no_complexity(),
                    || exec_mode::current(),
                    Some(|| exec_mode::current()),
                )
            }),
        );
        // combine() only locks descendants for a *plain* Sequential
        // parent; here the parent mode is ForceSequential, which loses
        // to the inner ForceParallel request exactly as the combinator
        // table specifies (callee Force* always wins).
        assert_eq!(observed, ExecMode::ForceParallel);
    }

    #[test]
    fn by_prediction_converges_through_repeated_cstmt_calls() {
        let policy = Policy::by_prediction("cstmt-test");
        policy.initialize(0.0001); // seed near-zero so the first call is sequential
        for _ in 0..50 {
            cstmt(
                &policy,
                no_cutoff(),
                Some(|| Cmeasure::value(100.0)),
                || unreachable!(),
                Some(|| ()),
            );
        }
        let mode = decide_by_prediction(Cmeasure::value(100.0), &policy);
        assert_eq!(mode, ExecMode::Sequential);
    }

    #[test]
    fn by_prediction_undefined_always_parallel() {
        let policy = Policy::by_prediction("t");
        policy.initialize(1e9); // huge K: every finite measure would predict "too slow"
        let result = cstmt(
            &policy,
            no_cutoff(),
            Some(|| Cmeasure::Undefined),
            || "par",
            Some(|| unreachable!()),
        );
        assert_eq!(result, "par");
    }

    /// A `Sequential` ancestor downgrades what this site's descendants
    /// observe, but must not retroactively change *this* site's own
    /// par-vs-seq decision: the body run and whether a sample is reported
    /// are keyed off this site's pre-combine request, not the post-combine
    /// mode pushed for descendants.
    #[test]
    fn by_prediction_parallel_request_runs_par_body_under_sequential_ancestor() {
        let policy = Policy::by_prediction("nested");
        policy.initialize(1e9); // huge K: this site's own request is Parallel
        let observed = exec_mode::scoped_push(ExecMode::Sequential, || {
            cstmt(
                &policy,
                no_cutoff(),
                Some(|| Cmeasure::value(1.0)),
                || exec_mode::current(),
                Some(|| unreachable!("this site requested Parallel; seq_body must not run")),
            )
        });
        // par_body ran, and observed the Sequential ancestor's lock on
        // descendants — the combinator's effect on nested sites, not on
        // this call's own body choice.
        assert_eq!(observed, ExecMode::Sequential);
        // A Parallel request never reports a sample: K is unchanged from
        // the seed.
        assert_eq!(policy.estimator().unwrap().predict(1.0), 1e9);
    }

    #[test]
    fn by_prediction_tiny_always_sequential_and_reports() {
        let policy = Policy::by_prediction("t");
        let result = cstmt(
            &policy,
            no_cutoff(),
            Some(|| Cmeasure::Tiny),
            || unreachable!(),
            Some(|| "seq"),
        );
        assert_eq!(result, "seq");
        // Tiny measures are never reported (m > 0 required), so the
        // estimator stays uninitialized.
        assert!(!policy.estimator().unwrap().is_initialized());
    }

    #[test]
    fn sequential_baseline_short_circuits_every_policy() {
        crate::config::set_sequential_baseline(true);
        let result = cstmt(
            &Policy::force_parallel(),
            no_cutoff(),
            no_complexity(),
            || unreachable!("baseline always takes seq_body"),
            Some(|| "seq"),
        );
        crate::config::set_sequential_baseline(false);
        assert_eq!(result, "seq");
    }
}
