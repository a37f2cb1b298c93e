//! `fork2`: run two closures, potentially in parallel, and return both
//! results (spec.md §4.4).
//!
//! One branch (`b`) is published as a job a sibling worker can steal; the
//! other (`a`) always runs on the calling thread. If nothing steals `b`
//! before the caller is done with `a`, the caller steals its own job back
//! and runs it itself — the same "stack of one" degradation the teacher's
//! pools don't need (they never await their own tasks) but that `fork2`
//! requires to stay correct even with zero idle workers.

use std::panic::{self, AssertUnwindSafe};

use crate::exec_mode::{self, ExecMode};
use crate::job::StackJob;
use crate::registry;

/// Run `a` and `b`, returning `(a(), b())`.
///
/// Reads the caller's current [`exec_mode`] once (honoring
/// [`crate::config::sequential_elision`], which forces it to
/// `Sequential` regardless of what the caller is actually in — spec.md
/// §4.3 / §8 S6). If that mode is `Sequential` or `ForceSequential`,
/// `a` then `b` run in the calling thread, in that order, with no mode
/// manipulation (the mode is already in force). Otherwise each body
/// runs under a fresh [`exec_mode::scoped_push`] of the *inherited*
/// mode — required because `b` may execute on a different worker
/// thread with its own independent mode stack (spec.md §4.4: "each
/// child body executes under a fresh scoped push of the inherited
/// mode"), mirroring the source's `execmode.mine().block(mode, f1)` /
/// `block(mode, f2)` pair inside `native::fork2`.
///
/// If a panic escapes either closure it is caught, the other branch is
/// still joined to preserve the worker's deque invariants, and the
/// panic is re-raised on the caller's thread afterward — matching "the
/// sibling is always joined... one failure is re-raised" (spec.md §7).
pub fn fork2<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    let mode = if crate::config::sequential_elision() {
        ExecMode::Sequential
    } else {
        exec_mode::current()
    };

    if matches!(mode, ExecMode::Sequential | ExecMode::ForceSequential) {
        let a_result = panic::catch_unwind(AssertUnwindSafe(a));
        let b_result = panic::catch_unwind(AssertUnwindSafe(b));
        return unwrap_both(a_result, b_result);
    }

    if !registry::is_worker_thread() {
        // No deque to steal from; run both inline, sequentially, the way
        // `rayon::join` degrades outside its own thread pool. Still
        // pushed under `mode` so nested `cstmt` sites see the correct
        // combinator input.
        let a_result = exec_mode::scoped_push(mode, || panic::catch_unwind(AssertUnwindSafe(a)));
        let b_result = exec_mode::scoped_push(mode, || panic::catch_unwind(AssertUnwindSafe(b)));
        return unwrap_both(a_result, b_result);
    }

    let job_b = StackJob::new(move || {
        exec_mode::scoped_push(mode, || panic::catch_unwind(AssertUnwindSafe(b)))
    });
    // SAFETY: `job_b` is joined (via `job_b.join()`) before it is dropped
    // at the end of this function, so the JobRef below never outlives it.
    let job_b_ref = unsafe { job_b.as_job_ref() };
    registry::push_local(job_b_ref);

    let a_result = exec_mode::scoped_push(mode, || panic::catch_unwind(AssertUnwindSafe(a)));

    // If nobody stole `job_b` while we ran `a`, it is still sitting on
    // our own local deque: reclaim and run it ourselves. Worth doing
    // unconditionally, not just under a single-worker registry — it's
    // pure upside whenever the steal hasn't happened yet, and it is load-
    // bearing for correctness when no other worker could ever have run it
    // (a one-worker pool, or every sibling currently busy).
    if let Some(reclaimed) = registry::pop_local() {
        reclaimed.execute();
    }
    let b_result = job_b.join();

    unwrap_both(a_result, b_result)
}

fn unwrap_both<RA, RB>(
    a: std::thread::Result<RA>,
    b: std::thread::Result<RB>,
) -> (RA, RB) {
    match (a, b) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(payload), Ok(_)) | (Err(payload), Err(_)) => panic::resume_unwind(payload),
        (Ok(_), Err(payload)) => panic::resume_unwind(payload),
    }
}
