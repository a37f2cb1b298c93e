//! Per-worker execution mode: the coercion applied to every decision site
//! until the enclosing scope exits.
//!
//! Mirrors the source's `dynidentifier`/`execmode` pair: a thread-local
//! stack with scoped push/pop (`scoped_push` below) standing in for the
//! template "block" helper, since Rust's `Drop` gives us the same
//! guaranteed-release-on-every-exit-path semantics without a template.

use std::cell::RefCell;

/// The granularity-control configuration in force at a decision site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    ForceParallel,
    ForceSequential,
    Sequential,
    Parallel,
}

/// Combine a caller's mode `p` with a callee's requested mode `c`.
///
/// Callee `Force*` always wins; otherwise a `Sequential` caller locks its
/// descendants to `Sequential` (sequential containment, property 3 in
/// spec.md §8); otherwise the callee's request is honored.
pub fn combine(p: ExecMode, c: ExecMode) -> ExecMode {
    if matches!(c, ExecMode::ForceParallel | ExecMode::ForceSequential) {
        return c;
    }
    if p == ExecMode::Sequential {
        return ExecMode::Sequential;
    }
    c
}

thread_local! {
    static MODE_STACK: RefCell<Vec<ExecMode>> = RefCell::new(vec![ExecMode::Parallel]);
}

/// The mode in force for the calling thread right now. Never panics: the
/// stack is seeded with `Parallel` and is never popped below one entry
/// (invariant 1 in spec.md §3).
pub fn current() -> ExecMode {
    MODE_STACK.with(|s| *s.borrow().last().expect("exec mode stack is never empty"))
}

/// RAII guard that pops the mode stack on drop, including during unwind,
/// so a panicking body still leaves the stack balanced (property 1 in
/// spec.md §8).
struct PopGuard;

impl Drop for PopGuard {
    fn drop(&mut self) {
        MODE_STACK.with(|s| {
            s.borrow_mut()
                .pop()
                .expect("exec mode stack underflow: pop without matching push");
        });
    }
}

/// Push `mode`, run `body`, and pop on every exit path (normal return or
/// panic).
pub fn scoped_push<R>(mode: ExecMode, body: impl FnOnce() -> R) -> R {
    MODE_STACK.with(|s| s.borrow_mut().push(mode));
    let _guard = PopGuard;
    body()
}

/// Current depth of this thread's mode stack, for balance assertions in tests.
#[cfg(test)]
pub(crate) fn depth() -> usize {
    MODE_STACK.with(|s| s.borrow().len())
}
