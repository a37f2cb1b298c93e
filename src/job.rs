//! Type-erased, stack-allocated job for [`crate::fork_join::fork2`].
//!
//! The teacher's pools (`EvalThreadPool`, `PriorityQueue`) box every task as
//! `Box<dyn FnOnce() + Send + 'static>` — fine when a task outlives the call
//! that spawned it, wrong for `fork2`, whose whole point (spec.md §4.3,
//! `fork2` on non-`'static` closures in the testable-properties list) is to
//! let a worker steal a closure that *borrows the caller's stack frame*,
//! because `fork2` never returns until both branches have run.
//!
//! This mirrors the approach rayon's internal `job` module uses: the
//! closure and its eventual result live in caller-owned storage on the
//! stack ([`StackJob`]); only a thin, `'static`-looking [`JobRef`] (a raw
//! pointer plus a harness function pointer) crosses into the work-stealing
//! deque. Soundness rests entirely on the caller joining the job (blocking
//! until `execute` has run) before the `StackJob` is dropped — never on any
//! lifetime the type system can see, which is why the harness is `unsafe`.

use std::cell::UnsafeCell;

use parking_lot::{Condvar, Mutex};

/// A reference to a job that a worker can pull off a deque and run.
///
/// Type-erased: the real closure type is hidden behind `harness`, a
/// function pointer that knows how to downcast `job` back to the concrete
/// `StackJob` and invoke it. Declared `Send` by fiat — see the safety note
/// on [`JobRef::new`].
#[derive(Copy, Clone)]
pub struct JobRef {
    job: *const (),
    harness: unsafe fn(*const ()),
}

// SAFETY: a `JobRef` is only ever constructed from a `StackJob` that the
// producing thread keeps alive (by blocking on its latch) until the
// consuming thread has finished calling `harness`. No two threads ever run
// the harness for the same `JobRef`, and the pointee is not accessed after
// the job completes.
unsafe impl Send for JobRef {}

impl JobRef {
    /// # Safety
    /// The caller must ensure `job` remains valid and exclusively owned by
    /// the executing thread for the duration of one `harness` call, which
    /// must happen before `job`'s storage is reused or dropped.
    unsafe fn new<T>(job: *const T, harness: unsafe fn(*const ())) -> Self {
        JobRef {
            job: job as *const (),
            harness,
        }
    }

    /// Run this job. May only be called once.
    pub fn execute(self) {
        unsafe { (self.harness)(self.job) }
    }
}

/// A one-shot latch that a job's producer waits on after publishing the
/// job, and that the worker which actually executes the job signals.
///
/// Grounded in the `not_empty: Condvar` / `count: Mutex<usize>` pairing in
/// the teacher's `PriorityQueue::pop_blocking`, narrowed from an N-item
/// counting wait to a single boolean flip.
pub struct Latch {
    state: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Latch {
            state: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut done = self.state.lock();
        *done = true;
        self.cond.notify_all();
    }

    pub fn wait(&self) {
        let mut done = self.state.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }
}

/// Stack-resident storage for a closure `F` and its eventual result `R`,
/// paired with a [`Latch`] the caller blocks on.
///
/// `func` is taken by the harness on first (and only) execution, matching
/// the once-only contract `FnOnce` already enforces at the type level;
/// `UnsafeCell` is needed only because the harness writes through a shared
/// `*const StackJob<F, R>` reference.
pub struct StackJob<F, R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    func: UnsafeCell<Option<F>>,
    result: UnsafeCell<Option<R>>,
    latch: Latch,
}

impl<F, R> StackJob<F, R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    pub fn new(func: F) -> Self {
        StackJob {
            func: UnsafeCell::new(Some(func)),
            result: UnsafeCell::new(None),
            latch: Latch::new(),
        }
    }

    /// Build a [`JobRef`] pointing at this stack slot.
    ///
    /// # Safety
    /// The returned `JobRef` must be executed (or dropped without ever
    /// being handed to another thread) before `self` goes out of scope.
    /// `fork2` upholds this by always waiting on `self.latch` before
    /// returning.
    pub unsafe fn as_job_ref(&self) -> JobRef {
        JobRef::new(self as *const Self, Self::harness)
    }

    unsafe fn harness(this: *const ()) {
        let this = &*(this as *const Self);
        let func = (*this.func.get())
            .take()
            .expect("StackJob harness invoked more than once");
        let result = func();
        *this.result.get() = Some(result);
        this.latch.set();
    }

    /// Block until the job has run, then take its result.
    pub fn join(&self) -> R {
        self.latch.wait();
        unsafe { (*self.result.get()).take() }.expect("StackJob joined before it ran")
    }
}

/// Run `func` inline, bypassing the deque entirely — used when `fork2`'s
/// caller is not a registered worker (see [`crate::registry`]) and there
/// is no stealer to hand the second branch to.
pub fn run_inline<F, R>(func: F) -> R
where
    F: FnOnce() -> R,
{
    func()
}
