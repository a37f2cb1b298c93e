//! Work-stealing worker pool: one [`Registry`], one named `JoinHandle` per
//! worker, a `crossbeam_deque::Injector` for external jobs and a
//! `Worker`/`Stealer` ring per thread for jobs the threads hand to each
//! other via [`crate::fork_join::fork2`].
//!
//! Grounded in the teacher's `EvalThreadPool` (global `LazyLock` singleton,
//! `thread::Builder::new().name(...)`, an `Arc<AtomicBool>` shutdown flag)
//! and its `PriorityQueue` (parking_lot `Mutex`+`Condvar` park/wake for
//! idle workers) — but replacing the bounded MPMC channel with a
//! work-stealing deque network, since `fork2`/`parallel_for` need a worker
//! to be able to push a job for *another* worker to steal, not just pull
//! the next job off one shared queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread::{self, JoinHandle};

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use parking_lot::{Condvar, Mutex};

use crate::job::JobRef;

/// Process-wide worker pool, sized from `num_cpus::get()` unless
/// overridden by [`crate::config::Config::num_workers`] before first use.
static GLOBAL_REGISTRY: LazyLock<Arc<Registry>> =
    LazyLock::new(|| Registry::new(configured_worker_count()));

static WORKER_COUNT_OVERRIDE: AtomicUsize = AtomicUsize::new(0);

/// Override the worker count the global registry is built with. Only takes
/// effect if called before the registry is first accessed (mirrors
/// spec.md §6's `proc` launch parameter); a call after first use is a
/// configuration error surfaced by `launch`, not silently ignored.
pub fn set_worker_count_override(n: usize) {
    WORKER_COUNT_OVERRIDE.store(n, Ordering::SeqCst);
}

fn configured_worker_count() -> usize {
    let override_n = WORKER_COUNT_OVERRIDE.load(Ordering::SeqCst);
    if override_n > 0 {
        override_n
    } else {
        num_cpus::get()
    }
}

/// Whether the global registry has already been materialized — used by
/// `launch` to detect a too-late `proc` override.
pub fn is_initialized() -> bool {
    LazyLock::get(&GLOBAL_REGISTRY).is_some()
}

pub fn global() -> &'static Arc<Registry> {
    &GLOBAL_REGISTRY
}

struct Idle {
    sleeping: Mutex<usize>,
    wake: Condvar,
}

pub struct Registry {
    injector: Injector<JobRef>,
    stealers: Vec<Stealer<JobRef>>,
    idle: Idle,
    shutdown: AtomicBool,
    threads: Mutex<Vec<JoinHandle<()>>>,
    num_workers: usize,
}

thread_local! {
    static WORKER: std::cell::RefCell<Option<WorkerContext>> = const { std::cell::RefCell::new(None) };
}

struct WorkerContext {
    index: usize,
    worker: Worker<JobRef>,
    registry: Arc<Registry>,
}

impl Registry {
    /// Build a dedicated worker pool of `num_workers` threads (minimum 1),
    /// each with its own work-stealing deque wired into a shared
    /// [`Injector`]. Used directly by [`crate::launch::launch`] (its own
    /// pool, not [`global`]'s) and by tests that need an isolated
    /// registry.
    pub fn new(num_workers: usize) -> Arc<Self> {
        let num_workers = num_workers.max(1);
        // LIFO: `fork_join::fork2`'s self-reclaim (`pop_local` right after
        // `push_local`) depends on a worker's own `pop()` handing back the
        // job it just pushed, not the oldest one sitting under it from an
        // outer, still-unresolved `fork2` frame. A FIFO deque would hand the
        // stealer-visible item to the pusher too, but the wrong one.
        let workers: Vec<Worker<JobRef>> = (0..num_workers).map(|_| Worker::new_lifo()).collect();
        let stealers = workers.iter().map(Worker::stealer).collect();

        let registry = Arc::new(Registry {
            injector: Injector::new(),
            stealers,
            idle: Idle {
                sleeping: Mutex::new(0),
                wake: Condvar::new(),
            },
            shutdown: AtomicBool::new(false),
            threads: Mutex::new(Vec::with_capacity(num_workers)),
            num_workers,
        });

        let mut handles = Vec::with_capacity(num_workers);
        for (index, worker) in workers.into_iter().enumerate() {
            let registry = Arc::clone(&registry);
            let handle = thread::Builder::new()
                .name(format!("gracore-worker-{index}"))
                .spawn(move || {
                    WORKER.with(|cell| {
                        *cell.borrow_mut() = Some(WorkerContext {
                            index,
                            worker,
                            registry: Arc::clone(&registry),
                        });
                    });
                    worker_loop(&registry, index);
                    WORKER.with(|cell| *cell.borrow_mut() = None);
                })
                .expect("failed to spawn gracore worker thread");
            handles.push(handle);
        }
        *registry.threads.lock() = handles;

        registry
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Run `f` on a registered worker thread and block until it returns,
    /// giving algorithm code the invariant that [`crate::exec_mode::current`]
    /// is always backed by a live mode stack and that `fork2` always has a
    /// deque to steal from (spec.md §3 invariant 1).
    ///
    /// If the calling thread is already a worker (nested `install`, or a
    /// call from inside `launch`'s `run` closure), runs `f` in place.
    pub fn install<F, R>(self: &Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if is_worker_thread() {
            return f();
        }

        let job = crate::job::StackJob::new(f);
        // SAFETY: we wait on `job`'s latch (via `join`) before `job` is
        // dropped at the end of this function, so the JobRef never
        // outlives the storage it points at.
        let job_ref = unsafe { job.as_job_ref() };
        self.injector.push(job_ref);
        self.wake_one();
        job.join()
    }

    fn wake_one(&self) {
        let mut sleeping = self.idle.sleeping.lock();
        if *sleeping > 0 {
            *sleeping -= 1;
            self.idle.wake.notify_one();
        }
    }

    fn wake_all(&self) {
        self.idle.wake.notify_all();
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake_all();
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }

    fn find_work(&self, local: &Worker<JobRef>) -> Option<JobRef> {
        if let Some(job) = local.pop() {
            return Some(job);
        }
        loop {
            match self.injector.steal_batch_and_pop(local) {
                Steal::Success(job) => return Some(job),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
        for stealer in &self.stealers {
            loop {
                match stealer.steal() {
                    Steal::Success(job) => return Some(job),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        None
    }
}

fn worker_loop(registry: &Arc<Registry>, index: usize) {
    loop {
        let job = WORKER.with(|cell| {
            let cell = cell.borrow();
            let ctx = cell.as_ref().expect("worker context missing in its own thread");
            registry.find_work(&ctx.worker)
        });

        match job {
            Some(job) => job.execute(),
            None => {
                if registry.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let mut sleeping = registry.idle.sleeping.lock();
                *sleeping += 1;
                // Bounded wait: a job may have been pushed between our
                // last failed steal and taking this lock, with no waker
                // left to notice us going to sleep (spec.md has no
                // liveness SLA, but we still re-poll rather than block
                // forever on a missed wakeup).
                registry
                    .idle
                    .wake
                    .wait_for(&mut sleeping, std::time::Duration::from_millis(5));
            }
        }
    }
    let _ = index;
}

/// Whether the calling thread is one of `registry`'s workers.
pub fn is_worker_thread() -> bool {
    WORKER.with(|cell| cell.borrow().is_some())
}

/// Push `job` onto the calling worker's local deque. Panics (via
/// `fatal_invariant`) if called from a non-worker thread; `fork2` checks
/// [`is_worker_thread`] first and falls back to inline execution instead.
pub fn push_local(job: JobRef) {
    WORKER.with(|cell| {
        let cell = cell.borrow();
        match cell.as_ref() {
            Some(ctx) => ctx.worker.push(job),
            None => crate::error::fatal_invariant("push_local called from a non-worker thread"),
        }
    });
    // A sibling worker may be asleep; nudge the pool so the job we just
    // published gets stolen promptly instead of waiting for the 5ms poll.
    current_registry().wake_one();
}

/// Attempt to make progress on the calling worker's own queue or steal one
/// job from elsewhere, without blocking. Used by `fork2` while waiting on
/// the spawned half's latch, so a stalled steal doesn't leave the stealing
/// worker spinning on nothing.
pub fn steal_one() -> Option<JobRef> {
    WORKER.with(|cell| {
        let cell = cell.borrow();
        let ctx = cell.as_ref()?;
        ctx.registry.find_work(&ctx.worker)
    })
}

/// Pop a job directly off the calling worker's own local deque, without
/// stealing from anyone else. Used by `fork2` to reclaim a just-pushed job
/// nobody has stolen yet — this is what keeps a single-worker registry
/// from deadlocking on a job only that one worker could ever run.
pub fn pop_local() -> Option<JobRef> {
    WORKER.with(|cell| {
        let cell = cell.borrow();
        cell.as_ref()?.worker.pop()
    })
}

fn current_registry() -> Arc<Registry> {
    WORKER.with(|cell| {
        let cell = cell.borrow();
        cell.as_ref()
            .map(|ctx| Arc::clone(&ctx.registry))
            .unwrap_or_else(|| Arc::clone(global()))
    })
}
