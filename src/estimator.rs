//! Online cost estimator: a shared constant *K* (time per unit
//! complexity), refined by reported samples, read lock-free from any
//! worker (spec.md §4.1).
//!
//! `K` lives in an `AtomicU64` holding the bit pattern of an `f64`.
//! Reads and writes are `Relaxed` — strictly stronger than the "torn
//! reads are tolerable" requirement in spec.md §5, which only asks for
//! convergence, not exactness.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::cmeasure::Cmeasure;

/// Decay applied to each new sample by the exponential smoothing update.
/// Chosen at the midpoint of the spec's suggested `[0.1, 0.3]` range
/// (spec.md §9, open question) — see DESIGN.md.
const SMOOTHING_ALPHA: f64 = 0.2;

/// Smallest elapsed time ever fed to the estimator; a measured zero or
/// negative duration (spec.md §7, timing anomaly) is clamped up to this
/// instead of being reported as-is or treated as fatal.
pub const TIMING_EPSILON_SECS: f64 = 1e-9;

/// A named, independently-seeded estimator instance.
///
/// Every `report`/`predict`-bearing policy (`CutoffWithReporting`,
/// `ByPrediction`, and `ByCmdline`'s copies of those two) owns one of
/// these. Cheap to share across workers: all methods take `&self`.
#[derive(Debug)]
pub struct Estimator {
    name: String,
    k_bits: AtomicU64,
    initialized: AtomicBool,
}

impl Estimator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            k_bits: AtomicU64::new(0u64),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seed `K` directly, as if from a command-line `estimator_init`
    /// value. Equivalent to the source's `set_init_constant`.
    pub fn set_init_constant(&self, init_cst: f64) {
        self.k_bits.store(init_cst.to_bits(), Ordering::Relaxed);
        self.initialized.store(true, Ordering::Relaxed);
    }

    /// Alias for `set_init_constant`, matching the policy-object
    /// `initialize(init_cst)` entry point named in spec.md §4.1/§4.6.
    pub fn initialize(&self, init_cst: f64) {
        self.set_init_constant(init_cst);
    }

    /// Report a sequential-leaf sample: `m` units of complexity took
    /// `elapsed_secs` seconds. Ignored for `Tiny`/`Undefined` measures
    /// and for `m <= 0`, matching "on `report(m, t)` with `m > 0`" in
    /// spec.md §3.
    pub fn report(&self, m: Cmeasure, elapsed_secs: f64) {
        let Cmeasure::Value(m) = m else { return };
        if !(m > 0.0) {
            return;
        }
        let elapsed = if elapsed_secs > 0.0 {
            elapsed_secs
        } else {
            TIMING_EPSILON_SECS
        };
        let sample = elapsed / m;

        // swap() tells us atomically whether we are the first sample.
        // A concurrent first report from another worker may race this
        // (both see `false`); the loser's smoothed update against a
        // not-yet-written `k_bits` is the "occasional torn read" the
        // spec explicitly tolerates.
        if self.initialized.swap(true, Ordering::Relaxed) {
            let prev = f64::from_bits(self.k_bits.load(Ordering::Relaxed));
            let updated = prev * (1.0 - SMOOTHING_ALPHA) + SMOOTHING_ALPHA * sample;
            self.k_bits.store(updated.to_bits(), Ordering::Relaxed);
        } else {
            self.k_bits.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    /// Predicted sequential time for `m` units of complexity. Returns
    /// `+inf` before the first sample, which steers `ByPrediction`
    /// toward parallel until the estimator has data (spec.md §4.1).
    pub fn predict(&self, m: f64) -> f64 {
        if m < 0.0 {
            crate::error::fatal_invariant(&format!(
                "predict called with negative complexity measure ({m}) on estimator '{}'",
                self.name
            ));
        }
        if !self.initialized.load(Ordering::Relaxed) {
            return f64::INFINITY;
        }
        f64::from_bits(self.k_bits.load(Ordering::Relaxed)) * m
    }

    /// Whether any sample has seeded `K` yet.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }
}
