//! Process-wide configuration: the `kappa` threshold and the two
//! build-mode toggles (spec.md §6), realized as runtime flags read once
//! at [`crate::launch`] and checked on the hot path (SPEC_FULL.md §9 —
//! the source's `#ifdef SEQUENTIAL_BASELINE`/`SEQUENTIAL_ELISION` have no
//! direct cargo-feature analogue worth paying a recompile for here).
//!
//! Also hand-rolls the `launch(args, ...)` argument parser, in the
//! teacher's own `main.rs` style: a manual loop over `&[String]`
//! matching on `key=value` and bare-flag strings, no `clap` dependency.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::ConfigError;

/// Default kappa: 100 microseconds. Sequential leaves predicted to run
/// at or under this are preferred over a parallel split.
pub const DEFAULT_KAPPA_USEC: u64 = 100;

struct Flags {
    kappa_bits: AtomicU64,
    sequential_baseline: AtomicBool,
    sequential_elision: AtomicBool,
    estimator_init_bits: AtomicU64,
    estimator_init_set: AtomicBool,
}

static FLAGS: Flags = Flags {
    kappa_bits: AtomicU64::new(0),
    sequential_baseline: AtomicBool::new(false),
    sequential_elision: AtomicBool::new(false),
    estimator_init_bits: AtomicU64::new(0),
    estimator_init_set: AtomicBool::new(false),
};

fn kappa_usec_to_secs(usec: u64) -> f64 {
    usec as f64 / 1_000_000.0
}

/// The kappa threshold in seconds, as consulted by `ByPrediction` (spec.md
/// §4.3 item 5). Defaults to [`DEFAULT_KAPPA_USEC`] until `launch` (or a
/// test) calls [`set_kappa_usec`].
pub fn kappa_secs() -> f64 {
    let bits = FLAGS.kappa_bits.load(Ordering::Relaxed);
    if bits == 0 {
        kappa_usec_to_secs(DEFAULT_KAPPA_USEC)
    } else {
        f64::from_bits(bits)
    }
}

pub fn set_kappa_usec(usec: u64) {
    FLAGS
        .kappa_bits
        .store(kappa_usec_to_secs(usec).to_bits(), Ordering::Relaxed);
}

/// `SEQUENTIAL_BASELINE`: every `cstmt` site short-circuits to its
/// sequential body, no mode manipulation (spec.md §4.3).
pub fn sequential_baseline() -> bool {
    FLAGS.sequential_baseline.load(Ordering::Relaxed)
}

pub fn set_sequential_baseline(on: bool) {
    FLAGS.sequential_baseline.store(on, Ordering::Relaxed);
}

/// `SEQUENTIAL_ELISION`: `fork2` always runs its two bodies inline, in
/// caller order, never touching the work-stealing deque (spec.md §4.3,
/// S6 in §8).
pub fn sequential_elision() -> bool {
    FLAGS.sequential_elision.load(Ordering::Relaxed)
}

pub fn set_sequential_elision(on: bool) {
    FLAGS.sequential_elision.store(on, Ordering::Relaxed);
}

/// The `estimator_init` cold-start constant (spec.md §6), if `launch` was
/// given one. There is no single estimator this process-wide value can seed
/// on its own — every [`crate::policy::Policy`] owns its own, independently
/// named [`crate::estimator::Estimator`] — so algorithm code queries this
/// getter from its `init` closure and feeds it to each policy's
/// [`crate::policy::Policy::initialize`], the way it would seed any other
/// per-policy state from a parsed option.
pub fn estimator_init_seed() -> Option<f64> {
    if FLAGS.estimator_init_set.load(Ordering::Relaxed) {
        Some(f64::from_bits(FLAGS.estimator_init_bits.load(Ordering::Relaxed)))
    } else {
        None
    }
}

pub fn set_estimator_init_seed(init_cst: f64) {
    FLAGS
        .estimator_init_bits
        .store(init_cst.to_bits(), Ordering::Relaxed);
    FLAGS.estimator_init_set.store(true, Ordering::Relaxed);
}

/// Parsed `launch` arguments (spec.md §6's configuration-options table).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub proc: Option<usize>,
    pub kappa_usec: Option<u64>,
    pub estimator_init: Option<f64>,
    pub sequential_baseline: bool,
    pub sequential_elision: bool,
}

/// Parse `proc=N`, `kappa_usec=N`, `estimator_init=N` key=value pairs and
/// `--sequential_baseline` / `--sequential_elision` bare flags, the way
/// the teacher's `parse_args` matches on `args[i].as_str()` by hand.
pub fn parse_args(args: &[String]) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();
    for arg in args {
        match arg.as_str() {
            "--sequential_baseline" => cfg.sequential_baseline = true,
            "--sequential_elision" => cfg.sequential_elision = true,
            other => {
                let Some((key, value)) = other.split_once('=') else {
                    return Err(ConfigError::InvalidValue {
                        key: other.to_string(),
                        value: String::new(),
                    });
                };
                match key {
                    "proc" => {
                        cfg.proc = Some(parse_usize(key, value)?);
                    }
                    "kappa_usec" => {
                        cfg.kappa_usec = Some(parse_u64(key, value)?);
                    }
                    "estimator_init" => {
                        cfg.estimator_init = Some(parse_f64(key, value)?);
                    }
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        })
                    }
                }
            }
        }
    }
    Ok(cfg)
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Apply a parsed [`Config`] to the process-wide flags and the worker
/// registry's size override. Errors (rather than silently ignoring) a
/// `proc` override arriving after the global registry has already been
/// materialized — spec.md §6 fixes the worker count at pool creation.
pub fn apply(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(proc) = cfg.proc {
        if crate::registry::is_initialized() {
            return Err(ConfigError::InvalidValue {
                key: "proc".to_string(),
                value: "worker pool already initialized".to_string(),
            });
        }
        crate::registry::set_worker_count_override(proc);
    }
    if let Some(kappa_usec) = cfg.kappa_usec {
        set_kappa_usec(kappa_usec);
    }
    if let Some(init_cst) = cfg.estimator_init {
        set_estimator_init_seed(init_cst);
    }
    set_sequential_baseline(cfg.sequential_baseline);
    set_sequential_elision(cfg.sequential_elision);
    Ok(())
}
