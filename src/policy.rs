//! The five decision policies plus the command-line multiplexer
//! (spec.md §4), each resolving to an [`ExecMode`] at a `cstmt` site.
//!
//! Mirrors the source's `control_by_*` class family: where the C++ used
//! overload sets and a shared `execmode_type` template parameter, this
//! uses one enum matched once inside [`crate::cstmt::cstmt`].

use crate::estimator::Estimator;
use crate::exec_mode::ExecMode;

/// A granularity-control policy attached to one decision site.
///
/// Built once (typically as a `static` or a field on long-lived
/// algorithm state) and passed by reference into [`crate::cstmt::cstmt`].
/// Unlike the source's `control_by_cutoff_*` classes, the cutoff
/// threshold itself is not stored here — it is a closure supplied at
/// the call site (spec.md §4.3's "cutoff predicate"); `kappa`, by
/// contrast, is a single scheduler-wide constant (see
/// [`crate::config::kappa_secs`]), not a per-policy field, matching the
/// source's free-standing `kappa` referenced directly inside
/// `control_by_prediction`'s `cstmt` overload.
pub enum Policy {
    /// Always resolves to `ForceParallel`: never called sequentially.
    ForceParallel,
    /// Always resolves to `ForceSequential`: never forks.
    ForceSequential,
    /// Delegates entirely to the caller-supplied cutoff predicate; no
    /// estimator, no reporting.
    CutoffWithoutReporting,
    /// Same cutoff predicate, but the sequential branch is timed and
    /// fed back into `estimator`.
    CutoffWithReporting { estimator: Estimator },
    /// No cutoff predicate: always evaluates the complexity function and
    /// compares `estimator.predict(m)` against the global kappa.
    ByPrediction { estimator: Estimator },
    /// Selects one of the above by name at startup (spec.md §4.6).
    ByCmdline(ByCmdline),
}

impl Policy {
    pub fn force_parallel() -> Self {
        Policy::ForceParallel
    }

    pub fn force_sequential() -> Self {
        Policy::ForceSequential
    }

    pub fn cutoff_without_reporting() -> Self {
        Policy::CutoffWithoutReporting
    }

    pub fn cutoff_with_reporting(name: impl Into<String>) -> Self {
        Policy::CutoffWithReporting {
            estimator: Estimator::new(name),
        }
    }

    pub fn by_prediction(name: impl Into<String>) -> Self {
        Policy::ByPrediction {
            estimator: Estimator::new(name),
        }
    }

    pub fn by_cmdline(name: impl Into<String>) -> Self {
        Policy::ByCmdline(ByCmdline::new(name))
    }

    /// Seed the policy's estimator(s), if any, from a cold-start
    /// constant (e.g. a `--estimator_init` command-line value). A
    /// no-op for policies with no estimator to seed (`ForceParallel`,
    /// `ForceSequential`, `CutoffWithoutReporting`) — the source's
    /// matching `initialize` overloads for those classes are likewise
    /// empty bodies, not a latent failure path.
    pub fn initialize(&self, init_cst: f64) {
        match self {
            Policy::CutoffWithReporting { estimator } => estimator.initialize(init_cst),
            Policy::ByPrediction { estimator } => estimator.initialize(init_cst),
            Policy::ByCmdline(b) => b.initialize(init_cst),
            Policy::ForceParallel | Policy::ForceSequential | Policy::CutoffWithoutReporting => {}
        }
    }

    /// Whether this policy shape ever needs a complexity measurement
    /// (used by [`crate::cstmt`] to decide whether to evaluate the
    /// complexity closure at all, and whether to time the sequential
    /// branch).
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Policy::ForceParallel => Kind::ForceParallel,
            Policy::ForceSequential => Kind::ForceSequential,
            Policy::CutoffWithoutReporting => Kind::CutoffWithoutReporting,
            Policy::CutoffWithReporting { .. } => Kind::CutoffWithReporting,
            Policy::ByPrediction { .. } => Kind::ByPrediction,
            Policy::ByCmdline(b) => b.kind(),
        }
    }

    pub(crate) fn estimator(&self) -> Option<&Estimator> {
        match self {
            Policy::CutoffWithReporting { estimator } => Some(estimator),
            Policy::ByPrediction { estimator } => Some(estimator),
            Policy::ByCmdline(b) => b.estimator(),
            Policy::ForceParallel | Policy::ForceSequential | Policy::CutoffWithoutReporting => None,
        }
    }
}

/// The policy shape actually in effect for one `cstmt` call — after
/// `ByCmdline` has resolved its current selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    ForceParallel,
    ForceSequential,
    CutoffWithoutReporting,
    CutoffWithReporting,
    ByPrediction,
}

/// The five accepted names for `ByCmdline::set` (spec.md §6), matching
/// the source's `control_by_cmdline::policy_type` enumerators exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selected {
    ByForceParallel,
    ByForceSequential,
    ByCutoffWithoutReporting,
    ByCutoffWithReporting,
    ByPrediction,
}

impl Selected {
    fn parse(name: &str) -> Result<Self, crate::error::ConfigError> {
        match name {
            "by_force_parallel" => Ok(Selected::ByForceParallel),
            "by_force_sequential" => Ok(Selected::ByForceSequential),
            "by_cutoff_without_reporting" => Ok(Selected::ByCutoffWithoutReporting),
            "by_cutoff_with_reporting" => Ok(Selected::ByCutoffWithReporting),
            "by_prediction" => Ok(Selected::ByPrediction),
            other => Err(crate::error::ConfigError::UnknownPolicyName(other.to_string())),
        }
    }

    fn kind(self) -> Kind {
        match self {
            Selected::ByForceParallel => Kind::ForceParallel,
            Selected::ByForceSequential => Kind::ForceSequential,
            Selected::ByCutoffWithoutReporting => Kind::CutoffWithoutReporting,
            Selected::ByCutoffWithReporting => Kind::CutoffWithReporting,
            Selected::ByPrediction => Kind::ByPrediction,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Selected::ByForceParallel => "by_force_parallel",
            Selected::ByForceSequential => "by_force_sequential",
            Selected::ByCutoffWithoutReporting => "by_cutoff_without_reporting",
            Selected::ByCutoffWithReporting => "by_cutoff_with_reporting",
            Selected::ByPrediction => "by_prediction",
        }
    }
}

/// Runtime-selectable multiplexer over the other four (non-`ByCmdline`)
/// policy shapes, matching the source's `control_by_cmdline`: it owns
/// one real instance of each shape that carries state (`cbcwtr`, `cbp`
/// in the source — `CutoffWithoutReporting`/`ForceParallel`/
/// `ForceSequential` carry none), plus a selector mutated only during
/// configuration (spec.md §4.6, §3). Defaults to `by_prediction`,
/// matching the source's `policy(By_prediction)` member-initializer.
pub struct ByCmdline {
    selected: std::sync::atomic::AtomicU8,
    cutoff_with_reporting: Estimator,
    by_prediction: Estimator,
}

impl ByCmdline {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        ByCmdline {
            selected: std::sync::atomic::AtomicU8::new(Selected::ByPrediction as u8),
            cutoff_with_reporting: Estimator::new(format!("{name}.cutoff_with_reporting")),
            by_prediction: Estimator::new(format!("{name}.by_prediction")),
        }
    }

    /// Select one of the five policy shapes by name. Returns an error
    /// for any name outside spec.md §6's accepted list, leaving the
    /// previous selection in effect.
    pub fn set(&self, name: &str) -> Result<(), crate::error::ConfigError> {
        let selected = Selected::parse(name)?;
        self.selected.store(selected as u8, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    /// The name currently in effect.
    pub fn get(&self) -> &'static str {
        self.current().name()
    }

    /// Only `cbcwtr` and `cbp`'s estimators are seeded — the source's
    /// `initialize` likewise leaves its own top-level `estimator` field
    /// untouched, seeding only `cbcwtr.get_estimator()` and
    /// `cbp.get_estimator()`.
    fn initialize(&self, init_cst: f64) {
        self.cutoff_with_reporting.initialize(init_cst);
        self.by_prediction.initialize(init_cst);
    }

    pub(crate) fn kind(&self) -> Kind {
        self.current().kind()
    }

    pub(crate) fn estimator(&self) -> Option<&Estimator> {
        match self.current() {
            Selected::ByCutoffWithReporting => Some(&self.cutoff_with_reporting),
            Selected::ByPrediction => Some(&self.by_prediction),
            _ => None,
        }
    }

    fn current(&self) -> Selected {
        match self.selected.load(std::sync::atomic::Ordering::Relaxed) {
            x if x == Selected::ByForceParallel as u8 => Selected::ByForceParallel,
            x if x == Selected::ByForceSequential as u8 => Selected::ByForceSequential,
            x if x == Selected::ByCutoffWithoutReporting as u8 => Selected::ByCutoffWithoutReporting,
            x if x == Selected::ByCutoffWithReporting as u8 => Selected::ByCutoffWithReporting,
            x if x == Selected::ByPrediction as u8 => Selected::ByPrediction,
            other => unreachable!("ByCmdline selected an unencoded policy id {other}"),
        }
    }
}

/// `ForceParallel`/`ForceSequential`'s `ExecMode`, for the two policy
/// shapes that need no cutoff/complexity evaluation at all.
pub(crate) fn forced_mode(kind: Kind) -> Option<ExecMode> {
    match kind {
        Kind::ForceParallel => Some(ExecMode::ForceParallel),
        Kind::ForceSequential => Some(ExecMode::ForceSequential),
        _ => None,
    }
}
