//! Error taxonomy (spec.md §7).
//!
//! Configuration errors are recoverable at the call site (`launch`
//! reports them and exits before the worker pool starts); runtime-
//! invariant violations are programmer errors with no recovery path and
//! abort the process. Neither uses an external error-derive crate: the
//! teacher has no `thiserror`/`anyhow` dependency anywhere in its
//! manifest and hand-writes `Display`/`Error` impls for its own error
//! enums (e.g. `CompileError` in the bytecode compiler), so this crate
//! does the same.

use std::fmt;

/// A configuration error discovered while parsing `launch` arguments or
/// resolving a policy name, before the worker pool is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `ByCmdline::set` (or the `launch` equivalent) was given a name not
    /// in spec.md §6's accepted list.
    UnknownPolicyName(String),
    /// A required configuration value was missing or malformed.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownPolicyName(name) => write!(f, "bogus policy name: {name}"),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value for '{key}': {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Report a configuration error and exit with a nonzero code. Called
/// before the worker pool is started, so there is nothing left to tear
/// down.
pub fn fatal_config(err: &ConfigError) -> ! {
    tracing::error!(error = %err, "configuration error");
    eprintln!("gracore: configuration error: {err}");
    std::process::exit(2);
}

/// Abort the process on a runtime-invariant violation (an empty mode
/// stack on pop, a negative complexity measure passed to `predict`,
/// etc). These are programmer errors, not recoverable at runtime, so
/// unlike `fatal_config` this does not unwind or return.
pub fn fatal_invariant(msg: &str) -> ! {
    tracing::error!(%msg, "runtime invariant violated");
    eprintln!("gracore: runtime invariant violated: {msg}");
    std::process::abort()
}
