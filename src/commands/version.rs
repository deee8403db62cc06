//! Command: print version information.
use crate::logging::Log;

/// Version string, overridable at build time through `MODDEPLOY_VERSION`.
#[must_use]
pub fn version() -> &'static str {
    option_env!("MODDEPLOY_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Log the moddeploy version.
pub fn run(log: &dyn Log) {
    log.info(&format!("moddeploy {}", version()));
}
