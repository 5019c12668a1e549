//! Opt-in tracing bootstrap.
//!
//! Library code never installs a global subscriber; callers that want
//! console output (CLIs, integration harnesses) call [`init`] once at
//! startup. Honors `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a formatting subscriber with an env-filter.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_is_idempotent() {
        super::init();
        super::init();
    }
}
