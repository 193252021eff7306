//! Subscriber setup for hosts that call in from C.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "UNSHAPE_TEXGEN_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

static INIT: Once = Once::new();

/// Installs a `fmt` subscriber filtered by [`LOG_ENV`], at most once.
///
/// A subscriber installed earlier by the host process is left in place.
pub(crate) fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
        tracing::debug!("logging initialized");
    }
}
