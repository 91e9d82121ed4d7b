use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV_VAR: &str = "LEDGERLOOP_LOG";

const DEFAULT_FILTER: &str = "ledgerloop=warn,ledgerloop_engine=warn";

static INIT: Once = Once::new();

/// Installs the stderr subscriber once per process. stdout stays reserved
/// for command output so `--json` remains parseable.
///
/// `LEDGERLOOP_LOG` takes `EnvFilter` directives, e.g.
/// `LEDGERLOOP_LOG=ledgerloop_engine::learning=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init();
    });
}
