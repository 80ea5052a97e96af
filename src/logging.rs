//! Logging initialization.
//!
//! The library only emits `tracing` events; subscribing is the host's
//! choice. Embedders that want output without wiring their own
//! subscriber can call [`init`] once at startup.
//!
//! `RUST_LOG` controls verbosity:
//! ```bash
//! RUST_LOG=codeplane=debug my-tool
//! ```

use std::sync::Once;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: Once = Once::new();

/// Install a compact stderr subscriber honoring `RUST_LOG`.
///
/// Defaults to `warn` when `RUST_LOG` is unset. Safe to call more than
/// once; only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    });
}
