//! Tracing setup for embedders.
//!
//! Installs an env-filtered fmt subscriber and bridges `log` records (the
//! persistence layer logs through `log`) into tracing. Call once at
//! startup; later calls are ignored so tests can call it freely.

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initializes global tracing with `RUST_LOG`-style filtering, defaulting
/// to `info` for this crate.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("scriptforge=info"));

        let _ = tracing_log::LogTracer::init();
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
