//! Builds one listener per vertex, starts the routing core, and blocks
//! until a shutdown signal arrives (spec §4.5, §5 "Cancellation /
//! shutdown").
//!
//! The teacher's control tooling registers `SIGINT`/`SIGTERM` via
//! `signal-hook` to flip an `Arc<AtomicBool>` rather than installing a
//! handler that calls back into application code directly; this supervisor
//! follows the same shape, checking the flag between event-loop ticks
//! instead of forcing cancellation mid-tick (spec: "There is no forced
//! cancellation").

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::config::Config;
use crate::error::HubError;
use crate::router::Router;

/// Runs the hub until `SIGINT`/`SIGTERM` or an unrecoverable startup
/// failure. Returns `Ok(())` on clean shutdown; `Err(HubError::Fatal(_))`
/// maps to a non-zero exit code at the process boundary (spec §6).
pub fn run(cfg: &Config) -> Result<(), HubError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&shutdown))
            .map_err(|err| HubError::Fatal(format!("failed to register signal handler: {err}")))?;
    }

    let mut router = Router::new(cfg)
        .map_err(|err| HubError::Fatal(format!("failed to start routing core: {err}")))?;

    info!("ground-station relay hub started");
    while !shutdown.load(Ordering::Relaxed) {
        router.tick().map_err(|err| HubError::Fatal(format!("event loop error: {err}")))?;
    }

    info!("shutdown signal received, exiting");
    Ok(())
}
