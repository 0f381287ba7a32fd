//! Process entry point. The operator CLI and any packaged logging format
//! for relayed payloads are explicitly out of scope (spec §1) — this is
//! just enough bootstrap to run the supervisor: tracing init, the
//! process-wide `SIGPIPE` suppression spec §4.5/§6 require, and the
//! startup-failure-to-exit-code contract from §6.

use std::process::ExitCode;

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gshub=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // SAFETY: called once at process startup before any socket exists;
    // `SIG_IGN` is a valid disposition for `SIGPIPE`.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let cfg = gshub::config::Config::from_env();

    match gshub::supervisor::run(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal error during startup or run, exiting");
            ExitCode::FAILURE
        }
    }
}
