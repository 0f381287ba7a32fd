//! Deployment configuration, read from environment variables.
//!
//! There is deliberately no CLI flag parser here — the operator CLI is an
//! external collaborator per spec §1, but the process still needs to be
//! tunable without a recompile, so every knob has an env var with a
//! documented default (spec §6).

use std::{net::IpAddr, time::Duration};

const DEFAULT_BASE_PORT: u16 = 54200;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_RECV_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BIND_RETRY_SECS: u64 = 5;
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_LOG_ROTATE_MIB: u64 = 256;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base listening port; each vertex's port is `base_port + 10 * index`.
    pub base_port: u16,
    /// Wildcard bind address shared by all five listeners.
    pub bind_addr: IpAddr,
    /// A peer that sends nothing for this long is treated as dead (§9 Open
    /// Question #4).
    pub recv_timeout: Duration,
    /// Backoff between bind retries while a port is still in `TIME_WAIT`.
    pub bind_retry_interval: Duration,
    /// Directory holding the per-vertex relay logs (§4.6).
    pub log_dir: std::path::PathBuf,
    /// Relay log rotation threshold, in bytes.
    pub log_rotate_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_BASE_PORT,
            bind_addr: DEFAULT_BIND_ADDR.parse().expect("default bind addr is valid"),
            recv_timeout: Duration::from_secs(DEFAULT_RECV_TIMEOUT_SECS),
            bind_retry_interval: Duration::from_secs(DEFAULT_BIND_RETRY_SECS),
            log_dir: std::path::PathBuf::from(DEFAULT_LOG_DIR),
            log_rotate_bytes: DEFAULT_LOG_ROTATE_MIB * 1024 * 1024,
        }
    }
}

impl Config {
    /// Builds a `Config` from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_u16("GSHUB_BASE_PORT") {
            cfg.base_port = v;
        }
        if let Ok(raw) = std::env::var("GSHUB_BIND_ADDR") {
            match raw.parse() {
                Ok(addr) => cfg.bind_addr = addr,
                Err(err) => {
                    tracing::warn!(%raw, %err, "invalid GSHUB_BIND_ADDR, keeping default")
                }
            }
        }
        if let Some(v) = env_u64("GSHUB_RECV_TIMEOUT_SECS") {
            cfg.recv_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("GSHUB_BIND_RETRY_SECS") {
            cfg.bind_retry_interval = Duration::from_secs(v);
        }
        if let Ok(raw) = std::env::var("GSHUB_LOG_DIR") {
            cfg.log_dir = std::path::PathBuf::from(raw);
        }
        if let Some(v) = env_u64("GSHUB_LOG_ROTATE_MIB") {
            cfg.log_rotate_bytes = v * 1024 * 1024;
        }

        cfg
    }
}

fn env_u16(name: &str) -> Option<u16> {
    std::env::var(name).ok().and_then(|raw| match raw.parse() {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(%name, %raw, %err, "invalid env var, keeping default");
            None
        }
    })
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|raw| match raw.parse() {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(%name, %raw, %err, "invalid env var, keeping default");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.base_port, 54200);
        assert_eq!(cfg.recv_timeout, Duration::from_secs(30));
        assert_eq!(cfg.bind_retry_interval, Duration::from_secs(5));
        assert_eq!(cfg.log_rotate_bytes, 256 * 1024 * 1024);
    }
}
