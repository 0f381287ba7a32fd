//! The five-kind error taxonomy from spec §7.

use thiserror::Error;

/// Errors the hub can encounter. Every variant except [`HubError::Fatal`]
/// is handled inside the worker that produced it and never propagates
/// across vertices (spec §7).
#[derive(Error, Debug)]
pub enum HubError {
    /// Target endpoint has no live connection.
    #[error("peer endpoint not ready")]
    NotReady,

    /// Frame failed GUID/termination/CRC/range checks.
    #[error("frame failed integrity check: {0}")]
    Integrity(&'static str),

    /// Socket inactive longer than the configured threshold.
    #[error("peer receive timed out")]
    Timeout,

    /// Peer closed its end of the connection.
    #[error("peer closed the connection")]
    Closed,

    /// Failed `socket`/`thread`/bind setup at startup. The only variant
    /// that aborts the process (spec §6: non-zero exit on startup failure).
    #[error("fatal startup failure: {0}")]
    Fatal(String),
}
