//! Non-blocking TCP plumbing: one listener per vertex, one [`PeerStream`]
//! per accepted connection. Mirrors the teacher's `tcp/{mod,connector,
//! stream}.rs` split (`flux-network/src/tcp/`).

mod listener;
mod stream;

pub use listener::VertexListener;
pub use stream::{ConnState, PeerStream, ReadOutcome};
