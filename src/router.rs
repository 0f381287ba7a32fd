//! The routing core: owns every vertex's listener and (at most one) live
//! connection, and moves frames between them.
//!
//! Grounded on `flux-network/src/tcp/connector.rs`'s `ConnectionManager` —
//! a single `mio::Poll`, a token-keyed table of sockets, and a
//! `handle_event`-style dispatch loop — adapted to this protocol's fixed
//! frame and to the single-active-connection-per-vertex model from spec
//! §4.3 (a second inbound connection replaces, rather than joins, the
//! first).

use std::collections::HashMap;
use std::time::Duration;

use mio::{Events, Poll, Token};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::HubError;
use crate::frame::Frame;
use crate::relaylog::RelayLog;
use crate::tcp::{ConnState, PeerStream, ReadOutcome, VertexListener};
use crate::vertex::{FrameType, PORTED_VERTICES, Vertex};

/// How long one `poll` call blocks before returning to let the supervisor
/// check the shutdown flag and retry any unbound listeners (spec §4.3:
/// "accept timeout... a few seconds").
const TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Listener tokens occupy `0..5`; stream tokens occupy `5..10`, one per
/// vertex in [`PORTED_VERTICES`] order. Fixed and disjoint so a `Token`
/// alone tells `Router::handle_event` which table to look in.
const STREAM_TOKEN_BASE: usize = 5;

pub struct Router {
    poll: Poll,
    listeners: Vec<VertexListener>,
    peers: HashMap<Vertex, PeerStream>,
    log: RelayLog,
    recv_timeout: Duration,
}

impl Router {
    pub fn new(cfg: &Config) -> std::io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry();

        let listeners = PORTED_VERTICES
            .iter()
            .enumerate()
            .map(|(i, &vertex)| VertexListener::new(vertex, cfg, Token(i), registry))
            .collect();

        let log = RelayLog::open(cfg)?;

        Ok(Self { poll, listeners, peers: HashMap::with_capacity(5), log, recv_timeout: cfg.recv_timeout })
    }

    /// Runs one iteration: blocks up to [`TICK_INTERVAL`] for events, then
    /// services them, retries unbound listeners, and sweeps idle peers.
    /// The supervisor calls this in a loop and checks its own shutdown
    /// flag between calls.
    pub fn tick(&mut self) -> std::io::Result<()> {
        let mut events = Events::with_capacity(16);
        self.poll.poll(&mut events, Some(TICK_INTERVAL))?;

        // `events` is a plain local buffer independent of `self` once
        // `poll` returns, so borrowing it across the `&mut self` calls
        // below is fine.
        for ev in events.iter() {
            let token = ev.token();
            if token.0 < STREAM_TOKEN_BASE {
                self.accept(token);
            } else {
                self.service_stream(token, ev);
            }
        }

        let registry = self.poll.registry();
        for listener in &mut self.listeners {
            listener.retry_if_due(registry);
        }

        self.sweep_idle();
        Ok(())
    }

    fn accept(&mut self, token: Token) {
        let Some(idx) = self.listeners.iter().position(|l| l.token() == token) else {
            return;
        };
        let vertex = self.listeners[idx].vertex();

        loop {
            // Re-index each iteration rather than holding a `&mut
            // VertexListener` across the loop body, since `self.adopt`
            // below needs `&mut self` as a whole.
            match self.listeners[idx].accept() {
                Ok((stream, peer_addr)) => {
                    info!(%vertex, %peer_addr, "accepted connection");
                    self.adopt(vertex, stream, peer_addr);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(%vertex, %err, "accept failed");
                    break;
                }
            }
        }
    }

    /// Installs a freshly accepted socket as `vertex`'s connection,
    /// replacing (and closing) any connection already held — spec §4.3:
    /// "at most one active connection per vertex".
    fn adopt(&mut self, vertex: Vertex, stream: mio::net::TcpStream, peer_addr: std::net::SocketAddr) {
        let token = stream_token(vertex);
        let registry = self.poll.registry();

        if let Some(mut old) = self.peers.remove(&vertex) {
            warn!(%vertex, "replacing existing connection with new inbound connection");
            old.close(registry);
        }

        match PeerStream::from_stream(stream, peer_addr, token) {
            Ok(mut peer) => {
                if let Err(err) = peer.register(registry) {
                    warn!(%vertex, %err, "failed to register accepted stream");
                    return;
                }
                self.peers.insert(vertex, peer);
            }
            Err(err) => warn!(%vertex, %err, "failed to prepare accepted stream"),
        }
    }

    fn service_stream(&mut self, token: Token, ev: &mio::event::Event) {
        let Some(&vertex) = PORTED_VERTICES.iter().find(|&&v| stream_token(v) == token) else {
            return;
        };

        let mut frames = Vec::new();
        let state = {
            let Some(peer) = self.peers.get_mut(&vertex) else { return };
            let registry = self.poll.registry();
            peer.poll_with(registry, ev, |outcome| match outcome {
                ReadOutcome::Frame(frame) => frames.push(*frame),
                ReadOutcome::Malformed(err) => {
                    warn!(%vertex, %err, "dropping malformed frame");
                }
                ReadOutcome::Disconnected | ReadOutcome::WouldBlock => {}
            })
        };

        for frame in frames {
            self.relay(vertex, frame);
        }

        if state == ConnState::Disconnected {
            self.disconnect(vertex, HubError::Closed);
        }
    }

    /// spec §4.4's per-frame algorithm: compute `netstat`, then either
    /// answer a `SERVER`-addressed poll locally or forward to the named
    /// destination.
    fn relay(&mut self, origin: Vertex, mut frame: Frame) {
        let netstat = self.netstat();

        if frame.destination == Vertex::Server {
            if frame.frame_type == FrameType::Poll {
                let reply = Frame::empty(Vertex::Server, origin, FrameType::Poll, netstat);
                self.send_to(origin, &reply);
            } else {
                warn!(%origin, frame_type = %frame.frame_type, "non-poll frame addressed to SERVER, dropping");
            }
            return;
        }

        frame.netstat = netstat;
        if self.peers.contains_key(&frame.destination) {
            // Only log a frame as relayed once `send_to` confirms it was
            // actually written — a write that fails between the
            // `contains_key` check above and the send itself must not be
            // recorded as a successful relay (spec §6, SPEC_FULL.md §4.6).
            if self.send_to(frame.destination, &frame) {
                if let Err(err) = self.log.record(frame.destination, &frame) {
                    warn!(destination = %frame.destination, %err, "relay log write failed");
                }
            }
        } else {
            warn!(%origin, destination = %frame.destination, error = %HubError::NotReady, "UNROUTABLE: destination not connected, dropping");
        }
    }

    /// Sends `frame` to `vertex`'s peer endpoint. Returns `true` only if
    /// the frame was actually written to the socket.
    fn send_to(&mut self, vertex: Vertex, frame: &Frame) -> bool {
        let outcome = {
            let Self { poll, peers, .. } = self;
            peers.get_mut(&vertex).map(|peer| peer.write_frame(poll.registry(), frame))
        };

        match outcome {
            Some(Ok(ConnState::Alive)) => true,
            Some(Ok(ConnState::Disconnected)) => {
                self.disconnect(vertex, HubError::Closed);
                false
            }
            Some(Err(err)) => {
                warn!(%vertex, %err, "refusing to send frame that failed verification");
                false
            }
            None => {
                warn!(%vertex, error = %HubError::NotReady, "cannot send, no peer endpoint");
                false
            }
        }
    }

    fn disconnect(&mut self, vertex: Vertex, reason: HubError) {
        if let Some(mut peer) = self.peers.remove(&vertex) {
            info!(%vertex, %reason, "connection closed, awaiting re-accept");
            peer.close(self.poll.registry());
        }
    }

    /// Closes any peer that hasn't produced a complete frame within the
    /// configured receive timeout (spec §4.4 "TIMEOUT" / §9 Open Question
    /// #4).
    fn sweep_idle(&mut self) {
        let stale: Vec<Vertex> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.last_active.elapsed() >= self.recv_timeout)
            .map(|(&v, _)| v)
            .collect();

        for vertex in stale {
            self.disconnect(vertex, HubError::Timeout);
        }
    }

    /// Bitwise-OR of every ported vertex's readiness bit, in the fixed
    /// order spec §3 requires, recomputed fresh on every call — never
    /// cached across frames.
    fn netstat(&self) -> u8 {
        PORTED_VERTICES
            .iter()
            .filter(|v| self.peers.contains_key(*v))
            .fold(0u8, |acc, v| acc | v.netstat_bit())
    }
}

fn stream_token(vertex: Vertex) -> Token {
    let index = vertex.port_index().expect("stream_token called on SERVER");
    Token(STREAM_TOKEN_BASE + index)
}
