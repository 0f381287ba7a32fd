//! One listening socket per vertex, with bind-retry backoff.
//!
//! Adapted from `flux-network/src/tcp/connector.rs`'s `listen_at` (bind,
//! register, stash under a token). That connector assumes the bind
//! succeeds immediately; spec §4.3 requires the hub to keep retrying a
//! failed bind (e.g. the port still sitting in `TIME_WAIT` from a previous
//! run) rather than aborting, so this version wraps the listener in an
//! `Option` and retries on a timer instead of unwrapping the first result.

use std::{net::SocketAddr, time::Instant};

use mio::{Interest, Registry, Token, net::TcpListener};
use tracing::{info, warn};

use crate::config::Config;
use crate::vertex::Vertex;

/// A vertex's listening port, which may currently be unbound while waiting
/// out the retry backoff.
pub struct VertexListener {
    vertex: Vertex,
    addr: SocketAddr,
    token: Token,
    retry_interval: std::time::Duration,
    listener: Option<TcpListener>,
    last_attempt: Instant,
}

impl VertexListener {
    /// Attempts an immediate bind; if it fails, the listener starts life
    /// unbound and [`VertexListener::retry_if_due`] will keep trying.
    pub fn new(vertex: Vertex, cfg: &Config, token: Token, registry: &Registry) -> Self {
        let port = vertex.listening_port(cfg.base_port);
        let addr = SocketAddr::new(cfg.bind_addr, port);

        let mut me = Self {
            vertex,
            addr,
            token,
            retry_interval: cfg.bind_retry_interval,
            listener: None,
            last_attempt: Instant::now(),
        };
        me.try_bind(registry);
        me
    }

    fn try_bind(&mut self, registry: &Registry) {
        self.last_attempt = Instant::now();
        match TcpListener::bind(self.addr) {
            Ok(mut listener) => {
                if let Err(err) = registry.register(&mut listener, self.token, Interest::READABLE)
                {
                    warn!(vertex = %self.vertex, %err, "failed to register listener, will retry");
                    return;
                }
                info!(vertex = %self.vertex, addr = %self.addr, "listening");
                self.listener = Some(listener);
            }
            Err(err) => {
                warn!(vertex = %self.vertex, addr = %self.addr, %err, "bind failed, will retry");
            }
        }
    }

    /// Called once per event-loop tick for every currently-unbound vertex.
    /// Retries the bind once `retry_interval` has elapsed since the last
    /// attempt (spec §4.3).
    pub fn retry_if_due(&mut self, registry: &Registry) {
        if self.listener.is_some() {
            return;
        }
        if self.last_attempt.elapsed() >= self.retry_interval {
            self.try_bind(registry);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.listener.is_some()
    }

    pub fn vertex(&self) -> Vertex {
        self.vertex
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Accepts one pending connection. Only valid to call after an event
    /// on this listener's token; panics if the listener isn't currently
    /// bound, since no such event can fire in that state.
    pub fn accept(&mut self) -> std::io::Result<(mio::net::TcpStream, SocketAddr)> {
        self.listener.as_mut().expect("accept called on unbound listener").accept()
    }
}
