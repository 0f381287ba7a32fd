//! Single non-blocking peer connection: fixed-frame read state machine plus
//! a write-or-enqueue backlog.
//!
//! Adapted from the teacher's length-prefixed, variable-size framing
//! (`flux-network/src/tcp/stream.rs`) to this protocol's fixed-size,
//! CRC-protected [`Frame`] — there is no length header to parse, just
//! [`Frame::WIRE_SIZE`] bytes read into a buffer and handed to
//! [`Frame::decode`].

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    net::SocketAddr,
    time::Instant,
};

use mio::{Interest, Registry, Token, event::Event};
use tracing::{debug, warn};

use crate::error::HubError;
use crate::frame::Frame;

/// Response type for all external calls. `Alive` means the connection is
/// still usable; `Disconnected` means the peer is gone (spec: `CLOSED`).
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    Alive,
    Disconnected,
}

/// One complete read attempt's outcome.
pub enum ReadOutcome {
    /// A frame passed every integrity check.
    Frame(Frame),
    /// Bytes arrived but failed `Frame::decode` — spec: drop this frame
    /// only, do not close the connection.
    Malformed(HubError),
    /// No complete frame is available right now; try again after the next
    /// readable event.
    WouldBlock,
    /// The peer closed its end (`read` returned `0`).
    Disconnected,
}

#[derive(Clone, Copy)]
struct RxState {
    buf: [u8; Frame::WIRE_SIZE],
    have: usize,
}

impl Default for RxState {
    fn default() -> Self {
        Self { buf: [0; Frame::WIRE_SIZE], have: 0 }
    }
}

/// Single `mio`-backed TCP connection carrying fixed-size [`Frame`]s.
///
/// Exactly one reader and one writer may touch a given `PeerStream` at a
/// time (spec §4.2); this crate upholds that by funneling all I/O through
/// the single-threaded event loop in [`crate::router::Router`].
pub struct PeerStream {
    stream: mio::net::TcpStream,
    peer_addr: SocketAddr,
    /// The token this stream is currently registered under. Kept so
    /// `reregister` calls (toggling `WRITABLE` interest on and off) always
    /// target this stream's own registration rather than some other fd's.
    token: Token,

    rx_state: RxState,
    send_backlog: VecDeque<[u8; Frame::WIRE_SIZE]>,
    /// Byte offset already written of the frontmost backlog entry.
    send_offset: usize,
    /// Invariant: `writable_armed == !send_backlog.is_empty()`.
    writable_armed: bool,

    /// Last time a complete frame was read from this peer. Checked by the
    /// router's idle-timeout sweep (spec §9 Open Question #4; §4.2
    /// `TIMEOUT`).
    pub last_active: Instant,
}

impl PeerStream {
    /// Wraps an already-connected, not-yet-registered socket. The caller
    /// registers it with `registry` under `token` immediately afterward via
    /// [`PeerStream::register`].
    pub fn from_stream(
        stream: mio::net::TcpStream,
        peer_addr: SocketAddr,
        token: Token,
    ) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer_addr,
            token,
            rx_state: RxState::default(),
            send_backlog: VecDeque::with_capacity(4),
            send_offset: 0,
            writable_armed: false,
            last_active: Instant::now(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn register(&mut self, registry: &Registry) -> io::Result<()> {
        registry.register(&mut self.stream, self.token, Interest::READABLE)
    }

    /// Reads and decodes as many frames as are currently available,
    /// invoking `on_outcome` once per outcome in arrival order.
    fn poll_readable<F>(&mut self, mut on_outcome: F)
    where
        F: FnMut(&ReadOutcome),
    {
        loop {
            let outcome = self.read_one();
            let stop = matches!(outcome, ReadOutcome::WouldBlock | ReadOutcome::Disconnected);
            if matches!(outcome, ReadOutcome::Frame(_) | ReadOutcome::Malformed(_)) {
                self.last_active = Instant::now();
            }
            on_outcome(&outcome);
            if stop {
                return;
            }
        }
    }

    fn read_one(&mut self) -> ReadOutcome {
        while self.rx_state.have < Frame::WIRE_SIZE {
            match self.stream.read(&mut self.rx_state.buf[self.rx_state.have..]) {
                Ok(0) => return ReadOutcome::Disconnected,
                Ok(n) => self.rx_state.have += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return ReadOutcome::WouldBlock;
                }
                Err(err) => {
                    debug!(?err, "tcp: read frame");
                    return ReadOutcome::Disconnected;
                }
            }
        }

        let result = Frame::decode(&self.rx_state.buf);
        self.rx_state = RxState::default();
        match result {
            Ok(frame) => ReadOutcome::Frame(frame),
            Err(reason) => ReadOutcome::Malformed(HubError::Integrity(reason)),
        }
    }

    /// Writes a frame immediately if possible, otherwise queues it in the
    /// backlog to be flushed on the next writable event.
    ///
    /// Refuses (spec §4.2 `sendFrame`) without writing anything if
    /// `frame.verify()` fails, returning `HubError::Integrity` rather than
    /// trusting every caller to have already validated the frame.
    pub fn write_frame(&mut self, registry: &Registry, frame: &Frame) -> Result<ConnState, HubError> {
        frame.verify()?;

        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);

        if !self.send_backlog.is_empty() {
            self.send_backlog.push_back(wire);
            return Ok(self.arm_writable(registry));
        }

        Ok(match self.stream.write(&wire) {
            Ok(0) => {
                warn!("tcp: stream failed to write, disconnecting");
                ConnState::Disconnected
            }
            Ok(n) if n == wire.len() => ConnState::Alive,
            Ok(n) => {
                self.send_backlog.push_back(wire);
                self.send_offset = n;
                self.arm_writable(registry)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.send_backlog.push_back(wire);
                self.arm_writable(registry)
            }
            Err(err) => {
                warn!(?err, "tcp: stream write failed");
                ConnState::Disconnected
            }
        })
    }

    /// Flushes queued frames until the kernel blocks or the backlog is
    /// empty.
    fn drain_backlog(&mut self, registry: &Registry) -> ConnState {
        while let Some(front) = self.send_backlog.front() {
            match self.stream.write(&front[self.send_offset..]) {
                Ok(0) => return ConnState::Disconnected,
                Ok(n) => {
                    self.send_offset += n;
                    if self.send_offset == front.len() {
                        self.send_backlog.pop_front();
                        self.send_offset = 0;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!(?err, "tcp: write from backlog");
                    return ConnState::Disconnected;
                }
            }
        }

        if self.send_backlog.is_empty() && self.writable_armed {
            if let Err(err) = registry.reregister(&mut self.stream, self.token, Interest::READABLE)
            {
                debug!(?err, "tcp: reregister drop writable");
                return ConnState::Disconnected;
            }
            self.writable_armed = false;
        }

        ConnState::Alive
    }

    fn arm_writable(&mut self, registry: &Registry) -> ConnState {
        if !self.writable_armed {
            if let Err(err) = registry.reregister(
                &mut self.stream,
                self.token,
                Interest::READABLE | Interest::WRITABLE,
            ) {
                debug!(?err, "tcp: arm writable");
                return ConnState::Disconnected;
            }
            self.writable_armed = true;
        }
        ConnState::Alive
    }

    /// Handles one `mio` event for this stream: reads available frames via
    /// `on_outcome`, then drains the write backlog if writable.
    pub fn poll_with<F>(&mut self, registry: &Registry, ev: &Event, mut on_outcome: F) -> ConnState
    where
        F: FnMut(&ReadOutcome),
    {
        if ev.is_readable() {
            let mut disconnected = false;
            self.poll_readable(|outcome| {
                if matches!(outcome, ReadOutcome::Disconnected) {
                    disconnected = true;
                }
                on_outcome(outcome);
            });
            if disconnected {
                return ConnState::Disconnected;
            }
        }

        if ev.is_writable() {
            return self.drain_backlog(registry);
        }

        ConnState::Alive
    }

    pub fn close(&mut self, registry: &Registry) {
        debug!(peer = %self.peer_addr, "closing peer connection");
        let _ = registry.deregister(&mut self.stream);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{IpAddr, Ipv4Addr, SocketAddr},
        thread,
        time::Duration,
    };

    use mio::{Events, Interest, Poll, Token, net::TcpListener};

    use super::*;
    use crate::vertex::{FrameType, Mode, Vertex};

    #[test]
    fn write_then_read_frame_over_loopback() {
        let bind_addr = SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 0));
        let mut listener = TcpListener::bind(bind_addr).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut accept_poll = Poll::new().unwrap();
        accept_poll.registry().register(&mut listener, Token(0), Interest::READABLE).unwrap();

        let frame = Frame {
            origin: Vertex::Client,
            destination: Vertex::RoofUhf,
            mode: Mode::Tx,
            frame_type: FrameType::Data,
            payload_size: 3,
            payload: {
                let mut p = [0u8; crate::frame::MAX_PAYLOAD];
                p[..3].copy_from_slice(&[1, 2, 3]);
                p
            },
            netstat: 0,
        };
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);

        let client = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let mut std_stream = std::net::TcpStream::connect(addr).unwrap();
            std_stream.write_all(&wire).unwrap();
        });

        let mut events = Events::with_capacity(8);
        accept_poll.poll(&mut events, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(events.iter().next().unwrap().token(), Token(0));
        let (stream, peer_addr) = listener.accept().unwrap();

        let server_poll = Poll::new().unwrap();
        let mut stream = stream;
        server_poll.registry().register(&mut stream, Token(2), Interest::READABLE).unwrap();
        let mut server_peer = PeerStream::from_stream(stream, peer_addr, Token(2)).unwrap();

        let mut received = None;
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while received.is_none() && std::time::Instant::now() < deadline {
            let mut ev2 = Events::with_capacity(8);
            server_poll.poll(&mut ev2, Some(Duration::from_millis(100))).unwrap();
            for e in ev2.iter() {
                server_peer.poll_with(server_poll.registry(), e, |outcome| {
                    if let ReadOutcome::Frame(frame) = outcome {
                        received = Some(*frame);
                    }
                });
            }
        }

        client.join().unwrap();
        let frame = received.expect("frame received");
        assert_eq!(frame.payload_size, 3);
        assert_eq!(&frame.payload[..3], &[1, 2, 3]);
    }
}
