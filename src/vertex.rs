//! Named peers of the relay hub and the wire constants tied to them.

use std::fmt;

/// One of the hub's five TCP-connected peers, or the hub itself.
///
/// `SERVER` never has a listening port or a `PeerEndpoint` — it only ever
/// appears as a frame's `origin` or `destination`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Vertex {
    Client = 0,
    RoofUhf = 1,
    RoofXband = 2,
    Haystack = 3,
    Track = 4,
    Server = 5,
}

/// The five vertices that own a listening port, in fixed iteration order.
///
/// This order is the one spec §4.4 requires when computing `netstat`: each
/// vertex's readiness bit must always land on the same position regardless
/// of connection/accept ordering.
pub const PORTED_VERTICES: [Vertex; 5] =
    [Vertex::Client, Vertex::RoofUhf, Vertex::RoofXband, Vertex::Haystack, Vertex::Track];

impl Vertex {
    /// Decodes a wire byte into a `Vertex`. Returns `None` for any value
    /// outside `0..=5`, which the codec treats as a `MALFORMED` frame.
    #[inline]
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Client),
            1 => Some(Self::RoofUhf),
            2 => Some(Self::RoofXband),
            3 => Some(Self::Haystack),
            4 => Some(Self::Track),
            5 => Some(Self::Server),
            _ => None,
        }
    }

    #[inline]
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Ordinal among the five ported vertices (`0..5`). `SERVER` has none.
    #[inline]
    pub fn port_index(self) -> Option<usize> {
        match self {
            Self::Client => Some(0),
            Self::RoofUhf => Some(1),
            Self::RoofXband => Some(2),
            Self::Haystack => Some(3),
            Self::Track => Some(4),
            Self::Server => None,
        }
    }

    /// Listening port for this vertex: `base + 10 * index`.
    ///
    /// # Panics
    /// Panics if called on `Vertex::Server`, which has no listening port.
    #[inline]
    pub fn listening_port(self, base: u16) -> u16 {
        let index = self.port_index().expect("SERVER has no listening port");
        base + 10 * index as u16
    }

    /// This vertex's bit in the `netstat` bitmap (`0x80, 0x40, 0x20, 0x10,
    /// 0x08` for `CLIENT, ROOFUHF, ROOFXBAND, HAYSTACK, TRACK`).
    ///
    /// Returns `0` for `SERVER`, which contributes no bit.
    #[inline]
    pub fn netstat_bit(self) -> u8 {
        match self.port_index() {
            Some(index) => 0x80 >> index,
            None => 0,
        }
    }

    /// Short tag used in log lines and log file names, matching the
    /// uppercase names used on the wire and in the original source's
    /// per-thread log prefixes.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::RoofUhf => "ROOFUHF",
            Self::RoofXband => "ROOFXBAND",
            Self::Haystack => "HAYSTACK",
            Self::Track => "TRACK",
            Self::Server => "SERVER",
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Frame payload/type classification. The hub itself only ever interprets
/// `Poll`; every other type is opaque cargo it relays unexamined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Null = 0,
    Ack = 1,
    Nack = 2,
    ConfigUhf = 3,
    ConfigXband = 4,
    Data = 5,
    Poll = 6,
}

impl FrameType {
    #[inline]
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Null),
            1 => Some(Self::Ack),
            2 => Some(Self::Nack),
            3 => Some(Self::ConfigUhf),
            4 => Some(Self::ConfigXband),
            5 => Some(Self::Data),
            6 => Some(Self::Poll),
            _ => None,
        }
    }

    #[inline]
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::ConfigUhf => "CONFIG_UHF",
            Self::ConfigXband => "CONFIG_XBAND",
            Self::Data => "DATA",
            Self::Poll => "POLL",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Advisory direction annotation. Preserved for wire compatibility; the hub
/// never branches on it (spec §9: "Mode field... has no semantic effect").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Rx = 0,
    Tx = 1,
}

impl Mode {
    #[inline]
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Rx),
            1 => Some(Self::Tx),
            _ => None,
        }
    }

    #[inline]
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netstat_bits_match_spec_table() {
        assert_eq!(Vertex::Client.netstat_bit(), 0x80);
        assert_eq!(Vertex::RoofUhf.netstat_bit(), 0x40);
        assert_eq!(Vertex::RoofXband.netstat_bit(), 0x20);
        assert_eq!(Vertex::Haystack.netstat_bit(), 0x10);
        assert_eq!(Vertex::Track.netstat_bit(), 0x08);
        assert_eq!(Vertex::Server.netstat_bit(), 0x00);
    }

    #[test]
    fn listening_ports_follow_base_plus_ten_i() {
        assert_eq!(Vertex::Client.listening_port(54200), 54200);
        assert_eq!(Vertex::RoofUhf.listening_port(54200), 54210);
        assert_eq!(Vertex::RoofXband.listening_port(54200), 54220);
        assert_eq!(Vertex::Haystack.listening_port(54200), 54230);
        assert_eq!(Vertex::Track.listening_port(54200), 54240);
    }

    #[test]
    fn wire_roundtrip_for_valid_bytes() {
        for b in 0u8..=5 {
            let v = Vertex::from_wire(b).expect("valid vertex byte");
            assert_eq!(v.to_wire(), b);
        }
        assert!(Vertex::from_wire(6).is_none());
    }

    #[test]
    fn frame_type_wire_roundtrip() {
        for b in 0u8..=6 {
            let t = FrameType::from_wire(b).expect("valid type byte");
            assert_eq!(t.to_wire(), b);
        }
        assert!(FrameType::from_wire(7).is_none());
    }
}
