//! The wire frame: fixed layout, dual CRCs, GUID/termination magic.
//!
//! Layout (all multi-byte fields little-endian, fixed at
//! [`Frame::WIRE_SIZE`] bytes total):
//!
//! ```text
//! guid:2 | origin:1 | destination:1 | mode:1 | type:1 | payload_size:2
//! | crc1:2 | payload:MAX_PAYLOAD | crc2:2 | netstat:1 | termination:2
//! ```

use crate::error::HubError;
use crate::vertex::{FrameType, Mode, Vertex};

/// Fixed magic identifying a frame; rejects stray data.
pub const GUID: u16 = 0x1A1C;
/// Fixed magic terminating a frame.
pub const TERMINATION: u16 = 0xAAAA;
/// Largest payload a frame may carry.
pub const MAX_PAYLOAD: usize = 0x64;

const LEN_GUID: usize = 2;
const LEN_ORIGIN: usize = 1;
const LEN_DESTINATION: usize = 1;
const LEN_MODE: usize = 1;
const LEN_TYPE: usize = 1;
const LEN_PAYLOAD_SIZE: usize = 2;
const LEN_CRC: usize = 2;
const LEN_NETSTAT: usize = 1;
const LEN_TERMINATION: usize = 2;

const OFF_GUID: usize = 0;
const OFF_ORIGIN: usize = OFF_GUID + LEN_GUID;
const OFF_DESTINATION: usize = OFF_ORIGIN + LEN_ORIGIN;
const OFF_MODE: usize = OFF_DESTINATION + LEN_DESTINATION;
const OFF_TYPE: usize = OFF_MODE + LEN_MODE;
const OFF_PAYLOAD_SIZE: usize = OFF_TYPE + LEN_TYPE;
const OFF_CRC1: usize = OFF_PAYLOAD_SIZE + LEN_PAYLOAD_SIZE;
const OFF_PAYLOAD: usize = OFF_CRC1 + LEN_CRC;
const OFF_CRC2: usize = OFF_PAYLOAD + MAX_PAYLOAD;
const OFF_NETSTAT: usize = OFF_CRC2 + LEN_CRC;
const OFF_TERMINATION: usize = OFF_NETSTAT + LEN_NETSTAT;

/// One frame, fully decoded into memory. A plain value type — no shared
/// ownership, no heap allocation beyond its fixed-size payload buffer
/// (spec §9: replace raw pointers and manually-`new`'d frames with values
/// passed by move or reference).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub origin: Vertex,
    pub destination: Vertex,
    pub mode: Mode,
    pub frame_type: FrameType,
    pub payload_size: u16,
    pub payload: [u8; MAX_PAYLOAD],
    /// Network-status bitmap. The codec never computes this — the caller
    /// (the routing core) is responsible for stamping it (spec §4.1).
    pub netstat: u8,
}

impl Frame {
    /// Total size of one frame on the wire.
    pub const WIRE_SIZE: usize = OFF_TERMINATION + LEN_TERMINATION;

    /// Builds a frame with an empty payload, e.g. a `POLL` reply.
    pub fn empty(origin: Vertex, destination: Vertex, frame_type: FrameType, netstat: u8) -> Self {
        Self {
            origin,
            destination,
            mode: Mode::Tx,
            frame_type,
            payload_size: 0,
            payload: [0; MAX_PAYLOAD],
            netstat,
        }
    }

    /// Structural + CRC validity check (spec §4.1 "verify").
    ///
    /// Does not check `guid`/`termination` — those are wire-only concerns
    /// re-derived by [`Frame::encode`] and checked on decode by
    /// [`decode`]; `verify` validates the in-memory invariants that both
    /// `encode` (preconditions) and a post-decode caller care about.
    ///
    /// Called by [`crate::tcp::PeerStream::write_frame`] (the spec §4.2
    /// `sendFrame`) before encoding, so a frame with an out-of-range
    /// `payload_size` is refused with `HubError::Integrity` instead of
    /// reaching [`Frame::encode`]'s precondition `assert!`.
    pub fn verify(&self) -> Result<(), HubError> {
        if self.payload_size as usize > MAX_PAYLOAD {
            return Err(HubError::Integrity("payload_size exceeds MAX_PAYLOAD"));
        }
        Ok(())
    }

    /// Encodes this frame to exactly [`Frame::WIRE_SIZE`] bytes.
    ///
    /// Sets `guid` and `termination`, and recomputes `crc1`/`crc2` over the
    /// meaningful payload prefix. The caller owns `netstat` — it is carried
    /// through unchanged.
    ///
    /// # Panics
    /// Panics if `self.payload_size as usize > MAX_PAYLOAD` — callers
    /// must have constructed a valid frame (see [`Frame::verify`]).
    pub fn encode(&self, out: &mut [u8; Self::WIRE_SIZE]) {
        let payload_size = self.payload_size as usize;
        assert!(payload_size <= MAX_PAYLOAD, "payload_size exceeds MAX_PAYLOAD");

        out[OFF_GUID..OFF_GUID + LEN_GUID].copy_from_slice(&GUID.to_le_bytes());
        out[OFF_ORIGIN] = self.origin.to_wire();
        out[OFF_DESTINATION] = self.destination.to_wire();
        out[OFF_MODE] = self.mode.to_wire();
        out[OFF_TYPE] = self.frame_type.to_wire();
        out[OFF_PAYLOAD_SIZE..OFF_PAYLOAD_SIZE + LEN_PAYLOAD_SIZE]
            .copy_from_slice(&self.payload_size.to_le_bytes());

        let crc = crc16_modbus(&self.payload[..payload_size]);
        out[OFF_CRC1..OFF_CRC1 + LEN_CRC].copy_from_slice(&crc.to_le_bytes());
        out[OFF_PAYLOAD..OFF_PAYLOAD + MAX_PAYLOAD].copy_from_slice(&self.payload);
        out[OFF_CRC2..OFF_CRC2 + LEN_CRC].copy_from_slice(&crc.to_le_bytes());
        out[OFF_NETSTAT] = self.netstat;
        out[OFF_TERMINATION..OFF_TERMINATION + LEN_TERMINATION]
            .copy_from_slice(&TERMINATION.to_le_bytes());
    }

    /// Decodes one frame from exactly [`Frame::WIRE_SIZE`] bytes.
    ///
    /// Rejects (returns `Err` describing which check failed) any frame
    /// with a bad `guid`, bad `termination`, an out-of-range `type` or
    /// vertex, an out-of-range `payload_size`, or disagreeing/incorrect
    /// CRCs (spec §4.1, §8 invariant 2).
    pub fn decode(bytes: &[u8; Self::WIRE_SIZE]) -> Result<Self, &'static str> {
        let guid = u16::from_le_bytes(bytes[OFF_GUID..OFF_GUID + LEN_GUID].try_into().unwrap());
        if guid != GUID {
            return Err("bad guid");
        }

        let termination = u16::from_le_bytes(
            bytes[OFF_TERMINATION..OFF_TERMINATION + LEN_TERMINATION].try_into().unwrap(),
        );
        if termination != TERMINATION {
            return Err("bad termination");
        }

        let origin = Vertex::from_wire(bytes[OFF_ORIGIN]).ok_or("bad origin vertex")?;
        let destination =
            Vertex::from_wire(bytes[OFF_DESTINATION]).ok_or("bad destination vertex")?;
        let mode = Mode::from_wire(bytes[OFF_MODE]).ok_or("bad mode")?;
        let frame_type = FrameType::from_wire(bytes[OFF_TYPE]).ok_or("bad frame type")?;

        let payload_size = u16::from_le_bytes(
            bytes[OFF_PAYLOAD_SIZE..OFF_PAYLOAD_SIZE + LEN_PAYLOAD_SIZE].try_into().unwrap(),
        );
        if payload_size as usize > MAX_PAYLOAD {
            return Err("payload_size out of range");
        }

        let crc1 =
            u16::from_le_bytes(bytes[OFF_CRC1..OFF_CRC1 + LEN_CRC].try_into().unwrap());
        let crc2 =
            u16::from_le_bytes(bytes[OFF_CRC2..OFF_CRC2 + LEN_CRC].try_into().unwrap());
        if crc1 != crc2 {
            return Err("crc1 != crc2");
        }

        let mut payload = [0u8; MAX_PAYLOAD];
        payload.copy_from_slice(&bytes[OFF_PAYLOAD..OFF_PAYLOAD + MAX_PAYLOAD]);

        let computed = crc16_modbus(&payload[..payload_size as usize]);
        if computed != crc1 {
            return Err("crc mismatch against payload");
        }

        let netstat = bytes[OFF_NETSTAT];

        Ok(Self { origin, destination, mode, frame_type, payload_size, payload, netstat })
    }
}

/// CRC-16/MODBUS (poly `0xA001`, init `0xFFFF`, no final XOR).
///
/// Any standard CRC-16 variant satisfies spec §4.1 as long as both ends of
/// the wire agree; this crate is the sole implementation on both ends.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            let lsb = (crc & 0x0001) != 0;
            crc >>= 1;
            if lsb {
                crc ^= 0xA001;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload: &[u8]) -> Frame {
        let mut buf = [0u8; MAX_PAYLOAD];
        buf[..payload.len()].copy_from_slice(payload);
        Frame {
            origin: Vertex::Client,
            destination: Vertex::RoofUhf,
            mode: Mode::Tx,
            frame_type: FrameType::Data,
            payload_size: payload.len() as u16,
            payload: buf,
            netstat: 0xC0,
        }
    }

    #[test]
    fn roundtrip_modulo_netstat_and_crc_fields() {
        let frame = sample(&[0x01, 0x02, 0x03]);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        let decoded = Frame::decode(&wire).expect("valid frame decodes");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn empty_payload_is_permitted() {
        let frame = sample(&[]);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        let decoded = Frame::decode(&wire).expect("empty payload decodes");
        assert_eq!(decoded.payload_size, 0);
    }

    #[test]
    fn max_payload_is_permitted() {
        let payload = vec![0xAB; MAX_PAYLOAD];
        let frame = sample(&payload);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        Frame::decode(&wire).expect("MAX_PAYLOAD decodes");
    }

    #[test]
    fn bad_guid_is_rejected() {
        let frame = sample(&[1, 2, 3]);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        wire[0] = 0x00;
        wire[1] = 0x00;
        assert_eq!(Frame::decode(&wire), Err("bad guid"));
    }

    #[test]
    fn bad_termination_is_rejected() {
        let frame = sample(&[1, 2, 3]);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        let last = Frame::WIRE_SIZE - 1;
        wire[last] = 0x00;
        assert_eq!(Frame::decode(&wire), Err("bad termination"));
    }

    #[test]
    fn crc_mismatch_against_payload_is_rejected() {
        let frame = sample(&[1, 2, 3]);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        // Corrupt one payload byte without touching either CRC field.
        wire[OFF_PAYLOAD] ^= 0xFF;
        assert_eq!(Frame::decode(&wire), Err("crc mismatch against payload"));
    }

    #[test]
    fn disagreeing_crcs_are_rejected() {
        let frame = sample(&[1, 2, 3]);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        wire[OFF_CRC2] ^= 0xFF;
        assert_eq!(Frame::decode(&wire), Err("crc1 != crc2"));
    }

    #[test]
    fn out_of_range_payload_size_is_rejected() {
        let frame = sample(&[1, 2, 3]);
        let mut wire = [0u8; Frame::WIRE_SIZE];
        frame.encode(&mut wire);
        let oversized = (MAX_PAYLOAD as u16 + 1).to_le_bytes();
        wire[OFF_PAYLOAD_SIZE..OFF_PAYLOAD_SIZE + 2].copy_from_slice(&oversized);
        assert_eq!(Frame::decode(&wire), Err("payload_size out of range"));
    }

    #[test]
    fn verify_rejects_oversized_payload_size() {
        let mut frame = sample(&[1, 2, 3]);
        frame.payload_size = MAX_PAYLOAD as u16 + 1;
        assert!(matches!(frame.verify(), Err(HubError::Integrity(_))));
    }

    #[test]
    fn verify_accepts_boundary_payload_sizes() {
        assert!(sample(&[]).verify().is_ok());
        let max = vec![0xAB; MAX_PAYLOAD];
        assert!(sample(&max).verify().is_ok());
    }

    #[test]
    fn crc16_modbus_matches_known_vector() {
        // "123456789" -> 0x4B37 is the standard CRC-16/MODBUS check value.
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
    }
}
