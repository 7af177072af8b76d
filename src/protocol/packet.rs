//! Network-layer packet format
//!
//! ```text
//! +----------------------------+------+-----------------+
//! | destination (W digits, 0-padded) | type | payload bytes  |
//! +----------------------------+------+-----------------+
//! ```
//!
//! The type digit is `1` for data and `2` for control. Control packets carry
//! an all-zero destination; their payload is an encoded
//! [`Advertisement`](super::Advertisement).

use bytes::{BufMut, Bytes, BytesMut};

use crate::NodeId;
use crate::error::FormatError;

pub const DEFAULT_DST_WIDTH: usize = 5;
/// Widest destination field that still parses into a `u32`.
pub const MAX_DST_WIDTH: usize = 10;

const DATA_CODE: u8 = b'1';
const CONTROL_CODE: u8 = b'2';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Data { destination: NodeId, payload: Bytes },
    Control { payload: Bytes },
}

impl Packet {
    pub fn data(destination: NodeId, payload: impl Into<Bytes>) -> Self {
        Packet::Data {
            destination,
            payload: payload.into(),
        }
    }

    pub fn control(payload: impl Into<Bytes>) -> Self {
        Packet::Control {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        match self {
            Packet::Data { payload, .. } | Packet::Control { payload } => payload,
        }
    }
}

/// Encoder/decoder for a fixed destination width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCodec {
    dst_width: usize,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self {
            dst_width: DEFAULT_DST_WIDTH,
        }
    }
}

impl PacketCodec {
    /// `dst_width` is clamped to `1..=MAX_DST_WIDTH`; configuration code
    /// rejects out-of-range widths before getting here.
    pub fn new(dst_width: usize) -> Self {
        Self {
            dst_width: dst_width.clamp(1, MAX_DST_WIDTH),
        }
    }

    pub fn dst_width(&self) -> usize {
        self.dst_width
    }

    pub fn header_len(&self) -> usize {
        self.dst_width + 1
    }

    /// Whether `id` can be written into the destination field.
    pub fn fits(&self, id: NodeId) -> bool {
        digits(id.0) <= self.dst_width
    }

    pub fn encode(&self, packet: &Packet) -> Result<Bytes, FormatError> {
        let (destination, code) = match packet {
            Packet::Data { destination, .. } => (*destination, DATA_CODE),
            Packet::Control { .. } => (NodeId(0), CONTROL_CODE),
        };
        if !self.fits(destination) {
            return Err(FormatError::DestinationTooWide {
                id: destination,
                width: self.dst_width,
            });
        }

        let payload = packet.payload();
        let mut buf = BytesMut::with_capacity(self.header_len() + payload.len());
        buf.put_slice(format!("{:0width$}", destination.0, width = self.dst_width).as_bytes());
        buf.put_u8(code);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    pub fn decode(&self, frame: Bytes) -> Result<Packet, FormatError> {
        let header = self.header_len();
        if frame.len() < header {
            return Err(FormatError::Truncated {
                len: frame.len(),
                header,
            });
        }

        let field = &frame[..self.dst_width];
        let destination = std::str::from_utf8(field)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u32>().ok())
            .map(NodeId)
            .ok_or_else(|| FormatError::InvalidDestination(String::from_utf8_lossy(field).into_owned()))?;

        let payload = frame.slice(header..);
        match frame[self.dst_width] {
            DATA_CODE => Ok(Packet::Data {
                destination,
                payload,
            }),
            CONTROL_CODE => Ok(Packet::Control { payload }),
            other => Err(FormatError::UnknownType(other as char)),
        }
    }
}

fn digits(mut value: u32) -> usize {
    let mut n = 1;
    while value >= 10 {
        value /= 10;
        n += 1;
    }
    n
}
