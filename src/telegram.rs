//! Decoded telegrams and outbound frame encoding.

use arrayvec::ArrayVec;
use core::convert::TryFrom;
use core::fmt;

use crate::crc::crc8;
use crate::error::{DecodeMalformedSnafu, Error, PayloadTooLongSnafu};
use crate::frame::{Frame, MAX_TELEGRAM_LEN};
use crate::nom_parser;
use crate::types::TypeId;
use crate::Millis;

/// Largest payload: a classic header (4 bytes) and the CRC leave 27 bytes.
pub const MAX_PAYLOAD_LEN: usize = MAX_TELEGRAM_LEN - 5;

pub type Payload = ArrayVec<u8, MAX_PAYLOAD_LEN>;
pub type FrameBuf = ArrayVec<u8, MAX_TELEGRAM_LEN>;

/// High bit of a destination byte: the frame is a read request.
pub(crate) const READ_FLAG: u8 = 0x80;

/// What a validated frame turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Single byte: a poll, or a write status byte.
    Poll(u8),
    /// A read request from some bus master to `destination`. Carries no data.
    ReadRequest { source: u8, destination: u8 },
    /// A data telegram.
    Data(Telegram),
}

/// An immutable view of one received telegram, CRC stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    source: u8,
    destination: u8,
    type_id: u16,
    offset: u8,
    payload: Payload,
    extended: bool,
    timestamp: Millis,
}

impl Telegram {
    /// Split a validated frame into its parts.
    ///
    /// # Errors
    /// [`Error::DecodeMalformed`] if the header doesn't fit the frame.
    pub fn decode(frame: Frame<'_>, timestamp: Millis) -> Result<Inbound, Error> {
        let bytes = match frame {
            Frame::Poll(b) => return Ok(Inbound::Poll(b)),
            Frame::Telegram(bytes) => bytes,
        };
        let malformed = DecodeMalformedSnafu { len: bytes.len() };
        let body = match bytes.split_last() {
            Some((_crc, body)) => body,
            None => return malformed.fail(),
        };
        // Destination byte decides before the type byte is looked at.
        if let [source, destination, ..] = body {
            if destination & READ_FLAG != 0 {
                return Ok(Inbound::ReadRequest {
                    source: *source,
                    destination: destination & !READ_FLAG,
                });
            }
        }

        let (payload, header) = nom_parser::header(body).map_err(|_| malformed.build())?;
        let payload = Payload::try_from(payload).map_err(|_| malformed.build())?;
        Ok(Inbound::Data(Self {
            source: header.source,
            destination: header.destination,
            type_id: header.type_id,
            offset: header.offset,
            payload,
            extended: header.extended,
            timestamp,
        }))
    }

    pub const fn source(&self) -> u8 {
        self.source
    }

    pub const fn destination(&self) -> u8 {
        self.destination
    }

    pub const fn type_id(&self) -> u16 {
        self.type_id
    }

    pub const fn offset(&self) -> u8 {
        self.offset
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub const fn is_extended(&self) -> bool {
        self.extended
    }

    pub const fn is_broadcast(&self) -> bool {
        self.destination == 0
    }

    pub const fn timestamp(&self) -> Millis {
        self.timestamp
    }

    /// Bytes `pos..pos + width` of the full record this telegram is a
    /// window into, if the window covers them.
    fn window(&self, pos: usize, width: usize) -> Option<&[u8]> {
        let start = pos.checked_sub(usize::from(self.offset))?;
        self.payload.get(start..start + width)
    }

    /// Byte at record position `pos`.
    pub fn u8_at(&self, pos: usize) -> Option<u8> {
        self.window(pos, 1).map(|b| b[0])
    }

    pub fn bit_at(&self, pos: usize, bit: u8) -> Option<bool> {
        self.u8_at(pos).map(|b| b & (1 << bit) != 0)
    }

    pub fn i16_at(&self, pos: usize) -> Option<i16> {
        self.window(pos, 2).and_then(nom_parser::field_i16)
    }

    pub fn u16_at(&self, pos: usize) -> Option<u16> {
        self.window(pos, 2).and_then(nom_parser::field_u16)
    }

    pub fn u24_at(&self, pos: usize) -> Option<u32> {
        self.window(pos, 3).and_then(nom_parser::field_u24)
    }

    pub fn u32_at(&self, pos: usize) -> Option<u32> {
        self.window(pos, 4).and_then(nom_parser::field_u32)
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:02X} -> 0x{:02X}, type 0x{:02X}, offset {}, data: {}",
            self.source,
            self.destination,
            self.type_id,
            self.offset,
            Hex(&self.payload)
        )
    }
}

/// Build a complete frame, CRC appended.
///
/// # Errors
/// [`Error::PayloadTooLong`] if the frame exceeds [`MAX_TELEGRAM_LEN`].
pub fn encode(
    source: u8,
    destination: u8,
    type_id: TypeId,
    offset: u8,
    payload: &[u8],
) -> Result<FrameBuf, Error> {
    let mut buf = FrameBuf::new();
    buf.push(source);
    buf.push(destination);
    buf.extend(type_id.to_bytes());
    buf.push(offset);
    let len = buf.len() + payload.len() + 1;
    buf.try_extend_from_slice(payload)
        .map_err(|_| PayloadTooLongSnafu { len }.build())?;
    let crc = crc8(&buf);
    buf.try_push(crc)
        .map_err(|_| PayloadTooLongSnafu { len }.build())?;
    Ok(buf)
}

/// Space separated upper case hex.
pub(crate) struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}
