use snafu::Snafu;

use crate::types;

/// Errors raised by the protocol engine.
///
/// Frame-level errors are counted and the frame is dropped; transmit-level
/// errors drive retries and only reach collaborators inside
/// [`BusEvent::TxFailed`](crate::BusEvent::TxFailed) once retries are exhausted.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// A multi-byte frame shorter than the minimum telegram length.
    #[snafu(display("Frame too short ({} bytes)", len))]
    FrameTooShort { len: usize },

    /// Trailing byte doesn't match the CRC of the frame.
    #[snafu(display("CRC mismatch: computed {:#04x}, received {:#04x}", expected, actual))]
    CrcMismatch { expected: u8, actual: u8 },

    /// No decoder is registered for this type in the sender's device class.
    #[snafu(display("No decoder for type {:#06x}", type_id))]
    UnknownType { type_id: u16 },

    /// CRC was fine, but the telegram structure wasn't.
    #[snafu(display("Malformed telegram ({} bytes)", len))]
    DecodeMalformed { len: usize },

    /// The transport gave up waiting for the echo of byte `at_byte`.
    #[snafu(display("Transmit timeout at byte {}", at_byte))]
    TxTimeout { at_byte: usize },

    /// A break arrived while byte `at_byte` was being transmitted.
    #[snafu(display("Bus collision at byte {}", at_byte))]
    TxCollision { at_byte: usize },

    /// Nothing answered a transmitted request within the reply window.
    #[snafu(display("No reply to request"))]
    ReplyTimeout,

    #[snafu(display("Transmit queue full ({} entries)", capacity))]
    QueueFull { capacity: usize },

    /// The value read back after a write differs from the value written.
    #[snafu(display("Write validation failed: expected {:#04x}, read {:?}", expected, actual))]
    WriteValidationFailed { expected: u8, actual: Option<u8> },

    /// The target answered the write with an error byte.
    #[snafu(display("Write rejected by device"))]
    WriteRejected,

    /// The addressed device model doesn't accept writes.
    #[snafu(display("Device doesn't support writes"))]
    WriteNotSupported,

    #[snafu(display("Value out of range"))]
    ValueOutOfRange,

    #[snafu(display("Payload too long ({} bytes)", len))]
    PayloadTooLong { len: usize },

    #[snafu(display("Invalid hex telegram"))]
    InvalidHex,

    #[snafu(context(false), display("{}", source))]
    Id { source: types::Error },
}
