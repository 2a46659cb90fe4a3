//! Frame validation: length rules, the single-byte poll special case and the
//! CRC check.

use snafu::ensure;

use crate::crc;
use crate::error::{CrcMismatchSnafu, Error, FrameTooShortSnafu};

/// Shortest frame that can carry a telegram, CRC included.
pub const MIN_TELEGRAM_LEN: usize = 6;
/// Longest frame the bus carries, CRC included.
pub const MAX_TELEGRAM_LEN: usize = 32;

/// A frame that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A single byte: a poll, or a status byte answering a write.
    Poll(u8),
    /// A CRC-checked telegram, CRC byte still attached.
    Telegram(&'a [u8]),
}

/// Leftover of our own transmission: a short run whose second-to-last byte
/// is the break marker. Only runs of 2 to 4 bytes qualify.
pub fn is_echo_artifact(bytes: &[u8]) -> bool {
    (2..=4).contains(&bytes.len()) && bytes[bytes.len() - 2] == 0x00
}

/// Validate a break-delimited byte run.
///
/// # Errors
/// [`Error::FrameTooShort`] for multi-byte runs below [`MIN_TELEGRAM_LEN`],
/// [`Error::CrcMismatch`] if the trailing byte doesn't match.
pub fn validate(bytes: &[u8]) -> Result<Frame<'_>, Error> {
    if let [single] = bytes {
        return Ok(Frame::Poll(*single));
    }
    ensure!(
        bytes.len() >= MIN_TELEGRAM_LEN,
        FrameTooShortSnafu { len: bytes.len() }
    );
    match crc::check(bytes) {
        Ok(()) => Ok(Frame::Telegram(bytes)),
        Err((expected, actual)) => CrcMismatchSnafu { expected, actual }.fail(),
    }
}

#[cfg(test)]
mod frame_tests {
    use super::*;

    #[test]
    fn test_poll_bypasses_crc() {
        assert_eq!(validate(&[0x8B]), Ok(Frame::Poll(0x8B)));
        assert_eq!(validate(&[0x00]), Ok(Frame::Poll(0x00)));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(validate(&[]), Err(Error::FrameTooShort { len: 0 }));
        assert_eq!(
            validate(&[0x0B, 0x88, 0x02, 0x00, 0xBC]),
            Err(Error::FrameTooShort { len: 5 })
        );
    }

    #[test]
    fn test_crc() {
        let good = [0x0B, 0x88, 0x02, 0x00, 0x20, 0xBC];
        assert_eq!(validate(&good), Ok(Frame::Telegram(&good)));

        let bad = [0x0B, 0x88, 0x02, 0x00, 0x20, 0x00];
        assert_eq!(
            validate(&bad),
            Err(Error::CrcMismatch {
                expected: 0xBC,
                actual: 0x00
            })
        );
    }

    #[test]
    fn test_echo_artifacts() {
        assert!(is_echo_artifact(&[0x00, 0x0B]));
        assert!(is_echo_artifact(&[0x8B, 0x00, 0x00]));
        assert!(is_echo_artifact(&[0x0B, 0x01, 0x00, 0x00]));
        assert!(!is_echo_artifact(&[0x0B]));
        assert!(!is_echo_artifact(&[0x0B, 0x00]));
        assert!(!is_echo_artifact(&[0x0B, 0x01, 0x02, 0x00]));
        // one byte past the longest artifact
        assert!(!is_echo_artifact(&[0x0B, 0x01, 0x02, 0x00, 0x00]));
        assert!(!is_echo_artifact(&[0x0B, 0x88, 0x02, 0x00, 0x20, 0xBC]));
    }
}
