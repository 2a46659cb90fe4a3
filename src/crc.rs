//! CRC-8 protecting every EMS telegram.
//!
//! The checksum is a shift register over all bytes of a frame except the
//! trailing CRC byte itself. Each step rotates the register left, folding the
//! carried-out bit back in through `0x0C` (the generator x^8 + x^4 + x^3 + 1
//! with the x^8 term implicit), then mixes in the next byte.

const GENERATOR: u8 = 0x0C;

/// Compute the CRC over `data`.
///
/// `data` must not include the CRC byte. See [`check`] for verifying a
/// complete frame.
pub const fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    let mut i = 0;
    while i < data.len() {
        let carry = crc >> 7;
        if carry == 1 {
            crc ^= GENERATOR;
        }
        crc = (crc << 1) | carry;
        crc ^= data[i];
        i += 1;
    }
    crc
}

/// Verify a complete frame, CRC byte last.
///
/// Returns `Ok(())` or `Err((computed, received))`.
pub fn check(frame: &[u8]) -> Result<(), (u8, u8)> {
    match frame.split_last() {
        Some((&received, body)) => {
            let computed = crc8(body);
            if computed == received {
                Ok(())
            } else {
                Err((computed, received))
            }
        }
        None => Err((0, 0)),
    }
}

#[cfg(test)]
mod crc_tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        // version read request from the service key to the boiler
        assert_eq!(crc8(&[0x0B, 0x88, 0x02, 0x00, 0x20]), 0xBC);
        assert_eq!(crc8(&[0x08, 0x0B, 0x02, 0x00, 0x7B, 0x06, 0x02]), 0x90);
        assert_eq!(crc8(&[0x80, 0x00]), 0x19);
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn test_check() {
        assert_eq!(check(&[0x0B, 0x88, 0x02, 0x00, 0x20, 0xBC]), Ok(()));
        assert_eq!(
            check(&[0x0B, 0x88, 0x02, 0x00, 0x20, 0xBD]),
            Err((0xBC, 0xBD))
        );
    }

    #[test]
    fn test_single_bit_errors_detected() {
        let frame = [0x08u8, 0x00, 0x18, 0x00, 0x46, 0x02, 0x1C, 0x64, 0x2E];
        let good = crc8(&frame);
        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupt = frame;
                corrupt[byte] ^= 1 << bit;
                assert_ne!(crc8(&corrupt), good, "byte {} bit {}", byte, bit);
            }
        }
    }
}
