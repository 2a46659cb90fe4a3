//! Identity telegrams: version replies from any device and the boiler's
//! bitmap of active bus participants.

use alloc::vec::Vec;
use core::fmt;

use crate::telegram::Telegram;

pub const VERSION: u16 = 0x02;
pub const UBA_DEVICES: u16 = 0x07;

/// The bitmap's first bit stands for this ID.
const FIRST_BITMAP_ID: usize = 0x08;

/// Firmware version, shown as `major.minor` with two digits each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}", self.major, self.minor)
    }
}

/// Product ID and firmware version from a version reply.
pub(crate) fn version(t: &Telegram) -> Option<(u8, Version)> {
    let product_id = t.u8_at(0)?;
    let major = t.u8_at(1)?;
    let minor = t.u8_at(2)?;
    Some((product_id, Version { major, minor }))
}

/// Device IDs flagged in an active-devices bitmap.
pub(crate) fn active_devices(t: &Telegram) -> Vec<u8> {
    let start = usize::from(t.offset());
    let mut ids = Vec::new();
    for (i, byte) in t.payload().iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) == 0 {
                continue;
            }
            let id = FIRST_BITMAP_ID + (start + i) * 8 + bit;
            if id <= 0x7F {
                ids.push(id as u8);
            }
        }
    }
    ids
}
