//! This module defines range-checked types for EMS device IDs and telegram
//! type IDs, meant to keep invalid values off the wire.

use snafu::{ensure, OptionExt, Snafu};

use arrayvec::ArrayVec;
use core::convert::TryInto;
use core::fmt;
use core::ops::Deref;

/// Error type for this module
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a valid 7-bit bus device ID.
    #[snafu(display("Invalid device id"))]
    InvalidDeviceId,
    /// The value is neither a classic (below the extended marker) nor an
    /// extended EMS+ type ID.
    #[snafu(display("Invalid type id"))]
    InvalidTypeId,
}

const fn invalid_device_id() -> InvalidDeviceIdSnafu {
    InvalidDeviceIdSnafu
}

const fn invalid_type_id() -> InvalidTypeIdSnafu {
    InvalidTypeIdSnafu
}

/// Lowest value of type byte 2 that flags an extended (EMS+) type.
pub const EXTENDED_TYPE_MARKER: u8 = 0xF0;

/// DeviceId is a range-checked [0x00, 0x7F] bus participant ID.
///
/// The high bit of an ID byte on the wire carries poll/read semantics and is
/// never part of the ID itself.
///
/// ## Example
/// ```
/// use ems_proto::DeviceId;
/// let boiler = DeviceId::new(0x08).unwrap();
/// assert_eq!(*boiler, 0x08);
/// assert!(DeviceId::new(0x88).is_err());
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct DeviceId(u8);

/// Create a new [`DeviceId`], panics if it is out of range.
pub const fn device(id: u8) -> DeviceId {
    if id <= 0x7F {
        return DeviceId(id);
    }
    panic!("Invalid device id.")
}

impl DeviceId {
    /// Destination of broadcast telegrams.
    pub const BROADCAST: DeviceId = DeviceId(0x00);

    /// Create a new device ID, checking that it fits in 7 bits.
    /// # Errors
    /// Returns [`Error::InvalidDeviceId`] if `id` is out of range.
    pub fn new(id: impl TryInto<u8>) -> Result<Self, Error> {
        let id = id.try_into().ok().with_context(invalid_device_id)?;
        ensure!(id <= 0x7F, invalid_device_id());
        Ok(Self(id))
    }

    pub const fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl Deref for DeviceId {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<u8> for DeviceId {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Trait to convert `T: TryInto<u8>` into a [`DeviceId`].
pub trait IntoDeviceId {
    /// Convert self to a DeviceId.
    /// # Errors
    /// Returns `Error::InvalidDeviceId` if self isn't a valid device ID.
    fn into_device_id(self) -> Result<DeviceId, Error>;
}

impl IntoDeviceId for DeviceId {
    fn into_device_id(self) -> Result<DeviceId, Error> {
        Ok(self)
    }
}

impl<T> IntoDeviceId for T
where
    T: TryInto<u8>,
{
    fn into_device_id(self) -> Result<DeviceId, Error> {
        DeviceId::new(self)
    }
}

/// `TypeId` identifies the layout of a telegram payload.
///
/// Classic EMS types are one byte below [`EXTENDED_TYPE_MARKER`]. Extended
/// (EMS+) types occupy two bytes on the wire, most significant first, and the
/// most significant byte is itself the marker, so every extended ID lies in
/// `0xF000..=0xFFFF`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct TypeId(u16);

/// Create a new [`TypeId`], panics if it is out of range.
pub const fn type_id(t: u16) -> TypeId {
    if t < EXTENDED_TYPE_MARKER as u16 || t >= (EXTENDED_TYPE_MARKER as u16) << 8 {
        TypeId(t)
    } else {
        panic!("Invalid type id.")
    }
}

impl TypeId {
    /// Create a new type ID.
    /// # Errors
    /// Returns [`Error::InvalidTypeId`] if `t` can't be represented on the wire.
    pub fn new(t: impl TryInto<u16>) -> Result<Self, Error> {
        let t: u16 = t.try_into().ok().with_context(invalid_type_id)?;
        ensure!(
            t < u16::from(EXTENDED_TYPE_MARKER) || t >= u16::from(EXTENDED_TYPE_MARKER) << 8,
            invalid_type_id()
        );
        Ok(Self(t))
    }

    pub const fn is_extended(self) -> bool {
        self.0 > 0xFF
    }

    pub(crate) fn to_bytes(self) -> ArrayVec<u8, 2> {
        let mut buf = ArrayVec::new();
        let [hi, lo] = self.0.to_be_bytes();
        if self.is_extended() {
            buf.push(hi);
        }
        buf.push(lo);
        buf
    }
}

impl Deref for TypeId {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<u16> for TypeId {
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "0x{:04X}", self.0)
        } else {
            write!(f, "0x{:02X}", self.0)
        }
    }
}

/// Trait to convert `T: TryInto<u16>` into a [`TypeId`].
pub trait IntoTypeId {
    /// Convert `self` to `TypeId`.
    /// # Errors
    /// Returns [`Error::InvalidTypeId`] if `self` can't be converted.
    fn into_type_id(self) -> Result<TypeId, Error>;
}

impl IntoTypeId for TypeId {
    fn into_type_id(self) -> Result<TypeId, Error> {
        Ok(self)
    }
}

impl<T> IntoTypeId for T
where
    T: TryInto<u16>,
{
    fn into_type_id(self) -> Result<TypeId, Error> {
        TypeId::new(self)
    }
}

#[cfg(test)]
mod device_id_tests {
    use super::DeviceId;

    #[test]
    fn test_valid_device_ids() {
        for n in 0..=0x7F {
            let d = DeviceId::new(n).unwrap();
            assert_eq!(*d, n);
        }
        assert!(DeviceId::BROADCAST.is_broadcast());
    }

    #[test]
    fn test_invalid_device_ids() {
        assert!(DeviceId::new(0x80).is_err());
        assert!(DeviceId::new(0x8B).is_err());
        assert!(DeviceId::new(-1).is_err());
        assert!(DeviceId::new(300).is_err());
    }
}

#[cfg(test)]
mod type_id_tests {
    use super::{type_id, TypeId};

    #[test]
    fn test_classic() {
        let t = TypeId::new(0x18).unwrap();
        assert!(!t.is_extended());
        assert_eq!(t.to_bytes().as_slice(), &[0x18]);
        assert!(TypeId::new(0xEF).is_ok());
    }

    #[test]
    fn test_extended() {
        let t = type_id(0xFF62);
        assert!(t.is_extended());
        assert_eq!(t.to_bytes().as_slice(), &[0xFF, 0x62]);
        assert!(TypeId::new(0xF000).is_ok());
    }

    #[test]
    fn test_marker_collisions_rejected() {
        // a classic type in the marker range would be read back as extended
        assert!(TypeId::new(0xF0).is_err());
        assert!(TypeId::new(0xFF).is_err());
        // an extended type whose first byte isn't a marker can't be decoded
        assert!(TypeId::new(0x01A5).is_err());
        assert!(TypeId::new(0xEFFF).is_err());
        assert!(TypeId::new(-1).is_err());
    }
}
