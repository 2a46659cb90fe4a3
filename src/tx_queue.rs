//! Outbound requests and the bounded FIFO holding them until a poll lets
//! one onto the bus.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use arrayvec::ArrayVec;
use core::convert::TryFrom;
use snafu::ensure;

use crate::crc::crc8;
use crate::error::{Error, InvalidHexSnafu, PayloadTooLongSnafu, QueueFullSnafu};
use crate::frame::MAX_TELEGRAM_LEN;
use crate::nom_parser::hex_telegram;
use crate::telegram::{encode, FrameBuf, MAX_PAYLOAD_LEN, READ_FLAG};
use crate::types::{type_id, DeviceId, IntoDeviceId, IntoTypeId, TypeId};
use crate::Millis;

/// Number of bytes asked for by a read unless set otherwise.
pub const DEFAULT_READ_LENGTH: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Read,
    Write,
    /// Read one byte back and compare it against an expected value.
    Validate,
    /// Bytes sent as given.
    Raw,
}

/// One outbound intent.
///
/// ## Example
/// ```
/// use ems_proto::{TxAction, TxRequest};
/// # fn main() -> Result<(), ems_proto::Error> {
/// // set warm water to 55 degrees and read the value back for confirmation
/// let req = TxRequest::write(0x08, 0x33, 2, &[55])?.validate_with(0x33, 2, 55)?;
/// assert_eq!(req.action(), TxAction::Write);
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    action: TxAction,
    destination: DeviceId,
    type_id: TypeId,
    offset: u8,
    /// Write data, raw bytes, or for reads the requested length.
    payload: ArrayVec<u8, MAX_TELEGRAM_LEN>,
    expected_validate_byte: u8,
    comparison_offset: u8,
    post_write_type_id: Option<TypeId>,
    post_read_type_id: Option<TypeId>,
    force_publish: bool,
    created_at: Millis,
    retry_count: u8,
    /// The write a validate request confirms.
    origin: Option<Box<TxRequest>>,
}

impl TxRequest {
    fn new(action: TxAction, destination: DeviceId, type_id: TypeId, offset: u8) -> Self {
        Self {
            action,
            destination,
            type_id,
            offset,
            payload: ArrayVec::new(),
            expected_validate_byte: 0,
            comparison_offset: 0,
            post_write_type_id: None,
            post_read_type_id: None,
            force_publish: false,
            created_at: 0,
            retry_count: 0,
            origin: None,
        }
    }

    /// Read `type_id` from `destination`, starting at record offset 0.
    pub fn read(destination: impl IntoDeviceId, type_id: impl IntoTypeId) -> Result<Self, Error> {
        let mut req = Self::new(
            TxAction::Read,
            destination.into_device_id()?,
            type_id.into_type_id()?,
            0,
        );
        req.payload.push(DEFAULT_READ_LENGTH);
        Ok(req)
    }

    /// Write `data` to `type_id` at `offset`.
    pub fn write(
        destination: impl IntoDeviceId,
        type_id: impl IntoTypeId,
        offset: u8,
        data: &[u8],
    ) -> Result<Self, Error> {
        let mut req = Self::new(
            TxAction::Write,
            destination.into_device_id()?,
            type_id.into_type_id()?,
            offset,
        );
        ensure!(
            data.len() <= MAX_PAYLOAD_LEN,
            PayloadTooLongSnafu { len: data.len() }
        );
        req.payload
            .try_extend_from_slice(data)
            .map_err(|_| PayloadTooLongSnafu { len: data.len() }.build())?;
        Ok(req)
    }

    /// Read one byte at `offset` of `type_id` and compare it with `expected`.
    pub fn validate(
        destination: impl IntoDeviceId,
        type_id: impl IntoTypeId,
        offset: u8,
        expected: u8,
    ) -> Result<Self, Error> {
        let mut req = Self::new(
            TxAction::Validate,
            destination.into_device_id()?,
            type_id.into_type_id()?,
            offset,
        );
        req.payload.push(1);
        req.expected_validate_byte = expected;
        req.comparison_offset = offset;
        Ok(req)
    }

    /// Bytes sent exactly as given, no CRC added.
    pub fn raw(bytes: &[u8]) -> Result<Self, Error> {
        let payload =
            ArrayVec::try_from(bytes).map_err(|_| PayloadTooLongSnafu { len: bytes.len() }.build())?;
        // the type of a raw request is whatever its bytes say
        let mut req = Self::new(TxAction::Raw, DeviceId::BROADCAST, type_id(0), 0);
        if let Some(&dest) = bytes.get(1) {
            req.destination = DeviceId::new(dest & !READ_FLAG)?;
        }
        req.payload = payload;
        Ok(req)
    }

    /// Parse hex such as `"0B 88 02 00 20"` and append the CRC.
    pub fn raw_hex(hex: &str) -> Result<Self, Error> {
        let mut bytes = hex_telegram(hex).ok_or_else(|| InvalidHexSnafu.build())?;
        let crc = crc8(&bytes);
        bytes
            .try_push(crc)
            .map_err(|_| PayloadTooLongSnafu { len: bytes.len() + 1 }.build())?;
        Self::raw(&bytes)
    }

    /// Start reading at record offset `offset`.
    pub fn at_offset(mut self, offset: u8) -> Self {
        self.offset = offset;
        self
    }

    /// Ask for `length` bytes. Only meaningful for reads.
    pub fn with_length(mut self, length: u8) -> Self {
        if self.action == TxAction::Read {
            self.payload.clear();
            self.payload.push(length);
        }
        self
    }

    /// After the write is acknowledged, read `type_id` back and require the
    /// byte at `offset` to equal `expected`.
    pub fn validate_with(mut self, type_id: impl IntoTypeId, offset: u8, expected: u8) -> Result<Self, Error> {
        self.post_write_type_id = Some(type_id.into_type_id()?);
        self.comparison_offset = offset;
        self.expected_validate_byte = expected;
        Ok(self)
    }

    /// Queue a read of `type_id` once this request has succeeded.
    pub fn then_read(mut self, type_id: impl IntoTypeId) -> Result<Self, Error> {
        self.post_read_type_id = Some(type_id.into_type_id()?);
        Ok(self)
    }

    /// Flag the result for immediate publishing by consumers.
    pub fn force_publish(mut self, force: bool) -> Self {
        self.force_publish = force;
        self
    }

    pub fn action(&self) -> TxAction {
        self.action
    }

    pub fn destination(&self) -> DeviceId {
        self.destination
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn expected_validate_byte(&self) -> u8 {
        self.expected_validate_byte
    }

    pub fn comparison_offset(&self) -> u8 {
        self.comparison_offset
    }

    pub fn post_write_type_id(&self) -> Option<TypeId> {
        self.post_write_type_id
    }

    pub fn post_read_type_id(&self) -> Option<TypeId> {
        self.post_read_type_id
    }

    pub fn is_force_publish(&self) -> bool {
        self.force_publish
    }

    pub fn created_at(&self) -> Millis {
        self.created_at
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    /// The write this validate request was spawned by.
    pub fn origin(&self) -> Option<&TxRequest> {
        self.origin.as_deref()
    }

    pub(crate) fn bump_retry(&mut self) -> u8 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.retry_count
    }

    /// The request the caller submitted: the write behind a spawned
    /// validate, otherwise the request itself.
    pub(crate) fn into_submitted(self) -> TxRequest {
        match self.origin {
            Some(origin) => *origin,
            None => self,
        }
    }

    /// The validate request confirming this write, if one was asked for.
    pub(crate) fn spawn_validate(&self, now: Millis) -> Option<TxRequest> {
        let type_id = self.post_write_type_id?;
        let mut req = Self::new(TxAction::Validate, self.destination, type_id, self.comparison_offset);
        req.payload.push(1);
        req.expected_validate_byte = self.expected_validate_byte;
        req.comparison_offset = self.comparison_offset;
        req.post_read_type_id = self.post_read_type_id;
        req.force_publish = self.force_publish;
        req.created_at = now;
        req.origin = Some(Box::new(self.clone()));
        Some(req)
    }

    /// Serialize for the bus.
    ///
    /// `source` is the byte sent as our ID, already adjusted for reversed
    /// polarity.
    pub(crate) fn encode(&self, source: u8) -> Result<FrameBuf, Error> {
        match self.action {
            TxAction::Raw => Ok(self.payload.clone()),
            TxAction::Write => encode(source, *self.destination, self.type_id, self.offset, &self.payload),
            TxAction::Read | TxAction::Validate => encode(
                source,
                *self.destination | READ_FLAG,
                self.type_id,
                self.offset,
                &self.payload,
            ),
        }
    }
}

/// Bounded FIFO of pending requests.
#[derive(Debug)]
pub struct TxQueue {
    queue: VecDeque<TxRequest>,
    capacity: usize,
}

impl TxQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Append a new request.
    /// # Errors
    /// [`Error::QueueFull`] if the queue holds `capacity` requests.
    pub fn push_back(&mut self, mut request: TxRequest, now: Millis) -> Result<(), Error> {
        ensure!(
            self.queue.len() < self.capacity,
            QueueFullSnafu {
                capacity: self.capacity
            }
        );
        request.created_at = now;
        self.queue.push_back(request);
        Ok(())
    }

    /// Put a retry or a spawned validate in front. These replace a request
    /// taken from the queue, so the bound isn't checked.
    pub(crate) fn push_front(&mut self, request: TxRequest) {
        self.queue.push_front(request);
    }

    pub(crate) fn pop_front(&mut self) -> Option<TxRequest> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<&TxRequest> {
        self.queue.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TxRequest> {
        self.queue.iter()
    }

    /// Is a read of `type_id` from `destination` already waiting?
    pub fn contains_read(&self, destination: DeviceId, type_id: TypeId) -> bool {
        self.queue.iter().any(|r| {
            r.action == TxAction::Read && r.destination == destination && r.type_id == type_id
        })
    }

    /// Drop queued requests matching `predicate`. Returns how many.
    pub fn cancel<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&TxRequest) -> bool,
    {
        let before = self.queue.len();
        self.queue.retain(|r| !predicate(r));
        before - self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
