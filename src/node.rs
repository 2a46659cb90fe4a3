//! The bus engine. See [`EmsNode`].

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::convert::TryFrom;
use core::time::Duration;
use log::{debug, info, trace, warn};

use crate::buffer::{RxBuffers, RxStatus};
use crate::config::Config;
use crate::devices::{Applied, DeviceRecord, DeviceRegistry, BOILER_ID};
use crate::error::Error;
use crate::frame::{self, is_echo_artifact};
use crate::registry::identity::VERSION;
use crate::registry::{DeviceClass, TypeRegistry};
use crate::status::{BusStatus, LogLevel, TxState};
use crate::telegram::{Hex, Inbound, Telegram, READ_FLAG};
use crate::transport::{TransmitOutcome, Transport};
use crate::tx_queue::{TxAction, TxQueue, TxRequest};
use crate::types::{DeviceId, IntoDeviceId, IntoTypeId, TypeId};
use crate::Millis;

/// Status byte a device answers an accepted write with.
const WRITE_ACCEPTED: u8 = 0x01;
/// Status byte a device answers a refused write with.
const WRITE_REJECTED: u8 = 0x04;

/// Thermostat IDs probed by [`EmsNode::discover_models`].
const THERMOSTAT_IDS: [u8; 3] = [0x10, 0x17, 0x18];

/// Something collaborators should know about. Drain with
/// [`EmsNode::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The request completed. For a validated write this is the write itself,
    /// reported once the value read back matched.
    TxSucceeded { request: TxRequest },
    /// The request was dropped after exhausting its retries, or refused.
    TxFailed { request: TxRequest, error: Error },
    /// A device answered its first version request.
    DeviceIdentified { device_id: u8 },
    ConnectionChanged { connected: bool },
}

#[derive(Debug)]
struct InFlight {
    request: TxRequest,
    sent_at: Millis,
}

fn millis(d: Duration) -> Millis {
    Millis::try_from(d.as_millis()).unwrap_or(Millis::MAX)
}

/// EMS bus participant.
///
/// The node owns the whole protocol state: bus status, receive buffers, the
/// transmit queue with the request in flight and the device registry. It
/// never blocks and never reads a clock. The caller
/// - feeds received bytes with [`receive_bytes`](Self::receive_bytes) and
///   ends each frame with [`receive_break`](Self::receive_break), or hands
///   over complete frames with [`on_frame_ready`](Self::on_frame_ready),
/// - runs [`process_pending`](Self::process_pending) to decode buffered
///   frames,
/// - calls [`tick`](Self::tick) periodically for liveness and reply
///   timeouts.
///
/// Polls addressed to us are the only moment the node transmits, so every
/// entry point that may see one borrows a [`Transport`].
///
/// # Example
/// ```
/// use ems_proto::{Config, EmsNode, TransmitOutcome, Transport, TxRequest};
///
/// struct Loopback(Vec<Vec<u8>>);
/// impl Transport for Loopback {
///     fn transmit(&mut self, frame: &[u8]) -> TransmitOutcome {
///         self.0.push(frame.to_vec());
///         TransmitOutcome::Success
///     }
/// }
///
/// # fn main() -> Result<(), ems_proto::Error> {
/// let mut node = EmsNode::new(Config::default());
/// let mut port = Loopback(Vec::new());
/// node.submit(TxRequest::read(0x08, 0x18)?, 0)?;
///
/// // the boiler polls us, and the read goes out
/// node.on_frame_ready(&mut port, &[0x8B], 10);
/// assert_eq!(port.0[0], [0x0B, 0x88, 0x18, 0x00, 0x20, 0xD4]);
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct EmsNode {
    config: Config,
    status: BusStatus,
    rx: RxBuffers,
    queue: TxQueue,
    in_flight: Option<InFlight>,
    devices: DeviceRegistry,
    types: TypeRegistry,
    events: VecDeque<BusEvent>,
}

impl Default for EmsNode {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl EmsNode {
    pub fn new(config: Config) -> Self {
        Self {
            status: BusStatus::new(
                config.poll_enabled,
                config.tx_disabled,
                config.reverse,
                config.log_level,
            ),
            rx: RxBuffers::new(config.rx_buffers, config.echo_filter),
            queue: TxQueue::new(config.queue_capacity),
            in_flight: None,
            devices: DeviceRegistry::new(),
            types: TypeRegistry::standard(),
            events: VecDeque::with_capacity(config.event_capacity),
            config,
        }
    }

    /// Decode with a custom type table instead of the standard one.
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn own_id(&self) -> DeviceId {
        self.config.own_id
    }

    pub fn status(&self) -> &BusStatus {
        &self.status
    }

    pub fn rx_status(&self) -> RxStatus {
        self.rx.status()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    // Owned snapshots for consumers that outlive the borrow.

    pub fn device(&self, device_id: u8) -> Option<DeviceRecord> {
        self.devices.get(device_id).cloned()
    }

    pub fn boiler(&self) -> Option<DeviceRecord> {
        self.devices.boiler().cloned()
    }

    pub fn thermostats(&self) -> Vec<DeviceRecord> {
        self.devices.thermostats().cloned().collect()
    }

    pub fn solar_module(&self) -> Option<DeviceRecord> {
        self.devices.solar_module().cloned()
    }

    pub fn heat_pump(&self) -> Option<DeviceRecord> {
        self.devices.heat_pump().cloned()
    }

    /// Forget every device. They are rediscovered from their traffic.
    pub fn clear_devices(&mut self) {
        info!("Clearing device list");
        self.devices.clear();
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.status.log_level = level;
    }

    pub fn set_tx_disabled(&mut self, disabled: bool) {
        self.status.tx_disabled = disabled;
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.status.reverse = reverse;
    }

    pub fn set_poll_enabled(&mut self, enabled: bool) {
        self.status.poll_enabled = enabled;
    }

    pub fn set_echo_filter(&mut self, enabled: bool) {
        self.config.echo_filter = enabled;
        self.rx.set_echo_filter(enabled);
    }

    pub fn next_event(&mut self) -> Option<BusEvent> {
        self.events.pop_front()
    }

    /// Read and clear the refreshed flag.
    pub fn take_refreshed(&mut self) -> bool {
        core::mem::replace(&mut self.status.refreshed, false)
    }

    /// Queue a request.
    /// # Errors
    /// [`Error::QueueFull`] when the queue is at capacity.
    pub fn submit(&mut self, request: TxRequest, now: Millis) -> Result<(), Error> {
        if self.status.log_level.logs_requests() {
            info!(
                "Queued {:?} 0x{:02X} type {} offset {}",
                request.action(),
                *request.destination(),
                request.type_id(),
                request.offset()
            );
        }
        self.queue.push_back(request, now)
    }

    /// Queue a read of a whole record.
    pub fn read(
        &mut self,
        destination: impl IntoDeviceId,
        type_id: impl IntoTypeId,
        now: Millis,
    ) -> Result<(), Error> {
        self.submit(TxRequest::read(destination, type_id)?, now)
    }

    /// Requests waiting for a poll, head first.
    pub fn pending(&self) -> impl Iterator<Item = &TxRequest> {
        self.queue.iter()
    }

    /// The request on the bus awaiting its answer.
    pub fn in_flight(&self) -> Option<&TxRequest> {
        self.in_flight.as_ref().map(|f| &f.request)
    }

    /// Drop waiting requests matching `predicate`. A request already on the
    /// bus is never cancelled.
    pub fn cancel_pending<F>(&mut self, predicate: F) -> usize
    where
        F: FnMut(&TxRequest) -> bool,
    {
        self.queue.cancel(predicate)
    }

    /// Queue a version read for every device ID in the model table.
    /// Returns how many were queued.
    pub fn scan_devices(&mut self, now: Millis) -> Result<usize, Error> {
        self.queue_version_reads(crate::devices::known_device_ids(), now)
    }

    /// Queue version reads for the boiler and the usual thermostat IDs.
    pub fn discover_models(&mut self, now: Millis) -> Result<usize, Error> {
        let mut ids = Vec::with_capacity(THERMOSTAT_IDS.len() + 1);
        ids.push(BOILER_ID);
        ids.extend_from_slice(&THERMOSTAT_IDS);
        self.queue_version_reads(ids, now)
    }

    fn queue_version_reads(&mut self, ids: Vec<u8>, now: Millis) -> Result<usize, Error> {
        let mut queued = 0;
        for id in ids {
            if self.queue_version_read(id, now)? {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Returns false if the read was already waiting or on the bus, or `id`
    /// is our own.
    fn queue_version_read(&mut self, id: u8, now: Millis) -> Result<bool, Error> {
        let destination = DeviceId::new(id)?;
        let version = TypeId::new(VERSION)?;
        let in_flight = self
            .in_flight()
            .map_or(false, |r| r.destination() == destination && r.type_id() == version);
        if destination == self.config.own_id || in_flight || self.queue.contains_read(destination, version) {
            return Ok(false);
        }
        self.queue.push_back(TxRequest::read(destination, version)?, now)?;
        Ok(true)
    }

    /// Ingestion stage: append received bytes to the frame being assembled.
    pub fn receive_bytes(&mut self, bytes: &[u8]) {
        self.rx.push_bytes(bytes);
        self.status.rx_overruns = self.rx.overruns();
    }

    /// Ingestion stage: a break ended the current frame. Returns true if a
    /// frame is now waiting for [`process_pending`](Self::process_pending).
    pub fn receive_break(&mut self, now: Millis) -> bool {
        let queued = self.rx.on_break(now);
        self.status.rx_overruns = self.rx.overruns();
        queued
    }

    /// Processing stage: decode and act on every buffered frame, oldest
    /// first. Returns the number of frames handled.
    pub fn process_pending<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let mut handled = 0;
        while let Some(frame) = self.rx.take_ready() {
            self.handle_frame(transport, frame.as_slice(), frame.timestamp());
            self.rx.recycle(frame);
            handled += 1;
        }
        handled
    }

    /// Handle one complete break-delimited frame straight away, bypassing
    /// the receive buffers.
    pub fn on_frame_ready<T: Transport + ?Sized>(&mut self, transport: &mut T, bytes: &[u8], now: Millis) {
        if self.config.echo_filter && is_echo_artifact(bytes) {
            trace!("dropping echo artifact {}", Hex(bytes));
            return;
        }
        self.handle_frame(transport, bytes, now);
    }

    /// Periodic housekeeping: bus liveness and the reply watchdog.
    pub fn tick(&mut self, now: Millis) {
        let connected = self
            .status
            .last_rx
            .map_or(false, |t| now.saturating_sub(t) < millis(self.config.bus_timeout));
        self.set_connected(connected);

        let expired = self
            .in_flight
            .as_ref()
            .map_or(false, |f| now.saturating_sub(f.sent_at) >= millis(self.config.reply_timeout));
        if expired {
            if let Some(request) = self.take_in_flight() {
                self.retry_or_fail(request, Error::ReplyTimeout);
            }
        }
    }

    fn handle_frame<T: Transport + ?Sized>(&mut self, transport: &mut T, bytes: &[u8], now: Millis) {
        if self.status.log_level == LogLevel::Raw {
            info!("<- {}", Hex(bytes));
        }
        self.status.frames_received = self.status.frames_received.wrapping_add(1);
        self.status.last_rx = Some(now);
        self.set_connected(true);

        let frame = match frame::validate(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                if let Error::CrcMismatch { .. } = e {
                    self.status.crc_errors = self.status.crc_errors.wrapping_add(1);
                }
                debug!("Dropping frame {}: {}", Hex(bytes), e);
                return;
            }
        };
        match Telegram::decode(frame, now) {
            Ok(Inbound::Poll(byte)) => self.on_poll(transport, byte, now),
            Ok(Inbound::ReadRequest {
                source,
                destination,
            }) => trace!("read request 0x{:02X} -> 0x{:02X}", source, destination),
            Ok(Inbound::Data(telegram)) => self.on_telegram(telegram, now),
            Err(e) => debug!("Dropping frame {}: {}", Hex(bytes), e),
        }
    }

    fn own(&self) -> u8 {
        *self.config.own_id
    }

    /// The poll byte that invites us to talk.
    fn poll_byte(&self) -> u8 {
        if self.status.reverse {
            self.own()
        } else {
            self.own() | READ_FLAG
        }
    }

    /// Our answer to a poll when there is nothing to send.
    fn ack_byte(&self) -> u8 {
        if self.status.reverse {
            self.own() | READ_FLAG
        } else {
            self.own()
        }
    }

    /// Source byte of our requests.
    fn source_byte(&self) -> u8 {
        if self.status.reverse {
            self.own() ^ READ_FLAG
        } else {
            self.own()
        }
    }

    fn on_poll<T: Transport + ?Sized>(&mut self, transport: &mut T, byte: u8, now: Millis) {
        let awaiting_write_status = self
            .in_flight()
            .map_or(false, |r| r.action() == TxAction::Write);
        if awaiting_write_status && (byte == WRITE_ACCEPTED || byte == WRITE_REJECTED) {
            self.on_write_status(transport, byte, now);
            return;
        }

        if byte != self.poll_byte() {
            trace!("poll 0x{:02X}", byte);
            return;
        }
        if !self.status.tx_capable {
            info!("Polled as 0x{:02X}, transmit enabled", self.own());
            self.status.tx_capable = true;
        }
        self.status.record_poll(now);

        if self.in_flight.is_none() && !self.queue.is_empty() && self.status.can_transmit() {
            self.send_head(transport, now);
        } else if self.status.poll_enabled {
            self.send_ack(transport);
        }
    }

    fn on_write_status<T: Transport + ?Sized>(&mut self, transport: &mut T, byte: u8, now: Millis) {
        let request = match self.take_in_flight() {
            Some(request) => request,
            None => return,
        };
        // the device is done, give the bus back
        self.send_ack(transport);
        if byte == WRITE_REJECTED {
            self.fail(request, Error::WriteRejected);
            return;
        }
        match request.spawn_validate(now) {
            Some(validate) => {
                if self.status.log_level.logs_requests() {
                    info!(
                        "Write to 0x{:02X} type {} accepted, validating",
                        *request.destination(),
                        request.type_id()
                    );
                }
                self.queue.push_front(validate);
            }
            None => self.succeed(request, now),
        }
    }

    fn send_ack<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        let ack = [self.ack_byte()];
        transport.set_receive_enabled(false);
        let outcome = transport.transmit(&ack);
        transport.set_receive_enabled(true);
        if outcome != TransmitOutcome::Success {
            trace!("poll ack: {:?}", outcome);
        }
    }

    fn send_head<T: Transport + ?Sized>(&mut self, transport: &mut T, now: Millis) {
        let request = match self.queue.pop_front() {
            Some(request) => request,
            None => return,
        };
        let frame = match request.encode(self.source_byte()) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(request, e);
                return;
            }
        };
        if self.status.log_level.logs_requests() {
            info!("-> {:?} {}", request.action(), Hex(&frame));
        }

        transport.set_receive_enabled(false);
        let outcome = transport.transmit(&frame);
        transport.set_receive_enabled(true);

        match outcome {
            TransmitOutcome::Success => {
                self.status.frames_sent = self.status.frames_sent.wrapping_add(1);
                let unanswered = request.action() == TxAction::Raw
                    || (request.action() == TxAction::Write && request.destination().is_broadcast());
                if unanswered {
                    self.succeed(request, now);
                } else {
                    self.in_flight = Some(InFlight {
                        request,
                        sent_at: now,
                    });
                    self.status.tx_state = TxState::Waiting;
                }
            }
            TransmitOutcome::Timeout { at_byte } => {
                self.retry_or_fail(request, Error::TxTimeout { at_byte })
            }
            TransmitOutcome::Collision { at_byte } => {
                self.retry_or_fail(request, Error::TxCollision { at_byte })
            }
        }
    }

    fn on_telegram(&mut self, telegram: Telegram, now: Millis) {
        self.log_telegram(&telegram);
        self.resolve_in_flight(&telegram, now);
        self.dispatch(&telegram, now);
    }

    fn log_telegram(&self, t: &Telegram) {
        let name = self.types.name_of(t.type_id()).unwrap_or("?");
        match self.status.log_level {
            LogLevel::Verbose => info!("{} {}", name, t),
            LogLevel::Thermostat => {
                let thermostat = |id: u8| self.devices.class_of(id) == DeviceClass::Thermostat;
                if thermostat(t.source()) || thermostat(t.destination()) {
                    info!("{} {}", name, t);
                }
            }
            _ => (),
        }
    }

    /// Is `t` the answer to the read or validate on the bus?
    fn answers_in_flight(&self, t: &Telegram) -> bool {
        match self.in_flight() {
            Some(r) => {
                matches!(r.action(), TxAction::Read | TxAction::Validate)
                    && r.destination() == t.source()
                    && t.destination() == self.own()
                    && r.type_id() == t.type_id()
            }
            None => false,
        }
    }

    fn resolve_in_flight(&mut self, t: &Telegram, now: Millis) {
        if !self.answers_in_flight(t) {
            return;
        }
        let request = match self.take_in_flight() {
            Some(request) => request,
            None => return,
        };
        if request.action() == TxAction::Read {
            self.succeed(request, now);
            return;
        }

        let expected = request.expected_validate_byte();
        let actual = t.u8_at(usize::from(request.comparison_offset()));
        if actual == Some(expected) {
            // report the write, not the read that confirmed it
            self.succeed(request.into_submitted(), now);
        } else {
            self.retry_or_fail(request, Error::WriteValidationFailed { expected, actual });
        }
    }

    fn dispatch(&mut self, t: &Telegram, now: Millis) {
        let class = self.devices.class_of(t.source());
        let entry = match self.types.lookup(class, t.type_id()) {
            Ok(entry) => entry,
            Err(e) => {
                trace!("0x{:02X}: {}", t.source(), e);
                return;
            }
        };
        match self.devices.apply(entry, t) {
            Applied::Updated => self.status.refreshed = true,
            Applied::Identified { first } => {
                self.status.refreshed = true;
                if first {
                    self.push_event(BusEvent::DeviceIdentified {
                        device_id: t.source(),
                    });
                }
            }
            Applied::ActiveDevices(ids) => {
                if self.config.auto_discover {
                    self.discover(ids, now);
                }
            }
            Applied::Skipped => (),
        }
    }

    fn discover(&mut self, ids: Vec<u8>, now: Millis) {
        for id in ids {
            if self.devices.get(id).map_or(false, DeviceRecord::is_identified) {
                continue;
            }
            match self.queue_version_read(id, now) {
                Ok(true) => debug!("Device 0x{:02X} is active, reading its version", id),
                Ok(false) => (),
                Err(e) => {
                    warn!("Can't queue version read for 0x{:02X}: {}", id, e);
                    break;
                }
            }
        }
    }

    fn take_in_flight(&mut self) -> Option<TxRequest> {
        self.status.tx_state = TxState::Idle;
        self.in_flight.take().map(|f| f.request)
    }

    /// A failed validate retries the write it confirms.
    fn retry_or_fail(&mut self, request: TxRequest, error: Error) {
        let mut request = request.into_submitted();
        let retries = request.bump_retry();
        self.status.last_retry_count = retries;
        if retries < self.config.max_retries {
            warn!(
                "{:?} 0x{:02X} type {}: {}, retry {} of {}",
                request.action(),
                *request.destination(),
                request.type_id(),
                error,
                retries,
                self.config.max_retries - 1
            );
            self.queue.push_front(request);
        } else {
            self.fail(request, error);
        }
    }

    fn fail(&mut self, request: TxRequest, error: Error) {
        warn!(
            "{:?} 0x{:02X} type {} failed: {}",
            request.action(),
            *request.destination(),
            request.type_id(),
            error
        );
        self.status.last_retry_count = request.retry_count();
        self.push_event(BusEvent::TxFailed { request, error });
    }

    fn succeed(&mut self, request: TxRequest, now: Millis) {
        if self.status.log_level.logs_requests() {
            info!(
                "{:?} 0x{:02X} type {} done",
                request.action(),
                *request.destination(),
                request.type_id()
            );
        }
        self.status.last_retry_count = request.retry_count();
        if request.is_force_publish() {
            self.status.refreshed = true;
        }
        if let Some(type_id) = request.post_read_type_id() {
            let refresh = TxRequest::read(request.destination(), type_id)
                .and_then(|read| self.queue.push_back(read, now));
            if let Err(e) = refresh {
                warn!("Can't queue read of type {}: {}", type_id, e);
            }
        }
        self.push_event(BusEvent::TxSucceeded { request });
    }

    /// Queue an event, dropping the oldest one when the queue is full.
    fn push_event(&mut self, event: BusEvent) {
        let capacity = self.config.event_capacity;
        if self.events.len() >= capacity {
            self.status.events_dropped = self.status.events_dropped.wrapping_add(1);
            if capacity == 0 {
                return;
            }
            trace!("event queue full, dropping {:?}", self.events.pop_front());
        }
        self.events.push_back(event);
    }

    fn set_connected(&mut self, connected: bool) {
        if self.status.connected != connected {
            self.status.connected = connected;
            info!("Bus {}", if connected { "connected" } else { "disconnected" });
            self.push_event(BusEvent::ConnectionChanged { connected });
        }
    }
}
