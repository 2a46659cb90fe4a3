use crate::Millis;

/// How much protocol traffic the engine traces through the `log` facade.
///
/// Levels are cumulative only where noted: `Verbose` includes `Basic`,
/// `Raw` and `Thermostat` are independent views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    None,
    /// Every completed frame as hex, polls included.
    Raw,
    /// Outgoing requests and their outcomes.
    Basic,
    /// Decoded telegrams to or from a thermostat.
    Thermostat,
    /// Every decoded telegram, plus `Basic`.
    Verbose,
}

impl LogLevel {
    pub(crate) fn logs_requests(self) -> bool {
        matches!(self, Self::Basic | Self::Verbose)
    }
}

/// Whether a request is on the bus awaiting its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Waiting,
}

/// Bus health and engine switches.
///
/// A snapshot is returned by [`EmsNode::status`](crate::EmsNode::status);
/// only the engine mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusStatus {
    /// Something was received within the bus timeout.
    pub connected: bool,
    /// Answer polls addressed to us when there's nothing to send.
    pub poll_enabled: bool,
    pub log_level: LogLevel,
    pub frames_received: u32,
    pub frames_sent: u32,
    pub crc_errors: u32,
    /// Frames lost to buffer exhaustion or oversize.
    pub rx_overruns: u32,
    /// Events discarded because nobody drained them.
    pub events_dropped: u32,
    /// Retries used by the most recently resolved or retried request.
    pub last_retry_count: u8,
    /// A bus master has polled us, so we may transmit.
    pub tx_capable: bool,
    pub tx_disabled: bool,
    /// Poll bytes and our source byte carry an inverted high bit.
    pub reverse: bool,
    pub tx_state: TxState,
    /// Decoded data changed since the flag was last taken.
    pub refreshed: bool,
    pub last_rx: Option<Millis>,
    /// Interval between the last two polls addressed to us.
    pub poll_interval: Option<Millis>,
    pub(crate) last_poll: Option<Millis>,
}

impl BusStatus {
    pub(crate) fn new(poll_enabled: bool, tx_disabled: bool, reverse: bool, log_level: LogLevel) -> Self {
        Self {
            connected: false,
            poll_enabled,
            log_level,
            frames_received: 0,
            frames_sent: 0,
            crc_errors: 0,
            rx_overruns: 0,
            events_dropped: 0,
            last_retry_count: 0,
            tx_capable: false,
            tx_disabled,
            reverse,
            tx_state: TxState::Idle,
            refreshed: false,
            last_rx: None,
            poll_interval: None,
            last_poll: None,
        }
    }

    /// Transmitting a queued request is allowed.
    pub fn can_transmit(&self) -> bool {
        self.tx_capable && !self.tx_disabled
    }

    pub(crate) fn record_poll(&mut self, now: Millis) {
        if let Some(last) = self.last_poll {
            self.poll_interval = Some(now.saturating_sub(last));
        }
        self.last_poll = Some(now);
    }
}
