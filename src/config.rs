use core::time::Duration;

use crate::status::LogLevel;
use crate::types::{device, DeviceId};

/// The service key ID, our default bus identity.
pub const DEFAULT_OWN_ID: DeviceId = device(0x0B);
pub const DEFAULT_MAX_RETRIES: u8 = 3;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_RX_BUFFERS: usize = 10;
/// Undrained events kept before the oldest is dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Engine settings. Every field has a working default.
///
/// # Example
/// ```
/// use ems_proto::{Config, LogLevel};
/// let config = Config::new().with_max_retries(5).with_log_level(LogLevel::Basic);
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub own_id: DeviceId,
    /// Attempts per request before it's dropped.
    pub max_retries: u8,
    pub queue_capacity: usize,
    pub rx_buffers: usize,
    pub event_capacity: usize,
    /// Silence longer than this marks the bus disconnected.
    pub bus_timeout: Duration,
    /// Longest wait for the answer to a transmitted request.
    pub reply_timeout: Duration,
    pub poll_enabled: bool,
    pub tx_disabled: bool,
    pub reverse: bool,
    /// Drop short runs ending in a break byte, left over from our own echo.
    pub echo_filter: bool,
    /// Queue version reads for devices announced by the boiler.
    pub auto_discover: bool,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            own_id: DEFAULT_OWN_ID,
            max_retries: DEFAULT_MAX_RETRIES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            rx_buffers: DEFAULT_RX_BUFFERS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            bus_timeout: Duration::from_secs(15),
            reply_timeout: Duration::from_secs(2),
            poll_enabled: true,
            tx_disabled: false,
            reverse: false,
            echo_filter: true,
            auto_discover: true,
            log_level: LogLevel::None,
        }
    }

    pub const fn with_own_id(mut self, own_id: DeviceId) -> Self {
        self.own_id = own_id;
        self
    }

    pub const fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub const fn with_rx_buffers(mut self, count: usize) -> Self {
        self.rx_buffers = count;
        self
    }

    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub const fn with_bus_timeout(mut self, timeout: Duration) -> Self {
        self.bus_timeout = timeout;
        self
    }

    pub const fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub const fn with_poll_enabled(mut self, enabled: bool) -> Self {
        self.poll_enabled = enabled;
        self
    }

    pub const fn with_tx_disabled(mut self, disabled: bool) -> Self {
        self.tx_disabled = disabled;
        self
    }

    pub const fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub const fn with_echo_filter(mut self, enabled: bool) -> Self {
        self.echo_filter = enabled;
        self
    }

    pub const fn with_auto_discover(mut self, enabled: bool) -> Self {
        self.auto_discover = enabled;
        self
    }

    pub const fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}
