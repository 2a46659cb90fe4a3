//! The byte-level side of the bus, supplied by the caller.
//!
//! EMS transmission is echo-paced: every byte written comes back through the
//! receiver before the next one may go out, and a telegram is closed with a
//! break. Implementations do that pacing and report how it ended. The engine
//! never touches hardware itself.

/// Result of pushing one frame onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitOutcome {
    /// Every byte echoed back and the closing break was sent.
    Success,
    /// The echo of byte `at_byte` didn't arrive in time.
    Timeout { at_byte: usize },
    /// Another participant's break interrupted byte `at_byte`.
    Collision { at_byte: usize },
}

/// A serial interface able to transmit one EMS frame.
pub trait Transport {
    /// Write `frame`, waiting for each byte's echo, then send a break.
    fn transmit(&mut self, frame: &[u8]) -> TransmitOutcome;

    /// Called with `false` before and `true` after [`transmit`](Self::transmit),
    /// so the echo of our own frame isn't handed back as a received frame.
    /// Default is a no-op for interfaces that filter the echo themselves.
    fn set_receive_enabled(&mut self, _enabled: bool) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn transmit(&mut self, frame: &[u8]) -> TransmitOutcome {
        (**self).transmit(frame)
    }

    fn set_receive_enabled(&mut self, enabled: bool) {
        (**self).set_receive_enabled(enabled)
    }
}
