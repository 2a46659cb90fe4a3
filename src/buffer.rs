//! Ingestion stage of the receive pipeline.
//!
//! Bytes are copied into one of a fixed number of preallocated frame buffers
//! until the transport reports a break. The completed buffer is then handed
//! to the processing stage as a [`RawFrame`], which owns it until it is given
//! back with [`RxBuffers::recycle`]. If every buffer is out, incoming frames
//! are dropped and counted as overruns.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use log::trace;

use crate::frame::{is_echo_artifact, MAX_TELEGRAM_LEN};
use crate::telegram::FrameBuf;
use crate::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStatus {
    /// Waiting for the first byte of a frame.
    Idle,
    /// Mid-frame, waiting for the break.
    Assembling,
}

/// A completed, break-delimited frame.
#[derive(Debug)]
pub struct RawFrame {
    bytes: FrameBuf,
    timestamp: Millis,
}

impl RawFrame {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub const fn timestamp(&self) -> Millis {
        self.timestamp
    }
}

impl AsRef<[u8]> for RawFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug)]
enum Current {
    Idle,
    Filling(FrameBuf),
    /// Frame is being dropped: no free buffer, or it outgrew one.
    Discarding,
}

#[derive(Debug)]
pub struct RxBuffers {
    free: Vec<FrameBuf>,
    current: Current,
    ready: VecDeque<RawFrame>,
    echo_filter: bool,
    overruns: u32,
}

impl RxBuffers {
    pub fn new(count: usize, echo_filter: bool) -> Self {
        Self {
            free: (0..count).map(|_| FrameBuf::new()).collect(),
            current: Current::Idle,
            ready: VecDeque::with_capacity(count),
            echo_filter,
            overruns: 0,
        }
    }

    pub fn status(&self) -> RxStatus {
        match self.current {
            Current::Idle => RxStatus::Idle,
            Current::Filling(_) | Current::Discarding => RxStatus::Assembling,
        }
    }

    /// Frames lost since creation.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Buffers neither filling, queued nor held by the processing stage.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn set_echo_filter(&mut self, enabled: bool) {
        self.echo_filter = enabled;
    }

    /// Append bytes to the frame being assembled.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Current::Idle = self.current {
            self.current = match self.free.pop() {
                Some(buf) => Current::Filling(buf),
                None => {
                    trace!("no free rx buffer");
                    self.overruns += 1;
                    Current::Discarding
                }
            };
        }
        if let Current::Filling(buf) = &mut self.current {
            if buf.try_extend_from_slice(bytes).is_err() {
                trace!("rx frame exceeds {} bytes", MAX_TELEGRAM_LEN);
                self.overruns += 1;
                if let Current::Filling(buf) =
                    core::mem::replace(&mut self.current, Current::Discarding)
                {
                    self.give_back(buf);
                }
            }
        }
    }

    /// A break ends the frame. Returns true if a frame was queued for
    /// processing.
    pub fn on_break(&mut self, timestamp: Millis) -> bool {
        match core::mem::replace(&mut self.current, Current::Idle) {
            Current::Filling(buf) => {
                if self.echo_filter && is_echo_artifact(&buf) {
                    trace!("dropping echo artifact");
                    self.give_back(buf);
                    false
                } else {
                    self.ready.push_back(RawFrame {
                        bytes: buf,
                        timestamp,
                    });
                    true
                }
            }
            // consecutive breaks carry nothing
            Current::Idle | Current::Discarding => false,
        }
    }

    /// Hand the oldest completed frame to the processing stage.
    pub fn take_ready(&mut self) -> Option<RawFrame> {
        self.ready.pop_front()
    }

    /// Return a processed frame's buffer to the pool.
    pub fn recycle(&mut self, frame: RawFrame) {
        self.give_back(frame.bytes);
    }

    fn give_back(&mut self, mut buf: FrameBuf) {
        buf.clear();
        self.free.push(buf);
    }
}
