#![allow(dead_code)]

use std::collections::VecDeque;

use ems_proto::{crc8, TransmitOutcome, Transport};

/// Transport that records what is sent and answers with scripted outcomes,
/// `Success` once the script runs out.
#[derive(Default)]
pub struct ScriptedTransport {
    pub sent: Vec<Vec<u8>>,
    outcomes: VecDeque<TransmitOutcome>,
    pub receive_enabled: bool,
    /// `set_receive_enabled(false)` calls seen.
    pub receive_pauses: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            receive_enabled: true,
            ..Default::default()
        }
    }

    pub fn push_outcome(&mut self, outcome: TransmitOutcome) {
        self.outcomes.push_back(outcome);
    }

    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }

    /// Frames longer than a poll ack.
    pub fn requests(&self) -> Vec<&[u8]> {
        self.sent
            .iter()
            .filter(|f| f.len() > 1)
            .map(Vec::as_slice)
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Transport for ScriptedTransport {
    fn transmit(&mut self, frame: &[u8]) -> TransmitOutcome {
        assert!(!self.receive_enabled, "transmit with receive enabled");
        self.sent.push(frame.to_vec());
        self.outcomes.pop_front().unwrap_or(TransmitOutcome::Success)
    }

    fn set_receive_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.receive_pauses += 1;
        }
        self.receive_enabled = enabled;
    }
}

/// `body` with its CRC appended.
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut f = body.to_vec();
    f.push(crc8(body));
    f
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
