//! Listen on an EMS bus through a serial adapter and print what is learned.
//!
//! Usage: serial_monitor [port] [--tx]
//!
//! Without `--tx` the node stays silent and only decodes traffic. With it,
//! the node answers polls and asks every device for its version.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serialport::{ClearBuffer, SerialPort};

use ems_proto::{BusEvent, Config, EmsNode, LogLevel, TransmitOutcome, Transport};

/// A gap this long between bytes ends a frame.
const FRAME_GAP: Duration = Duration::from_millis(10);

/// Serial port driving the bus. A frame is terminated by holding the line
/// in break; everything we send comes back as echo and is discarded.
struct EmsPort {
    serial: Box<dyn SerialPort>,
    receiving: bool,
}

impl EmsPort {
    fn send_break(&mut self) -> std::io::Result<()> {
        self.serial.set_break()?;
        // a bit over 11 bit times at 9600 baud
        std::thread::sleep(Duration::from_micros(1_200));
        self.serial.clear_break()?;
        Ok(())
    }
}

impl Transport for EmsPort {
    fn transmit(&mut self, frame: &[u8]) -> TransmitOutcome {
        for (at_byte, byte) in frame.iter().enumerate() {
            if self.serial.write_all(&[*byte]).and_then(|_| self.serial.flush()).is_err() {
                return TransmitOutcome::Timeout { at_byte };
            }
            let mut echo = [0u8];
            match self.serial.read_exact(&mut echo) {
                Ok(()) if echo[0] == *byte => (),
                Ok(()) => return TransmitOutcome::Collision { at_byte },
                Err(_) => return TransmitOutcome::Timeout { at_byte },
            }
        }
        match self.send_break() {
            Ok(()) => TransmitOutcome::Success,
            Err(_) => TransmitOutcome::Timeout { at_byte: frame.len() },
        }
    }

    fn set_receive_enabled(&mut self, enabled: bool) {
        if enabled && !self.receiving {
            // our break shows up as a stray zero byte
            let _ = self.serial.clear(ClearBuffer::Input);
        }
        self.receiving = enabled;
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut path = "/dev/ttyUSB0".to_string();
    let mut transmit = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--tx" => transmit = true,
            _ => path = arg,
        }
    }

    let serial = serialport::new(&path, 9600)
        .timeout(FRAME_GAP)
        .open()
        .with_context(|| format!("failed to open {}", path))?;
    let mut port = EmsPort {
        serial,
        receiving: true,
    };

    let config = Config::new()
        .with_tx_disabled(!transmit)
        .with_log_level(LogLevel::Basic);
    let mut node = EmsNode::new(config);
    let start = Instant::now();
    if transmit {
        let queued = node.discover_models(0)?;
        println!("asking {} devices for their version", queued);
    }

    let mut pending = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let now = start.elapsed().as_millis() as u64;
        match port.serial.read(&mut buf) {
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                if !pending.is_empty() {
                    // the UART reports the terminating break as a zero byte
                    if pending.len() > 1 && pending.last() == Some(&0x00) {
                        pending.pop();
                    }
                    node.receive_bytes(&pending);
                    node.receive_break(now);
                    pending.clear();
                    node.process_pending(&mut port);
                }
                node.tick(now);
            }
            Err(e) => return Err(e).context("serial read failed"),
        }

        while let Some(event) = node.next_event() {
            match event {
                BusEvent::DeviceIdentified { device_id } => {
                    if let Some(record) = node.device(device_id) {
                        println!("{:#04x}: {:?}", device_id, record.identity);
                    }
                }
                BusEvent::ConnectionChanged { connected } => println!("bus connected: {}", connected),
                BusEvent::TxFailed { request, error } => {
                    println!("request to {:?} failed: {}", request.destination(), error)
                }
                BusEvent::TxSucceeded { .. } => (),
            }
        }
        if node.take_refreshed() {
            if let Some(boiler) = node.boiler().as_ref().and_then(|r| r.boiler().cloned()) {
                println!("boiler: {:?}", boiler);
            }
        }
    }
}
