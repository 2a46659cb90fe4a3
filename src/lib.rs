//! Sans-io protocol engine for the EMS bus used by Buderus, Nefit, Bosch and
//! Junkers heating appliances.
//!
//! The crate decodes the telegrams exchanged between boilers, thermostats,
//! solar modules and heat pumps, keeps a registry of the devices it has
//! seen, and takes part in the bus as a polled node to read and write
//! values. Serial I/O and time are left to the caller: bytes and breaks are
//! fed in, a [`Transport`] is lent for transmitting, and every time
//! dependent call takes a [`Millis`] timestamp.
//!
//! Start with [`EmsNode`].

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod buffer;
pub mod commands;
mod config;
mod crc;
pub mod devices;
mod error;
mod frame;
mod node;
mod nom_parser;
pub mod registry;
mod status;
mod telegram;
mod transport;
mod tx_queue;
pub mod types;

/// Milliseconds from any monotonic clock of the caller's choosing.
pub type Millis = u64;

pub use buffer::{RawFrame, RxBuffers, RxStatus};
pub use config::{Config, DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_RETRIES, DEFAULT_OWN_ID, DEFAULT_QUEUE_CAPACITY, DEFAULT_RX_BUFFERS};
pub use crc::{check as check_crc, crc8};
pub use devices::{DeviceRecord, DeviceRegistry, DeviceState};
pub use error::Error;
pub use frame::{is_echo_artifact, validate as validate_frame, Frame, MAX_TELEGRAM_LEN, MIN_TELEGRAM_LEN};
pub use node::{BusEvent, EmsNode};
pub use registry::{DeviceClass, TypeRegistry};
pub use status::{BusStatus, LogLevel, TxState};
pub use telegram::{encode, FrameBuf, Inbound, Payload, Telegram, MAX_PAYLOAD_LEN};
pub use transport::{TransmitOutcome, Transport};
pub use tx_queue::{TxAction, TxQueue, TxRequest, DEFAULT_READ_LENGTH};
pub use types::{device, type_id, DeviceId, IntoDeviceId, IntoTypeId, TypeId};
