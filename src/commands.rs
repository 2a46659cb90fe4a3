//! Ready-made write requests for common settings.
//!
//! Each builder returns a [`TxRequest`] to hand to
//! [`EmsNode::submit`](crate::EmsNode::submit). Writes that the target
//! echoes in a readable record carry a validate chain, so they only succeed
//! once the new value has been read back.

use snafu::ensure;

use crate::devices::{DeviceRecord, ModelKind, ThermostatKind, BOILER_ID};
use crate::error::{Error, ValueOutOfRangeSnafu, WriteNotSupportedSnafu};
use crate::registry::boiler::{UBA_FUNCTION_TEST, UBA_MONITOR_FAST, UBA_PARAMETER_WW, UBA_SET_POINTS};
use crate::registry::thermostat as th;
use crate::tx_queue::TxRequest;

/// Hottest warm water setting accepted.
pub const MAX_WARM_WATER_TEMP: u8 = 60;

const WW_ACTIVATED_OFFSET: u8 = 1;
const WW_TEMP_OFFSET: u8 = 2;
const WW_COMFORT_OFFSET: u8 = 9;
const FLOW_TEMP_OFFSET: u8 = 0;

const FUNCTION_TEST_LEN: usize = 13;
const TEST_MODE_ON: u8 = 0x5A;

const RC20_TEMP_OFFSET: u8 = 28;
const RC20_MODE_OFFSET: u8 = 23;

const RC35_NIGHT_OFFSET: u8 = 1;
const RC35_DAY_OFFSET: u8 = 2;
const RC35_HOLIDAY_OFFSET: u8 = 3;
const RC35_TEMP_OFFSET: u8 = 37;
const RC35_MODE_OFFSET: u8 = 7;

/// Which programmed temperature a thermostat write changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempTarget {
    Night,
    Day,
    Holiday,
    /// The setpoint in effect right now.
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatMode {
    Night = 0,
    Day = 1,
    Auto = 2,
}

/// Warm water comfort setting of the boiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comfort {
    Hot,
    Eco,
    Intelligent,
}

impl Comfort {
    pub const fn value(self) -> u8 {
        match self {
            Self::Hot => 0x00,
            Self::Eco => 0xD8,
            Self::Intelligent => 0xEC,
        }
    }
}

/// Where a thermostat family keeps its writable settings.
struct Layout {
    set_type: u16,
    status_type: u16,
    mode_offset: u8,
}

fn layout(record: &DeviceRecord, hc: u8) -> Result<(ThermostatKind, Layout), Error> {
    let model = match record.identity.model {
        Some(model) if model.write_supported => model,
        _ => return WriteNotSupportedSnafu.fail(),
    };
    let kind = match model.kind {
        ModelKind::Thermostat(kind) => kind,
        _ => return WriteNotSupportedSnafu.fail(),
    };
    let layout = match kind {
        ThermostatKind::Rc20 | ThermostatKind::Rc10 => {
            ensure!(hc == 1, ValueOutOfRangeSnafu);
            Layout {
                set_type: th::RC20_SET,
                status_type: th::RC20_STATUS,
                mode_offset: RC20_MODE_OFFSET,
            }
        }
        ThermostatKind::Rc30 => {
            ensure!(hc == 1, ValueOutOfRangeSnafu);
            Layout {
                set_type: th::RC30_SET,
                status_type: th::RC30_STATUS,
                mode_offset: RC20_MODE_OFFSET,
            }
        }
        ThermostatKind::Rc35 | ThermostatKind::Es73 => {
            let (set_type, status_type) = match hc {
                1 => (th::RC35_SET_HC1, th::RC35_STATUS_HC1),
                2 => (th::RC35_SET_HC2, th::RC35_STATUS_HC2),
                _ => return ValueOutOfRangeSnafu.fail(),
            };
            Layout {
                set_type,
                status_type,
                mode_offset: RC35_MODE_OFFSET,
            }
        }
        ThermostatKind::Easy | ThermostatKind::RcPlus | ThermostatKind::Junkers => {
            return WriteNotSupportedSnafu.fail()
        }
    };
    Ok((kind, layout))
}

/// One byte write, read back at the same place, then the status record
/// refreshed.
fn validated_write(record: &DeviceRecord, layout: &Layout, offset: u8, value: u8) -> Result<TxRequest, Error> {
    TxRequest::write(record.device_id(), layout.set_type, offset, &[value])?
        .validate_with(layout.set_type, offset, value)?
        .then_read(layout.status_type)
}

/// Half degree steps, as thermostats store them.
fn half_degrees(temp: f32) -> Result<u8, Error> {
    let v = temp * 2.0;
    ensure!((0.0..=f32::from(u8::MAX)).contains(&v), ValueOutOfRangeSnafu);
    Ok((v + 0.5) as u8)
}

/// Set a thermostat temperature for heating circuit `hc`.
///
/// RC20 and RC30 models keep a single setpoint, so `target` only matters for
/// the RC35 family.
///
/// # Errors
/// [`Error::WriteNotSupported`] if the record isn't an identified, writable
/// thermostat. [`Error::ValueOutOfRange`] for a circuit the model lacks or an
/// unrepresentable temperature.
pub fn set_thermostat_temp(
    record: &DeviceRecord,
    hc: u8,
    target: TempTarget,
    temp: f32,
) -> Result<TxRequest, Error> {
    let (kind, layout) = layout(record, hc)?;
    let offset = match kind {
        ThermostatKind::Rc35 | ThermostatKind::Es73 => match target {
            TempTarget::Night => RC35_NIGHT_OFFSET,
            TempTarget::Day => RC35_DAY_OFFSET,
            TempTarget::Holiday => RC35_HOLIDAY_OFFSET,
            TempTarget::Current => RC35_TEMP_OFFSET,
        },
        _ => RC20_TEMP_OFFSET,
    };
    validated_write(record, &layout, offset, half_degrees(temp)?)
}

pub fn set_thermostat_mode(record: &DeviceRecord, hc: u8, mode: ThermostatMode) -> Result<TxRequest, Error> {
    let (_, layout) = layout(record, hc)?;
    validated_write(record, &layout, layout.mode_offset, mode as u8)
}

/// Warm water target temperature, degrees.
pub fn set_warm_water_temp(temp: u8) -> Result<TxRequest, Error> {
    ensure!(temp <= MAX_WARM_WATER_TEMP, ValueOutOfRangeSnafu);
    TxRequest::write(BOILER_ID, UBA_PARAMETER_WW, WW_TEMP_OFFSET, &[temp])?
        .validate_with(UBA_PARAMETER_WW, WW_TEMP_OFFSET, temp)
}

/// Heating flow temperature, degrees. The boiler doesn't echo set points, so
/// the monitor record is read instead of validating.
pub fn set_flow_temp(temp: u8) -> Result<TxRequest, Error> {
    TxRequest::write(BOILER_ID, UBA_SET_POINTS, FLOW_TEMP_OFFSET, &[temp])?.then_read(UBA_MONITOR_FAST)
}

pub fn set_warm_water_activated(activated: bool) -> Result<TxRequest, Error> {
    let value = if activated { 0xFF } else { 0x00 };
    TxRequest::write(BOILER_ID, UBA_PARAMETER_WW, WW_ACTIVATED_OFFSET, &[value])?
        .validate_with(UBA_PARAMETER_WW, WW_ACTIVATED_OFFSET, value)
}

/// Turn the hot tap water supply off or back on.
///
/// Switching off puts the boiler into its function test mode with the burner
/// at 0%, the pump at 100% and the 3-way valve on warm water, so no heat
/// reaches the tap. Switching on leaves test mode. The boiler doesn't report
/// test mode, so there is nothing to validate.
pub fn set_warm_tap_water_activated(activated: bool) -> Result<TxRequest, Error> {
    let mut data = [0u8; FUNCTION_TEST_LEN];
    if !activated {
        data[0] = TEST_MODE_ON;
        data[3] = 0x64;
        data[4] = 0xFF;
    }
    TxRequest::write(BOILER_ID, UBA_FUNCTION_TEST, 0, &data)
}

pub fn set_warm_water_comfort(comfort: Comfort) -> Result<TxRequest, Error> {
    let value = comfort.value();
    TxRequest::write(BOILER_ID, UBA_PARAMETER_WW, WW_COMFORT_OFFSET, &[value])?
        .validate_with(UBA_PARAMETER_WW, WW_COMFORT_OFFSET, value)
}
