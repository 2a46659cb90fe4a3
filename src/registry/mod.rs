//! Type registry: which decoder handles a telegram type, scoped by the class
//! of the sending device.
//!
//! The table is static data. Each row names the device class it applies to,
//! the type ID and a [`Decoder`], which says what part of the Device Registry
//! the telegram updates. Identity telegrams are registered for
//! [`DeviceClass::Any`] so they are found before the sender is known.

use core::fmt;

use crate::error::{Error, UnknownTypeSnafu};
use crate::telegram::Telegram;

pub mod boiler;
pub mod heatpump;
pub mod identity;
pub mod solar;
pub mod thermostat;

use boiler::BoilerState;
use heatpump::HeatPumpState;
use solar::SolarState;
use thermostat::{CircuitState, ThermostatState};

/// Broad kind of bus participant. Decides which telegram types apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Matches every device. Only used in type table rows.
    Any,
    Boiler,
    Thermostat,
    SolarModule,
    HeatPump,
    Other,
}

/// What a telegram type updates.
#[derive(Clone, Copy)]
pub enum Decoder {
    /// Product ID and firmware version of the sender.
    Version,
    /// Bitmap of devices present on the bus.
    ActiveDevices,
    Boiler(fn(&Telegram, &mut BoilerState)),
    Thermostat(fn(&Telegram, &mut ThermostatState)),
    /// One heating circuit of a thermostat.
    Circuit {
        hc: u8,
        decode: fn(&Telegram, &mut CircuitState),
    },
    SolarModule(fn(&Telegram, &mut SolarState)),
    HeatPump(fn(&Telegram, &mut HeatPumpState)),
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => f.write_str("Version"),
            Self::ActiveDevices => f.write_str("ActiveDevices"),
            Self::Boiler(_) => f.write_str("Boiler"),
            Self::Thermostat(_) => f.write_str("Thermostat"),
            Self::Circuit { hc, .. } => write!(f, "Circuit({})", hc),
            Self::SolarModule(_) => f.write_str("SolarModule"),
            Self::HeatPump(_) => f.write_str("HeatPump"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypeEntry {
    pub class: DeviceClass,
    pub type_id: u16,
    pub name: &'static str,
    /// The device accepts writes to this type.
    pub writable: bool,
    pub decoder: Decoder,
}

const fn entry(
    class: DeviceClass,
    type_id: u16,
    name: &'static str,
    writable: bool,
    decoder: Decoder,
) -> TypeEntry {
    TypeEntry {
        class,
        type_id,
        name,
        writable,
        decoder,
    }
}

const fn circuit(hc: u8, decode: fn(&Telegram, &mut CircuitState)) -> Decoder {
    Decoder::Circuit { hc, decode }
}

/// Every telegram type the engine decodes.
pub static STANDARD_TYPES: &[TypeEntry] = {
    use thermostat as th;
    use DeviceClass::*;
    &[
        entry(Any, identity::VERSION, "Version", false, Decoder::Version),
        entry(Boiler, identity::UBA_DEVICES, "UBADevices", false, Decoder::ActiveDevices),
        entry(Boiler, boiler::UBA_TOTAL_UPTIME, "UBATotalUptime", false, Decoder::Boiler(boiler::total_uptime)),
        entry(Boiler, boiler::UBA_PARAMETERS, "UBAParameters", true, Decoder::Boiler(boiler::parameters)),
        entry(Boiler, boiler::UBA_MONITOR_FAST, "UBAMonitorFast", false, Decoder::Boiler(boiler::monitor_fast)),
        entry(Boiler, boiler::UBA_MONITOR_SLOW, "UBAMonitorSlow", false, Decoder::Boiler(boiler::monitor_slow)),
        entry(Boiler, boiler::UBA_PARAMETER_WW, "UBAParameterWW", true, Decoder::Boiler(boiler::parameter_ww)),
        entry(Boiler, boiler::UBA_MONITOR_WW, "UBAMonitorWW", false, Decoder::Boiler(boiler::monitor_ww)),
        entry(Thermostat, th::RC_TIME, "RCTime", true, Decoder::Thermostat(th::rc_time)),
        entry(Thermostat, th::RC20_STATUS, "RC20StatusMessage", false, circuit(1, th::rc20_status)),
        entry(Thermostat, th::RC20_SET, "RC20Set", true, circuit(1, th::rc20_set)),
        entry(Thermostat, th::RC30_STATUS, "RC30StatusMessage", false, circuit(1, th::rc20_status)),
        entry(Thermostat, th::RC30_SET, "RC30Set", true, circuit(1, th::rc20_set)),
        entry(Thermostat, th::RC35_STATUS_HC1, "RC35StatusMessage_HC1", false, circuit(1, th::rc35_status)),
        entry(Thermostat, th::RC35_SET_HC1, "RC35Set_HC1", true, circuit(1, th::rc35_set)),
        entry(Thermostat, th::RC35_STATUS_HC2, "RC35StatusMessage_HC2", false, circuit(2, th::rc35_status)),
        entry(Thermostat, th::RC35_SET_HC2, "RC35Set_HC2", true, circuit(2, th::rc35_set)),
        entry(Thermostat, th::EASY_STATUS, "EasyStatusMessage", false, circuit(1, th::easy_status)),
        entry(Thermostat, th::RC_PLUS_STATUS, "RCPLUSStatusMessage", false, circuit(1, th::rc_plus_status)),
        entry(Thermostat, th::RC_PLUS_SET, "RCPLUSSet", true, circuit(1, th::rc_plus_set)),
        entry(Thermostat, th::JUNKERS_STATUS, "JunkersStatusMessage", false, circuit(1, th::junkers_status)),
        entry(SolarModule, solar::SM10_MONITOR, "SM10Monitor", false, Decoder::SolarModule(solar::sm10_monitor)),
        entry(SolarModule, solar::SM100_MONITOR, "SM100Monitor", false, Decoder::SolarModule(solar::sm100_monitor)),
        entry(SolarModule, solar::SM100_STATUS, "SM100Status", false, Decoder::SolarModule(solar::sm100_status)),
        entry(SolarModule, solar::SM100_STATUS2, "SM100Status2", false, Decoder::SolarModule(solar::sm100_status2)),
        entry(SolarModule, solar::SM100_ENERGY, "SM100Energy", false, Decoder::SolarModule(solar::sm100_energy)),
        entry(HeatPump, heatpump::HP_MONITOR1, "HPMonitor1", false, Decoder::HeatPump(heatpump::monitor1)),
        entry(HeatPump, heatpump::HP_MONITOR2, "HPMonitor2", false, Decoder::HeatPump(heatpump::monitor2)),
    ]
};

/// Lookup table from `(device class, type ID)` to a [`TypeEntry`].
#[derive(Debug, Clone, Copy)]
pub struct TypeRegistry {
    entries: &'static [TypeEntry],
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl TypeRegistry {
    pub const fn new(entries: &'static [TypeEntry]) -> Self {
        Self { entries }
    }

    pub const fn standard() -> Self {
        Self::new(STANDARD_TYPES)
    }

    pub fn entries(&self) -> &'static [TypeEntry] {
        self.entries
    }

    /// Find the entry for `type_id` sent by a device of class `class`.
    ///
    /// # Errors
    /// [`Error::UnknownType`] when no row matches. On a shared bus this is
    /// routine and callers normally ignore it.
    pub fn lookup(&self, class: DeviceClass, type_id: u16) -> Result<&'static TypeEntry, Error> {
        self.entries
            .iter()
            .find(|e| e.type_id == type_id && (e.class == class || e.class == DeviceClass::Any))
            .ok_or_else(|| UnknownTypeSnafu { type_id }.build())
    }

    pub fn name_of(&self, type_id: u16) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.type_id == type_id)
            .map(|e| e.name)
    }
}

// Field conversions for the "not set" sentinels devices send.

/// Temperatures and other signed shorts.
pub(crate) fn temperature(v: i16) -> Option<i16> {
    if v == i16::MIN {
        None
    } else {
        Some(v)
    }
}

/// Three byte counters.
pub(crate) fn counter(v: u32) -> Option<u32> {
    if v == 0x00FF_FFFF {
        None
    } else {
        Some(v)
    }
}

pub(crate) fn byte_value(v: u8) -> Option<u8> {
    if v == 0xFF {
        None
    } else {
        Some(v)
    }
}

#[cfg(test)]
pub(crate) fn test_telegram(source: u8, type_id: u16, offset: u8, payload: &[u8]) -> Telegram {
    use crate::frame::Frame;
    use crate::telegram::{encode, Inbound};
    use crate::types::TypeId;

    let frame = encode(source, 0x00, TypeId::new(type_id).unwrap(), offset, payload).unwrap();
    match Telegram::decode(Frame::Telegram(&frame), 0).unwrap() {
        Inbound::Data(t) => t,
        other => panic!("not a data telegram: {:?}", other),
    }
}
