//! Thermostat telegrams, per heating circuit where the model has several.

use arrayvec::ArrayVec;

use crate::telegram::Telegram;

use super::temperature;

pub const RC_TIME: u16 = 0x06;
pub const EASY_STATUS: u16 = 0x0A;
pub const RC20_STATUS: u16 = 0x91;
pub const RC20_SET: u16 = 0xA8;
pub const RC30_STATUS: u16 = 0x41;
pub const RC30_SET: u16 = 0xA7;
pub const RC35_SET_HC1: u16 = 0x3D;
pub const RC35_STATUS_HC1: u16 = 0x3E;
pub const RC35_SET_HC2: u16 = 0x47;
pub const RC35_STATUS_HC2: u16 = 0x48;
pub const RC_PLUS_STATUS: u16 = 0xFFA5;
pub const RC_PLUS_SET: u16 = 0xFFB9;
pub const JUNKERS_STATUS: u16 = 0xFF6F;

pub const MAX_CIRCUITS: usize = 4;

/// Thermostat clock as last broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clock {
    /// Years since 2000.
    pub year: Option<u8>,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
}

/// Values of one heating circuit. Room temperatures are tenths of a degree,
/// the programmed day/night/holiday temperatures are half degrees as sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitState {
    pub hc: u8,
    pub setpoint_room_temp: Option<i16>,
    pub current_room_temp: Option<i16>,
    /// Model specific: usually 0 = night/low, 1 = day/manual, 2 = auto.
    pub mode: Option<u8>,
    pub day_mode: Option<bool>,
    pub day_temp: Option<u8>,
    pub night_temp: Option<u8>,
    pub holiday_temp: Option<u8>,
    pub heating_type: Option<u8>,
    pub circuit_calc_temp: Option<u8>,
}

impl CircuitState {
    pub const fn new(hc: u8) -> Self {
        Self {
            hc,
            setpoint_room_temp: None,
            current_room_temp: None,
            mode: None,
            day_mode: None,
            day_temp: None,
            night_temp: None,
            holiday_temp: None,
            heating_type: None,
            circuit_calc_temp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermostatState {
    pub clock: Clock,
    circuits: ArrayVec<CircuitState, MAX_CIRCUITS>,
}

impl Default for ThermostatState {
    fn default() -> Self {
        Self {
            clock: Clock::default(),
            circuits: ArrayVec::new(),
        }
    }
}

impl ThermostatState {
    /// Circuits seen so far, in order of first appearance.
    pub fn circuits(&self) -> &[CircuitState] {
        &self.circuits
    }

    pub fn circuit(&self, hc: u8) -> Option<&CircuitState> {
        self.circuits.iter().find(|c| c.hc == hc)
    }

    /// The state of circuit `hc`, added on first use. `None` once
    /// `MAX_CIRCUITS` distinct circuits are tracked.
    pub(crate) fn circuit_mut(&mut self, hc: u8) -> Option<&mut CircuitState> {
        let index = match self.circuits.iter().position(|c| c.hc == hc) {
            Some(i) => i,
            None => {
                self.circuits.try_push(CircuitState::new(hc)).ok()?;
                self.circuits.len() - 1
            }
        };
        self.circuits.get_mut(index)
    }
}

fn half_degrees(v: u8) -> i16 {
    i16::from(v) * 5
}

pub(crate) fn rc_time(t: &Telegram, s: &mut ThermostatState) {
    let c = &mut s.clock;
    let fields = [
        (0, &mut c.year),
        (1, &mut c.month),
        (2, &mut c.hour),
        (3, &mut c.day),
        (4, &mut c.minute),
        (5, &mut c.second),
    ];
    for (pos, field) in fields {
        if let Some(v) = t.u8_at(pos) {
            *field = Some(v);
        }
    }
}

/// RC20 and RC30 share the status layout.
pub(crate) fn rc20_status(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.u8_at(1) {
        c.setpoint_room_temp = Some(half_degrees(v));
    }
    if let Some(v) = t.i16_at(2) {
        c.current_room_temp = temperature(v);
    }
}

/// RC20 and RC30 share the settings layout.
pub(crate) fn rc20_set(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.u8_at(23) {
        c.mode = Some(v);
    }
}

pub(crate) fn rc35_status(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.bit_at(1, 1) {
        c.day_mode = Some(v);
    }
    if let Some(v) = t.u8_at(2) {
        c.setpoint_room_temp = Some(half_degrees(v));
    }
    if let Some(v) = t.i16_at(3) {
        c.current_room_temp = temperature(v);
    }
}

pub(crate) fn rc35_set(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.u8_at(0) {
        c.heating_type = Some(v);
    }
    if let Some(v) = t.u8_at(1) {
        c.night_temp = Some(v);
    }
    if let Some(v) = t.u8_at(2) {
        c.day_temp = Some(v);
    }
    if let Some(v) = t.u8_at(3) {
        c.holiday_temp = Some(v);
    }
    if let Some(v) = t.u8_at(7) {
        c.mode = Some(v);
    }
    if let Some(v) = t.u8_at(14) {
        c.circuit_calc_temp = Some(v);
    }
}

/// Easy thermostats send hundredths.
pub(crate) fn easy_status(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.i16_at(8) {
        c.current_room_temp = temperature(v).map(|v| v / 10);
    }
    if let Some(v) = t.i16_at(10) {
        c.setpoint_room_temp = temperature(v).map(|v| v / 10);
    }
}

pub(crate) fn rc_plus_status(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.i16_at(0) {
        c.current_room_temp = temperature(v);
    }
    if let Some(v) = t.u8_at(3) {
        c.setpoint_room_temp = Some(half_degrees(v));
    }
}

pub(crate) fn rc_plus_set(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.u8_at(0) {
        c.mode = Some(v);
    }
}

pub(crate) fn junkers_status(t: &Telegram, c: &mut CircuitState) {
    if let Some(v) = t.i16_at(2) {
        c.setpoint_room_temp = temperature(v);
    }
    if let Some(v) = t.i16_at(4) {
        c.current_room_temp = temperature(v);
    }
}
