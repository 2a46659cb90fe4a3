//! Solar module telegrams (SM10, SM100, ISM1).

use crate::telegram::Telegram;

use super::temperature;

pub const SM10_MONITOR: u16 = 0x97;
pub const SM100_MONITOR: u16 = 0xFF62;
pub const SM100_STATUS: u16 = 0xFF64;
pub const SM100_STATUS2: u16 = 0xFF6A;
pub const SM100_ENERGY: u16 = 0xFF8E;

/// Temperatures are tenths of a degree, energy is Wh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolarState {
    pub collector_temp: Option<i16>,
    pub bottom_temp: Option<i16>,
    /// Percent.
    pub pump_modulation: Option<u8>,
    pub pump: Option<bool>,
    pub energy_last_hour: Option<u32>,
    pub energy_today: Option<u32>,
    pub energy_total: Option<u32>,
}

pub(crate) fn sm10_monitor(t: &Telegram, s: &mut SolarState) {
    if let Some(v) = t.i16_at(2) {
        s.collector_temp = temperature(v);
    }
    if let Some(v) = t.u8_at(4) {
        s.pump_modulation = Some(v);
    }
    if let Some(v) = t.i16_at(5) {
        s.bottom_temp = temperature(v);
    }
    if let Some(v) = t.bit_at(7, 1) {
        s.pump = Some(v);
    }
}

pub(crate) fn sm100_monitor(t: &Telegram, s: &mut SolarState) {
    if let Some(v) = t.i16_at(0) {
        s.collector_temp = temperature(v);
    }
    if let Some(v) = t.i16_at(2) {
        s.bottom_temp = temperature(v);
    }
}

pub(crate) fn sm100_status(t: &Telegram, s: &mut SolarState) {
    if let Some(v) = t.u8_at(9) {
        s.pump_modulation = Some(v);
    }
}

pub(crate) fn sm100_status2(t: &Telegram, s: &mut SolarState) {
    if let Some(v) = t.bit_at(10, 2) {
        s.pump = Some(v);
    }
}

pub(crate) fn sm100_energy(t: &Telegram, s: &mut SolarState) {
    if let Some(v) = t.u32_at(0) {
        s.energy_last_hour = Some(v);
    }
    if let Some(v) = t.u32_at(4) {
        s.energy_today = Some(v);
    }
    if let Some(v) = t.u32_at(8) {
        s.energy_total = Some(v);
    }
}
