//! Boiler (UBA) telegrams.

use crate::telegram::Telegram;

use super::{byte_value, counter, temperature};

pub const UBA_TOTAL_UPTIME: u16 = 0x14;
pub const UBA_PARAMETERS: u16 = 0x16;
pub const UBA_MONITOR_FAST: u16 = 0x18;
pub const UBA_MONITOR_SLOW: u16 = 0x19;
pub const UBA_SET_POINTS: u16 = 0x1A;
/// Service test mode; written only.
pub const UBA_FUNCTION_TEST: u16 = 0x1D;
pub const UBA_PARAMETER_WW: u16 = 0x33;
pub const UBA_MONITOR_WW: u16 = 0x34;

/// Selected flow temperature at or above which a burning boiler is heating.
pub const HEATING_FLOW_TEMP: u8 = 70;

/// Last known boiler state. Temperatures are in tenths of a degree Celsius
/// unless noted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoilerState {
    // UBAParameterWW
    pub ww_activated: Option<bool>,
    /// Whole degrees.
    pub ww_selected_temp: Option<u8>,
    pub ww_circulation_pump: Option<bool>,
    /// Whole degrees.
    pub ww_desired_temp: Option<u8>,
    /// 0x00 hot, 0xD8 eco, 0xEC intelligent.
    pub ww_comfort: Option<u8>,

    // UBAMonitorFast
    /// Whole degrees.
    pub selected_flow_temp: Option<u8>,
    pub current_flow_temp: Option<i16>,
    pub return_temp: Option<i16>,
    pub burner_gas: Option<bool>,
    pub fan_working: Option<bool>,
    pub ignition_working: Option<bool>,
    pub heating_pump: Option<bool>,
    /// Three way valve on warm water.
    pub ww_heating: Option<bool>,
    pub ww_circulation: Option<bool>,
    /// Percent.
    pub selected_burner_power: Option<u8>,
    pub current_burner_power: Option<u8>,
    /// Micro ampere, tenths.
    pub flame_current: Option<u16>,
    /// Tenths of a bar.
    pub system_pressure: Option<u8>,
    /// The two characters shown on the boiler display.
    pub service_code_display: Option<[u8; 2]>,
    pub service_code: Option<u16>,

    // UBAMonitorSlow
    pub outside_temp: Option<i16>,
    pub boiler_temp: Option<i16>,
    /// Percent.
    pub pump_modulation: Option<u8>,
    pub burner_starts: Option<u32>,
    /// Minutes.
    pub burner_work_min: Option<u32>,
    pub heating_work_min: Option<u32>,

    // UBAMonitorWW
    pub ww_current_temp: Option<i16>,
    pub ww_starts: Option<u32>,
    pub ww_work_min: Option<u32>,
    pub ww_one_time: Option<bool>,
    /// Tenths of a litre per minute.
    pub ww_current_flow: Option<u8>,

    /// Minutes.
    pub uba_uptime: Option<u32>,

    // UBAParameters
    pub heating_temp: Option<u8>,
    pub pump_mod_max: Option<u8>,
    pub pump_mod_min: Option<u8>,

    pub tapwater_active: Option<bool>,
    pub heating_active: Option<bool>,
}

impl BoilerState {
    /// Derive the tap water / heating activity from the monitor values.
    fn update_activity(&mut self) {
        if let (Some(flow), Some(gas)) = (self.ww_current_flow, self.burner_gas) {
            self.tapwater_active = Some(flow != 0 && gas);
        }
        if let (Some(sel), Some(gas)) = (self.selected_flow_temp, self.burner_gas) {
            self.heating_active = Some(sel >= HEATING_FLOW_TEMP && gas);
        }
    }
}

pub(crate) fn monitor_fast(t: &Telegram, b: &mut BoilerState) {
    if let Some(v) = t.u8_at(0) {
        b.selected_flow_temp = Some(v);
    }
    if let Some(v) = t.i16_at(1) {
        b.current_flow_temp = temperature(v);
    }
    if let Some(v) = t.u8_at(3) {
        b.selected_burner_power = Some(v);
    }
    if let Some(v) = t.u8_at(4) {
        b.current_burner_power = Some(v);
    }
    if let Some(v) = t.u8_at(7) {
        b.burner_gas = Some(v & 0x01 != 0);
        b.fan_working = Some(v & 0x04 != 0);
        b.ignition_working = Some(v & 0x08 != 0);
        b.heating_pump = Some(v & 0x20 != 0);
        b.ww_heating = Some(v & 0x40 != 0);
        b.ww_circulation = Some(v & 0x80 != 0);
    }
    if let Some(v) = t.i16_at(13) {
        b.return_temp = temperature(v);
    }
    if let Some(v) = t.u16_at(15) {
        b.flame_current = Some(v);
    }
    if let Some(v) = t.u8_at(17) {
        b.system_pressure = byte_value(v);
    }
    if let (Some(c1), Some(c2)) = (t.u8_at(18), t.u8_at(19)) {
        b.service_code_display = Some([c1, c2]);
    }
    if let Some(v) = t.u16_at(20) {
        b.service_code = Some(v);
    }
    b.update_activity();
}

pub(crate) fn monitor_slow(t: &Telegram, b: &mut BoilerState) {
    if let Some(v) = t.i16_at(0) {
        b.outside_temp = temperature(v);
    }
    if let Some(v) = t.i16_at(2) {
        b.boiler_temp = temperature(v);
    }
    if let Some(v) = t.u8_at(9) {
        b.pump_modulation = Some(v);
    }
    if let Some(v) = t.u24_at(10) {
        b.burner_starts = counter(v);
    }
    if let Some(v) = t.u24_at(13) {
        b.burner_work_min = counter(v);
    }
    if let Some(v) = t.u24_at(19) {
        b.heating_work_min = counter(v);
    }
}

pub(crate) fn monitor_ww(t: &Telegram, b: &mut BoilerState) {
    if let Some(v) = t.i16_at(1) {
        b.ww_current_temp = temperature(v);
    }
    if let Some(v) = t.bit_at(5, 1) {
        b.ww_one_time = Some(v);
    }
    if let Some(v) = t.u8_at(9) {
        b.ww_current_flow = Some(v);
    }
    if let Some(v) = t.u24_at(10) {
        b.ww_work_min = counter(v);
    }
    if let Some(v) = t.u24_at(13) {
        b.ww_starts = counter(v);
    }
    b.update_activity();
}

pub(crate) fn parameter_ww(t: &Telegram, b: &mut BoilerState) {
    if let Some(v) = t.u8_at(1) {
        b.ww_activated = Some(v == 0xFF);
    }
    if let Some(v) = t.u8_at(2) {
        b.ww_selected_temp = Some(v);
    }
    if let Some(v) = t.u8_at(6) {
        b.ww_circulation_pump = Some(v == 0xFF);
    }
    if let Some(v) = t.u8_at(8) {
        b.ww_desired_temp = Some(v);
    }
    if let Some(v) = t.u8_at(9) {
        b.ww_comfort = Some(v);
    }
}

pub(crate) fn total_uptime(t: &Telegram, b: &mut BoilerState) {
    if let Some(v) = t.u24_at(0) {
        b.uba_uptime = counter(v);
    }
}

pub(crate) fn parameters(t: &Telegram, b: &mut BoilerState) {
    if let Some(v) = t.u8_at(1) {
        b.heating_temp = Some(v);
    }
    if let Some(v) = t.u8_at(9) {
        b.pump_mod_max = Some(v);
    }
    if let Some(v) = t.u8_at(10) {
        b.pump_mod_min = Some(v);
    }
}
