use crate::telegram::Telegram;

pub const HP_MONITOR1: u16 = 0xE3;
pub const HP_MONITOR2: u16 = 0xE5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeatPumpState {
    /// Percent.
    pub modulation: Option<u8>,
    /// Percent.
    pub speed: Option<u8>,
}

pub(crate) fn monitor1(t: &Telegram, s: &mut HeatPumpState) {
    if let Some(v) = t.u8_at(14) {
        s.modulation = Some(v);
    }
}

pub(crate) fn monitor2(t: &Telegram, s: &mut HeatPumpState) {
    if let Some(v) = t.u8_at(25) {
        s.speed = Some(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_telegram;

    #[test]
    fn test_monitors() {
        let mut s = HeatPumpState::default();
        monitor1(&test_telegram(0x38, HP_MONITOR1, 14, &[0x32]), &mut s);
        monitor2(&test_telegram(0x38, HP_MONITOR2, 20, &[0x55]), &mut s);
        assert_eq!(s.modulation, Some(0x32));
        assert_eq!(s.speed, None);
        monitor2(&test_telegram(0x38, HP_MONITOR2, 25, &[0x55]), &mut s);
        assert_eq!(s.speed, Some(0x55));
    }
}
