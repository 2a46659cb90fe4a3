//! Device registry: bus participants seen so far, their identity and their
//! last decoded state.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use log::{debug, info};

use crate::registry::boiler::BoilerState;
use crate::registry::heatpump::HeatPumpState;
use crate::registry::identity::{self, Version};
use crate::registry::solar::SolarState;
use crate::registry::thermostat::ThermostatState;
use crate::registry::{Decoder, DeviceClass, TypeEntry};
use crate::telegram::Telegram;

pub const BOILER_ID: u8 = 0x08;
pub const SOLAR_MODULE_ID: u8 = 0x30;
pub const HEAT_PUMP_ID: u8 = 0x38;
pub const GATEWAY_ID: u8 = 0x48;

pub const PRODUCT_SM10: u8 = 73;
pub const PRODUCT_SM100: u8 = 163;
pub const PRODUCT_ISM1: u8 = 101;
pub const PRODUCT_HEATRONIC3: u8 = 95;

/// Thermostat families, which differ in telegram layout and write support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatKind {
    Es73,
    Rc10,
    Rc20,
    Rc30,
    Rc35,
    Easy,
    RcPlus,
    Junkers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Boiler,
    Thermostat(ThermostatKind),
    SolarModule,
    HeatPump,
    Other,
}

impl ModelKind {
    pub const fn class(self) -> DeviceClass {
        match self {
            Self::Boiler => DeviceClass::Boiler,
            Self::Thermostat(_) => DeviceClass::Thermostat,
            Self::SolarModule => DeviceClass::SolarModule,
            Self::HeatPump => DeviceClass::HeatPump,
            Self::Other => DeviceClass::Other,
        }
    }
}

/// A known product.
#[derive(Debug, PartialEq, Eq)]
pub struct Model {
    pub product_id: u8,
    /// Bus ID the product uses. `None` for boilers, which answer on
    /// [`BOILER_ID`] whatever the product.
    pub device_id: Option<u8>,
    pub kind: ModelKind,
    pub name: &'static str,
    pub write_supported: bool,
}

const fn boiler(product_id: u8, name: &'static str) -> Model {
    Model {
        product_id,
        device_id: None,
        kind: ModelKind::Boiler,
        name,
        write_supported: true,
    }
}

const fn model(product_id: u8, device_id: u8, kind: ModelKind, name: &'static str, write_supported: bool) -> Model {
    Model {
        product_id,
        device_id: Some(device_id),
        kind,
        name,
        write_supported,
    }
}

pub static MODELS: &[Model] = {
    use ModelKind::{HeatPump, Other, SolarModule, Thermostat};
    use ThermostatKind::*;
    &[
        boiler(72, "MC10 Module"),
        boiler(84, "Sieger BK15 Boiler"),
        boiler(PRODUCT_HEATRONIC3, "Bosch Condens 2500/Junkers Heatronic3"),
        boiler(115, "Buderus GB162/Nefit Topline Compact"),
        boiler(122, "Nefit Proline"),
        boiler(123, "Buderus GB172/Nefit Trendline"),
        boiler(203, "Buderus Logamax U122"),
        boiler(208, "Buderus Logamax plus/GB192"),
        model(76, 0x10, Thermostat(Es73), "Sieger ES73", true),
        model(79, 0x17, Thermostat(Rc10), "RC10/Nefit Moduline 100", true),
        model(77, 0x17, Thermostat(Rc20), "RC20/Nefit Moduline 300", true),
        model(93, 0x18, Thermostat(Rc20), "RC20F", true),
        model(78, 0x10, Thermostat(Rc30), "RC30/Nefit Moduline 400", true),
        model(86, 0x10, Thermostat(Rc35), "RC35", true),
        model(202, 0x18, Thermostat(Easy), "TC100/Nefit Easy", false),
        model(158, 0x10, Thermostat(RcPlus), "RC300/RC310", false),
        model(165, 0x18, Thermostat(RcPlus), "RC100", false),
        model(111, 0x18, Thermostat(Junkers), "Junkers FR10", false),
        model(105, 0x18, Thermostat(Junkers), "Junkers FR100", false),
        model(107, 0x10, Thermostat(Junkers), "Junkers FW100", false),
        model(PRODUCT_SM10, SOLAR_MODULE_ID, SolarModule, "SM10 Solar Module", false),
        model(PRODUCT_SM100, SOLAR_MODULE_ID, SolarModule, "SM100 Solar Module", false),
        model(PRODUCT_ISM1, SOLAR_MODULE_ID, SolarModule, "Junkers ISM1 Solar Module", false),
        model(252, HEAT_PUMP_ID, HeatPump, "HeatPump Module", false),
        model(69, 0x21, Other, "MM10 Mixer Module", false),
        model(71, 0x11, Other, "WM10 Switch Module", false),
        model(160, 0x20, Other, "MM100 Mixing Module", false),
        model(190, 0x09, Other, "BC10 Base Controller", false),
        model(125, 0x09, Other, "BC25 Base Controller", false),
        model(68, 0x09, Other, "BC10/RFM20 Receiver", false),
        model(PRODUCT_HEATRONIC3, GATEWAY_ID, Other, "Web Gateway KM200", false),
    ]
};

/// Find the model a device reports. Boiler rows match on [`BOILER_ID`] only,
/// so a gateway sharing a boiler's product ID still resolves correctly.
pub fn find_model(device_id: u8, product_id: u8) -> Option<&'static Model> {
    MODELS.iter().find(|m| {
        m.product_id == product_id
            && match m.device_id {
                Some(id) => id == device_id,
                None => device_id == BOILER_ID,
            }
    })
}

/// Class assumed for a device whose identity hasn't been read yet.
pub const fn default_class(device_id: u8) -> DeviceClass {
    match device_id {
        BOILER_ID => DeviceClass::Boiler,
        SOLAR_MODULE_ID => DeviceClass::SolarModule,
        HEAT_PUMP_ID => DeviceClass::HeatPump,
        0x10..=0x1F => DeviceClass::Thermostat,
        _ => DeviceClass::Other,
    }
}

/// Distinct bus IDs of every model in the table.
pub fn known_device_ids() -> Vec<u8> {
    let mut ids: Vec<u8> = MODELS
        .iter()
        .map(|m| m.device_id.unwrap_or(BOILER_ID))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Who a device is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub device_id: u8,
    pub product_id: Option<u8>,
    pub model: Option<&'static Model>,
    pub version: Option<Version>,
}

/// Decoded state, one variant per device class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Boiler(BoilerState),
    Thermostat(ThermostatState),
    SolarModule(SolarState),
    HeatPump(HeatPumpState),
    /// A known product we don't decode telegrams for.
    Other,
    /// Nothing known about the product yet.
    Generic,
}

impl DeviceState {
    fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Boiler => Self::Boiler(BoilerState::default()),
            DeviceClass::Thermostat => Self::Thermostat(ThermostatState::default()),
            DeviceClass::SolarModule => Self::SolarModule(SolarState::default()),
            DeviceClass::HeatPump => Self::HeatPump(HeatPumpState::default()),
            DeviceClass::Other => Self::Other,
            DeviceClass::Any => Self::Generic,
        }
    }

    pub fn class(&self) -> DeviceClass {
        match self {
            Self::Boiler(_) => DeviceClass::Boiler,
            Self::Thermostat(_) => DeviceClass::Thermostat,
            Self::SolarModule(_) => DeviceClass::SolarModule,
            Self::HeatPump(_) => DeviceClass::HeatPump,
            Self::Other | Self::Generic => DeviceClass::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub identity: Identity,
    pub state: DeviceState,
}

impl DeviceRecord {
    fn new(device_id: u8) -> Self {
        let class = default_class(device_id);
        let state = match class {
            DeviceClass::Other => DeviceState::Generic,
            _ => DeviceState::for_class(class),
        };
        Self {
            identity: Identity {
                device_id,
                product_id: None,
                model: None,
                version: None,
            },
            state,
        }
    }

    pub fn device_id(&self) -> u8 {
        self.identity.device_id
    }

    pub fn class(&self) -> DeviceClass {
        self.state.class()
    }

    pub fn is_identified(&self) -> bool {
        self.identity.product_id.is_some()
    }

    pub fn boiler(&self) -> Option<&BoilerState> {
        match &self.state {
            DeviceState::Boiler(b) => Some(b),
            _ => None,
        }
    }

    pub fn thermostat(&self) -> Option<&ThermostatState> {
        match &self.state {
            DeviceState::Thermostat(t) => Some(t),
            _ => None,
        }
    }

    pub fn solar_module(&self) -> Option<&SolarState> {
        match &self.state {
            DeviceState::SolarModule(s) => Some(s),
            _ => None,
        }
    }

    pub fn heat_pump(&self) -> Option<&HeatPumpState> {
        match &self.state {
            DeviceState::HeatPump(h) => Some(h),
            _ => None,
        }
    }
}

/// Outcome of applying a telegram to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Applied {
    /// A record's state changed.
    Updated,
    /// A version reply was stored. `first` is set the first time the device
    /// is identified.
    Identified { first: bool },
    /// Devices the boiler reports as present.
    ActiveDevices(Vec<u8>),
    /// Telegram didn't fit the record.
    Skipped,
}

/// Records keyed by device ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: BTreeMap<u8, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: u8) -> Option<&DeviceRecord> {
        self.devices.get(&device_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Class of a device: from its record if there is one, else by ID.
    pub fn class_of(&self, device_id: u8) -> DeviceClass {
        self.devices
            .get(&device_id)
            .map_or_else(|| default_class(device_id), DeviceRecord::class)
    }

    pub fn boiler(&self) -> Option<&DeviceRecord> {
        self.devices.values().find(|r| r.boiler().is_some())
    }

    pub fn thermostats(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values().filter(|r| r.thermostat().is_some())
    }

    pub fn solar_module(&self) -> Option<&DeviceRecord> {
        self.devices.values().find(|r| r.solar_module().is_some())
    }

    pub fn heat_pump(&self) -> Option<&DeviceRecord> {
        self.devices.values().find(|r| r.heat_pump().is_some())
    }

    /// Records of known products that aren't boilers, thermostats, solar
    /// modules or heat pumps.
    pub fn others(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices
            .values()
            .filter(|r| matches!(r.state, DeviceState::Other))
    }

    pub(crate) fn entry(&mut self, device_id: u8) -> &mut DeviceRecord {
        self.devices
            .entry(device_id)
            .or_insert_with(|| DeviceRecord::new(device_id))
    }

    /// Store identity from a version reply. The record changes variant if
    /// the model belongs to another class than assumed; state decoded under
    /// the old class is dropped then.
    pub(crate) fn identify(&mut self, device_id: u8, product_id: u8, version: Version) -> bool {
        let model = find_model(device_id, product_id);
        let record = self.entry(device_id);
        let first = record.identity.product_id.is_none();

        let class = model.map_or_else(|| record.class(), |m| m.kind.class());
        if record.class() != class || (model.is_some() && record.state == DeviceState::Generic) {
            record.state = DeviceState::for_class(class);
        }
        record.identity.product_id = Some(product_id);
        record.identity.model = model;
        record.identity.version = Some(version);

        if first {
            match model {
                Some(m) => info!(
                    "Found {} (device 0x{:02X}, product {}, version {})",
                    m.name, device_id, product_id, version
                ),
                None => info!(
                    "Found unknown device 0x{:02X} (product {}, version {})",
                    device_id, product_id, version
                ),
            }
        }
        first
    }

    /// Run the decoder of `entry` on `telegram`, updating the sender's record.
    pub(crate) fn apply(&mut self, entry: &TypeEntry, telegram: &Telegram) -> Applied {
        let source = telegram.source();
        match entry.decoder {
            Decoder::Version => match identity::version(telegram) {
                Some((product_id, version)) => Applied::Identified {
                    first: self.identify(source, product_id, version),
                },
                None => Applied::Skipped,
            },
            Decoder::ActiveDevices => Applied::ActiveDevices(identity::active_devices(telegram)),
            decoder => {
                let record = self.entry(source);
                match (decoder, &mut record.state) {
                    (Decoder::Boiler(f), DeviceState::Boiler(s)) => f(telegram, s),
                    (Decoder::Thermostat(f), DeviceState::Thermostat(s)) => f(telegram, s),
                    (Decoder::Circuit { hc, decode }, DeviceState::Thermostat(s)) => {
                        match s.circuit_mut(hc) {
                            Some(c) => decode(telegram, c),
                            None => {
                                debug!("0x{:02X}: no room for heating circuit {}", source, hc);
                                return Applied::Skipped;
                            }
                        }
                    }
                    (Decoder::SolarModule(f), DeviceState::SolarModule(s)) => f(telegram, s),
                    (Decoder::HeatPump(f), DeviceState::HeatPump(s)) => f(telegram, s),
                    _ => {
                        debug!(
                            "{} doesn't apply to device 0x{:02X}",
                            entry.name, source
                        );
                        return Applied::Skipped;
                    }
                }
                Applied::Updated
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{test_telegram, TypeRegistry};

    fn apply(reg: &mut DeviceRegistry, t: &Telegram) -> Applied {
        let class = reg.class_of(t.source());
        let entry = TypeRegistry::standard().lookup(class, t.type_id()).unwrap();
        reg.apply(entry, t)
    }

    #[test]
    fn test_find_model() {
        assert_eq!(find_model(0x08, 123).unwrap().name, "Buderus GB172/Nefit Trendline");
        assert_eq!(find_model(0x48, 95).unwrap().name, "Web Gateway KM200");
        assert_eq!(find_model(0x08, 95).unwrap().kind, ModelKind::Boiler);
        assert!(find_model(0x08, 73).is_none());
        assert!(find_model(0x30, 1).is_none());
    }

    #[test]
    fn test_default_class() {
        assert_eq!(default_class(0x08), DeviceClass::Boiler);
        assert_eq!(default_class(0x17), DeviceClass::Thermostat);
        assert_eq!(default_class(0x30), DeviceClass::SolarModule);
        assert_eq!(default_class(0x38), DeviceClass::HeatPump);
        assert_eq!(default_class(0x21), DeviceClass::Other);
    }

    #[test]
    fn test_identify_idempotent() {
        let mut reg = DeviceRegistry::new();
        let t = test_telegram(0x17, identity::VERSION, 0, &[77, 0x02, 0x01]);
        assert_eq!(apply(&mut reg, &t), Applied::Identified { first: true });
        assert_eq!(apply(&mut reg, &t), Applied::Identified { first: false });
        assert_eq!(reg.len(), 1);

        let rec = reg.get(0x17).unwrap();
        assert_eq!(rec.identity.model.unwrap().name, "RC20/Nefit Moduline 300");
        assert_eq!(rec.identity.version, Some(Version { major: 2, minor: 1 }));
        assert!(rec.thermostat().is_some());
    }

    #[test]
    fn test_identify_keeps_state_of_same_class() {
        let mut reg = DeviceRegistry::new();
        apply(&mut reg, &test_telegram(0x08, 0x18, 13, &[0x01, 0xA4]));
        apply(&mut reg, &test_telegram(0x08, identity::VERSION, 0, &[123, 6, 2]));
        let boiler = reg.boiler().unwrap();
        assert_eq!(boiler.boiler().unwrap().return_temp, Some(420));
        assert!(boiler.is_identified());
    }

    #[test]
    fn test_generic_becomes_other() {
        let mut reg = DeviceRegistry::new();
        reg.entry(0x21);
        assert_eq!(reg.get(0x21).unwrap().state, DeviceState::Generic);
        apply(&mut reg, &test_telegram(0x21, identity::VERSION, 0, &[69, 1, 0]));
        assert_eq!(reg.get(0x21).unwrap().state, DeviceState::Other);
        assert_eq!(reg.others().count(), 1);
    }

    #[test]
    fn test_circuit_dispatch() {
        let mut reg = DeviceRegistry::new();
        let t = test_telegram(0x10, crate::registry::thermostat::RC35_STATUS_HC2, 2, &[0x28]);
        assert_eq!(apply(&mut reg, &t), Applied::Updated);
        let th = reg.get(0x10).unwrap().thermostat().unwrap();
        assert_eq!(th.circuit(2).unwrap().setpoint_room_temp, Some(200));
        assert_eq!(reg.thermostats().count(), 1);
    }

    #[test]
    fn test_circuit_overflow_skipped() {
        use crate::registry::thermostat::{rc35_status, MAX_CIRCUITS};
        use crate::registry::{Decoder, TypeEntry};

        let mut reg = DeviceRegistry::new();
        for hc in 1..=MAX_CIRCUITS as u8 + 1 {
            let entry = TypeEntry {
                class: DeviceClass::Thermostat,
                type_id: 0x60 + u16::from(hc),
                name: "Circuit",
                writable: false,
                decoder: Decoder::Circuit {
                    hc,
                    decode: rc35_status,
                },
            };
            let t = test_telegram(0x10, entry.type_id, 2, &[0x28]);
            let expected = if usize::from(hc) <= MAX_CIRCUITS {
                Applied::Updated
            } else {
                Applied::Skipped
            };
            assert_eq!(reg.apply(&entry, &t), expected);
        }
        let th = reg.get(0x10).unwrap().thermostat().unwrap();
        assert_eq!(th.circuits().len(), MAX_CIRCUITS);
    }

    #[test]
    fn test_clear() {
        let mut reg = DeviceRegistry::new();
        reg.entry(0x08);
        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.boiler().is_none());
    }

    #[test]
    fn test_known_device_ids() {
        let ids = known_device_ids();
        assert!(ids.contains(&BOILER_ID));
        assert!(ids.contains(&0x17));
        assert!(ids.contains(&GATEWAY_ID));
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
