//! Supported INA models and their constants
//!
//! Every model-specific number the driver needs lives in one
//! [`ModelSpec`] per [`Model`]. Control flow is shared; only the data
//! differs between chips.

use serde::{Deserialize, Serialize};

use crate::register;

/// Known INA chip variants
///
/// INA220 is indistinguishable from INA219 over the bus and reports as
/// [`Model::Ina219`]. INA231 is register-identical to INA230 and reports
/// as [`Model::Ina230`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Model {
    /// SOT-23 / SOIC-8, programmable gain, 26V bus
    Ina219,
    /// VSSOP-10, 36V bus
    Ina226,
    /// QFN-16, 28V bus
    Ina230,
    /// TSSOP-16, integrated 2mΩ shunt
    Ina260,
    /// Responded but did not match any signature
    Unknown,
}

/// Configuration register bit layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigLayout {
    /// BRNG, PG, BADC (averaging and resolution combined), SADC, MODE
    Ina219,
    /// AVG, VBUSCT, VSHCT, MODE
    Ina226,
    /// Only the MODE bits are assumed
    ModeOnly,
}

/// Constants describing one model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Short name, at most 7 characters
    pub name: &'static str,
    /// Bus voltage LSB in µV
    pub bus_lsb_uv: u32,
    /// Status bits below the bus voltage value
    pub bus_voltage_shift: u16,
    /// Shunt voltage LSB in nV
    pub shunt_lsb_nv: u32,
    /// Calibration constant for current LSB in nA and shunt in µΩ
    pub calib_const: u64,
    /// Power LSB as a multiple of the current LSB
    pub power_constant: u32,
    /// Current LSB granularity in nA
    pub current_lsb_step_na: u32,
    /// Current LSB fixed by the silicon (no calibration register)
    pub fixed_current_lsb_na: Option<u32>,
    /// Shunt built into the package
    pub integrated_shunt_uohm: Option<u32>,
    /// Writable bits of the calibration register
    pub calibration_mask: u16,
    /// Register holding the current reading
    pub current_register: u8,
    /// Register holding the shunt voltage, if any
    ///
    /// Without one, shunt voltage is derived from the current register.
    pub shunt_register: Option<u8>,
    /// Whether the calibration register exists
    pub has_calibration_register: bool,
    /// Whether the mask/enable and alert limit registers exist
    pub has_alerts: bool,
    /// Whether the shunt ADC has a programmable gain amplifier
    pub has_programmable_gain: bool,
    /// Configuration register layout
    pub layout: ConfigLayout,
}

const INA219_SPEC: ModelSpec = ModelSpec {
    name: "INA219",
    bus_lsb_uv: 4_000,
    bus_voltage_shift: register::INA219_BUS_VOLTAGE_SHIFT,
    shunt_lsb_nv: 10_000,
    calib_const: 409_600_000,
    power_constant: 20,
    current_lsb_step_na: 1_000,
    fixed_current_lsb_na: None,
    integrated_shunt_uohm: None,
    // Bit 0 is read-only
    calibration_mask: 0xFFFE,
    current_register: register::CURRENT,
    shunt_register: Some(register::SHUNT_VOLTAGE),
    has_calibration_register: true,
    has_alerts: false,
    has_programmable_gain: true,
    layout: ConfigLayout::Ina219,
};

const INA226_SPEC: ModelSpec = ModelSpec {
    name: "INA226",
    bus_lsb_uv: 1_250,
    bus_voltage_shift: 0,
    shunt_lsb_nv: 2_500,
    calib_const: 51_200_000,
    power_constant: 25,
    current_lsb_step_na: 1_000,
    fixed_current_lsb_na: None,
    integrated_shunt_uohm: None,
    calibration_mask: 0x7FFF,
    current_register: register::CURRENT,
    shunt_register: Some(register::SHUNT_VOLTAGE),
    has_calibration_register: true,
    has_alerts: true,
    has_programmable_gain: false,
    layout: ConfigLayout::Ina226,
};

const INA230_SPEC: ModelSpec = ModelSpec {
    name: "INA230",
    ..INA226_SPEC
};

const INA260_SPEC: ModelSpec = ModelSpec {
    name: "INA260",
    bus_lsb_uv: 1_250,
    bus_voltage_shift: 0,
    // No shunt register: one current count (1.25mA) across the 2mΩ shunt
    shunt_lsb_nv: 2_500,
    calib_const: 51_200_000,
    power_constant: 8,
    current_lsb_step_na: 1_250_000,
    fixed_current_lsb_na: Some(1_250_000),
    integrated_shunt_uohm: Some(2_000),
    calibration_mask: 0x7FFF,
    current_register: register::INA260_CURRENT,
    shunt_register: None,
    has_calibration_register: false,
    has_alerts: true,
    has_programmable_gain: false,
    layout: ConfigLayout::Ina226,
};

// Coarsest LSBs of the family, no optional registers assumed.
const UNKNOWN_SPEC: ModelSpec = ModelSpec {
    name: "UNKNOWN",
    has_programmable_gain: false,
    layout: ConfigLayout::ModeOnly,
    ..INA219_SPEC
};

impl Model {
    /// Every identifiable model, in probe order
    pub const KNOWN: [Model; 4] = [Model::Ina219, Model::Ina226, Model::Ina230, Model::Ina260];

    /// Constant table entry for this model
    pub const fn spec(self) -> &'static ModelSpec {
        match self {
            Model::Ina219 => &INA219_SPEC,
            Model::Ina226 => &INA226_SPEC,
            Model::Ina230 => &INA230_SPEC,
            Model::Ina260 => &INA260_SPEC,
            Model::Unknown => &UNKNOWN_SPEC,
        }
    }

    /// Short display name
    pub const fn name(self) -> &'static str {
        self.spec().name
    }

    /// Whether the model exposes the mask/enable register
    pub const fn has_alerts(self) -> bool {
        self.spec().has_alerts
    }

    /// Classify from the die ID register of a TI part
    pub const fn from_die_id(die_id: u16) -> Model {
        match die_id {
            register::INA226_DIE_ID => Model::Ina226,
            register::INA260_DIE_ID => Model::Ina260,
            _ => Model::Unknown,
        }
    }

    /// Classify from the configuration register of a part without
    /// manufacturer/die ID registers
    pub const fn from_config_pattern(config: u16) -> Model {
        match config {
            0x0000 | 0xFFFF => Model::Unknown,
            c if c & register::INA226_LAYOUT_MARKER != 0 => Model::Ina230,
            _ => Model::Ina219,
        }
    }
}
