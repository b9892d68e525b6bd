//! Averaging and conversion-time settings
//!
//! The chips only accept a handful of discrete averaging counts and
//! conversion times. A request is mapped to the closest supported value
//! at or below it (or the smallest one if the request is below every
//! entry), then written into the configuration register through the
//! layout-specific bit helpers below.
//!
//! # Register layouts
//!
//! ```text
//! INA226 layout:  15 RST | 14-12 fixed | 11-9 AVG  | 8-6 VBUSCT | 5-3 VSHCT | 2-0 MODE
//! INA219 layout:  15 RST | 14 -  | 13 BRNG | 12-11 PG | 10-7 BADC | 6-3 SADC | 2-0 MODE
//! ```
//!
//! The INA219 has no separate averaging field: BADC/SADC select either
//! a resolution (codes 0-3) or a sample count at 12 bits (codes 8-15).
//! Averaging therefore rewrites both ADC fields and a later conversion
//! time request overrides the averaging of that channel.

use crate::calibration::ProgrammableGain;
use crate::model::ConfigLayout;
use crate::register;

/// A register field inside the configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    mask: u16,
    shift: u16,
}

impl Field {
    const fn insert(self, config: u16, code: u16) -> u16 {
        (config & !self.mask) | ((code << self.shift) & self.mask)
    }
}

/// AVG, bits 9-11
const INA226_AVG: Field = Field { mask: 0x0E00, shift: 9 };
/// VBUSCT, bits 6-8
const INA226_VBUSCT: Field = Field { mask: 0x01C0, shift: 6 };
/// VSHCT, bits 3-5
const INA226_VSHCT: Field = Field { mask: 0x0038, shift: 3 };
/// BADC, bits 7-10
const INA219_BADC: Field = Field { mask: 0x0780, shift: 7 };
/// SADC, bits 3-6
const INA219_SADC: Field = Field { mask: 0x0078, shift: 3 };
/// PG, bits 11-12
const INA219_PG: Field = Field { mask: 0x1800, shift: 11 };
/// BRNG, bit 13 (set = 32V bus range)
const INA219_BRNG: u16 = 1 << 13;

/// A supported discrete setting and its field code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Setting {
    /// Sample count or conversion time in µs
    pub value: u32,
    /// Field code written to the register
    pub code: u16,
}

const fn s(value: u32, code: u16) -> Setting {
    Setting { value, code }
}

const INA226_AVERAGES: [Setting; 8] = [
    s(1, 0),
    s(4, 1),
    s(16, 2),
    s(64, 3),
    s(128, 4),
    s(256, 5),
    s(512, 6),
    s(1024, 7),
];

const INA226_CONVERSION_US: [Setting; 8] = [
    s(140, 0),
    s(204, 1),
    s(332, 2),
    s(588, 3),
    s(1100, 4),
    s(2116, 5),
    s(4156, 6),
    s(8244, 7),
];

const INA219_AVERAGES: [Setting; 8] = [
    s(1, 0b1000),
    s(2, 0b1001),
    s(4, 0b1010),
    s(8, 0b1011),
    s(16, 0b1100),
    s(32, 0b1101),
    s(64, 0b1110),
    s(128, 0b1111),
];

// 9 to 12 bit single samples, then 12 bit averaged
const INA219_CONVERSION_US: [Setting; 11] = [
    s(84, 0b0000),
    s(148, 0b0001),
    s(276, 0b0010),
    s(532, 0b0011),
    s(1060, 0b1001),
    s(2130, 0b1010),
    s(4260, 0b1011),
    s(8510, 0b1100),
    s(17020, 0b1101),
    s(34050, 0b1110),
    s(68100, 0b1111),
];

/// Closest entry at or below `requested`, else the smallest entry
fn at_or_below(table: &[Setting], requested: u32) -> Option<Setting> {
    table
        .iter()
        .rev()
        .find(|setting| setting.value <= requested)
        .or_else(|| table.first())
        .copied()
}

/// Pick the averaging setting for `requested` samples
///
/// Returns `None` if the layout has no averaging control.
pub fn select_averaging(layout: ConfigLayout, requested: u32) -> Option<Setting> {
    match layout {
        ConfigLayout::Ina226 => at_or_below(&INA226_AVERAGES, requested),
        ConfigLayout::Ina219 => at_or_below(&INA219_AVERAGES, requested),
        ConfigLayout::ModeOnly => None,
    }
}

/// Pick the conversion time setting for `requested_us`
///
/// Bus and shunt channels share the same list on every layout.
/// Returns `None` if the layout has no conversion time control.
pub fn select_conversion_time(layout: ConfigLayout, requested_us: u32) -> Option<Setting> {
    match layout {
        ConfigLayout::Ina226 => at_or_below(&INA226_CONVERSION_US, requested_us),
        ConfigLayout::Ina219 => at_or_below(&INA219_CONVERSION_US, requested_us),
        ConfigLayout::ModeOnly => None,
    }
}

/// Write an averaging setting into `config`
///
/// INA226 layout: AVG (`0x0E00`). INA219 layout: BADC (`0x0780`) and
/// SADC (`0x0078`). Mode-only layout: unchanged.
pub const fn set_averaging_bits(layout: ConfigLayout, config: u16, setting: Setting) -> u16 {
    match layout {
        ConfigLayout::Ina226 => INA226_AVG.insert(config, setting.code),
        ConfigLayout::Ina219 => {
            INA219_SADC.insert(INA219_BADC.insert(config, setting.code), setting.code)
        }
        ConfigLayout::ModeOnly => config,
    }
}

/// Write a bus conversion time into `config`
///
/// INA226 layout: VBUSCT (`0x01C0`). INA219 layout: BADC (`0x0780`).
pub const fn set_bus_conversion_bits(layout: ConfigLayout, config: u16, setting: Setting) -> u16 {
    match layout {
        ConfigLayout::Ina226 => INA226_VBUSCT.insert(config, setting.code),
        ConfigLayout::Ina219 => INA219_BADC.insert(config, setting.code),
        ConfigLayout::ModeOnly => config,
    }
}

/// Write a shunt conversion time into `config`
///
/// INA226 layout: VSHCT (`0x0038`). INA219 layout: SADC (`0x0078`).
pub const fn set_shunt_conversion_bits(layout: ConfigLayout, config: u16, setting: Setting) -> u16 {
    match layout {
        ConfigLayout::Ina226 => INA226_VSHCT.insert(config, setting.code),
        ConfigLayout::Ina219 => INA219_SADC.insert(config, setting.code),
        ConfigLayout::ModeOnly => config,
    }
}

/// Write the INA219 gain (`0x1800`) and select the 32V bus range
pub const fn set_gain_bits(config: u16, gain: ProgrammableGain) -> u16 {
    INA219_PG.insert(config, gain.bits()) | INA219_BRNG
}

/// Register and flag that signal a completed conversion
///
/// INA226 layout: CVRF in the mask/enable register. INA219 layout: CNVR
/// in the bus voltage register. Reading the mask/enable register clears
/// CVRF.
pub const fn conversion_ready_flag(layout: ConfigLayout) -> Option<(u8, u16)> {
    match layout {
        ConfigLayout::Ina226 => Some((register::MASK_ENABLE, register::CONVERSION_READY_FLAG)),
        ConfigLayout::Ina219 => Some((register::BUS_VOLTAGE, register::INA219_CONVERSION_READY)),
        ConfigLayout::ModeOnly => None,
    }
}
