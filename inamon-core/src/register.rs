//! INA register map
//!
//! Register pointers shared by the whole family. Not every model
//! implements every register; [`crate::ModelSpec`] records which ones
//! exist and where a model deviates (the INA260 has no shunt voltage or
//! calibration register and keeps current at 0x01).

/// Configuration register
pub const CONFIGURATION: u8 = 0x00;
/// Shunt voltage register
pub const SHUNT_VOLTAGE: u8 = 0x01;
/// Bus voltage register
pub const BUS_VOLTAGE: u8 = 0x02;
/// Power register
pub const POWER: u8 = 0x03;
/// Current register
pub const CURRENT: u8 = 0x04;
/// Calibration register
pub const CALIBRATION: u8 = 0x05;
/// Mask/enable register (not on INA219)
pub const MASK_ENABLE: u8 = 0x06;
/// Alert limit register (not on INA219)
pub const ALERT_LIMIT: u8 = 0x07;
/// Manufacturer ID register (not on INA219/INA230)
pub const MANUFACTURER_ID: u8 = 0xFE;
/// Die ID register (not on INA219/INA230)
pub const DIE_ID: u8 = 0xFF;

/// INA260 current register
pub const INA260_CURRENT: u8 = 0x01;

/// Write to the configuration register to reset the device
pub const RESET: u16 = 0x8000;

/// "TI" in ASCII, read from [`MANUFACTURER_ID`]
pub const TI_MANUFACTURER_ID: u16 = 0x5449;
/// Hard-coded die ID of the INA226
pub const INA226_DIE_ID: u16 = 0x2260;
/// Hard-coded die ID of the INA260
pub const INA260_DIE_ID: u16 = 0x2270;

/// Configuration bit that always reads 1 on the INA226 layout
/// and 0 on the INA219
pub const INA226_LAYOUT_MARKER: u16 = 1 << 14;

/// CVRF conversion-ready flag in [`MASK_ENABLE`]
pub const CONVERSION_READY_FLAG: u16 = 1 << 3;
/// CNVR conversion-ready flag in the INA219 [`BUS_VOLTAGE`] register
pub const INA219_CONVERSION_READY: u16 = 1 << 1;
/// Number of status bits below the INA219 bus voltage value
pub const INA219_BUS_VOLTAGE_SHIFT: u16 = 3;
