//! Raw register to physical unit scaling
//!
//! `physical = raw * LSB` in integer math. Bus voltage and power are
//! unsigned registers; shunt voltage and current are two's complement
//! on every model.

use crate::descriptor::DeviceDescriptor;

/// Current or power requested from a descriptor that was never calibrated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uncalibrated;

/// One full set of readings from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Bus voltage in mV
    pub bus_millivolts: u32,
    /// Shunt voltage in µV
    pub shunt_microvolts: i32,
    /// Current in µA
    pub current_microamps: i64,
    /// Power in µW
    pub power_microwatts: u64,
}

/// Bus voltage in mV from the bus voltage register
///
/// Status bits below the value (INA219 CNVR/OVF) are discarded.
pub fn bus_millivolts(desc: &DeviceDescriptor, raw: u16) -> u32 {
    let counts = (raw >> desc.model.spec().bus_voltage_shift) as u32;
    counts * desc.bus_lsb_uv / 1_000
}

/// Shunt voltage in µV
///
/// `raw` comes from the shunt voltage register, or from the current
/// register on models without one (see [`crate::ModelSpec::shunt_register`]).
pub fn shunt_microvolts(desc: &DeviceDescriptor, raw: u16) -> i32 {
    let counts = raw as i16 as i64;
    (counts * desc.shunt_lsb_nv as i64 / 1_000) as i32
}

/// Current in µA from the current register
pub fn current_microamps(desc: &DeviceDescriptor, raw: u16) -> Result<i64, Uncalibrated> {
    if !desc.is_calibrated() {
        return Err(Uncalibrated);
    }
    let counts = raw as i16 as i64;
    Ok(counts * desc.current_lsb_na as i64 / 1_000)
}

/// Power in µW from the power register
pub fn power_microwatts(desc: &DeviceDescriptor, raw: u16) -> Result<u64, Uncalibrated> {
    if !desc.is_calibrated() {
        return Err(Uncalibrated);
    }
    Ok(raw as u64 * desc.power_lsb_nw as u64 / 1_000)
}
