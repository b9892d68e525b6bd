//! Calibration engine
//!
//! Maps a model plus the user's physical parameters (maximum expected
//! bus current and shunt resistance) to the LSB factors and the value of
//! the chip's calibration register. Pure integer math: currents in nA,
//! power in nW, resistance in µΩ.
//!
//! The datasheet formula `CAL = k / (Current_LSB[A] * R[Ω])` becomes
//! `calib_const / (current_lsb_na * shunt_uohm / 100_000)` once both
//! quantities are expressed in those units. The calibration register is
//! 15 bits wide on every model, so any result outside `1..=0x7FFF` means
//! the requested current / shunt combination does not fit the chip's
//! dynamic range.

use serde::{Deserialize, Serialize};

use crate::model::Model;

/// Full-scale current maps onto this many positive counts
pub const CURRENT_FULL_SCALE: u64 = 32_767;

/// Highest value the calibration register can hold
pub const MAX_CALIBRATION: u64 = 0x7FFF;

/// INA219 shunt ADC gain setting (PG bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgrammableGain {
    /// ±40 mV
    Div1,
    /// ±80 mV
    Div2,
    /// ±160 mV
    Div4,
    /// ±320 mV (power-on default)
    Div8,
}

impl ProgrammableGain {
    const ALL: [ProgrammableGain; 4] = [
        ProgrammableGain::Div1,
        ProgrammableGain::Div2,
        ProgrammableGain::Div4,
        ProgrammableGain::Div8,
    ];

    /// Full-scale shunt voltage in µV
    pub const fn full_scale_uv(self) -> u64 {
        match self {
            ProgrammableGain::Div1 => 40_000,
            ProgrammableGain::Div2 => 80_000,
            ProgrammableGain::Div4 => 160_000,
            ProgrammableGain::Div8 => 320_000,
        }
    }

    /// PG field value (bits 11-12 of the configuration register)
    pub const fn bits(self) -> u16 {
        match self {
            ProgrammableGain::Div1 => 0b00,
            ProgrammableGain::Div2 => 0b01,
            ProgrammableGain::Div4 => 0b10,
            ProgrammableGain::Div8 => 0b11,
        }
    }

    /// Smallest range covering `max_shunt_uv`, saturating at /8
    pub fn for_shunt_voltage(max_shunt_uv: u64) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|gain| gain.full_scale_uv() >= max_shunt_uv)
            .unwrap_or(ProgrammableGain::Div8)
    }
}

/// Calibration failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Maximum bus current of zero
    ZeroMaxCurrent,
    /// Shunt resistance of zero
    ZeroShuntResistance,
    /// The combination cannot be represented in the calibration register
    OutOfRange,
}

/// Result of a calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Calibration register value, `1..=0x7FFF`
    pub register: u16,
    /// Current LSB in nA
    pub current_lsb_na: u32,
    /// Power LSB in nW
    pub power_lsb_nw: u32,
    /// Shunt ADC gain (INA219 only)
    pub gain: Option<ProgrammableGain>,
}

/// Smallest current LSB that keeps `max_bus_amps` inside 15 bits,
/// rounded up to a multiple of `step_na`
pub fn minimum_current_lsb_na(max_bus_amps: u16, step_na: u32) -> u64 {
    let exact = (max_bus_amps as u64 * 1_000_000_000).div_ceil(CURRENT_FULL_SCALE);
    let step = step_na.max(1) as u64;
    exact.div_ceil(step) * step
}

/// Compute the calibration for `model`
///
/// Never touches the chip. The caller writes [`Calibration::register`]
/// to the calibration register and stores the LSBs in the descriptor.
///
/// # Example
/// ```
/// use inamon_core::{calibrate, Model};
///
/// // 20A through a 0.1Ω shunt
/// let cal = calibrate(Model::Ina226, 20, 100_000).unwrap();
/// assert_eq!(cal.current_lsb_na, 611_000);
/// assert_eq!(cal.register, 83);
/// ```
pub fn calibrate(
    model: Model,
    max_bus_amps: u16,
    shunt_micro_ohms: u32,
) -> Result<Calibration, CalibrationError> {
    if max_bus_amps == 0 {
        return Err(CalibrationError::ZeroMaxCurrent);
    }
    if shunt_micro_ohms == 0 {
        return Err(CalibrationError::ZeroShuntResistance);
    }

    let spec = model.spec();
    let shunt_uohm = spec.integrated_shunt_uohm.unwrap_or(shunt_micro_ohms) as u64;
    let required_lsb = minimum_current_lsb_na(max_bus_amps, spec.current_lsb_step_na);

    let current_lsb_na = match spec.fixed_current_lsb_na {
        Some(fixed) if (fixed as u64) < required_lsb => return Err(CalibrationError::OutOfRange),
        Some(fixed) => fixed as u64,
        None => required_lsb,
    };

    let divisor = current_lsb_na * shunt_uohm / 100_000;
    if divisor == 0 {
        return Err(CalibrationError::OutOfRange);
    }
    let register = spec.calib_const / divisor;
    if register == 0 || register > MAX_CALIBRATION {
        return Err(CalibrationError::OutOfRange);
    }
    let register = register as u16 & spec.calibration_mask;
    if register == 0 {
        return Err(CalibrationError::OutOfRange);
    }

    let power_lsb_nw = current_lsb_na * spec.power_constant as u64;
    let current_lsb_na = u32::try_from(current_lsb_na).map_err(|_| CalibrationError::OutOfRange)?;
    let power_lsb_nw = u32::try_from(power_lsb_nw).map_err(|_| CalibrationError::OutOfRange)?;

    let gain = spec
        .has_programmable_gain
        .then(|| ProgrammableGain::for_shunt_voltage(max_bus_amps as u64 * shunt_uohm));

    Ok(Calibration {
        register,
        current_lsb_na,
        power_lsb_nw,
        gain,
    })
}
