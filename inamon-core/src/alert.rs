//! Alert encoding
//!
//! The mask/enable register (0x06) selects which condition drives the
//! ALERT pin; the alert limit register (0x07) holds the single threshold
//! compared against it. Thresholds are converted to raw register counts
//! with the same LSBs used to read the compared register.
//!
//! ```text
//! Mask/enable: 15 SOL | 14 SUL | 13 BOL | 12 BUL | 11 POL | 10 CNVR | 4-0 flags
//! ```

use crate::descriptor::DeviceDescriptor;
use crate::model::Model;

/// Alert function bits, bits 10-15 of the mask/enable register
pub const ALERT_FUNCTION_MASK: u16 = 0xFC00;

/// Condition that drives the ALERT pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertKind {
    /// Shunt voltage above the limit (mV)
    ShuntOverVoltage,
    /// Shunt voltage below the limit (mV)
    ShuntUnderVoltage,
    /// Bus voltage above the limit (mV)
    BusOverVoltage,
    /// Bus voltage below the limit (mV)
    BusUnderVoltage,
    /// Power above the limit (mW)
    PowerOverLimit,
    /// Conversion finished, no limit
    ConversionReady,
}

impl AlertKind {
    /// Mask/enable bit
    pub const fn bit(self) -> u16 {
        match self {
            AlertKind::ShuntOverVoltage => 1 << 15,
            AlertKind::ShuntUnderVoltage => 1 << 14,
            AlertKind::BusOverVoltage => 1 << 13,
            AlertKind::BusUnderVoltage => 1 << 12,
            AlertKind::PowerOverLimit => 1 << 11,
            AlertKind::ConversionReady => 1 << 10,
        }
    }

    /// Whether the kind compares against the alert limit register
    pub const fn has_limit(self) -> bool {
        !matches!(self, AlertKind::ConversionReady)
    }
}

/// Alert failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertError {
    /// Model has no mask/enable register
    Unsupported,
    /// Threshold does not fit the limit register
    LimitOutOfRange,
    /// Power limit needs a calibrated power LSB
    Uncalibrated,
}

/// Reject models without a mask/enable register
pub const fn check_supported(model: Model) -> Result<(), AlertError> {
    if model.has_alerts() {
        Ok(())
    } else {
        Err(AlertError::Unsupported)
    }
}

/// Raw alert limit register value for `threshold`
///
/// Shunt thresholds are signed mV, bus thresholds mV and power
/// thresholds mW; negative bus or power thresholds are out of range.
/// Models without a shunt register compare the current register, whose
/// counts map onto the same shunt LSB.
pub fn limit_raw(desc: &DeviceDescriptor, kind: AlertKind, threshold: i64) -> Result<u16, AlertError> {
    check_supported(desc.model)?;
    let signed = matches!(kind, AlertKind::ShuntOverVoltage | AlertKind::ShuntUnderVoltage);
    if threshold < 0 && !signed {
        return Err(AlertError::LimitOutOfRange);
    }
    match kind {
        AlertKind::ShuntOverVoltage | AlertKind::ShuntUnderVoltage => {
            let raw = threshold.saturating_mul(1_000_000) / desc.shunt_lsb_nv.max(1) as i64;
            i16::try_from(raw)
                .map(|r| r as u16)
                .map_err(|_| AlertError::LimitOutOfRange)
        }
        AlertKind::BusOverVoltage | AlertKind::BusUnderVoltage => {
            let raw = threshold.saturating_mul(1_000) / desc.bus_lsb_uv.max(1) as i64;
            u16::try_from(raw).map_err(|_| AlertError::LimitOutOfRange)
        }
        AlertKind::PowerOverLimit => {
            if desc.power_lsb_nw == 0 {
                return Err(AlertError::Uncalibrated);
            }
            let raw = threshold.saturating_mul(1_000_000) / desc.power_lsb_nw as i64;
            u16::try_from(raw).map_err(|_| AlertError::LimitOutOfRange)
        }
        AlertKind::ConversionReady => Ok(0),
    }
}

/// Set or clear the bit for `kind`, leaving every other bit untouched
pub const fn update_mask(mask: u16, kind: AlertKind, enabled: bool) -> u16 {
    if enabled {
        mask | kind.bit()
    } else {
        mask & !kind.bit()
    }
}
