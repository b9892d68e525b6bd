//! Operating modes
//!
//! All supported models encode the operating mode in the low three bits
//! of the configuration register with the same meaning.

use serde::{Deserialize, Serialize};

/// MODE field of the configuration register (bits 0-2)
pub const MODE_MASK: u16 = 0x0007;

/// Operating mode
///
/// Triggered modes convert once per configuration write; continuous
/// modes free-run at the configured conversion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// Device powered down
    Shutdown,
    /// Triggered shunt, no bus
    TriggeredShuntOnly,
    /// Triggered bus, no shunt
    TriggeredBusOnly,
    /// Triggered bus and shunt
    TriggeredBoth,
    /// ADC off (INA219) or power-down
    PowerDown,
    /// Continuous shunt, no bus
    ContinuousShuntOnly,
    /// Continuous bus, no shunt
    ContinuousBusOnly,
    /// Continuous bus and shunt
    #[default]
    ContinuousBoth,
}

impl OperatingMode {
    /// MODE field value
    pub const fn bits(self) -> u16 {
        match self {
            OperatingMode::Shutdown => 0b000,
            OperatingMode::TriggeredShuntOnly => 0b001,
            OperatingMode::TriggeredBusOnly => 0b010,
            OperatingMode::TriggeredBoth => 0b011,
            OperatingMode::PowerDown => 0b100,
            OperatingMode::ContinuousShuntOnly => 0b101,
            OperatingMode::ContinuousBusOnly => 0b110,
            OperatingMode::ContinuousBoth => 0b111,
        }
    }

    /// Decode the MODE field of a configuration register value
    pub const fn from_config(config: u16) -> Self {
        match config & MODE_MASK {
            0b000 => OperatingMode::Shutdown,
            0b001 => OperatingMode::TriggeredShuntOnly,
            0b010 => OperatingMode::TriggeredBusOnly,
            0b011 => OperatingMode::TriggeredBoth,
            0b100 => OperatingMode::PowerDown,
            0b101 => OperatingMode::ContinuousShuntOnly,
            0b110 => OperatingMode::ContinuousBusOnly,
            _ => OperatingMode::ContinuousBoth,
        }
    }

    /// Whether each conversion must be started by a configuration write
    pub const fn is_triggered(self) -> bool {
        matches!(
            self,
            OperatingMode::TriggeredShuntOnly
                | OperatingMode::TriggeredBusOnly
                | OperatingMode::TriggeredBoth
        )
    }

    /// Whether the ADC free-runs
    pub const fn is_continuous(self) -> bool {
        matches!(
            self,
            OperatingMode::ContinuousShuntOnly
                | OperatingMode::ContinuousBusOnly
                | OperatingMode::ContinuousBoth
        )
    }
}

/// Replace the MODE bits of `config`, keeping every other bit
pub const fn set_mode_bits(config: u16, mode: OperatingMode) -> u16 {
    (config & !MODE_MASK) | mode.bits()
}
