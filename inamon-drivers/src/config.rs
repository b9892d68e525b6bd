//! Driver configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What to do with a chip that answers but matches no known model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnknownModelPolicy {
    /// Reject the device with [`crate::Error::UnknownModel`]
    #[default]
    Abort,
    /// Keep it with the coarsest constants of the family; alerts,
    /// averaging and conversion times report unsupported
    Conservative,
}

/// Driver behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InaConfig {
    /// Handling of unrecognised chips
    pub unknown_model_policy: UnknownModelPolicy,
    /// Reads spent waiting for a conversion before giving up
    pub conversion_poll_limit: u32,
    /// Save descriptors to storage after every change
    pub persist: bool,
    /// First address scanned by `discover`
    pub scan_start: u8,
    /// Last address scanned by `discover` (inclusive)
    pub scan_end: u8,
}

impl Default for InaConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl InaConfig {
    /// Abort on unknown chips, persist, scan 0x40-0x4F
    pub const DEFAULT: Self = Self {
        unknown_model_policy: UnknownModelPolicy::Abort,
        conversion_poll_limit: 10_000,
        persist: true,
        scan_start: 0x40,
        scan_end: 0x4F,
    };

    /// Like [`InaConfig::DEFAULT`] but never touches storage
    pub const VOLATILE: Self = Self {
        persist: false,
        ..Self::DEFAULT
    };

    /// Scan a different address range
    pub const fn with_scan_range(mut self, start: u8, end: u8) -> Self {
        self.scan_start = start;
        self.scan_end = end;
        self
    }

    /// Replace the unknown-model policy
    pub const fn with_unknown_model_policy(mut self, policy: UnknownModelPolicy) -> Self {
        self.unknown_model_policy = policy;
        self
    }
}
