//! Per-device state and the device store
//!
//! A [`DeviceDescriptor`] holds everything needed to talk to one chip
//! without probing it again: address, model, calibration register value
//! and the derived LSB factors. Descriptors live in a fixed-capacity
//! [`DeviceStore`] ordered by detection; a descriptor's position is its
//! [`DeviceId`] and never changes until the store is cleared.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::calibration::{Calibration, ProgrammableGain};
use crate::mode::OperatingMode;
use crate::model::Model;

/// Derived state of one attached chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    /// 7-bit bus address
    pub address: u8,
    /// Identified model
    pub model: Model,
    /// Calibration register value, 0 until calibrated
    pub calibration: u16,
    /// Shunt voltage LSB in nV
    pub shunt_lsb_nv: u32,
    /// Bus voltage LSB in µV
    pub bus_lsb_uv: u32,
    /// Current LSB in nA
    pub current_lsb_na: u32,
    /// Power LSB in nW
    pub power_lsb_nw: u32,
    /// Shunt ADC gain (INA219 only)
    pub gain: Option<ProgrammableGain>,
    /// Last requested operating mode
    pub mode: OperatingMode,
    /// Maximum expected bus current in A
    pub max_bus_amps: u16,
    /// Shunt resistance in µΩ
    pub shunt_micro_ohms: u32,
}

impl DeviceDescriptor {
    /// Uncalibrated descriptor with the model's fixed LSBs
    pub const fn new(address: u8, model: Model) -> Self {
        let spec = model.spec();
        Self {
            address,
            model,
            calibration: 0,
            shunt_lsb_nv: spec.shunt_lsb_nv,
            bus_lsb_uv: spec.bus_lsb_uv,
            current_lsb_na: 0,
            power_lsb_nw: 0,
            gain: None,
            mode: OperatingMode::ContinuousBoth,
            max_bus_amps: 0,
            shunt_micro_ohms: 0,
        }
    }

    /// Fixed short name of the model
    pub const fn display_name(&self) -> &'static str {
        self.model.name()
    }

    /// Whether current and power can be scaled
    pub const fn is_calibrated(&self) -> bool {
        self.calibration != 0
    }

    /// Record a calibration result and the inputs that produced it
    pub fn apply_calibration(&mut self, max_bus_amps: u16, shunt_micro_ohms: u32, cal: Calibration) {
        self.calibration = cal.register;
        self.current_lsb_na = cal.current_lsb_na;
        self.power_lsb_nw = cal.power_lsb_nw;
        self.gain = cal.gain;
        self.max_bus_amps = max_bus_amps;
        self.shunt_micro_ohms = shunt_micro_ohms;
    }

    /// Forget the calibration after the chip was reset
    ///
    /// Models without a calibration register keep theirs, the silicon
    /// never loses it.
    pub fn clear_calibration(&mut self) {
        if self.model.spec().has_calibration_register {
            self.calibration = 0;
            self.current_lsb_na = 0;
            self.power_lsb_nw = 0;
            self.gain = None;
        }
        self.mode = OperatingMode::ContinuousBoth;
    }
}

/// Stable handle to a descriptor (its detection order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(usize);

impl DeviceId {
    /// Handle for the descriptor at `index`
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in detection order
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One device or every device in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    /// A single device
    Device(DeviceId),
    /// Every known device, in detection order
    All,
}

impl From<DeviceId> for Target {
    fn from(id: DeviceId) -> Self {
        Target::Device(id)
    }
}

/// Store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Capacity reached
    Full,
    /// Another descriptor already uses the address
    DuplicateAddress,
    /// No descriptor with this id
    InvalidDevice,
}

/// Fixed-capacity, append-only list of descriptors
#[derive(Debug, Clone, Default)]
pub struct DeviceStore<const N: usize> {
    devices: Vec<DeviceDescriptor, N>,
}

impl<const N: usize> DeviceStore<N> {
    /// Create an empty store
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is known
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Maximum number of descriptors
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append a descriptor, returning its id
    pub fn push(&mut self, descriptor: DeviceDescriptor) -> Result<DeviceId, StoreError> {
        if self.find(descriptor.address).is_some() {
            return Err(StoreError::DuplicateAddress);
        }
        let id = DeviceId(self.devices.len());
        self.devices
            .push(descriptor)
            .map_err(|_| StoreError::Full)?;
        Ok(id)
    }

    /// Descriptor for `id`
    pub fn get(&self, id: DeviceId) -> Result<&DeviceDescriptor, StoreError> {
        self.devices.get(id.0).ok_or(StoreError::InvalidDevice)
    }

    /// Mutable descriptor for `id`
    pub fn get_mut(&mut self, id: DeviceId) -> Result<&mut DeviceDescriptor, StoreError> {
        self.devices.get_mut(id.0).ok_or(StoreError::InvalidDevice)
    }

    /// Id of the descriptor at `address`
    pub fn find(&self, address: u8) -> Option<DeviceId> {
        self.devices
            .iter()
            .position(|d| d.address == address)
            .map(DeviceId)
    }

    /// Ids selected by `target`
    ///
    /// A single id must exist. [`Target::All`] on an empty store yields
    /// nothing.
    pub fn select(&self, target: Target) -> Result<impl Iterator<Item = DeviceId>, StoreError> {
        let range = match target {
            Target::Device(id) if id.0 < self.devices.len() => id.0..id.0 + 1,
            Target::Device(_) => return Err(StoreError::InvalidDevice),
            Target::All => 0..self.devices.len(),
        };
        Ok(range.map(DeviceId))
    }

    /// All ids in detection order
    pub fn ids(&self) -> impl Iterator<Item = DeviceId> {
        (0..self.devices.len()).map(DeviceId)
    }

    /// All descriptors in detection order
    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.iter()
    }

    /// Drop every descriptor
    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
