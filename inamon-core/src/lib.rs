//! Board-agnostic core logic for INA power monitors
//!
//! This crate contains everything that does not touch the bus:
//!
//! - Register map and per-model constant table
//! - Calibration engine (LSB factors and calibration register value)
//! - Mode, averaging and conversion-time bit helpers
//! - Raw register to physical unit scaling
//! - Alert threshold and mask/enable encoding
//! - Device descriptor store and its persisted record format

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod alert;
pub mod calibration;
pub mod descriptor;
pub mod measurement;
pub mod mode;
pub mod model;
pub mod persist;
pub mod register;
pub mod timing;

pub use alert::{AlertError, AlertKind};
pub use calibration::{calibrate, Calibration, CalibrationError, ProgrammableGain};
pub use descriptor::{DeviceDescriptor, DeviceId, DeviceStore, StoreError, Target};
pub use measurement::{Measurement, Uncalibrated};
pub use mode::OperatingMode;
pub use model::{ConfigLayout, Model, ModelSpec};
pub use persist::{DescriptorRecord, PersistError};
pub use timing::Setting;
