//! Bus-level driver for the INA power monitor family
//!
//! This crate talks to the chips through the traits defined in
//! inamon-hal and uses inamon-core for everything that does not need
//! the bus:
//!
//! - Chip identification by ID registers or configuration pattern
//! - [`Ina`]: calibration, modes, timing, measurements and alerts for
//!   any number of chips on one bus
//! - Descriptor persistence through [`inamon_hal::FlashStorage`]
//! - [`EmbeddedHalBus`] to run on any `embedded-hal` 1.0 I2C master

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod identify;
pub mod ina;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{InaConfig, UnknownModelPolicy};
pub use error::Error;
pub use identify::identify;
pub use ina::Ina;
pub use transport::EmbeddedHalBus;

pub use inamon_core::{DeviceId, Measurement, Model, OperatingMode, Target};
