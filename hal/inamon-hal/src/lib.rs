//! inamon Hardware Abstraction Layer
//!
//! This crate defines the two collaborators the INA driver consumes but
//! does not implement: the I2C bus and non-volatile storage. Board support
//! code implements these traits once and every INA model works on top.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application                            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  inamon-drivers (Ina driver)            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  inamon-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::I2cBus`] - Blocking I2C bus operations
//! - [`flash::FlashStorage`] - Persistent slot storage

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod i2c;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashStorage, NoStorage, StorageKey};
pub use i2c::I2cBus;
