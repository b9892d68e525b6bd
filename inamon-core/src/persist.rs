//! Persisted descriptor record
//!
//! Each descriptor is stored in its own slot as a postcard-serialized
//! [`DescriptorRecord`]. The record carries a magic number, a format
//! version and a CRC32 over the descriptor's own postcard bytes, so a
//! stale or half-written slot is rejected instead of producing wrong
//! readings.

use inamon_hal::FlashError;
use serde::{Deserialize, Serialize};

use crate::descriptor::DeviceDescriptor;

/// Magic number to identify a descriptor record
pub const RECORD_MAGIC: u32 = 0x494E_4144; // "INAD"

/// Current record format version
pub const RECORD_VERSION: u8 = 1;

/// Upper bound of a serialized record
pub const MAX_RECORD_SIZE: usize = 64;

/// Persistence failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    /// Flash operation failed
    Flash(FlashError),
    /// Serialization failed
    Serialize,
    /// Deserialization failed
    Deserialize,
    /// CRC check failed
    CrcMismatch,
    /// Invalid magic or version
    InvalidFormat,
    /// Device index has no storage slot
    NoSlot,
}

impl From<FlashError> for PersistError {
    fn from(e: FlashError) -> Self {
        PersistError::Flash(e)
    }
}

/// One descriptor as stored in flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Stored descriptor
    pub descriptor: DeviceDescriptor,
    /// CRC32 of the descriptor's postcard bytes
    pub crc: u32,
}

impl DescriptorRecord {
    /// Wrap `descriptor` with a fresh header and CRC
    pub fn new(descriptor: DeviceDescriptor) -> Result<Self, PersistError> {
        Ok(Self {
            magic: RECORD_MAGIC,
            version: RECORD_VERSION,
            descriptor,
            crc: descriptor_crc(&descriptor)?,
        })
    }

    /// Check if magic and version match
    pub fn is_valid(&self) -> bool {
        self.magic == RECORD_MAGIC && self.version == RECORD_VERSION
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        descriptor_crc(&self.descriptor).is_ok_and(|crc| crc == self.crc)
    }

    /// Serialize into `buffer`, returning the used bytes
    pub fn encode<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], PersistError> {
        postcard::to_slice(self, buffer).map_err(|_| PersistError::Serialize)
    }

    /// Deserialize and validate a stored record
    pub fn decode(bytes: &[u8]) -> Result<Self, PersistError> {
        let record: DescriptorRecord =
            postcard::from_bytes(bytes).map_err(|_| PersistError::Deserialize)?;

        if !record.is_valid() {
            return Err(PersistError::InvalidFormat);
        }
        if !record.verify_crc() {
            return Err(PersistError::CrcMismatch);
        }
        Ok(record)
    }
}

/// CRC32 over the postcard encoding of `descriptor`
fn descriptor_crc(descriptor: &DeviceDescriptor) -> Result<u32, PersistError> {
    let mut buffer = [0u8; MAX_RECORD_SIZE];
    let bytes = postcard::to_slice(descriptor, &mut buffer).map_err(|_| PersistError::Serialize)?;
    Ok(!crc32_update(0xFFFF_FFFF, bytes))
}

/// Simple CRC32 update function (IEEE 802.3 polynomial)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB88320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
