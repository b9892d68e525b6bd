//! Flash storage abstractions
//!
//! Provides the trait for persistent slot storage of device descriptors.
//! Board support code backs it with EEPROM, a flash partition or
//! anything else that can hold a few dozen bytes per slot.

/// Highest slot number a [`StorageKey`] can address
pub const MAX_SLOT: u8 = 0x7F;

/// Storage key for one persisted device descriptor
///
/// Slots follow device detection order, so slot `n` holds the
/// descriptor of the `n`-th detected chip. The actual storage
/// implementation handles wear leveling and data integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageKey {
    slot: u8,
}

impl StorageKey {
    /// Key for the descriptor stored in `slot`
    ///
    /// Returns `None` if `slot` is above [`MAX_SLOT`].
    pub const fn descriptor(slot: u8) -> Option<Self> {
        if slot > MAX_SLOT {
            None
        } else {
            Some(Self { slot })
        }
    }

    /// Slot number of this key
    pub const fn slot(self) -> u8 {
        self.slot
    }

    /// Get the key as a byte value
    pub const fn as_u8(self) -> u8 {
        self.slot
    }

    /// Create a key from a byte value
    pub const fn from_u8(value: u8) -> Option<Self> {
        Self::descriptor(value)
    }
}

/// Errors from flash storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Flash operation failed
    Flash,
    /// Storage operation failed
    Storage,
    /// Key not found
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Data corrupted or invalid
    Corrupted,
    /// Storage is full
    Full,
}

/// Flash storage trait
///
/// Blocking slot storage for opaque descriptor records.
/// Implementations should handle:
/// - Wear leveling across flash sectors
/// - Atomic writes where possible
pub trait FlashStorage {
    /// Read a value by key into the provided buffer
    ///
    /// # Returns
    /// The number of bytes read, or [`FlashError::NotFound`] if the slot
    /// was never written.
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError>;

    /// Write a value by key, replacing any previous value
    fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError>;

    /// Check if a key exists in storage
    fn exists(&mut self, key: StorageKey) -> bool;

    /// Erase all stored data
    fn erase_all(&mut self) -> Result<(), FlashError>;
}

impl<T: FlashStorage + ?Sized> FlashStorage for &mut T {
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        T::read(self, key, buffer)
    }

    fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        T::write(self, key, data)
    }

    fn exists(&mut self, key: StorageKey) -> bool {
        T::exists(self, key)
    }

    fn erase_all(&mut self) -> Result<(), FlashError> {
        T::erase_all(self)
    }
}

/// Storage that keeps nothing
///
/// For boards without non-volatile memory. Writes succeed and are
/// dropped, reads always report [`FlashError::NotFound`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStorage;

impl FlashStorage for NoStorage {
    fn read(&mut self, _key: StorageKey, _buffer: &mut [u8]) -> Result<usize, FlashError> {
        Err(FlashError::NotFound)
    }

    fn write(&mut self, _key: StorageKey, _data: &[u8]) -> Result<(), FlashError> {
        Ok(())
    }

    fn exists(&mut self, _key: StorageKey) -> bool {
        false
    }

    fn erase_all(&mut self) -> Result<(), FlashError> {
        Ok(())
    }
}

// Implement the sequential-storage Key trait when the feature is enabled
#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        buffer[0] = self.as_u8();
        Ok(1)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        match StorageKey::from_u8(buffer[0]) {
            Some(key) => Ok((key, 1)),
            None => Err(sequential_storage::map::SerializationError::InvalidFormat),
        }
    }
}
