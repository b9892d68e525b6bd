//! Driver errors
//!
//! One error type for every driver operation, generic over the bus
//! error so the transport's own error is propagated unchanged.

use inamon_core::{AlertError, CalibrationError, PersistError, StoreError, Uncalibrated};

/// All failures of an [`crate::Ina`] operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Nothing answered at the address
    DeviceNotPresent {
        /// Probed 7-bit address
        address: u8,
    },
    /// A chip answered but matched no known model
    UnknownModel {
        /// Probed 7-bit address
        address: u8,
    },
    /// Calibration inputs rejected, nothing was written
    Calibration(CalibrationError),
    /// The model lacks the register, nothing was written
    UnsupportedFeature,
    /// Current or power requested before calibration
    UncalibratedRead,
    /// Alert threshold does not fit the limit register
    LimitOutOfRange,
    /// No device with this id
    InvalidDevice,
    /// Address already in the store
    DuplicateAddress,
    /// Store capacity reached
    StoreFull,
    /// Saving or loading a descriptor failed
    Storage(PersistError),
    /// Bus transaction failed
    Transport(E),
}

impl<E> From<CalibrationError> for Error<E> {
    fn from(e: CalibrationError) -> Self {
        Error::Calibration(e)
    }
}

impl<E> From<PersistError> for Error<E> {
    fn from(e: PersistError) -> Self {
        Error::Storage(e)
    }
}

impl<E> From<Uncalibrated> for Error<E> {
    fn from(_: Uncalibrated) -> Self {
        Error::UncalibratedRead
    }
}

impl<E> From<StoreError> for Error<E> {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Full => Error::StoreFull,
            StoreError::DuplicateAddress => Error::DuplicateAddress,
            StoreError::InvalidDevice => Error::InvalidDevice,
        }
    }
}

impl<E> From<AlertError> for Error<E> {
    fn from(e: AlertError) -> Self {
        match e {
            AlertError::Unsupported => Error::UnsupportedFeature,
            AlertError::LimitOutOfRange => Error::LimitOutOfRange,
            AlertError::Uncalibrated => Error::UncalibratedRead,
        }
    }
}
