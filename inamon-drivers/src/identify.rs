//! Chip identification
//!
//! Identification only reads. The configuration register answers on
//! every model, so a nack there means nothing is attached. Any other bus
//! failure is returned as is. TI parts with
//! ID registers (INA226, INA260) are classified by die ID; the rest by
//! the fixed bits of their power-on configuration.

#[cfg(feature = "defmt")]
use defmt::debug;

use embedded_hal::i2c::{Error as _, ErrorKind};
use inamon_core::{register, Model};
use inamon_hal::I2cBus;

use crate::transport::read_word;
use crate::Error;

/// Probe `address` and classify the chip
///
/// Unexpected register contents degrade to [`Model::Unknown`]; only a
/// missing device is an error.
pub fn identify<B>(bus: &mut B, address: u8) -> Result<Model, Error<B::Error>>
where
    B: I2cBus + ?Sized,
    B::Error: embedded_hal::i2c::Error,
{
    let config = read_word(bus, address, register::CONFIGURATION).map_err(|e| match e.kind() {
        ErrorKind::NoAcknowledge(_) => Error::DeviceNotPresent { address },
        _ => Error::Transport(e),
    })?;

    if config == 0x0000 || config == 0xFFFF {
        #[cfg(feature = "defmt")]
        debug!("0x{:02x}: configuration reads 0x{:04x}", address, config);
        return Ok(Model::Unknown);
    }

    let model = match read_word(bus, address, register::MANUFACTURER_ID) {
        Ok(register::TI_MANUFACTURER_ID) => read_word(bus, address, register::DIE_ID)
            .map_or(Model::Unknown, Model::from_die_id),
        _ => Model::from_config_pattern(config),
    };

    #[cfg(feature = "defmt")]
    debug!("0x{:02x}: identified as {}", address, model.name());

    Ok(model)
}
