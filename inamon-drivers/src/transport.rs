//! Register access over the bus
//!
//! Every INA register is 16 bits, transferred MSB first after a one-byte
//! register pointer.

use embedded_hal::i2c::I2c;
use inamon_hal::I2cBus;

/// Read a 16-bit register
pub fn read_word<B: I2cBus + ?Sized>(bus: &mut B, address: u8, register: u8) -> Result<u16, B::Error> {
    let mut buf = [0u8; 2];
    bus.write_read(address, &[register], &mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Write a 16-bit register
pub fn write_word<B: I2cBus + ?Sized>(
    bus: &mut B,
    address: u8,
    register: u8,
    value: u16,
) -> Result<(), B::Error> {
    let [msb, lsb] = value.to_be_bytes();
    bus.write(address, &[register, msb, lsb])
}

/// [`I2cBus`] on top of any blocking `embedded-hal` I2C master
pub struct EmbeddedHalBus<T> {
    i2c: T,
}

impl<T: I2c> EmbeddedHalBus<T> {
    /// Wrap an `embedded-hal` bus
    pub fn new(i2c: T) -> Self {
        Self { i2c }
    }

    /// Return the wrapped bus
    pub fn release(self) -> T {
        self.i2c
    }
}

impl<T: I2c> I2cBus for EmbeddedHalBus<T> {
    type Error = T::Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.read(address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.i2c.write_read(address, write_data, read_buf)
    }
}
