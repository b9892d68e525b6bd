//! Test doubles: an in-memory I2C bus populated with INA register
//! files, and RAM-backed slot storage.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use heapless::{LinearMap, Vec};
use inamon_hal::{FlashError, FlashStorage, I2cBus, StorageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeError {
    Nack,
    Busy,
}

impl embedded_hal::i2c::Error for FakeError {
    fn kind(&self) -> ErrorKind {
        match self {
            FakeError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            FakeError::Busy => ErrorKind::Bus,
        }
    }
}

/// Register write seen on the bus: (address, register, value)
pub type Write = (u8, u8, u16);

pub struct FakeBus {
    attached: Vec<u8, 16>,
    faults: LinearMap<u8, FakeError, 4>,
    regs: LinearMap<(u8, u8), u16, 64>,
    writes: Vec<Write, 128>,
    last_raw: Vec<u8, 3>,
    pointer: u8,
    reads: usize,
}

impl FakeBus {
    pub fn new() -> Self {
        FakeBus {
            attached: Vec::new(),
            faults: LinearMap::new(),
            regs: LinearMap::new(),
            writes: Vec::new(),
            last_raw: Vec::new(),
            pointer: 0,
            reads: 0,
        }
    }

    /// Make `address` acknowledge; unset registers still nack
    pub fn attach(&mut self, address: u8) {
        self.attached.push(address).unwrap();
    }

    /// Fail every transaction with `address` with `error`
    pub fn fail(&mut self, address: u8, error: FakeError) {
        self.faults.insert(address, error).unwrap();
    }

    pub fn set(&mut self, address: u8, register: u8, value: u16) {
        self.regs.insert((address, register), value).unwrap();
    }

    pub fn remove(&mut self, address: u8, register: u8) {
        self.regs.remove(&(address, register));
    }

    pub fn get(&self, address: u8, register: u8) -> Option<u16> {
        self.regs.get(&(address, register)).copied()
    }

    /// INA226 at power-on: ID registers present
    pub fn with_ina226(mut self, address: u8) -> Self {
        self.attach(address);
        self.set(address, 0x00, 0x4127);
        self.set(address, 0x06, 0x0000);
        self.set(address, 0x07, 0x0000);
        self.set(address, 0xFE, 0x5449);
        self.set(address, 0xFF, 0x2260);
        self
    }

    /// INA230 at power-on: INA226 layout without ID registers
    pub fn with_ina230(mut self, address: u8) -> Self {
        self.attach(address);
        self.set(address, 0x00, 0x4127);
        self.set(address, 0x06, 0x0000);
        self.set(address, 0x07, 0x0000);
        self
    }

    /// INA260 at power-on
    pub fn with_ina260(mut self, address: u8) -> Self {
        self.attach(address);
        self.set(address, 0x00, 0x6127);
        self.set(address, 0x06, 0x0000);
        self.set(address, 0x07, 0x0000);
        self.set(address, 0xFE, 0x5449);
        self.set(address, 0xFF, 0x2270);
        self
    }

    /// INA219 at power-on: no ID, mask or limit registers
    pub fn with_ina219(mut self, address: u8) -> Self {
        self.attach(address);
        self.set(address, 0x00, 0x399F);
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn writes_to(&self, address: u8, register: u8) -> usize {
        self.writes
            .iter()
            .filter(|(a, r, _)| *a == address && *r == register)
            .count()
    }

    pub fn last_raw_write(&self) -> Option<&[u8]> {
        (!self.last_raw.is_empty()).then_some(&self.last_raw[..])
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.reads = 0;
    }

    fn ack(&self, address: u8) -> Result<(), FakeError> {
        if let Some(error) = self.faults.get(&address) {
            Err(*error)
        } else if self.attached.contains(&address) {
            Ok(())
        } else {
            Err(FakeError::Nack)
        }
    }

    fn load(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), FakeError> {
        let value = self.get(address, register).ok_or(FakeError::Nack)?;
        self.reads += 1;
        let bytes = value.to_be_bytes();
        let n = buf.len().min(2);
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }
}

impl I2cBus for FakeBus {
    type Error = FakeError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.ack(address)?;
        self.last_raw.clear();
        self.last_raw.extend_from_slice(&data[..data.len().min(3)]).unwrap();
        match *data {
            [register] => self.pointer = register,
            [register, msb, lsb] => {
                let value = u16::from_be_bytes([msb, lsb]);
                self.pointer = register;
                self.set(address, register, value);
                self.writes.push((address, register, value)).unwrap();
            }
            _ => return Err(FakeError::Nack),
        }
        Ok(())
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.ack(address)?;
        let register = self.pointer;
        self.load(address, register, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.ack(address)?;
        let register = *write_data.first().ok_or(FakeError::Nack)?;
        self.pointer = register;
        self.load(address, register, read_buf)
    }
}

/// Slot storage kept in RAM
pub struct RamStorage {
    slots: LinearMap<u8, Vec<u8, 64>, 16>,
    pub writes: usize,
}

impl RamStorage {
    pub fn new() -> Self {
        RamStorage {
            slots: LinearMap::new(),
            writes: 0,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Flip one byte of a stored record
    pub fn corrupt(&mut self, slot: u8, index: usize) {
        let record = self.slots.get_mut(&slot).unwrap();
        record[index] ^= 0xFF;
    }
}

impl FlashStorage for RamStorage {
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let record = self.slots.get(&key.slot()).ok_or(FlashError::NotFound)?;
        if buffer.len() < record.len() {
            return Err(FlashError::BufferTooSmall);
        }
        buffer[..record.len()].copy_from_slice(record);
        Ok(record.len())
    }

    fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let record = Vec::from_slice(data).map_err(|_| FlashError::BufferTooSmall)?;
        self.slots
            .insert(key.slot(), record)
            .map_err(|_| FlashError::Full)?;
        self.writes += 1;
        Ok(())
    }

    fn exists(&mut self, key: StorageKey) -> bool {
        self.slots.contains_key(&key.slot())
    }

    fn erase_all(&mut self) -> Result<(), FlashError> {
        self.slots.clear();
        Ok(())
    }
}
