//! INA driver
//!
//! [`Ina`] owns the bus, the descriptor storage and a [`DeviceStore`] of
//! every chip it has identified. Setup is identify, calibrate, persist,
//! configure; at runtime a reading is one register read scaled with the
//! descriptor's LSB.
//!
//! Operations that take a [`Target`] run on one device or on all of them.
//! With [`Target::All`] every device is attempted and the first error is
//! returned once all devices were processed.

#[cfg(feature = "defmt")]
use defmt::{debug, info, warn};

use heapless::Vec;
use inamon_core::persist::MAX_RECORD_SIZE;
use inamon_core::{
    alert, calibrate, measurement, mode, register, timing, AlertKind, ConfigLayout,
    DescriptorRecord, DeviceDescriptor, DeviceId, DeviceStore, Measurement, Model,
    OperatingMode, PersistError, Setting, Target,
};
use inamon_hal::flash::MAX_SLOT;
use inamon_hal::{FlashError, FlashStorage, I2cBus, StorageKey};

use crate::config::{InaConfig, UnknownModelPolicy};
use crate::identify::identify;
use crate::transport::{read_word, write_word};
use crate::Error;

/// Driver for up to `N` INA chips sharing one bus
pub struct Ina<B, S, const N: usize> {
    bus: B,
    storage: S,
    config: InaConfig,
    devices: DeviceStore<N>,
}

impl<B, S, const N: usize> Ina<B, S, N>
where
    B: I2cBus,
    B::Error: embedded_hal::i2c::Error,
    S: FlashStorage,
{
    /// Create a driver with an empty device store
    ///
    /// Nothing is sent on the bus until a device is added.
    pub fn new(bus: B, storage: S, config: InaConfig) -> Self {
        Self {
            bus,
            storage,
            config,
            devices: DeviceStore::new(),
        }
    }

    /// Give back the bus and the storage
    pub fn release(self) -> (B, S) {
        (self.bus, self.storage)
    }

    /// Active configuration
    pub fn config(&self) -> &InaConfig {
        &self.config
    }

    /// Every known device
    pub fn store(&self) -> &DeviceStore<N> {
        &self.devices
    }

    /// Descriptor of one device
    pub fn descriptor(&self, id: DeviceId) -> Result<&DeviceDescriptor, Error<B::Error>> {
        Ok(self.devices.get(id)?)
    }

    /// Short model name of one device
    pub fn device_name(&self, id: DeviceId) -> Result<&'static str, Error<B::Error>> {
        Ok(self.devices.get(id)?.display_name())
    }

    /// Identify the chip at `address` without adding it
    pub fn probe(&mut self, address: u8) -> Result<Model, Error<B::Error>> {
        identify(&mut self.bus, address)
    }

    /// Identify the chip at `address` and append it to the store
    ///
    /// The new descriptor is uncalibrated. If saving it fails the device
    /// stays in the store and the storage error is returned.
    pub fn add_device(&mut self, address: u8) -> Result<DeviceId, Error<B::Error>> {
        if self.devices.find(address).is_some() {
            return Err(Error::DuplicateAddress);
        }
        if self.devices.len() == self.devices.capacity() {
            return Err(Error::StoreFull);
        }

        let model = self.probe(address)?;
        if model == Model::Unknown && self.config.unknown_model_policy == UnknownModelPolicy::Abort {
            #[cfg(feature = "defmt")]
            warn!("0x{:02x}: unrecognised chip rejected", address);
            return Err(Error::UnknownModel { address });
        }

        let id = self.devices.push(DeviceDescriptor::new(address, model))?;

        #[cfg(feature = "defmt")]
        info!("0x{:02x}: {} added as device {}", address, model.name(), id.index());

        self.persist(id)?;
        Ok(id)
    }

    /// Add every chip answering in the configured address range
    ///
    /// Addresses that do not answer, are already known or are rejected
    /// are skipped. Stops early once the store is full. Returns the
    /// number of known devices.
    pub fn discover(&mut self) -> usize {
        for address in self.config.scan_start..=self.config.scan_end {
            if self.devices.find(address).is_some() {
                continue;
            }
            if let Err(Error::StoreFull) = self.add_device(address) {
                #[cfg(feature = "defmt")]
                warn!("Device store full, scan stopped at 0x{:02x}", address);
                break;
            }
        }
        self.devices.len()
    }

    /// Calibrate for `max_bus_amps` through `shunt_micro_ohms`
    ///
    /// Writes the calibration register (and the INA219 gain), reapplies
    /// the stored mode and saves the descriptor. Inputs that do not fit
    /// the chip, or a chip that does not answer, fail before anything is
    /// written.
    pub fn begin(
        &mut self,
        max_bus_amps: u16,
        shunt_micro_ohms: u32,
        target: Target,
    ) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| ina.begin_device(id, max_bus_amps, shunt_micro_ohms))
    }

    fn begin_device(
        &mut self,
        id: DeviceId,
        max_bus_amps: u16,
        shunt_micro_ohms: u32,
    ) -> Result<(), Error<B::Error>> {
        let mut desc = *self.devices.get(id)?;
        let cal = calibrate(desc.model, max_bus_amps, shunt_micro_ohms)?;
        desc.apply_calibration(max_bus_amps, shunt_micro_ohms, cal);
        self.program(&desc)?;
        *self.devices.get_mut(id)? = desc;

        #[cfg(feature = "defmt")]
        debug!(
            "0x{:02x}: calibration {} current LSB {} nA power LSB {} nW",
            desc.address, desc.calibration, desc.current_lsb_na, desc.power_lsb_nw
        );

        self.persist(id)
    }

    /// Replace the store with the descriptors saved in storage
    ///
    /// Slots are read in order until the first empty one. Nothing is
    /// sent on the bus; see [`Ina::resume`]. Returns the number of
    /// devices loaded. If any slot fails to load the store is left as it
    /// was.
    pub fn restore(&mut self) -> Result<usize, Error<B::Error>> {
        let mut restored: DeviceStore<N> = DeviceStore::new();
        let mut buffer = [0u8; MAX_RECORD_SIZE];

        for slot in 0..=MAX_SLOT {
            if restored.len() == restored.capacity() {
                break;
            }
            let Some(key) = StorageKey::descriptor(slot) else {
                break;
            };
            let len = match self.storage.read(key, &mut buffer) {
                Ok(len) => len,
                Err(FlashError::NotFound) => break,
                Err(e) => return Err(PersistError::Flash(e).into()),
            };
            let record = DescriptorRecord::decode(&buffer[..len])?;
            restored.push(record.descriptor)?;
        }
        self.devices = restored;

        #[cfg(feature = "defmt")]
        info!("Restored {} device(s) from storage", self.devices.len());

        Ok(self.devices.len())
    }

    /// Write the stored calibration and mode back to the chips
    ///
    /// For use after [`Ina::restore`], when the chips lost their
    /// registers on power-down.
    pub fn resume(&mut self, target: Target) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            let desc = *ina.devices.get(id)?;
            ina.program(&desc)
        })
    }

    fn persist(&mut self, id: DeviceId) -> Result<(), Error<B::Error>> {
        if !self.config.persist {
            return Ok(());
        }
        let desc = *self.devices.get(id)?;
        let key = u8::try_from(id.index())
            .ok()
            .and_then(StorageKey::descriptor)
            .ok_or(PersistError::NoSlot)?;

        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let bytes = DescriptorRecord::new(desc)?.encode(&mut buffer)?;
        self.storage
            .write(key, bytes)
            .map_err(PersistError::Flash)?;

        #[cfg(feature = "defmt")]
        debug!("0x{:02x}: saved to slot {}", desc.address, key.slot());

        Ok(())
    }

    /// Change the operating mode, keeping averaging and conversion times
    pub fn set_mode(&mut self, mode: OperatingMode, target: Target) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            ina.update_config(id, |config| mode::set_mode_bits(config, mode))?;
            ina.devices.get_mut(id)?.mode = mode;
            ina.persist(id)
        })
    }

    /// Average `samples` conversions (rounded down to a supported count)
    pub fn set_averaging(&mut self, samples: u32, target: Target) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            let layout = ina.devices.get(id)?.model.spec().layout;
            let setting = timing::select_averaging(layout, samples).ok_or(Error::UnsupportedFeature)?;
            ina.update_config(id, |config| timing::set_averaging_bits(layout, config, setting))
        })
    }

    /// Set the bus voltage conversion time (rounded down to a supported value)
    pub fn set_bus_conversion(&mut self, micros: u32, target: Target) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            let (layout, setting) = ina.conversion_setting(id, micros)?;
            ina.update_config(id, |config| timing::set_bus_conversion_bits(layout, config, setting))
        })
    }

    /// Set the shunt voltage conversion time (rounded down to a supported value)
    pub fn set_shunt_conversion(&mut self, micros: u32, target: Target) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            let (layout, setting) = ina.conversion_setting(id, micros)?;
            ina.update_config(id, |config| timing::set_shunt_conversion_bits(layout, config, setting))
        })
    }

    fn conversion_setting(
        &self,
        id: DeviceId,
        micros: u32,
    ) -> Result<(ConfigLayout, Setting), Error<B::Error>> {
        let layout = self.devices.get(id)?.model.spec().layout;
        let setting = timing::select_conversion_time(layout, micros).ok_or(Error::UnsupportedFeature)?;
        Ok((layout, setting))
    }

    /// Start a conversion on devices in a triggered mode
    ///
    /// Devices in a continuous or power-down mode are left alone.
    pub fn trigger(&mut self, target: Target) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            let mode = ina.devices.get(id)?.mode;
            if mode.is_triggered() {
                ina.update_config(id, |config| mode::set_mode_bits(config, mode))?;
            }
            Ok(())
        })
    }

    /// Reset the chips to power-on defaults
    ///
    /// The chip forgets its calibration, and so does the descriptor; call
    /// [`Ina::begin`] again before reading current or power.
    pub fn reset(&mut self, target: Target) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            let address = ina.devices.get(id)?.address;
            ina.write(address, register::CONFIGURATION, register::RESET)?;
            ina.devices.get_mut(id)?.clear_calibration();
            ina.persist(id)
        })
    }

    /// Poll until the current conversion finishes
    ///
    /// Gives up silently after `conversion_poll_limit` reads.
    pub fn wait_for_conversion(&mut self, target: Target) -> Result<(), Error<B::Error>> {
        let limit = self.config.conversion_poll_limit;
        self.for_each(target, |ina, id| {
            let desc = *ina.devices.get(id)?;
            let (reg, flag) = timing::conversion_ready_flag(desc.model.spec().layout)
                .ok_or(Error::UnsupportedFeature)?;
            for _ in 0..limit {
                if ina.read(desc.address, reg)? & flag != 0 {
                    return Ok(());
                }
            }

            #[cfg(feature = "defmt")]
            warn!("0x{:02x}: no conversion after {} polls", desc.address, limit);

            Ok(())
        })
    }

    /// Bus voltage in mV
    pub fn bus_millivolts(&mut self, id: DeviceId) -> Result<u32, Error<B::Error>> {
        let desc = *self.devices.get(id)?;
        let raw = self.read(desc.address, register::BUS_VOLTAGE)?;
        Ok(measurement::bus_millivolts(&desc, raw))
    }

    /// Shunt voltage in µV
    pub fn shunt_microvolts(&mut self, id: DeviceId) -> Result<i32, Error<B::Error>> {
        let desc = *self.devices.get(id)?;
        let spec = desc.model.spec();
        let reg = spec.shunt_register.unwrap_or(spec.current_register);
        let raw = self.read(desc.address, reg)?;
        Ok(measurement::shunt_microvolts(&desc, raw))
    }

    /// Current in µA
    pub fn bus_microamps(&mut self, id: DeviceId) -> Result<i64, Error<B::Error>> {
        let desc = self.calibrated(id)?;
        let raw = self.read(desc.address, desc.model.spec().current_register)?;
        Ok(measurement::current_microamps(&desc, raw)?)
    }

    /// Power in µW
    pub fn bus_microwatts(&mut self, id: DeviceId) -> Result<u64, Error<B::Error>> {
        let desc = self.calibrated(id)?;
        let raw = self.read(desc.address, register::POWER)?;
        Ok(measurement::power_microwatts(&desc, raw)?)
    }

    /// All four readings of one device
    pub fn measure(&mut self, id: DeviceId) -> Result<Measurement, Error<B::Error>> {
        self.calibrated(id)?;
        Ok(Measurement {
            bus_millivolts: self.bus_millivolts(id)?,
            shunt_microvolts: self.shunt_microvolts(id)?,
            current_microamps: self.bus_microamps(id)?,
            power_microwatts: self.bus_microwatts(id)?,
        })
    }

    /// Readings of every device, indexed by [`DeviceId`]
    pub fn measure_all(&mut self) -> Vec<Result<Measurement, Error<B::Error>>, N> {
        let mut results = Vec::new();
        for id in self.devices.ids() {
            let result = self.measure(id);
            // At most N devices
            let _ = results.push(result);
        }
        results
    }

    fn calibrated(&self, id: DeviceId) -> Result<DeviceDescriptor, Error<B::Error>> {
        let desc = *self.devices.get(id)?;
        if desc.is_calibrated() {
            Ok(desc)
        } else {
            Err(Error::UncalibratedRead)
        }
    }

    /// Drive the ALERT pin when a conversion completes
    pub fn alert_on_conversion(&mut self, enabled: bool, target: Target) -> Result<(), Error<B::Error>> {
        self.arm_alert(AlertKind::ConversionReady, enabled, 0, target)
    }

    /// Drive the ALERT pin when the shunt voltage exceeds `millivolts`
    pub fn alert_on_shunt_over_voltage(
        &mut self,
        enabled: bool,
        millivolts: i32,
        target: Target,
    ) -> Result<(), Error<B::Error>> {
        self.arm_alert(AlertKind::ShuntOverVoltage, enabled, millivolts.into(), target)
    }

    /// Drive the ALERT pin when the shunt voltage drops below `millivolts`
    pub fn alert_on_shunt_under_voltage(
        &mut self,
        enabled: bool,
        millivolts: i32,
        target: Target,
    ) -> Result<(), Error<B::Error>> {
        self.arm_alert(AlertKind::ShuntUnderVoltage, enabled, millivolts.into(), target)
    }

    /// Drive the ALERT pin when the bus voltage exceeds `millivolts`
    pub fn alert_on_bus_over_voltage(
        &mut self,
        enabled: bool,
        millivolts: u32,
        target: Target,
    ) -> Result<(), Error<B::Error>> {
        self.arm_alert(AlertKind::BusOverVoltage, enabled, millivolts.into(), target)
    }

    /// Drive the ALERT pin when the bus voltage drops below `millivolts`
    pub fn alert_on_bus_under_voltage(
        &mut self,
        enabled: bool,
        millivolts: u32,
        target: Target,
    ) -> Result<(), Error<B::Error>> {
        self.arm_alert(AlertKind::BusUnderVoltage, enabled, millivolts.into(), target)
    }

    /// Drive the ALERT pin when power exceeds `milliwatts`
    pub fn alert_on_power_over_limit(
        &mut self,
        enabled: bool,
        milliwatts: u32,
        target: Target,
    ) -> Result<(), Error<B::Error>> {
        self.arm_alert(AlertKind::PowerOverLimit, enabled, milliwatts.into(), target)
    }

    /// The limit register is shared: arming a kind replaces the
    /// threshold of any other armed kind.
    fn arm_alert(
        &mut self,
        kind: AlertKind,
        enabled: bool,
        threshold: i64,
        target: Target,
    ) -> Result<(), Error<B::Error>> {
        self.for_each(target, |ina, id| {
            let desc = *ina.devices.get(id)?;
            alert::check_supported(desc.model)?;

            if enabled && kind.has_limit() {
                let raw = alert::limit_raw(&desc, kind, threshold)?;
                ina.write(desc.address, register::ALERT_LIMIT, raw)?;
            }
            let mask = ina.read(desc.address, register::MASK_ENABLE)?;
            ina.write(
                desc.address,
                register::MASK_ENABLE,
                alert::update_mask(mask, kind, enabled),
            )
        })
    }

    fn for_each<F>(&mut self, target: Target, mut op: F) -> Result<(), Error<B::Error>>
    where
        F: FnMut(&mut Self, DeviceId) -> Result<(), Error<B::Error>>,
    {
        let mut first_error = None;
        for id in self.devices.select(target)? {
            if let Err(e) = op(self, id) {
                #[cfg(feature = "defmt")]
                warn!("Device {} failed", id.index());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn update_config(
        &mut self,
        id: DeviceId,
        f: impl FnOnce(u16) -> u16,
    ) -> Result<(), Error<B::Error>> {
        let address = self.devices.get(id)?.address;
        let config = self.read(address, register::CONFIGURATION)?;
        self.write(address, register::CONFIGURATION, f(config))
    }

    /// Write the descriptor's calibration, mode and gain to the chip
    ///
    /// The configuration register is read before the first write, so a
    /// chip that does not answer is left untouched.
    fn program(&mut self, desc: &DeviceDescriptor) -> Result<(), Error<B::Error>> {
        let config = self.read(desc.address, register::CONFIGURATION)?;
        if desc.is_calibrated() && desc.model.spec().has_calibration_register {
            self.write(desc.address, register::CALIBRATION, desc.calibration)?;
        }
        let mut updated = mode::set_mode_bits(config, desc.mode);
        if let Some(gain) = desc.gain {
            updated = timing::set_gain_bits(updated, gain);
        }
        self.write(desc.address, register::CONFIGURATION, updated)
    }

    fn read(&mut self, address: u8, register: u8) -> Result<u16, Error<B::Error>> {
        read_word(&mut self.bus, address, register).map_err(Error::Transport)
    }

    fn write(&mut self, address: u8, register: u8, value: u16) -> Result<(), Error<B::Error>> {
        write_word(&mut self.bus, address, register, value).map_err(Error::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBus, FakeError, RamStorage};
    use inamon_core::{CalibrationError, ProgrammableGain};

    type TestIna = Ina<FakeBus, RamStorage, 4>;

    fn driver(bus: FakeBus) -> TestIna {
        Ina::new(bus, RamStorage::new(), InaConfig::DEFAULT)
    }

    const FIRST: DeviceId = DeviceId::new(0);
    const SECOND: DeviceId = DeviceId::new(1);

    #[test]
    fn test_add_device() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        assert_eq!(id, FIRST);
        assert_eq!(ina.device_name(id), Ok("INA226"));
        assert!(!ina.descriptor(id).unwrap().is_calibrated());
        assert_eq!(ina.add_device(0x40), Err(Error::DuplicateAddress));
        assert_eq!(ina.add_device(0x41), Err(Error::DeviceNotPresent { address: 0x41 }));
        assert_eq!(ina.store().len(), 1);
    }

    #[test]
    fn test_unknown_model_policy() {
        let mut bus = FakeBus::new();
        bus.attach(0x40);
        bus.set(0x40, 0x00, 0xFFFF);

        let mut ina = driver(bus);
        assert_eq!(ina.add_device(0x40), Err(Error::UnknownModel { address: 0x40 }));
        assert!(ina.store().is_empty());

        let (bus, storage) = ina.release();
        let config = InaConfig::DEFAULT.with_unknown_model_policy(UnknownModelPolicy::Conservative);
        let mut ina: TestIna = Ina::new(bus, storage, config);
        let id = ina.add_device(0x40).unwrap();
        assert_eq!(ina.device_name(id), Ok("UNKNOWN"));

        ina.bus.clear_log();
        assert_eq!(ina.set_averaging(16, id.into()), Err(Error::UnsupportedFeature));
        assert_eq!(ina.alert_on_conversion(true, id.into()), Err(Error::UnsupportedFeature));
        assert!(ina.bus.writes().is_empty());
    }

    #[test]
    fn test_discover_scans_range() {
        let bus = FakeBus::new().with_ina226(0x40).with_ina219(0x45).with_ina260(0x4F);
        let mut ina = driver(bus);
        assert_eq!(ina.discover(), 3);

        let addresses: heapless::Vec<u8, 4> = ina.store().iter().map(|d| d.address).collect();
        assert_eq!(addresses.as_slice(), &[0x40, 0x45, 0x4F]);
        assert_eq!(ina.device_name(SECOND), Ok("INA219"));

        // Known devices are not added twice
        assert_eq!(ina.discover(), 3);
    }

    #[test]
    fn test_discover_stops_when_full() {
        let bus = FakeBus::new().with_ina226(0x40).with_ina226(0x41).with_ina226(0x42);
        let mut ina: Ina<FakeBus, RamStorage, 2> = Ina::new(bus, RamStorage::new(), InaConfig::DEFAULT);
        assert_eq!(ina.discover(), 2);
        assert!(ina.store().find(0x42).is_none());
    }

    #[test]
    fn test_begin_ina226() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.begin(20, 100_000, Target::All).unwrap();

        let desc = ina.descriptor(id).unwrap();
        assert_eq!(desc.calibration, 83);
        assert_eq!(desc.current_lsb_na, 611_000);
        assert_eq!(ina.bus.get(0x40, register::CALIBRATION), Some(83));

        ina.bus.set(0x40, register::CURRENT, 1000);
        assert_eq!(ina.bus_microamps(id), Ok(611_000));
    }

    #[test]
    fn test_begin_ina219_sets_gain() {
        let mut ina = driver(FakeBus::new().with_ina219(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.begin(1, 50_000, id.into()).unwrap();

        assert_eq!(ina.descriptor(id).unwrap().gain, Some(ProgrammableGain::Div2));
        assert_eq!(ina.bus.get(0x40, register::CALIBRATION), Some(26_424));
        // 32V range, /2 gain, ADC settings and mode untouched
        assert_eq!(ina.bus.get(0x40, register::CONFIGURATION), Some(0x299F));
    }

    #[test]
    fn test_begin_ina260_has_no_calibration_register() {
        let mut ina = driver(FakeBus::new().with_ina260(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.begin(15, 2_000, id.into()).unwrap();

        assert_eq!(ina.descriptor(id).unwrap().calibration, 2048);
        assert_eq!(ina.bus.writes_to(0x40, register::CALIBRATION), 0);

        // 800 counts of 1.25mA
        ina.bus.set(0x40, register::INA260_CURRENT, 800);
        assert_eq!(ina.bus_microamps(id), Ok(1_000_000));
        assert_eq!(ina.shunt_microvolts(id), Ok(2_000));
    }

    #[test]
    fn test_rejected_calibration_writes_nothing() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.bus.clear_log();

        assert_eq!(
            ina.begin(0, 100_000, id.into()),
            Err(Error::Calibration(CalibrationError::ZeroMaxCurrent))
        );
        assert_eq!(
            ina.begin(10, 0, id.into()),
            Err(Error::Calibration(CalibrationError::ZeroShuntResistance))
        );
        assert_eq!(
            ina.begin(1, 1_000, id.into()),
            Err(Error::Calibration(CalibrationError::OutOfRange))
        );
        assert!(ina.bus.writes().is_empty());
        assert!(!ina.descriptor(id).unwrap().is_calibrated());
    }

    #[test]
    fn test_begin_reads_before_writing() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.bus.remove(0x40, register::CONFIGURATION);
        ina.bus.clear_log();

        assert_eq!(
            ina.begin(20, 100_000, id.into()),
            Err(Error::Transport(FakeError::Nack))
        );
        assert_eq!(ina.bus.writes_to(0x40, register::CALIBRATION), 0);
        assert!(!ina.descriptor(id).unwrap().is_calibrated());
    }

    #[test]
    fn test_begin_is_idempotent() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.begin(20, 100_000, id.into()).unwrap();
        let first = *ina.descriptor(id).unwrap();
        ina.begin(20, 100_000, id.into()).unwrap();
        assert_eq!(*ina.descriptor(id).unwrap(), first);
    }

    #[test]
    fn test_uncalibrated_read_skips_bus() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.bus.set(0x40, register::CURRENT, 1000);
        ina.bus.clear_log();

        assert_eq!(ina.bus_microamps(id), Err(Error::UncalibratedRead));
        assert_eq!(ina.bus_microwatts(id), Err(Error::UncalibratedRead));
        assert_eq!(ina.measure(id), Err(Error::UncalibratedRead));
        assert_eq!(ina.bus.reads(), 0);
    }

    #[test]
    fn test_measure() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.begin(20, 100_000, id.into()).unwrap();
        ina.bus.set(0x40, register::BUS_VOLTAGE, 9600);
        ina.bus.set(0x40, register::SHUNT_VOLTAGE, (-2i16) as u16);
        ina.bus.set(0x40, register::CURRENT, 1000);
        ina.bus.set(0x40, register::POWER, 100);

        assert_eq!(
            ina.measure(id),
            Ok(Measurement {
                bus_millivolts: 12_000,
                shunt_microvolts: -5,
                current_microamps: 611_000,
                power_microwatts: 1_527_500,
            })
        );
    }

    #[test]
    fn test_measure_all_reports_per_device() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40).with_ina226(0x41));
        ina.discover();
        ina.begin(20, 100_000, FIRST.into()).unwrap();
        for reg in [register::BUS_VOLTAGE, register::SHUNT_VOLTAGE, register::CURRENT, register::POWER] {
            ina.bus.set(0x40, reg, 0);
        }

        let results = ina.measure_all();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Ok(Measurement::default()));
        assert_eq!(results[1], Err(Error::UncalibratedRead));
    }

    #[test]
    fn test_persist_and_restore() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40).with_ina219(0x41));
        ina.discover();
        ina.begin(20, 100_000, FIRST.into()).unwrap();
        ina.begin(3, 100_000, SECOND.into()).unwrap();
        ina.bus.set(0x40, register::CURRENT, 1234);
        let before = ina.bus_microamps(FIRST).unwrap();
        let saved: heapless::Vec<DeviceDescriptor, 4> = ina.store().iter().copied().collect();

        let (bus, storage) = ina.release();
        assert_eq!(storage.slots(), 2);
        let mut ina: TestIna = Ina::new(bus, storage, InaConfig::DEFAULT);
        assert_eq!(ina.restore(), Ok(2));

        let restored: heapless::Vec<DeviceDescriptor, 4> = ina.store().iter().copied().collect();
        assert_eq!(restored, saved);
        assert_eq!(ina.bus_microamps(FIRST), Ok(before));
    }

    #[test]
    fn test_restore_rejects_corrupted_record() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        ina.add_device(0x40).unwrap();
        ina.begin(20, 100_000, Target::All).unwrap();

        let (bus, mut storage) = ina.release();
        storage.corrupt(0, 6);
        let mut ina: TestIna = Ina::new(bus, storage, InaConfig::DEFAULT);
        assert!(matches!(ina.restore(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_failed_restore_keeps_store() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40).with_ina226(0x41));
        ina.discover();
        ina.begin(20, 100_000, Target::All).unwrap();

        let (bus, mut storage) = ina.release();
        storage.corrupt(1, 6);
        let mut ina: TestIna = Ina::new(bus, storage, InaConfig::VOLATILE);
        let id = ina.add_device(0x40).unwrap();

        assert_eq!(
            ina.restore(),
            Err(Error::Storage(PersistError::CrcMismatch))
        );
        // Still the uncalibrated device added above, not slot 0
        assert_eq!(ina.store().len(), 1);
        assert!(!ina.descriptor(id).unwrap().is_calibrated());
    }

    #[test]
    fn test_resume_rewrites_chips() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        ina.add_device(0x40).unwrap();
        ina.begin(20, 100_000, Target::All).unwrap();
        ina.set_mode(OperatingMode::TriggeredBoth, Target::All).unwrap();

        // Power cycle: chip back at defaults
        let (mut bus, storage) = ina.release();
        bus.set(0x40, register::CONFIGURATION, 0x4127);
        bus.set(0x40, register::CALIBRATION, 0);

        let mut ina: TestIna = Ina::new(bus, storage, InaConfig::DEFAULT);
        ina.restore().unwrap();
        ina.resume(Target::All).unwrap();
        assert_eq!(ina.bus.get(0x40, register::CALIBRATION), Some(83));
        assert_eq!(ina.bus.get(0x40, register::CONFIGURATION), Some(0x4123));
    }

    #[test]
    fn test_volatile_config_never_saves() {
        let bus = FakeBus::new().with_ina226(0x40);
        let mut ina: TestIna = Ina::new(bus, RamStorage::new(), InaConfig::VOLATILE);
        ina.add_device(0x40).unwrap();
        ina.begin(20, 100_000, Target::All).unwrap();
        let (_, storage) = ina.release();
        assert_eq!(storage.writes, 0);
    }

    #[test]
    fn test_set_mode_preserves_timing() {
        let mut bus = FakeBus::new().with_ina226(0x40);
        bus.set(0x40, register::CONFIGURATION, 0x4527);
        let mut ina = driver(bus);
        let id = ina.add_device(0x40).unwrap();

        ina.set_mode(OperatingMode::TriggeredBoth, id.into()).unwrap();
        assert_eq!(ina.bus.get(0x40, register::CONFIGURATION), Some(0x4523));
        assert_eq!(ina.descriptor(id).unwrap().mode, OperatingMode::TriggeredBoth);
    }

    #[test]
    fn test_timing_on_all_devices() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40).with_ina219(0x41));
        ina.discover();

        ina.set_averaging(16, Target::All).unwrap();
        assert_eq!(ina.bus.get(0x40, register::CONFIGURATION), Some(0x4527));
        assert_eq!(ina.bus.get(0x41, register::CONFIGURATION), Some(0x3E67));

        ina.set_bus_conversion(8244, FIRST.into()).unwrap();
        ina.set_shunt_conversion(100, FIRST.into()).unwrap();
        assert_eq!(ina.bus.get(0x40, register::CONFIGURATION), Some(0x45C7));
    }

    #[test]
    fn test_trigger_only_in_triggered_mode() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();

        ina.bus.clear_log();
        ina.trigger(id.into()).unwrap();
        assert!(ina.bus.writes().is_empty());

        ina.set_mode(OperatingMode::TriggeredBusOnly, id.into()).unwrap();
        ina.bus.clear_log();
        ina.trigger(id.into()).unwrap();
        assert_eq!(ina.bus.writes(), &[(0x40, register::CONFIGURATION, 0x4122)]);
    }

    #[test]
    fn test_reset_forgets_calibration() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.begin(20, 100_000, id.into()).unwrap();

        ina.reset(id.into()).unwrap();
        assert_eq!(ina.bus.get(0x40, register::CONFIGURATION), Some(register::RESET));
        assert_eq!(ina.bus_microamps(id), Err(Error::UncalibratedRead));
    }

    #[test]
    fn test_wait_for_conversion() {
        let mut bus = FakeBus::new().with_ina226(0x40);
        bus.set(0x40, register::MASK_ENABLE, register::CONVERSION_READY_FLAG);
        let mut ina = driver(bus);
        let id = ina.add_device(0x40).unwrap();

        ina.bus.clear_log();
        ina.wait_for_conversion(id.into()).unwrap();
        assert_eq!(ina.bus.reads(), 1);
    }

    #[test]
    fn test_wait_for_conversion_gives_up() {
        let config = InaConfig {
            conversion_poll_limit: 5,
            ..InaConfig::DEFAULT
        };
        let mut ina: TestIna = Ina::new(FakeBus::new().with_ina219(0x40), RamStorage::new(), config);
        let id = ina.add_device(0x40).unwrap();
        ina.bus.set(0x40, register::BUS_VOLTAGE, 3000 << 3);

        ina.bus.clear_log();
        assert_eq!(ina.wait_for_conversion(id.into()), Ok(()));
        assert_eq!(ina.bus.reads(), 5);
    }

    #[test]
    fn test_alert_rejected_on_ina219() {
        let mut ina = driver(FakeBus::new().with_ina219(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.bus.clear_log();

        assert_eq!(
            ina.alert_on_shunt_under_voltage(true, -200, id.into()),
            Err(Error::UnsupportedFeature)
        );
        assert!(ina.bus.writes().is_empty());
        assert_eq!(ina.bus.reads(), 0);
    }

    #[test]
    fn test_alert_arm_and_disarm() {
        let mut bus = FakeBus::new().with_ina226(0x40);
        bus.set(0x40, register::MASK_ENABLE, 0x0403);
        let mut ina = driver(bus);
        let id = ina.add_device(0x40).unwrap();

        ina.alert_on_bus_under_voltage(true, 12_000, id.into()).unwrap();
        assert_eq!(ina.bus.get(0x40, register::ALERT_LIMIT), Some(9600));
        assert_eq!(ina.bus.get(0x40, register::MASK_ENABLE), Some(0x1403));

        ina.bus.clear_log();
        ina.alert_on_conversion(false, id.into()).unwrap();
        assert_eq!(ina.bus.get(0x40, register::MASK_ENABLE), Some(0x1003));
        assert_eq!(ina.bus.writes_to(0x40, register::ALERT_LIMIT), 0);
    }

    #[test]
    fn test_alert_on_ina230_and_ina260() {
        let mut ina = driver(FakeBus::new().with_ina230(0x40).with_ina260(0x41));
        ina.discover();
        assert_eq!(ina.device_name(FIRST), Ok("INA230"));

        ina.alert_on_bus_over_voltage(true, 12_000, Target::All).unwrap();
        for address in [0x40, 0x41] {
            assert_eq!(ina.bus.get(address, register::ALERT_LIMIT), Some(9600));
            assert_eq!(ina.bus.get(address, register::MASK_ENABLE), Some(0x2000));
        }

        // 2mV across the internal 2mΩ shunt is 800 current counts
        ina.alert_on_shunt_over_voltage(true, 2, SECOND.into()).unwrap();
        assert_eq!(ina.bus.get(0x41, register::ALERT_LIMIT), Some(800));
        assert_eq!(ina.bus.get(0x41, register::MASK_ENABLE), Some(0xA000));
    }

    #[test]
    fn test_alert_limit_out_of_range() {
        let mut ina = driver(FakeBus::new().with_ina226(0x40));
        let id = ina.add_device(0x40).unwrap();
        ina.bus.clear_log();

        assert_eq!(
            ina.alert_on_shunt_over_voltage(true, 100, id.into()),
            Err(Error::LimitOutOfRange)
        );
        assert_eq!(
            ina.alert_on_power_over_limit(true, 1_000, id.into()),
            Err(Error::UncalibratedRead)
        );
        assert!(ina.bus.writes().is_empty());
    }

    #[test]
    fn test_target_all_continues_after_failure() {
        let mut ina = driver(FakeBus::new().with_ina219(0x40).with_ina226(0x41));
        ina.discover();

        assert_eq!(
            ina.alert_on_bus_over_voltage(true, 12_000, Target::All),
            Err(Error::UnsupportedFeature)
        );
        // The INA226 behind the failing INA219 was still armed
        assert_eq!(ina.bus.get(0x41, register::MASK_ENABLE), Some(0x2000));
        assert_eq!(ina.bus.get(0x41, register::ALERT_LIMIT), Some(9600));
    }

    #[test]
    fn test_invalid_device() {
        let mut ina = driver(FakeBus::new());
        let missing = DeviceId::new(3);
        assert_eq!(ina.descriptor(missing).err(), Some(Error::InvalidDevice));
        assert_eq!(ina.bus_millivolts(missing), Err(Error::InvalidDevice));
        assert_eq!(
            ina.set_mode(OperatingMode::Shutdown, missing.into()),
            Err(Error::InvalidDevice)
        );
        // Nothing to do on an empty store
        assert_eq!(ina.set_mode(OperatingMode::Shutdown, Target::All), Ok(()));
    }
}
