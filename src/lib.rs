/*
Copyright (c) 2026 bmp580-rs contributors
LICENSE: BSD3 (see LICENSE file)
*/

//! Driver for the Bosch BMP580 barometric pressure/temperature sensor.
//!
//! The BMP580 streams measurement frames into an on-chip FIFO at a fixed
//! output rate. This driver pushes a fixed configuration sequence into the
//! sensor's control registers once at construction, then drains one frame
//! per read, converting the raw 24-bit register words into hectopascals and
//! degrees Celsius. Optionally a read also derives altitude relative to a
//! baseline captured from the first frame after configuration, so altitude
//! is always measured from the device's power-on location.
//!
//! All bus traffic is synchronous and blocking, bounded by per-transfer
//! timeouts. The platform's I2C primitives sit behind the traits in
//! [`Platform`]; master buses are shared across sensor handles through a
//! [`BusRegistry`], so two sensors constructed on the same controller never
//! re-initialize it.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, info};
use thiserror::Error;

mod altitude;
mod bus;
mod platform;
#[cfg(test)]
mod testutil;

pub use altitude::estimate_altitude;
pub use bus::{BusRegistry, Port};
pub use platform::{Bus, BusConfig, Device, DeviceConfig, Platform};

use altitude::KELVIN_OFFSET;

/// Errors in this crate
#[derive(Debug, Error)]
pub enum Error<E: Debug> {
    /// Address selector outside {0, 1}
    #[error("invalid address selector {0}: use 0 for 0x46 or 1 for 0x47")]
    InvalidAddressSelector(u8),
    /// Fixed port index beyond what the platform provides
    #[error("invalid I2C port number {0}")]
    InvalidPort(u8),
    /// Pin not usable as an output
    #[error("invalid SCL or SDA pin number {0}")]
    InvalidPin(u32),
    /// Bus creation or device attachment failed
    #[error("error initialising I2C bus: {0:?}")]
    Connection(E),
    /// Probe produced no acknowledgment
    #[error("BMP580 device not found on I2C bus")]
    DeviceNotFound,
    /// A register write in the setup sequence failed
    #[error("unable to write to sensor configuration registers: {0:?}")]
    Configuration(E),
    /// FIFO stayed empty past the bounded poll
    #[error("no BMP580 data available in the FIFO buffer")]
    DataUnavailable,
    /// Any other bus I/O failure
    #[error("BMP580 bus transfer failed: {0:?}")]
    Transport(E),
}

/// Construction parameters.
///
/// `port` and `address_select` carry the firmware defaults: let the
/// platform pick a controller, address pin pulled low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub scl_pin: u32,
    pub sda_pin: u32,
    pub port: Port,
    /// 0 selects target address 0x46, 1 selects 0x47.
    pub address_select: u8,
}

impl Config {
    pub fn new(scl_pin: u32, sda_pin: u32) -> Self {
        Self {
            scl_pin,
            sda_pin,
            port: Port::Auto,
            address_select: 0,
        }
    }
}

/// One decoded measurement frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub pressure_hpa: f32,
    pub temperature_c: f32,
}

/// A connected, configured BMP580.
///
/// The handle owns its device attachment exclusively and shares the
/// underlying bus with any other handle constructed on the same port; the
/// bus is torn down when the last handle referencing it drops.
pub struct Bmp580<P: Platform> {
    // Declared before `bus` so the attachment is released first on drop.
    device: P::Device,
    bus: Arc<P::Bus>,
    address: u8,
    /// Baseline pair captured from the first frame, in hPa and Kelvin.
    baseline_pressure: f32,
    baseline_temperature: f32,
}

impl<P: Platform> Bmp580<P> {
    /// Connect to the sensor: validate the arguments, acquire the (possibly
    /// shared) bus, attach the device, push the register configuration and
    /// capture the altitude baseline from the first frame.
    ///
    /// Either every step succeeds or no handle is produced; a failed
    /// configuration is not rolled back, so the sensor may be left in an
    /// indeterminate state and must be reconnected before use.
    pub fn connect(
        registry: &BusRegistry<P>,
        config: Config,
        delay_source: &mut impl DelayNs,
    ) -> Result<Self, Error<P::Error>> {
        let address = match config.address_select {
            0 => I2C_ADDRESS_0,
            1 => I2C_ADDRESS_1,
            other => return Err(Error::InvalidAddressSelector(other)),
        };

        let platform = registry.platform();
        if !platform.is_valid_output_pin(config.scl_pin) {
            return Err(Error::InvalidPin(config.scl_pin));
        }
        if !platform.is_valid_output_pin(config.sda_pin) {
            return Err(Error::InvalidPin(config.sda_pin));
        }
        if let Port::Fixed(index) = config.port {
            if index >= platform.port_count() {
                return Err(Error::InvalidPort(index));
            }
        }

        let bus = registry.acquire(config.port, config.scl_pin, config.sda_pin)?;
        let mut device = bus
            .attach(&DeviceConfig {
                address,
                scl_speed_hz: DEVICE_CLOCK_HZ,
            })
            .map_err(Error::Connection)?;

        // The sensor needs 2 ms after power-on before it takes configuration.
        delay_source.delay_us(STARTUP_DELAY_US);
        Self::configure(bus.as_ref(), &mut device, address)?;
        info!("sensor configured");

        // The first frame doubles as the altitude reference.
        let baseline = Self::read_frame(&mut device, delay_source)?;
        debug!(
            "baseline captured: {} hPa at {} degC",
            baseline.pressure_hpa, baseline.temperature_c
        );

        Ok(Self {
            device,
            bus,
            address,
            baseline_pressure: baseline.pressure_hpa,
            baseline_temperature: baseline.temperature_c + KELVIN_OFFSET,
        })
    }

    /// Drain one frame from the FIFO and return it in physical units.
    ///
    /// Blocks until the FIFO holds a frame, bounded by
    /// [`FIFO_POLL_ATTEMPTS`] polls of the frame counter.
    pub fn read_pressure_temperature(
        &mut self,
        delay_source: &mut impl DelayNs,
    ) -> Result<Measurement, Error<P::Error>> {
        Self::read_frame(&mut self.device, delay_source)
    }

    /// Like [`Self::read_pressure_temperature`], plus the altitude in
    /// meters relative to the power-on location.
    pub fn read_pressure_temperature_altitude(
        &mut self,
        delay_source: &mut impl DelayNs,
    ) -> Result<(Measurement, f32), Error<P::Error>> {
        let measurement = Self::read_frame(&mut self.device, delay_source)?;
        let altitude = estimate_altitude(
            measurement.pressure_hpa,
            self.baseline_pressure,
            self.baseline_temperature,
        );
        Ok((measurement, altitude))
    }

    /// The 7-bit target address this handle resolved to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The controller index of the underlying (possibly shared) bus.
    pub fn port(&self) -> u8 {
        self.bus.port()
    }

    /// Baseline pressure in hPa captured at construction.
    pub fn baseline_pressure(&self) -> f32 {
        self.baseline_pressure
    }

    /// Baseline temperature in Kelvin captured at construction.
    pub fn baseline_temperature(&self) -> f32 {
        self.baseline_temperature
    }

    /// Probe for the sensor and push the fixed register sequence.
    ///
    /// Order matters: the remaining registers are only writable once the
    /// first write has taken the part out of deep standby.
    fn configure(
        bus: &P::Bus,
        device: &mut P::Device,
        address: u8,
    ) -> Result<(), Error<P::Error>> {
        if !bus.probe(address, PROBE_TIMEOUT).map_err(Error::Transport)? {
            return Err(Error::DeviceNotFound);
        }

        // Normal power mode, 140 Hz output rate, deep standby disabled.
        Self::write_register(device, REG_ODR_PWR_CONFIG, ODR_PWR_NORMAL_140HZ)?;
        // Pressure measurement enabled, OSR x8 pressure / x2 temperature.
        Self::write_register(device, REG_OSR_CONFIG, OSR_PRESS_8X_TEMP_2X)?;
        // IIR filter coefficient 7 on both channels.
        Self::write_register(device, REG_DSP_IIR_CONFIG, IIR_COEFF_7)?;
        // FIFO streaming mode, threshold 31 entries.
        Self::write_register(device, REG_FIFO_CONFIG, FIFO_STREAMING_THRESHOLD_31)?;
        // No decimation; both pressure and temperature go into the FIFO.
        Self::write_register(device, REG_FIFO_SEL_CONFIG, FIFO_SEL_PRESS_TEMP)?;

        Ok(())
    }

    fn write_register(
        device: &mut P::Device,
        register: u8,
        value: u8,
    ) -> Result<(), Error<P::Error>> {
        device
            .transmit(&[register, value], CONFIG_WRITE_TIMEOUT)
            .map_err(Error::Configuration)
    }

    /// Wait for the FIFO to hold at least one frame, then read and decode
    /// the oldest one.
    ///
    /// Only the empty-FIFO condition is retried; a transport failure at any
    /// point is immediately fatal.
    fn read_frame(
        device: &mut P::Device,
        delay_source: &mut impl DelayNs,
    ) -> Result<Measurement, Error<P::Error>> {
        let mut count = [0u8; 1];
        let mut attempts = 0;
        loop {
            device
                .transmit_receive(&[REG_FIFO_COUNT], &mut count, DATA_READ_TIMEOUT)
                .map_err(Error::Transport)?;
            if count[0] != 0 {
                break;
            }
            attempts += 1;
            if attempts == FIFO_POLL_ATTEMPTS {
                return Err(Error::DataUnavailable);
            }
            delay_source.delay_us(FIFO_POLL_INTERVAL_US);
        }

        let mut frame = [0u8; 6];
        device
            .transmit_receive(&[REG_FIFO_DATA], &mut frame, DATA_READ_TIMEOUT)
            .map_err(Error::Transport)?;

        let (pressure_raw, temperature_raw) = split_frame(&frame);
        Ok(Measurement {
            pressure_hpa: pressure_from_raw(pressure_raw),
            temperature_c: temperature_from_raw(temperature_raw),
        })
    }
}

/// Split a 6-byte FIFO frame into its raw 24-bit words.
///
/// Bytes 0-2 encode temperature, bytes 3-5 pressure, both little-endian.
/// Returns `(pressure, temperature)`.
fn split_frame(frame: &[u8; 6]) -> (u32, u32) {
    let temperature = u32::from(frame[0]) | u32::from(frame[1]) << 8 | u32::from(frame[2]) << 16;
    let pressure = u32::from(frame[3]) | u32::from(frame[4]) << 8 | u32::from(frame[5]) << 16;
    (pressure, temperature)
}

/// Pressure in hPa from the unsigned 24-bit raw word.
fn pressure_from_raw(raw: u32) -> f32 {
    raw as f32 / PRESSURE_LSB_PER_HPA
}

/// Temperature in degrees Celsius from the 24-bit raw word.
///
/// The field is two's complement; sign-extend explicitly from bit 23
/// instead of leaning on integer promotion.
fn temperature_from_raw(raw: u32) -> f32 {
    let signed = ((raw as i32) ^ 0x80_0000) - 0x80_0000;
    signed as f32 / TEMPERATURE_LSB_PER_DEGC
}

/// Register map
///
const REG_FIFO_CONFIG: u8 = 0x16;
const REG_FIFO_COUNT: u8 = 0x17;
const REG_FIFO_SEL_CONFIG: u8 = 0x18;
const REG_FIFO_DATA: u8 = 0x29;
const REG_DSP_IIR_CONFIG: u8 = 0x31;
const REG_OSR_CONFIG: u8 = 0x36;
const REG_ODR_PWR_CONFIG: u8 = 0x37;

/// Configuration values, in the order `configure` writes them
const ODR_PWR_NORMAL_140HZ: u8 = 0x99;
const OSR_PRESS_8X_TEMP_2X: u8 = 0x59;
const IIR_COEFF_7: u8 = 0x1B;
const FIFO_STREAMING_THRESHOLD_31: u8 = 0x3F;
const FIFO_SEL_PRESS_TEMP: u8 = 0x03;

/// I2C target addresses, selected by the ADDR pin level
pub const I2C_ADDRESS_0: u8 = 0x46;
pub const I2C_ADDRESS_1: u8 = 0x47;

/// Bus clock used for the attached device, in hertz.
const DEVICE_CLOCK_HZ: u32 = 400_000;

/// Raw LSBs per physical unit, from the datasheet.
const PRESSURE_LSB_PER_HPA: f32 = 6400.0;
const TEMPERATURE_LSB_PER_DEGC: f32 = 65536.0;

const PROBE_TIMEOUT: Duration = Duration::from_millis(100);
const CONFIG_WRITE_TIMEOUT: Duration = Duration::from_millis(100);
const DATA_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Settle time after power-on before the sensor takes configuration.
const STARTUP_DELAY_US: u32 = 2000;

/// Upper bound on frame-counter polls before a read gives up.
///
/// 2000 attempts spaced 500 us apart bound the empty-FIFO wait to roughly
/// one second at the configured 140 Hz output rate.
pub const FIFO_POLL_ATTEMPTS: u32 = 2000;

/// Delay between frame-counter polls, in microseconds.
const FIFO_POLL_INTERVAL_US: u32 = 500;
