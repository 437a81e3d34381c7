use std::fmt::Debug;
use std::time::Duration;

/// Parameters for a newly created master bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Explicit controller index, or `None` to let the platform pick a
    /// free one.
    pub port: Option<u8>,
    /// GPIO driving the clock line.
    pub scl_pin: u32,
    /// GPIO driving the data line.
    pub sda_pin: u32,
    /// Glitch-filter debounce window, in bus cycles.
    pub glitch_filter_cycles: u8,
    /// Enable the chip's internal pull-up resistors on both lines.
    pub internal_pullups: bool,
}

/// Parameters for attaching a target device to an existing bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// 7-bit target address.
    pub address: u8,
    /// Bus clock used when talking to this device, in hertz.
    pub scl_speed_hz: u32,
}

/// Entry point into the platform's I2C layer.
///
/// The driver never talks to hardware directly; everything goes through an
/// implementation of this trait (and the [`Bus`]/[`Device`] handles it
/// produces). All operations are blocking and bounded by their timeout.
pub trait Platform {
    type Bus: Bus<Device = Self::Device, Error = Self::Error>;
    type Device: Device<Error = Self::Error>;
    type Error: Debug;

    /// Create a new master bus.
    fn create_bus(&self, config: &BusConfig) -> Result<Self::Bus, Self::Error>;

    /// Whether `pin` can be driven as an output on this platform.
    fn is_valid_output_pin(&self, pin: u32) -> bool;

    /// Number of I2C controllers the platform provides.
    fn port_count(&self) -> u8;
}

/// A live master bus, shared by every sensor handle built on the same port.
pub trait Bus {
    type Device;
    type Error: Debug;

    /// The controller index this bus resolved to.
    fn port(&self) -> u8;

    /// Address a target and wait for an acknowledgment.
    ///
    /// `Ok(false)` means the bus itself is healthy but nothing answered at
    /// `address` within `timeout`.
    fn probe(&self, address: u8, timeout: Duration) -> Result<bool, Self::Error>;

    /// Attach a target device, producing an exclusively owned handle.
    fn attach(&self, config: &DeviceConfig) -> Result<Self::Device, Self::Error>;
}

/// An attached target device.
pub trait Device {
    type Error: Debug;

    /// Write `bytes` to the device.
    fn transmit(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), Self::Error>;

    /// Write `tx`, then read back exactly `rx.len()` bytes.
    fn transmit_receive(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        timeout: Duration,
    ) -> Result<(), Self::Error>;
}
