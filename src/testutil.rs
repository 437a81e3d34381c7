//! Scripted fake of the platform I2C layer.
//!
//! Follows the transaction idiom of `embedded-hal-mock`: a test enumerates
//! the transfers it expects, the fake pops them in order and panics on any
//! divergence, and `done()` asserts the script ran dry.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::platform::{Bus, BusConfig, Device, DeviceConfig, Platform};

/// Error code handed back by scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError(pub &'static str);

/// One expected bus transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum Xfer {
    Probe {
        address: u8,
        ack: bool,
    },
    Write {
        bytes: Vec<u8>,
        result: Result<(), MockError>,
    },
    WriteRead {
        tx: Vec<u8>,
        rx: Vec<u8>,
        result: Result<(), MockError>,
    },
}

impl Xfer {
    pub fn probe(address: u8, ack: bool) -> Self {
        Xfer::Probe { address, ack }
    }

    pub fn write(bytes: &[u8]) -> Self {
        Xfer::Write {
            bytes: bytes.to_vec(),
            result: Ok(()),
        }
    }

    pub fn write_fail(bytes: &[u8], why: &'static str) -> Self {
        Xfer::Write {
            bytes: bytes.to_vec(),
            result: Err(MockError(why)),
        }
    }

    pub fn write_read(tx: &[u8], rx: &[u8]) -> Self {
        Xfer::WriteRead {
            tx: tx.to_vec(),
            rx: rx.to_vec(),
            result: Ok(()),
        }
    }

    pub fn write_read_fail(tx: &[u8], why: &'static str) -> Self {
        Xfer::WriteRead {
            tx: tx.to_vec(),
            rx: Vec::new(),
            result: Err(MockError(why)),
        }
    }
}

type Script = Arc<Mutex<VecDeque<Xfer>>>;

fn next(script: &Script, requested: &str) -> Xfer {
    script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| panic!("unexpected {requested}: script exhausted"))
}

pub struct MockPlatform {
    script: Script,
    created: Arc<Mutex<Vec<BusConfig>>>,
    attached: Arc<Mutex<Vec<DeviceConfig>>>,
    fail_bus_create: bool,
    fail_attach: bool,
    port_count: u8,
    max_output_pin: u32,
}

impl MockPlatform {
    /// A platform with two controllers, output-capable pins 0..=48 and the
    /// given transfer script.
    pub fn new(script: impl IntoIterator<Item = Xfer>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            created: Arc::new(Mutex::new(Vec::new())),
            attached: Arc::new(Mutex::new(Vec::new())),
            fail_bus_create: false,
            fail_attach: false,
            port_count: 2,
            max_output_pin: 48,
        }
    }

    /// A platform that refuses to create buses.
    pub fn failing_bus_create() -> Self {
        Self {
            fail_bus_create: true,
            ..Self::new([])
        }
    }

    /// A platform that refuses to attach devices.
    pub fn failing_attach() -> Self {
        Self {
            fail_attach: true,
            ..Self::new([])
        }
    }

    /// Every bus configuration `create_bus` was called with.
    pub fn buses_created(&self) -> Vec<BusConfig> {
        self.created.lock().unwrap().clone()
    }

    /// Every device configuration `attach` was called with.
    pub fn devices_attached(&self) -> Vec<DeviceConfig> {
        self.attached.lock().unwrap().clone()
    }

    /// Assert that the whole script was consumed.
    pub fn done(&self) {
        let remaining = self.script.lock().unwrap();
        assert!(
            remaining.is_empty(),
            "{} expected transfer(s) never happened: {:?}",
            remaining.len(),
            remaining
        );
    }
}

impl Platform for MockPlatform {
    type Bus = MockBus;
    type Device = MockDevice;
    type Error = MockError;

    fn create_bus(&self, config: &BusConfig) -> Result<MockBus, MockError> {
        if self.fail_bus_create {
            return Err(MockError("bus creation refused"));
        }
        self.created.lock().unwrap().push(config.clone());
        Ok(MockBus {
            // Auto requests resolve to the first controller.
            port: config.port.unwrap_or(0),
            script: Arc::clone(&self.script),
            attached: Arc::clone(&self.attached),
            fail_attach: self.fail_attach,
        })
    }

    fn is_valid_output_pin(&self, pin: u32) -> bool {
        pin <= self.max_output_pin
    }

    fn port_count(&self) -> u8 {
        self.port_count
    }
}

pub struct MockBus {
    port: u8,
    script: Script,
    attached: Arc<Mutex<Vec<DeviceConfig>>>,
    fail_attach: bool,
}

impl Bus for MockBus {
    type Device = MockDevice;
    type Error = MockError;

    fn port(&self) -> u8 {
        self.port
    }

    fn probe(&self, address: u8, _timeout: Duration) -> Result<bool, MockError> {
        match next(&self.script, "probe") {
            Xfer::Probe {
                address: expected,
                ack,
            } => {
                assert_eq!(address, expected, "probe address mismatch");
                Ok(ack)
            }
            other => panic!("expected {other:?}, got probe of 0x{address:02x}"),
        }
    }

    fn attach(&self, config: &DeviceConfig) -> Result<MockDevice, MockError> {
        if self.fail_attach {
            return Err(MockError("attach refused"));
        }
        self.attached.lock().unwrap().push(*config);
        Ok(MockDevice {
            script: Arc::clone(&self.script),
        })
    }
}

pub struct MockDevice {
    script: Script,
}

impl Device for MockDevice {
    type Error = MockError;

    fn transmit(&mut self, bytes: &[u8], _timeout: Duration) -> Result<(), MockError> {
        match next(&self.script, "transmit") {
            Xfer::Write {
                bytes: expected,
                result,
            } => {
                assert_eq!(bytes, &expected[..], "transmit bytes mismatch");
                result
            }
            other => panic!("expected {other:?}, got transmit of {bytes:02x?}"),
        }
    }

    fn transmit_receive(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
        _timeout: Duration,
    ) -> Result<(), MockError> {
        match next(&self.script, "transmit_receive") {
            Xfer::WriteRead {
                tx: expected,
                rx: data,
                result,
            } => {
                assert_eq!(tx, &expected[..], "transmit_receive tx mismatch");
                result?;
                assert_eq!(
                    rx.len(),
                    data.len(),
                    "transmit_receive rx length mismatch"
                );
                rx.copy_from_slice(&data);
                Ok(())
            }
            other => panic!("expected {other:?}, got transmit_receive of {tx:02x?}"),
        }
    }
}
