use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::debug;

use crate::platform::{Bus, BusConfig, Platform};
use crate::Error;

/// Glitch-filter debounce applied to every bus the registry creates.
const GLITCH_FILTER_CYCLES: u8 = 7;

/// I2C controller selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Port {
    /// Let the platform pick a free controller.
    #[default]
    Auto,
    /// Use this controller index.
    Fixed(u8),
}

/// Port-keyed lookup-or-create service for master buses.
///
/// Buses are a host-wide resource: two sensor handles on the same port must
/// share one bus rather than each re-initializing the controller, which
/// would either fail or silently reconfigure shared pins. The registry
/// holds weak references only, so a bus is torn down once the last handle
/// referencing it is dropped.
pub struct BusRegistry<P: Platform> {
    platform: P,
    buses: Mutex<HashMap<u8, Weak<P::Bus>>>,
}

impl<P: Platform> BusRegistry<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            buses: Mutex::new(HashMap::new()),
        }
    }

    /// The platform this registry creates buses on.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Return the live bus for `port` if one exists, otherwise create it.
    ///
    /// On the reuse path the pin arguments are ignored: the existing bus's
    /// pins remain authoritative. An auto-selected bus is registered under
    /// the port the platform resolved it to, so a later explicit request
    /// for that port finds it.
    pub fn acquire(
        &self,
        port: Port,
        scl_pin: u32,
        sda_pin: u32,
    ) -> Result<Arc<P::Bus>, Error<P::Error>> {
        // One guard around the whole lookup-or-create sequence, so two
        // threads constructing on the same port cannot both create a bus.
        let mut buses = self.buses.lock().expect("bus registry lock poisoned");

        if let Port::Fixed(index) = port {
            if let Some(bus) = buses.get(&index).and_then(Weak::upgrade) {
                debug!("reusing existing I2C bus on port {index}");
                return Ok(bus);
            }
        }

        let config = BusConfig {
            port: match port {
                Port::Auto => None,
                Port::Fixed(index) => Some(index),
            },
            scl_pin,
            sda_pin,
            glitch_filter_cycles: GLITCH_FILTER_CYCLES,
            internal_pullups: true,
        };
        let bus = Arc::new(self.platform.create_bus(&config).map_err(Error::Connection)?);
        debug!("created I2C bus on port {}", bus.port());
        buses.insert(bus.port(), Arc::downgrade(&bus));

        Ok(bus)
    }
}
