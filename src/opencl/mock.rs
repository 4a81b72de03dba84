//! Mock OpenCL driver for testing
//!
//! Allows tests to stage platforms, devices, info failures and canned build
//! logs, and to observe the compilations a device received.

use super::{ClApi, ClDevice, ClError, ClPlatform};
use std::cell::RefCell;
use std::rc::Rc;

/// Scriptable device with a canned build log
#[derive(Debug, Clone)]
pub struct MockDevice {
    vendor: String,
    name: String,
    driver_version: String,
    compute_units: u32,
    clock_frequency: u32,
    build_log: String,
    info_available: bool,

    /// (source, options) pairs passed to `compile`
    compilations: Rc<RefCell<Vec<(String, String)>>>,
}

impl MockDevice {
    pub fn new(name: &str) -> Self {
        Self {
            vendor: "Acme".to_string(),
            name: name.to_string(),
            driver_version: "1.2.3".to_string(),
            compute_units: 1,
            clock_frequency: 1000,
            build_log: String::new(),
            info_available: true,
            compilations: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Set the ranking inputs (compute units, clock frequency in MHz)
    pub fn with_power(mut self, compute_units: u32, clock_frequency: u32) -> Self {
        self.compute_units = compute_units;
        self.clock_frequency = clock_frequency;
        self
    }

    /// Set the build log returned by every `compile` call
    pub fn with_build_log(mut self, build_log: &str) -> Self {
        self.build_log = build_log.to_string();
        self
    }

    /// Make every info query fail with `InfoUnavailable`
    pub fn without_info(mut self) -> Self {
        self.info_available = false;
        self
    }

    /// The (source, options) pairs this device compiled so far.
    /// Clones of the device share the record.
    pub fn compilations(&self) -> Vec<(String, String)> {
        self.compilations.borrow().clone()
    }

    fn info<T>(&self, value: T) -> Result<T, ClError> {
        if self.info_available {
            Ok(value)
        } else {
            Err(ClError::InfoUnavailable("mock info query failed".to_string()))
        }
    }
}

impl ClDevice for MockDevice {
    fn vendor(&self) -> Result<String, ClError> {
        self.info(self.vendor.clone())
    }

    fn name(&self) -> Result<String, ClError> {
        self.info(self.name.clone())
    }

    fn driver_version(&self) -> Result<String, ClError> {
        self.info(self.driver_version.clone())
    }

    fn max_compute_units(&self) -> Result<u32, ClError> {
        self.info(self.compute_units)
    }

    fn max_clock_frequency(&self) -> Result<u32, ClError> {
        self.info(self.clock_frequency)
    }

    fn compile(&self, source: &str, options: &str) -> Result<String, ClError> {
        self.compilations
            .borrow_mut()
            .push((source.to_string(), options.to_string()));
        Ok(self.build_log.clone())
    }
}

/// Platform holding a staged device list
pub struct MockPlatform {
    devices: Vec<MockDevice>,
    fail_devices: bool,
}

impl MockPlatform {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            fail_devices: false,
        }
    }

    /// Make the device query fail with `DeviceQuery`
    pub fn failing() -> Self {
        Self {
            devices: Vec::new(),
            fail_devices: true,
        }
    }
}

impl ClPlatform for MockPlatform {
    fn devices(&self) -> Result<Vec<Box<dyn ClDevice>>, ClError> {
        if self.fail_devices {
            return Err(ClError::DeviceQuery("mock device query failed".to_string()));
        }
        Ok(self
            .devices
            .iter()
            .cloned()
            .map(|device| Box::new(device) as Box<dyn ClDevice>)
            .collect())
    }
}

/// Driver backend staging any number of platforms
pub struct MockClApi {
    platforms: Vec<MockPlatform>,
    fail_platforms: bool,
}

impl MockClApi {
    /// Driver with no platforms at all
    pub fn new() -> Self {
        Self {
            platforms: Vec::new(),
            fail_platforms: false,
        }
    }

    /// Driver with a single platform holding `devices`
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self::with_platforms(vec![MockPlatform::new(devices)])
    }

    pub fn with_platforms(platforms: Vec<MockPlatform>) -> Self {
        Self {
            platforms,
            fail_platforms: false,
        }
    }

    /// Driver whose platform query fails with `PlatformQuery`
    pub fn failing() -> Self {
        Self {
            platforms: Vec::new(),
            fail_platforms: true,
        }
    }
}

impl Default for MockClApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ClApi for MockClApi {
    fn platforms(&self) -> Result<Vec<Box<dyn ClPlatform>>, ClError> {
        if self.fail_platforms {
            return Err(ClError::PlatformQuery(
                "mock platform query failed".to_string(),
            ));
        }
        Ok(self
            .platforms
            .iter()
            .map(|platform| {
                Box::new(MockPlatform {
                    devices: platform.devices.clone(),
                    fail_devices: platform.fail_devices,
                }) as Box<dyn ClPlatform>
            })
            .collect())
    }
}
