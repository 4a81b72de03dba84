//! System OpenCL driver backed by the `opencl3` crate
//!
//! Links the ICD loader, so this module only builds under the `opencl`
//! feature. Device info failures are mapped to `InfoUnavailable` and a
//! failed compilation is not an error: the caller wants the build log.

use super::{ClApi, ClDevice, ClError, ClPlatform};
use opencl3::context::Context;
use opencl3::device::{CL_DEVICE_TYPE_ALL, Device};
use opencl3::error_codes::CL_BUILD_PROGRAM_FAILURE;
use opencl3::platform::{Platform, get_platforms};
use opencl3::program::Program;
use tracing::{debug, error};

/// Driver backend over the system's OpenCL platforms
pub struct SystemClApi;

impl SystemClApi {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ClApi for SystemClApi {
    fn platforms(&self) -> Result<Vec<Box<dyn ClPlatform>>, ClError> {
        let platforms = get_platforms().map_err(|err| ClError::PlatformQuery(err.to_string()))?;
        Ok(platforms
            .into_iter()
            .map(|platform| Box::new(SystemPlatform { platform }) as Box<dyn ClPlatform>)
            .collect())
    }
}

struct SystemPlatform {
    platform: Platform,
}

impl ClPlatform for SystemPlatform {
    fn devices(&self) -> Result<Vec<Box<dyn ClDevice>>, ClError> {
        let ids = self
            .platform
            .get_devices(CL_DEVICE_TYPE_ALL)
            .map_err(|err| ClError::DeviceQuery(err.to_string()))?;
        Ok(ids
            .into_iter()
            .map(|id| Box::new(SystemDevice { device: Device::new(id) }) as Box<dyn ClDevice>)
            .collect())
    }
}

struct SystemDevice {
    device: Device,
}

fn info_unavailable(err: opencl3::error_codes::ClError) -> ClError {
    ClError::InfoUnavailable(err.to_string())
}

impl ClDevice for SystemDevice {
    fn vendor(&self) -> Result<String, ClError> {
        self.device.vendor().map_err(info_unavailable)
    }

    fn name(&self) -> Result<String, ClError> {
        self.device.name().map_err(info_unavailable)
    }

    fn driver_version(&self) -> Result<String, ClError> {
        self.device.driver_version().map_err(info_unavailable)
    }

    fn max_compute_units(&self) -> Result<u32, ClError> {
        self.device.max_compute_units().map_err(info_unavailable)
    }

    fn max_clock_frequency(&self) -> Result<u32, ClError> {
        self.device.max_clock_frequency().map_err(info_unavailable)
    }

    fn compile(&self, source: &str, options: &str) -> Result<String, ClError> {
        let context =
            Context::from_device(&self.device).map_err(|err| ClError::Build(err.to_string()))?;
        let mut program = Program::create_from_source(&context, source)
            .map_err(|err| ClError::Build(err.to_string()))?;

        debug!("SystemClApi: Building program with options: '{}'", options);
        if let Err(err) = program.build(context.devices(), options) {
            // CL_BUILD_PROGRAM_FAILURE means the kernel has compile errors,
            // which is exactly what the build log is fetched for.
            if err.0 != CL_BUILD_PROGRAM_FAILURE {
                error!("SystemClApi: Failed to build program: {}", err);
            }
        }

        match program.get_build_log(self.device.id()) {
            Ok(build_log) => Ok(build_log),
            Err(err) => {
                error!("SystemClApi: Failed to get build info: {}", err);
                Ok(String::new())
            }
        }
    }
}
