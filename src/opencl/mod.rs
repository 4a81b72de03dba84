//! OpenCL driver seam and device inspection
//!
//! The compiler sits behind object-safe traits so the diagnostics engine and
//! every test run against a mock driver; the `opencl` cargo feature adds the
//! system-backed implementation linking the ICD loader.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

pub mod mock;
#[cfg(feature = "opencl")]
pub mod system;

#[cfg(feature = "opencl")]
pub use system::SystemClApi;

// ============================================================================
// Errors
// ============================================================================

/// Failures reported by an OpenCL driver backend
#[derive(Debug, Error)]
pub enum ClError {
    /// The platform enumeration itself failed
    #[error("OpenCL platform query failed: {0}")]
    PlatformQuery(String),

    /// Device enumeration failed for one platform
    #[error("OpenCL device query failed: {0}")]
    DeviceQuery(String),

    /// A device info query errored; callers skip the device
    #[error("device info unavailable: {0}")]
    InfoUnavailable(String),

    /// Context or program setup failed before a build log existed
    #[error("program build failed: {0}")]
    Build(String),
}

// ============================================================================
// Driver Traits
// ============================================================================

/// Entry point of a driver backend
pub trait ClApi {
    fn platforms(&self) -> Result<Vec<Box<dyn ClPlatform>>, ClError>;
}

/// One OpenCL platform, enumerating its devices of any type
pub trait ClPlatform {
    fn devices(&self) -> Result<Vec<Box<dyn ClDevice>>, ClError>;
}

/// One OpenCL device: identity queries, ranking inputs, and compilation
pub trait ClDevice {
    fn vendor(&self) -> Result<String, ClError>;
    fn name(&self) -> Result<String, ClError>;
    fn driver_version(&self) -> Result<String, ClError>;
    fn max_compute_units(&self) -> Result<u32, ClError>;
    fn max_clock_frequency(&self) -> Result<u32, ClError>;

    /// Compile `source` with the given option string on this device and
    /// return the build log. A failed compilation is a successful call; the
    /// interesting output is the log itself.
    fn compile(&self, source: &str, options: &str) -> Result<String, ClError>;
}

// ============================================================================
// Device Inspection
// ============================================================================

/// Human-readable device description: vendor, name and driver version
pub fn describe(device: &dyn ClDevice) -> Result<String, ClError> {
    Ok(format!(
        "{} {} {}",
        device.vendor()?,
        device.name()?,
        device.driver_version()?
    ))
}

/// Stable 32-bit device identifier.
///
/// Hashes vendor, name and driver version so clients can pin a device across
/// runs; truncated to 32 bits to travel safely through JSON numbers.
pub fn stable_id(device: &dyn ClDevice) -> Result<u32, ClError> {
    let mut hasher = Sha256::new();
    hasher.update(device.vendor()?.as_bytes());
    hasher.update(device.name()?.as_bytes());
    hasher.update(device.driver_version()?.as_bytes());
    let digest = hasher.finalize();
    Ok(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// Ad-hoc device ranking: compute-unit count times clock frequency
pub fn power_index(device: &dyn ClDevice) -> Result<u64, ClError> {
    Ok(u64::from(device.max_compute_units()?) * u64::from(device.max_clock_frequency()?))
}

/// Device summary as printed by `--clinfo`
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    #[serde(rename = "deviceID")]
    pub device_id: u32,
    pub description: String,
    #[serde(rename = "powerIndex")]
    pub power_index: u64,
}

/// Enumerate every visible device. Devices whose info queries error are
/// skipped, platforms whose device query errors are skipped.
pub fn enumerate(api: &dyn ClApi) -> Result<Vec<DeviceRecord>, ClError> {
    let mut records = Vec::new();
    for platform in api.platforms()? {
        let devices = match platform.devices() {
            Ok(devices) => devices,
            Err(err) => {
                warn!("Device enumeration failed for a platform: {}", err);
                continue;
            }
        };
        for device in devices {
            match (
                stable_id(device.as_ref()),
                describe(device.as_ref()),
                power_index(device.as_ref()),
            ) {
                (Ok(device_id), Ok(description), Ok(power_index)) => records.push(DeviceRecord {
                    device_id,
                    description,
                    power_index,
                }),
                _ => warn!("Skipping a device with unavailable info"),
            }
        }
    }
    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================
