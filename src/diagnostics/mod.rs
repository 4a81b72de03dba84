//! Kernel diagnostics engine
//!
//! Owns the device-selection policy, drives a compilation through the
//! driver seam and converts the resulting build log into LSP diagnostics.

pub mod log_parser;

pub use log_parser::{BuildLogParser, Diagnostic, Position, Range};

use crate::opencl::{self, ClApi, ClDevice};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Diagnostic count cap applied when the client configures nothing
pub const DEFAULT_MAX_PROBLEMS: usize = 100;

/// A compilation request: kernel text plus an optional display path.
/// The path only contributes its basename to the diagnostics' `source`.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub text: String,
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// Platform enumeration failed during device selection
    #[error("OpenCL compiler unavailable")]
    CompilerUnavailable,

    /// No device survived selection
    #[error("missing OpenCL device")]
    NoDevice,

    #[error(transparent)]
    Cl(#[from] opencl::ClError),
}

// ============================================================================
// Engine
// ============================================================================

pub struct DiagnosticsEngine {
    api: Box<dyn ClApi>,
    device: Option<Box<dyn ClDevice>>,
    parser: BuildLogParser,
    build_options: String,
    max_problems: usize,
    platforms_failed: bool,
}

impl DiagnosticsEngine {
    /// Create an engine with no device selected yet. Callers normally follow
    /// up with `select_device(0)` to auto-select the most powerful device.
    pub fn new(api: Box<dyn ClApi>) -> Self {
        Self {
            api,
            device: None,
            parser: BuildLogParser::default(),
            build_options: String::new(),
            max_problems: DEFAULT_MAX_PROBLEMS,
            platforms_failed: false,
        }
    }

    /// Store the compiler flags, joined with single spaces.
    ///
    /// Expects a JSON array of strings; any non-string entry aborts the
    /// update and the previous value is retained.
    pub fn set_build_options(&mut self, options: &Value) {
        let Some(entries) = options.as_array() else {
            error!("Diagnostics: Build options must be an array of strings");
            return;
        };
        let mut parts = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.as_str() {
                Some(option) => parts.push(option),
                None => {
                    error!(
                        "Diagnostics: Ignoring build options update, non-string entry: {}",
                        entry
                    );
                    return;
                }
            }
        }
        self.build_options = parts.join(" ");
        trace!("Diagnostics: Set build options: '{}'", self.build_options);
    }

    /// Cap the number of diagnostics reported per `get` call
    pub fn set_max_problems(&mut self, max_problems: usize) {
        trace!("Diagnostics: Set max number of problems: {}", max_problems);
        self.max_problems = max_problems;
    }

    /// (Re-)select a device. `requested` is a stable device id from a
    /// previous run; 0 asks for auto-selection.
    ///
    /// An exact id match wins and ends the scan. Otherwise the device with
    /// the greatest power index across all platforms wins, ties broken by
    /// enumeration order. Devices whose info queries fail are skipped.
    pub fn select_device(&mut self, requested: u32) {
        trace!("Diagnostics: Selecting OpenCL device...");
        self.device = None;

        let platforms = match self.api.platforms() {
            Ok(platforms) => {
                self.platforms_failed = false;
                platforms
            }
            Err(err) => {
                error!("Diagnostics: No OpenCL platforms were found: {}", err);
                self.platforms_failed = true;
                return;
            }
        };
        info!("Diagnostics: Found OpenCL platforms: {}", platforms.len());

        let mut exact: Option<Box<dyn ClDevice>> = None;
        let mut best: Option<(Box<dyn ClDevice>, u64)> = None;
        'platforms: for platform in platforms {
            let devices = match platform.devices() {
                Ok(devices) => devices,
                Err(err) => {
                    error!("Diagnostics: No OpenCL devices were found: {}", err);
                    continue;
                }
            };
            debug!("Diagnostics: Found OpenCL devices: {}", devices.len());

            for device in devices {
                let identifier = match opencl::stable_id(device.as_ref()) {
                    Ok(identifier) => identifier,
                    Err(err) => {
                        error!("Diagnostics: Failed to get info for a device: {}", err);
                        continue;
                    }
                };
                if identifier == requested {
                    exact = Some(device);
                    break 'platforms;
                }
                let power = match opencl::power_index(device.as_ref()) {
                    Ok(power) => power,
                    Err(err) => {
                        error!("Diagnostics: Failed to get info for a device: {}", err);
                        continue;
                    }
                };
                // Strictly greater, so the earlier device keeps ties.
                if best.as_ref().map_or(true, |(_, best_power)| power > *best_power) {
                    best = Some((device, power));
                }
            }
        }

        self.device = exact.or_else(|| best.map(|(device, _)| device));
        match self.device.as_deref() {
            Some(device) => {
                let description = opencl::describe(device).unwrap_or_default();
                info!("Diagnostics: Selected OpenCL device: {}", description);
            }
            None => warn!("Diagnostics: No OpenCL device selected"),
        }
    }

    /// Stable id of the currently selected device, if any
    pub fn selected_device_id(&self) -> Option<u32> {
        self.device
            .as_deref()
            .and_then(|device| opencl::stable_id(device).ok())
    }

    /// Compile `source` on the selected device and return the diagnostics
    /// parsed from its build log.
    pub fn get(&self, source: &Source) -> Result<Vec<Diagnostic>, DiagnosticsError> {
        if self.platforms_failed {
            return Err(DiagnosticsError::CompilerUnavailable);
        }
        let device = self.device.as_deref().ok_or(DiagnosticsError::NoDevice)?;

        trace!("Diagnostics: Getting diagnostics...");
        let source_name = source
            .file_path
            .as_deref()
            .and_then(|path| path.file_name())
            .and_then(|name| name.to_str())
            .map(str::to_owned);

        debug!("Diagnostics: Building program with options: '{}'", self.build_options);
        let build_log = device.compile(&source.text, &self.build_options)?;
        // Some drivers NUL-terminate the log they hand back.
        let build_log = build_log.trim_end_matches('\0');
        trace!("Diagnostics: Build log:\n{}", build_log);

        Ok(self.collect(build_log, source_name.as_deref()))
    }

    fn collect(&self, build_log: &str, source_name: Option<&str>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for line in build_log.split('\n') {
            if diagnostics.len() == self.max_problems {
                info!("Diagnostics: Maximum number of problems reached, skipping the rest");
                break;
            }
            if let Some(diagnostic) = self.parser.parse_line(line, source_name) {
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }
}

// ============================================================================
// Tests
// ============================================================================
