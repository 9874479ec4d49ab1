//! Peripheral configuration

use crate::error::{PeripheralError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Longest device name the advertising data can carry.
pub const MAX_DEVICE_NAME_LEN: usize = 29;

/// Identity and options of the peripheral
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    /// Advertised device name
    pub device_name: String,
    /// Manufacturer name in the Device Information service
    pub vendor_name: String,
    /// Software revision in the Device Information service
    pub firmware_version: String,
    /// Whether the device has a battery to report
    pub battery: bool,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            device_name: "bleperiph".to_string(),
            vendor_name: "Unknown".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            battery: false,
        }
    }
}

impl PeripheralConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() || self.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(PeripheralError::InvalidParameter(format!(
                "device name must be 1 to {} bytes, got {}",
                MAX_DEVICE_NAME_LEN,
                self.device_name.len()
            )));
        }
        Ok(())
    }
}
