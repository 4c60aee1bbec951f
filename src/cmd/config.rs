use color_eyre::eyre::{eyre, Result, WrapErr};
use labpower_mgmt::DeviceConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Devices known to the CLI, keyed by name
#[derive(Debug, Default, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,
}

impl LabConfig {
    /// Read the configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&contents).wrap_err_with(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Look up a device by name
    pub fn device(&self, name: &str) -> Result<&DeviceConfig> {
        self.devices.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.devices.keys().map(String::as_str).collect();
            eyre!("Unknown device '{}' (configured: {})", name, known.join(", "))
        })
    }
}
