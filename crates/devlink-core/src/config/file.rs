//! Plain file configuration.

use crate::{DeviceSettings, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File that receives everything written to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    settings: DeviceSettings,
    path: String,
    create_if_missing: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::new("File"),
            path: String::new(),
            create_if_missing: false,
        }
    }
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.set_create_if_missing(create);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }

    #[must_use]
    pub fn create_if_missing(&self) -> bool {
        self.create_if_missing
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.settings.update("path", &mut self.path, path.into());
    }

    pub fn set_create_if_missing(&mut self, create: bool) {
        self.settings
            .update("create_if_missing", &mut self.create_if_missing, create);
    }

    /// # Errors
    ///
    /// Returns [`Error::MissingField`] when no path is set.
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(Error::missing_field("path"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config() {
        let config = FileConfig::new("/tmp/receipt.txt").with_create_if_missing(true);

        assert_eq!(config.path(), Path::new("/tmp/receipt.txt"));
        assert!(config.create_if_missing());
        assert!(config.validate().is_ok());
        assert!(FileConfig::default().validate().is_err());
    }
}
