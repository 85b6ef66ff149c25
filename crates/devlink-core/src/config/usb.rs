//! USB HID configuration.

use crate::{DeviceSettings, Error, Result};
use serde::{Deserialize, Serialize};

/// HID device selected by vendor and product id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidConfig {
    settings: DeviceSettings,
    vendor_id: u16,
    product_id: u16,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::new("USB"),
            vendor_id: 0,
            product_id: 0,
        }
    }
}

impl HidConfig {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    #[must_use]
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn set_vendor_id(&mut self, vendor_id: u16) {
        self.settings
            .update("vendor_id", &mut self.vendor_id, vendor_id);
    }

    pub fn set_product_id(&mut self, product_id: u16) {
        self.settings
            .update("product_id", &mut self.product_id, product_id);
    }

    /// # Errors
    ///
    /// Returns [`Error::MissingField`] when the vendor id is zero.
    pub fn validate(&self) -> Result<()> {
        if self.vendor_id == 0 {
            return Err(Error::missing_field("vendor_id"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hid_config() {
        let config = HidConfig::new(0x04b8, 0x0202);

        assert_eq!(config.vendor_id(), 0x04b8);
        assert_eq!(config.product_id(), 0x0202);
        assert_eq!(config.settings().name(), "USB");
        assert!(config.validate().is_ok());
        assert!(HidConfig::default().validate().is_err());
    }
}
