//! Print spooler configuration.

use crate::{DeviceSettings, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder replaced by the printer name in spooler arguments.
pub const PRINTER_PLACEHOLDER: &str = "{printer}";

/// Command line that receives a raw print job on stdin.
///
/// Defaults to `lp -d {printer} -o raw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolCommand(Vec<String>);

impl Default for SpoolCommand {
    fn default() -> Self {
        Self(
            ["lp", "-d", PRINTER_PLACEHOLDER, "-o", "raw"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }
}

impl SpoolCommand {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Program and arguments with the printer placeholder substituted.
    ///
    /// # Examples
    ///
    /// ```
    /// use devlink_core::config::SpoolCommand;
    ///
    /// let (program, args) = SpoolCommand::default().resolve("EPSON").unwrap();
    /// assert_eq!(program, "lp");
    /// assert_eq!(args, vec!["-d", "EPSON", "-o", "raw"]);
    /// ```
    #[must_use]
    pub fn resolve(&self, printer: &str) -> Option<(String, Vec<String>)> {
        let (program, args) = self.0.split_first()?;
        let args = args
            .iter()
            .map(|arg| arg.replace(PRINTER_PLACEHOLDER, printer))
            .collect();
        Some((program.clone(), args))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SpoolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Printer reached through the operating system spooler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    settings: DeviceSettings,
    printer: String,
    spool_command: SpoolCommand,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::new("RAW"),
            printer: String::new(),
            spool_command: SpoolCommand::default(),
        }
    }
}

impl RawConfig {
    pub fn new(printer: impl Into<String>) -> Self {
        Self {
            printer: printer.into(),
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
    pub fn printer(&self) -> &str {
        &self.printer
    }

    #[must_use]
    pub fn spool_command(&self) -> &SpoolCommand {
        &self.spool_command
    }

    pub fn set_printer(&mut self, printer: impl Into<String>) {
        self.settings
            .update("printer", &mut self.printer, printer.into());
    }

    pub fn set_spool_command(&mut self, command: SpoolCommand) {
        self.settings
            .update("spool_command", &mut self.spool_command, command);
    }

    /// # Errors
    ///
    /// Returns [`Error::MissingField`] when no printer or spooler is set.
    pub fn validate(&self) -> Result<()> {
        if self.printer.trim().is_empty() {
            return Err(Error::missing_field("printer"));
        }
        if self.spool_command.is_empty() {
            return Err(Error::missing_field("spool_command"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_spool_command() {
        let command = SpoolCommand::new(["sh", "-c", "cat > /tmp/{printer}.prn"]);
        let (program, args) = command.resolve("kitchen").unwrap();

        assert_eq!(program, "sh");
        assert_eq!(args, vec!["-c", "cat > /tmp/kitchen.prn"]);
        assert_eq!(command.to_string(), "sh -c cat > /tmp/{printer}.prn");
    }

    #[test]
    fn test_empty_spool_command_does_not_resolve() {
        assert!(SpoolCommand::new(Vec::<String>::new()).resolve("x").is_none());
    }

    #[test]
    fn test_validate() {
        assert!(RawConfig::new("EPSON_TM_T20").validate().is_ok());
        assert!(matches!(
            RawConfig::default().validate(),
            Err(Error::MissingField(f)) if f == "printer"
        ));

        let mut config = RawConfig::new("EPSON");
        config.set_spool_command(SpoolCommand::new(Vec::<String>::new()));
        assert!(config.validate().is_err());
    }
}
