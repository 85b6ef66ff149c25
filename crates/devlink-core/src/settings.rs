//! Settings shared by every transport kind.
//!
//! [`DeviceSettings`] carries the knobs the device stream algorithms consume:
//! port-control mode, timeout, retry count and interval, and the read/write
//! chunk sizes. Every numeric knob is clamped to a minimum of 1 whenever it is
//! assigned, including when the settings are deserialized.
//!
//! # Change Notification
//!
//! Observers subscribe to a [`tokio::sync::broadcast`] channel and receive a
//! [`ConfigEvent`] before ([`ChangePhase::Changing`]) and after
//! ([`ChangePhase::Changed`]) each effective change. Assigning the value a
//! property already holds publishes nothing.
//!
//! ```
//! use devlink_core::{ChangePhase, DeviceSettings};
//!
//! let mut settings = DeviceSettings::new("Scale");
//! let mut events = settings.subscribe();
//!
//! settings.set_retries(0);
//! assert_eq!(settings.retries(), 1);
//!
//! let changing = events.try_recv().unwrap();
//! let changed = events.try_recv().unwrap();
//! assert_eq!(changing.phase, ChangePhase::Changing);
//! assert_eq!(changed.property, "retries");
//! assert_eq!(changed.value, "1");
//! ```

use crate::constants::{
    DEFAULT_ENCODING, DEFAULT_PORT_CONTROL, DEFAULT_READ_BUFFER_SIZE, DEFAULT_RETRIES,
    DEFAULT_RETRY_INTERVAL_MS, DEFAULT_TIMEOUT_SECS, DEFAULT_WRITE_BUFFER_SIZE, MIN_KNOB_VALUE,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Whether an event is published before or after the value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangePhase {
    /// The property is about to change.
    Changing,

    /// The property has changed.
    Changed,
}

/// A property change on a device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEvent {
    /// Name of the device whose configuration changed.
    pub device: String,

    /// Before or after the assignment.
    pub phase: ChangePhase,

    /// Property name, e.g. `"retries"` or `"baud_rate"`.
    pub property: &'static str,

    /// New value, rendered for display.
    pub value: String,

    /// When the event was published.
    pub at: DateTime<Utc>,
}

/// Publisher side of the configuration change channel.
///
/// The channel is created on the first [`subscribe`](Self::subscribe) call.
/// Clones share the same channel.
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    sender: Option<broadcast::Sender<ConfigEvent>>,
}

impl ChangeNotifier {
    /// Subscribe to future change events.
    pub fn subscribe(&mut self) -> broadcast::Receiver<ConfigEvent> {
        self.sender
            .get_or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish a single event. Does nothing if nobody ever subscribed.
    pub fn publish(
        &self,
        device: &str,
        phase: ChangePhase,
        property: &'static str,
        value: &dyn Display,
    ) {
        let Some(sender) = &self.sender else {
            return;
        };

        // Fails only when every receiver was dropped
        let _ = sender.send(ConfigEvent {
            device: device.to_string(),
            phase,
            property,
            value: value.to_string(),
            at: Utc::now(),
        });
    }
}

/// Knobs shared by every transport configuration.
///
/// # Examples
///
/// ```
/// use devlink_core::DeviceSettings;
/// use std::time::Duration;
///
/// let settings = DeviceSettings::new("Printer")
///     .with_port_control(false)
///     .with_retries(5)
///     .with_retry_interval_ms(0);
///
/// assert!(!settings.port_control());
/// assert_eq!(settings.retries(), 5);
/// assert_eq!(settings.retry_interval(), Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawSettings")]
pub struct DeviceSettings {
    name: String,
    port_control: bool,
    timeout_secs: u32,
    retries: u32,
    retry_interval_ms: u64,
    read_buffer_size: usize,
    write_buffer_size: usize,
    encoding: String,
    #[serde(skip)]
    notifier: ChangeNotifier,
}

impl DeviceSettings {
    /// Create settings with the default knobs for a device called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_control: DEFAULT_PORT_CONTROL,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            encoding: DEFAULT_ENCODING.to_string(),
            notifier: ChangeNotifier::default(),
        }
    }

    /// Device name, used in log output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true`: open and close the transport around every operation.
    /// `false`: keep it open between explicit open and close calls.
    #[must_use]
    pub fn port_control(&self) -> bool {
        self.port_control
    }

    #[must_use]
    pub fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs))
    }

    /// Attempts per operation before a transient failure becomes fatal.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    #[must_use]
    pub fn retry_interval_ms(&self) -> u64 {
        self.retry_interval_ms
    }

    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    #[must_use]
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    #[must_use]
    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    /// Text encoding label the device expects.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn set_port_control(&mut self, enabled: bool) {
        let Self {
            name,
            notifier,
            port_control: slot,
            ..
        } = self;
        store(notifier, name, "port_control", slot, enabled);
    }

    pub fn set_timeout_secs(&mut self, secs: u32) {
        let Self {
            name,
            notifier,
            timeout_secs: slot,
            ..
        } = self;
        store(notifier, name, "timeout_secs", slot, secs.max(MIN_KNOB_VALUE));
    }

    pub fn set_retries(&mut self, retries: u32) {
        let Self {
            name,
            notifier,
            retries: slot,
            ..
        } = self;
        store(notifier, name, "retries", slot, retries.max(MIN_KNOB_VALUE));
    }

    pub fn set_retry_interval_ms(&mut self, millis: u64) {
        let Self {
            name,
            notifier,
            retry_interval_ms: slot,
            ..
        } = self;
        store(
            notifier,
            name,
            "retry_interval_ms",
            slot,
            millis.max(u64::from(MIN_KNOB_VALUE)),
        );
    }

    pub fn set_read_buffer_size(&mut self, size: usize) {
        let Self {
            name,
            notifier,
            read_buffer_size: slot,
            ..
        } = self;
        store(
            notifier,
            name,
            "read_buffer_size",
            slot,
            size.max(MIN_KNOB_VALUE as usize),
        );
    }

    pub fn set_write_buffer_size(&mut self, size: usize) {
        let Self {
            name,
            notifier,
            write_buffer_size: slot,
            ..
        } = self;
        store(
            notifier,
            name,
            "write_buffer_size",
            slot,
            size.max(MIN_KNOB_VALUE as usize),
        );
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        let Self {
            name,
            notifier,
            encoding: slot,
            ..
        } = self;
        store(notifier, name, "encoding", slot, encoding.into());
    }

    #[must_use]
    pub fn with_port_control(mut self, enabled: bool) -> Self {
        self.set_port_control(enabled);
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u32) -> Self {
        self.set_timeout_secs(secs);
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.set_retries(retries);
        self
    }

    #[must_use]
    pub fn with_retry_interval_ms(mut self, millis: u64) -> Self {
        self.set_retry_interval_ms(millis);
        self
    }

    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.set_read_buffer_size(size);
        self
    }

    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.set_write_buffer_size(size);
        self
    }

    /// Subscribe to change events of these settings and of the transport
    /// configuration that owns them.
    pub fn subscribe(&mut self) -> broadcast::Receiver<ConfigEvent> {
        self.notifier.subscribe()
    }

    /// Store `value` into `slot`, publishing change events around the
    /// assignment when the value actually differs.
    ///
    /// Transport configurations use this for their own fields so that every
    /// property of a device publishes on the same channel. Returns `true` if
    /// the value changed.
    pub fn update<T>(&self, property: &'static str, slot: &mut T, value: T) -> bool
    where
        T: PartialEq + Display,
    {
        store(&self.notifier, &self.name, property, slot, value)
    }
}

/// Assign `value` to `slot`, publishing around the assignment when it differs.
fn store<T>(
    notifier: &ChangeNotifier,
    device: &str,
    property: &'static str,
    slot: &mut T,
    value: T,
) -> bool
where
    T: PartialEq + Display,
{
    if *slot == value {
        return false;
    }

    notifier.publish(device, ChangePhase::Changing, property, &value);
    *slot = value;
    notifier.publish(device, ChangePhase::Changed, property, &*slot);
    true
}

impl PartialEq for DeviceSettings {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.port_control == other.port_control
            && self.timeout_secs == other.timeout_secs
            && self.retries == other.retries
            && self.retry_interval_ms == other.retry_interval_ms
            && self.read_buffer_size == other.read_buffer_size
            && self.write_buffer_size == other.write_buffer_size
            && self.encoding == other.encoding
    }
}

/// Wire form of [`DeviceSettings`]; signed so that negative knobs clamp
/// instead of failing to parse.
#[derive(Deserialize)]
#[serde(default)]
struct RawSettings {
    name: String,
    port_control: bool,
    timeout_secs: i64,
    retries: i64,
    retry_interval_ms: i64,
    read_buffer_size: i64,
    write_buffer_size: i64,
    encoding: String,
}

impl Default for RawSettings {
    fn default() -> Self {
        let defaults = DeviceSettings::new("Device");
        Self {
            name: defaults.name,
            port_control: defaults.port_control,
            timeout_secs: i64::from(defaults.timeout_secs),
            retries: i64::from(defaults.retries),
            retry_interval_ms: defaults.retry_interval_ms as i64,
            read_buffer_size: defaults.read_buffer_size as i64,
            write_buffer_size: defaults.write_buffer_size as i64,
            encoding: defaults.encoding,
        }
    }
}

fn clamp_knob(value: i64) -> i64 {
    value.max(i64::from(MIN_KNOB_VALUE))
}

impl From<RawSettings> for DeviceSettings {
    fn from(raw: RawSettings) -> Self {
        Self {
            name: raw.name,
            port_control: raw.port_control,
            timeout_secs: u32::try_from(clamp_knob(raw.timeout_secs)).unwrap_or(u32::MAX),
            retries: u32::try_from(clamp_knob(raw.retries)).unwrap_or(u32::MAX),
            retry_interval_ms: clamp_knob(raw.retry_interval_ms) as u64,
            read_buffer_size: usize::try_from(clamp_knob(raw.read_buffer_size))
                .unwrap_or(usize::MAX),
            write_buffer_size: usize::try_from(clamp_knob(raw.write_buffer_size))
                .unwrap_or(usize::MAX),
            encoding: raw.encoding,
            notifier: ChangeNotifier::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let settings = DeviceSettings::new("Serial");

        assert_eq!(settings.name(), "Serial");
        assert!(settings.port_control());
        assert_eq!(settings.timeout_secs(), 3);
        assert_eq!(settings.retries(), 3);
        assert_eq!(settings.retry_interval_ms(), 3000);
        assert_eq!(settings.read_buffer_size(), 200);
        assert_eq!(settings.write_buffer_size(), 3000);
        assert_eq!(settings.encoding(), "IBM860");
    }

    #[test]
    fn test_zero_knobs_are_stored_as_one() {
        let mut settings = DeviceSettings::new("Device");
        settings.set_timeout_secs(0);
        settings.set_retries(0);
        settings.set_retry_interval_ms(0);
        settings.set_read_buffer_size(0);
        settings.set_write_buffer_size(0);

        assert_eq!(settings.timeout_secs(), 1);
        assert_eq!(settings.retries(), 1);
        assert_eq!(settings.retry_interval_ms(), 1);
        assert_eq!(settings.read_buffer_size(), 1);
        assert_eq!(settings.write_buffer_size(), 1);
    }

    #[rstest]
    #[case(-10, 1)]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(42, 42)]
    fn test_deserialized_knobs_are_clamped(#[case] input: i64, #[case] expected: u64) {
        let json = format!(
            r#"{{"name":"Dev","timeout_secs":{input},"retries":{input},"retry_interval_ms":{input},"read_buffer_size":{input},"write_buffer_size":{input}}}"#
        );
        let settings: DeviceSettings = serde_json::from_str(&json).unwrap();

        assert_eq!(u64::from(settings.timeout_secs()), expected);
        assert_eq!(u64::from(settings.retries()), expected);
        assert_eq!(settings.retry_interval_ms(), expected);
        assert_eq!(settings.read_buffer_size() as u64, expected);
        assert_eq!(settings.write_buffer_size() as u64, expected);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: DeviceSettings = serde_json::from_str(r#"{"name":"Scale"}"#).unwrap();
        assert_eq!(settings, DeviceSettings::new("Scale"));
    }

    #[test]
    fn test_serialize_round_trip() {
        let settings = DeviceSettings::new("Printer")
            .with_port_control(false)
            .with_write_buffer_size(64);

        let json = serde_json::to_string(&settings).unwrap();
        let back: DeviceSettings = serde_json::from_str(&json).unwrap();

        assert_eq!(settings, back);
    }

    #[test]
    fn test_events_published_before_and_after() {
        let mut settings = DeviceSettings::new("Printer");
        let mut events = settings.subscribe();

        settings.set_write_buffer_size(512);

        let before = events.try_recv().unwrap();
        let after = events.try_recv().unwrap();
        assert_eq!(before.phase, ChangePhase::Changing);
        assert_eq!(after.phase, ChangePhase::Changed);
        assert_eq!(before.property, "write_buffer_size");
        assert_eq!(after.value, "512");
        assert_eq!(after.device, "Printer");
    }

    #[test]
    fn test_no_event_when_value_unchanged() {
        let mut settings = DeviceSettings::new("Printer");
        let mut events = settings.subscribe();

        settings.set_retries(3);
        settings.set_port_control(true);

        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_update_tracks_foreign_fields() {
        let mut settings = DeviceSettings::new("TCP");
        let mut events = settings.subscribe();
        let mut host = String::from("10.0.0.1");

        assert!(settings.update("host", &mut host, "10.0.0.2".to_string()));
        assert!(!settings.update("host", &mut host, "10.0.0.2".to_string()));

        assert_eq!(host, "10.0.0.2");
        assert_eq!(events.try_recv().unwrap().property, "host");
        assert_eq!(events.try_recv().unwrap().value, "10.0.0.2");
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let mut settings = DeviceSettings::new("File");
        settings.set_retries(9);
        assert_eq!(settings.retries(), 9);
    }
}
