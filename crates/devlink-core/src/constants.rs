//! Default values for device configuration.
//!
//! Every transport configuration starts from these values. They mirror what
//! point-of-sale peripherals usually tolerate out of the box: short connect
//! timeouts, a handful of retries spaced a few seconds apart and buffers big
//! enough for a full receipt.
//!
//! # Usage
//!
//! ```
//! use devlink_core::constants::*;
//! use std::time::Duration;
//!
//! let interval = Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS);
//! assert_eq!(interval.as_secs(), 3);
//! assert!(DEFAULT_PORT_CONTROL);
//! ```

// ============================================================================
// Port Control
// ============================================================================

/// Open and close the transport around every logical operation by default.
pub const DEFAULT_PORT_CONTROL: bool = true;

// ============================================================================
// Timeouts and Retries
// ============================================================================

/// Transport timeout in seconds, applied when the transport is opened.
pub const DEFAULT_TIMEOUT_SECS: u32 = 3;

/// Attempts made for a single read or write before giving up.
pub const DEFAULT_RETRIES: u32 = 3;

/// Delay between two attempts, in milliseconds.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 3000;

/// Pause between the write and the read of a write-read exchange, in milliseconds.
///
/// Models the turnaround time of request/response devices such as fiscal
/// printers and scales.
pub const DEFAULT_WRITE_READ_DELAY_MS: u64 = 10;

/// Lower bound applied to every numeric knob on assignment.
pub const MIN_KNOB_VALUE: u32 = 1;

// ============================================================================
// Buffers
// ============================================================================

/// Maximum bytes requested from the transport per read call.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 200;

/// Maximum bytes handed to the transport per write call.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 3000;

/// Serial ports use larger read buffers than the generic default.
pub const SERIAL_READ_BUFFER_SIZE: usize = 4096;

/// Serial ports use smaller write chunks than the generic default.
pub const SERIAL_WRITE_BUFFER_SIZE: usize = 2048;

/// Capacity, in chunks, of the queue behind push-based transports.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

// ============================================================================
// Serial Line
// ============================================================================

/// Default serial port name.
pub const DEFAULT_SERIAL_PORT: &str = "COM1";

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

// ============================================================================
// Text Encoding
// ============================================================================

/// Code page most Brazilian fiscal printers expect.
///
/// Only recorded on the configuration; conversion is done by the caller.
pub const DEFAULT_ENCODING: &str = "IBM860";

// ============================================================================
// Port Name Prefixes
// ============================================================================

/// Windows serial port prefix.
pub const PORT_PREFIX_COM: &str = "COM";

/// Parallel port prefix, driven through the serial backend.
pub const PORT_PREFIX_LPT: &str = "LPT";

/// Unix device node prefix, driven through the serial backend.
pub const PORT_PREFIX_DEV: &str = "/dev/";

/// TCP port prefix (`TCP:host:port`).
pub const PORT_PREFIX_TCP: &str = "TCP:";

/// Raw printer prefix (`RAW:printer-name`).
pub const PORT_PREFIX_RAW: &str = "RAW:";

/// File prefix (`FILE:/path/to/file`).
pub const PORT_PREFIX_FILE: &str = "FILE:";

// ============================================================================
// Transport Tags
// ============================================================================

/// Registry tag of the serial port transport.
pub const TAG_SERIAL: &str = "serial";

/// Registry tag of the raw TCP socket transport.
pub const TAG_TCP: &str = "tcp";

/// Registry tag of the print spooler transport.
pub const TAG_RAW: &str = "raw";

/// Registry tag of the plain file transport.
pub const TAG_FILE: &str = "file";

/// Registry tag of the USB HID transport.
pub const TAG_HID: &str = "hid";

/// Registry tag of the push-to-pull queued transport.
pub const TAG_QUEUED: &str = "queued";

/// Separator between a tag and its refinements, e.g. `serial.ftdi`.
pub const TAG_SEPARATOR: char = '.';
