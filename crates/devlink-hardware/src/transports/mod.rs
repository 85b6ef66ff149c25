//! Concrete transport backends.
//!
//! Each backend adapts one platform primitive to the [`Transport`] contract
//! and nothing more. Blocking drivers run on the blocking thread pool.
//!
//! [`Transport`]: crate::traits::Transport

pub mod file;
#[cfg(feature = "hardware-hid")]
pub mod hid;
pub mod queued;
pub mod raw;
#[cfg(feature = "hardware-serial")]
pub mod serial;
pub mod tcp;

pub use file::FileTransport;
#[cfg(feature = "hardware-hid")]
pub use hid::HidTransport;
pub use queued::QueuedTransport;
pub use raw::RawTransport;
#[cfg(feature = "hardware-serial")]
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

/// Lock a driver handle shared with the blocking pool.
#[cfg(any(feature = "hardware-serial", feature = "hardware-hid"))]
pub(crate) fn lock_driver<'a, D: ?Sized>(
    driver: &'a std::sync::Mutex<D>,
    device: &str,
) -> std::io::Result<std::sync::MutexGuard<'a, D>> {
    driver
        .lock()
        .map_err(|_| std::io::Error::other(format!("{device} driver lock poisoned")))
}

/// Flatten the result of a blocking driver call.
#[cfg(any(feature = "hardware-serial", feature = "hardware-hid"))]
pub(crate) fn joined<R>(
    result: Result<std::io::Result<R>, tokio::task::JoinError>,
) -> std::io::Result<R> {
    result.map_err(std::io::Error::other)?
}
