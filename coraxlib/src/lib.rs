//! Host-side control and streaming runtime for Corax capture/playout cards.
//!
//! The [driver::Driver] trait is the only boundary that touches the kernel;
//! everything above it (device model, signal routing, SDRAM auditing, the
//! AutoCirculate engine, capture/playout sessions) is pure host logic.
//! [sim::SimDriver] stands in for the kernel side in tests and tooling.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod anc;
pub mod audio;
pub mod audit;
pub mod autocirc;
pub mod caps;
pub mod device;
pub mod dma;
pub mod driver;
pub mod format;
pub mod ring;
pub mod router;
pub mod sim;
pub mod stream;
pub mod timecode;

pub use corax_regs::{AudioSystem, Channel, DeviceId};
pub use device::CoraxCard;
pub use driver::Driver;

/// An error from the runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Opening or claiming the device failed.
    DeviceUnavailable,
    /// Another application holds the device.
    Busy,
    /// Register number out of range for this device.
    BadRegister(u32),
    /// The feature or widget is not present on this device.
    UnsupportedOnDevice,
    /// The route ROM rejected a crosspoint connection.
    IllegalRoute {
        input: corax_regs::InputXpt,
        output: corax_regs::OutputXpt,
    },
    /// No frame is ready for transfer; wait for the next vertical interrupt.
    NoFrame,
    /// A capture wrap overwrote a pending frame.
    FrameDropped,
    /// A blocking wait was cancelled.
    Aborted,
    /// A host buffer is shorter than the transfer requires.
    BufferTooSmall { needed: usize, got: usize },
    /// The operation is not legal in the channel's current state.
    InvalidState,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Error::DeviceUnavailable => write!(f, "device unavailable"),
            Error::Busy => write!(f, "device held by another application"),
            Error::BadRegister(num) => write!(f, "bad register number {}", num),
            Error::UnsupportedOnDevice => write!(f, "unsupported on this device"),
            Error::IllegalRoute { input, output } => {
                write!(f, "illegal route {} <== {}", input, output)
            }
            Error::NoFrame => write!(f, "no frame available"),
            Error::FrameDropped => write!(f, "frame dropped"),
            Error::Aborted => write!(f, "aborted"),
            Error::BufferTooSmall { needed, got } => {
                write!(f, "buffer too small: need {} bytes, got {}", needed, got)
            }
            Error::InvalidState => write!(f, "invalid channel state"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

/// The shared cancellation flag.
///
/// One flag per session, shared by every blocking wait: frame ring waits and
/// vertical-interrupt waits both poll it and fail with [Error::Aborted] once
/// it is raised.
#[derive(Debug, Default)]
pub struct AbortFlag {
    raised: AtomicBool,
}

impl AbortFlag {
    pub fn new() -> AbortFlag {
        AbortFlag::default()
    }

    /// Raise the flag. Every pending and future wait fails with `Aborted`.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn abort_flag_latches() {
        let flag = AbortFlag::new();
        assert!(!flag.is_raised());
        flag.raise();
        assert!(flag.is_raised());
        flag.raise();
        assert!(flag.is_raised());
    }

    #[test]
    fn errors_render() {
        assert_eq!("bad register number 12", Error::BadRegister(12).to_string());
        assert_eq!(
            "buffer too small: need 10 bytes, got 4",
            Error::BufferTooSmall { needed: 10, got: 4 }.to_string()
        );
    }
}
