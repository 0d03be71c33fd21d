use core::fmt;
use core::time::Duration;

use embedded_hal::digital::ErrorKind;

use crate::gpio::Direction;

/// Boxed source error of a GPIO backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong between opening the controller and
/// handing back a weight.
///
/// None of these are retried: a bad GPIO state is a wiring or
/// configuration fault the driver cannot fix on its own.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The GPIO controller does not exist or access was denied.
    #[error("cannot open GPIO controller `{name}`")]
    DeviceOpen {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The pin is invalid or already reserved by another handle.
    #[error("cannot acquire GPIO line {pin} as {direction}")]
    LineAcquire {
        pin: u32,
        direction: Direction,
        #[source]
        source: BoxError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The OS refused to pin the process to the requested core.
    #[error("cannot pin process to CPU {cpu}")]
    Scheduling { cpu: usize },

    /// The data line never went low within the configured ready timeout.
    #[error("hx711 not ready after {waited:?}")]
    DeviceNotReady { waited: Duration },

    /// A GPIO read or write failed mid-handshake. The backend's own error
    /// is logged where it happens.
    #[error("hx711 {role} line I/O failed ({kind:?})")]
    Pin { role: PinRole, kind: ErrorKind },
}

/// Which of the two hx711 lines an I/O failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    Clock,
    Data,
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::Clock => f.write_str("clock"),
            PinRole::Data => f.write_str("data"),
        }
    }
}

impl Error {
    pub(crate) fn clock<E: embedded_hal::digital::Error>(err: E) -> Self {
        Error::Pin {
            role: PinRole::Clock,
            kind: err.kind(),
        }
    }

    pub(crate) fn data<E: embedded_hal::digital::Error>(err: E) -> Self {
        Error::Pin {
            role: PinRole::Data,
            kind: err.kind(),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
