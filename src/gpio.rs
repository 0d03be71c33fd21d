//! GPIO line manager.
//!
//! Owns the GPIO controller and hands out directional line handles for the
//! hx711 clock (output) and data (input) pins. Lines implement the
//! `embedded-hal` digital traits so they plug straight into
//! [`HX711`](crate::hx711::HX711).
//!
//! A line is released when it is dropped or when [`OutputLine::release`] /
//! [`InputLine::release`] is called, whichever happens first. Releasing
//! twice is a no-op.

use core::fmt;
use std::path::PathBuf;

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin, PinState};
use linux_embedded_hal::gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use log::{debug, error};

use crate::error::{BoxError, Error, Result};

/// Consumer label the kernel shows for our reservations.
const CONSUMER: &str = "hx711";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Something that can reserve single lines of a GPIO controller.
///
/// The reservation lives as long as the returned handle; dropping the handle
/// gives the line back.
pub trait LineProvider {
    type Handle: LineIo;

    /// Reserve `pin` in `direction`. `initial` is the starting level of an
    /// output and ignored for inputs.
    fn request(
        &mut self,
        pin: u32,
        direction: Direction,
        initial: bool,
    ) -> core::result::Result<Self::Handle, BoxError>;
}

/// Level access on a reserved line.
pub trait LineIo {
    fn get(&self) -> core::result::Result<bool, BoxError>;
    fn set(&self, value: bool) -> core::result::Result<(), BoxError>;
}

impl LineProvider for Chip {
    type Handle = LineHandle;

    fn request(
        &mut self,
        pin: u32,
        direction: Direction,
        initial: bool,
    ) -> core::result::Result<LineHandle, BoxError> {
        let flags = match direction {
            Direction::Input => LineRequestFlags::INPUT,
            Direction::Output => LineRequestFlags::OUTPUT,
        };
        let handle = self.get_line(pin)?.request(flags, initial as u8, CONSUMER)?;
        Ok(handle)
    }
}

impl LineIo for LineHandle {
    fn get(&self) -> core::result::Result<bool, BoxError> {
        Ok(self.get_value()? != 0)
    }

    fn set(&self, value: bool) -> core::result::Result<(), BoxError> {
        self.set_value(value as u8)?;
        Ok(())
    }
}

/// Failure of a single line operation.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("GPIO line {pin} was already released")]
    Released { pin: u32 },
    #[error("GPIO line {pin} I/O failed")]
    Io {
        pin: u32,
        #[source]
        source: BoxError,
    },
}

impl embedded_hal::digital::Error for LineError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Maps a controller name to its character device. Bare names such as
/// `gpiochip0` live under `/dev`, anything with a slash is a path already.
pub fn controller_path(name: &str) -> PathBuf {
    if name.contains('/') {
        PathBuf::from(name)
    } else {
        PathBuf::from("/dev").join(name)
    }
}

/// An open GPIO controller.
pub struct GpioController<P = Chip> {
    name: String,
    provider: P,
}

impl GpioController<Chip> {
    /// Open the named controller, e.g. `gpiochip0`.
    pub fn open(name: &str) -> Result<Self> {
        let path = controller_path(name);
        let chip = Chip::new(&path).map_err(|e| Error::DeviceOpen {
            name: name.to_owned(),
            source: e.into(),
        })?;
        debug!("opened GPIO controller {} ({} lines)", path.display(), chip.num_lines());
        Ok(Self::with_provider(name, chip))
    }
}

impl<P: LineProvider> GpioController<P> {
    pub fn with_provider(name: &str, provider: P) -> Self {
        Self {
            name: name.to_owned(),
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reserve `pin` as an output driven to `initial`.
    pub fn acquire_output(&mut self, pin: u32, initial: PinState) -> Result<OutputLine<P::Handle>> {
        let handle = self.request(pin, Direction::Output, initial == PinState::High)?;
        Ok(OutputLine(Reservation::new(pin, handle)))
    }

    /// Reserve `pin` as an input.
    pub fn acquire_input(&mut self, pin: u32) -> Result<InputLine<P::Handle>> {
        let handle = self.request(pin, Direction::Input, false)?;
        Ok(InputLine(Reservation::new(pin, handle)))
    }

    /// Close the controller. Lines handed out earlier should be released
    /// before this.
    pub fn close(self) {
        debug!("closing GPIO controller {}", self.name);
    }

    fn request(&mut self, pin: u32, direction: Direction, initial: bool) -> Result<P::Handle> {
        let handle = self
            .provider
            .request(pin, direction, initial)
            .map_err(|source| Error::LineAcquire {
                pin,
                direction,
                source,
            })?;
        debug!("acquired GPIO line {} on {} as {}", pin, self.name, direction);
        Ok(handle)
    }
}

/// Acquire the hx711 clock line (output, low) and data line (input).
///
/// If the data line cannot be acquired the clock line is released before
/// the error is returned, so a failed start never leaks a reservation.
pub fn acquire_hx711_lines<P: LineProvider>(
    controller: &mut GpioController<P>,
    sck_pin: u32,
    dt_pin: u32,
) -> Result<(OutputLine<P::Handle>, InputLine<P::Handle>)> {
    let mut sck = controller.acquire_output(sck_pin, PinState::Low)?;
    match controller.acquire_input(dt_pin) {
        Ok(dt) => Ok((sck, dt)),
        Err(e) => {
            sck.release();
            Err(e)
        }
    }
}

struct Reservation<H> {
    pin: u32,
    handle: Option<H>,
}

impl<H: LineIo> Reservation<H> {
    fn new(pin: u32, handle: H) -> Self {
        Self {
            pin,
            handle: Some(handle),
        }
    }

    fn handle(&self) -> core::result::Result<&H, LineError> {
        self.handle.as_ref().ok_or_else(|| {
            error!("GPIO line {} used after release", self.pin);
            LineError::Released { pin: self.pin }
        })
    }

    fn get(&self) -> core::result::Result<bool, LineError> {
        self.handle()?.get().map_err(|source| self.io_error(source))
    }

    fn set(&self, value: bool) -> core::result::Result<(), LineError> {
        self.handle()?.set(value).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: BoxError) -> LineError {
        error!("GPIO line {}: {}", self.pin, source);
        LineError::Io {
            pin: self.pin,
            source,
        }
    }

    fn release(&mut self) {
        if self.handle.take().is_some() {
            debug!("released GPIO line {}", self.pin);
        }
    }
}

/// A line reserved as output. Used for the hx711 clock.
pub struct OutputLine<H = LineHandle>(Reservation<H>);

/// A line reserved as input. Used for the hx711 data line.
pub struct InputLine<H = LineHandle>(Reservation<H>);

macro_rules! line_common {
    ($line:ident) => {
        impl<H: LineIo> $line<H> {
            pub fn pin(&self) -> u32 {
                self.0.pin
            }

            /// Give the line back to the controller. Safe to call again.
            pub fn release(&mut self) {
                self.0.release();
            }

            pub fn is_released(&self) -> bool {
                self.0.handle.is_none()
            }
        }

        impl<H> ErrorType for $line<H> {
            type Error = LineError;
        }

        impl<H: LineIo> InputPin for $line<H> {
            fn is_high(&mut self) -> core::result::Result<bool, LineError> {
                self.0.get()
            }

            fn is_low(&mut self) -> core::result::Result<bool, LineError> {
                self.0.get().map(|v| !v)
            }
        }
    };
}

line_common!(OutputLine);
line_common!(InputLine);

impl<H: LineIo> OutputPin for OutputLine<H> {
    fn set_low(&mut self) -> core::result::Result<(), LineError> {
        self.0.set(false)
    }

    fn set_high(&mut self) -> core::result::Result<(), LineError> {
        self.0.set(true)
    }
}
