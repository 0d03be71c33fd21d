//! HX711 load cell driver bit-banged over Linux GPIO, plus a tare-and-average
//! weighing session.
//!
//! ```no_run
//! use gpio_loadcell::gpio::{acquire_hx711_lines, GpioController};
//! use gpio_loadcell::hx711::HX711;
//! use gpio_loadcell::session::Session;
//! use linux_embedded_hal::Delay;
//!
//! # fn main() -> Result<(), gpio_loadcell::Error> {
//! gpio_loadcell::sched::pin_to_cpu(2)?;
//! let mut controller = GpioController::open("gpiochip0")?;
//! let (sck, dt) = acquire_hx711_lines(&mut controller, 17, 18)?;
//! let mut hx711 = HX711::new(sck, dt, Delay)?;
//! let session = Session { sample_count: 10, scale_factor: 106.5, inter_sample_delay_ms: 100 };
//! let grams = session.run(&mut hx711, &mut Delay)?;
//! println!("{grams:.2} g");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gpio;
pub mod hx711;
pub mod output;
pub mod sched;
pub mod session;

pub use error::{Error, Result};

/// A source of raw, sign-corrected ADC counts.
pub trait RawRead {
    type Error;

    /// Read the raw value from the load cell.
    fn read(&mut self) -> core::result::Result<i32, Self::Error>;
}

/// Load cell with its own tare offset and scale.
pub trait LoadCell: RawRead {
    /// Read the value after applying offset and scaling.
    fn read_scaled(&mut self) -> core::result::Result<f32, Self::Error>;

    /// Zero the load cell offset by averaging `num_samples` readings
    fn tare(&mut self, num_samples: usize) -> core::result::Result<(), Self::Error>;

    /// Get the load cell offset.
    fn get_offset(&self) -> i32;

    /// Set the scale (AKA calibrate the scale), in counts per unit.
    /// Use this to ensure that 1kg ~ 1kg
    fn set_scale(&mut self, scale: f32);

    /// Get the scale.
    fn get_scale(&self) -> f32;
}
